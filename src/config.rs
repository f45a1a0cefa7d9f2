//! Carga y gestión de configuración de la aplicación (OpenAI + SerpAPI + corpus documental).

use std::env;
use anyhow::{anyhow, Result};

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub serpapi_api_key: String,
    pub openai_model: String,
    pub docs_path: String,
    pub server_addr: String,

    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_k: usize,
    pub agent_max_steps: usize,
    pub session_max_turns: usize,
    pub docs_skip_errors: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    ///
    /// Las cuatro variables de los servicios externos son obligatorias: si falta
    /// alguna, el proceso no arranca.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("Falta OPENAI_API_KEY en el entorno"))?;
        let serpapi_api_key = env::var("SERPAPI_API_KEY")
            .map_err(|_| anyhow!("Falta SERPAPI_API_KEY en el entorno"))?;
        let openai_model = env::var("OPENAI_MODEL")
            .map_err(|_| anyhow!("Falta OPENAI_MODEL en el entorno"))?;
        let docs_path = env::var("DOCS_PATH")
            .map_err(|_| anyhow!("Falta DOCS_PATH en el entorno"))?;

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3344".to_string());

        let embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let chunk_size = parse_usize_var("CHUNK_SIZE", 1500)?;
        let chunk_overlap = parse_usize_var("CHUNK_OVERLAP", 200)?;
        if chunk_overlap >= chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({chunk_overlap}) debe ser menor que CHUNK_SIZE ({chunk_size})"
            ));
        }

        let retrieval_top_k = parse_usize_var("RETRIEVAL_TOP_K", 4)?;
        let agent_max_steps = parse_usize_var("AGENT_MAX_STEPS", 8)?;
        let session_max_turns = parse_usize_var("SESSION_MAX_TURNS", 40)?;

        let docs_skip_errors = env::var("DOCS_SKIP_ERRORS")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            openai_api_key,
            serpapi_api_key,
            openai_model,
            docs_path,
            server_addr,
            embedding_model,
            chunk_size,
            chunk_overlap,
            retrieval_top_k,
            agent_max_steps,
            session_max_turns,
            docs_skip_errors,
        })
    }
}

fn parse_usize_var(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| anyhow!("{name} debe ser un entero positivo, no '{raw}'")),
        Err(_) => Ok(default),
    }
}
