//! Abstracción sobre Rig para el modelo de chat y el modelo de embeddings de OpenAI.

use anyhow::{anyhow, Result};
use rig::client::{CompletionClient as _, EmbeddingsClient as _};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;

use crate::config::AppConfig;

/// Cliente de LLM y embeddings. Barato de clonar; el cliente HTTP real lo
/// gestiona Rig internamente.
#[derive(Debug, Clone)]
pub struct LlmEngine {
    chat_model: String,
    embedding_model: String,
}

impl LlmEngine {
    /// Construye el motor a partir de la configuración.
    ///
    /// Rig lee `OPENAI_API_KEY` del entorno; la configuración ya garantizó su
    /// presencia en el arranque.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            chat_model: cfg.openai_model.clone(),
            embedding_model: cfg.embedding_model.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    /// Calcula embeddings en bloque para una lista de textos.
    /// Devuelve un vector por texto, en el mismo orden.
    pub async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        let client = openai::Client::from_env();
        let model = client.embedding_model(&self.embedding_model);

        let expected = texts.len();
        let embeddings = model.embed_texts(texts).await?;

        if embeddings.len() != expected {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                expected
            ));
        }

        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    /// Embedding de una única consulta.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
        let mut vectors = self.embed_texts(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("No se pudo generar el embedding de la consulta"))
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    /// Una llamada al modelo de chat: instrucción de sistema fija + prompt
    /// completo (historial, pregunta y scratchpad los compone el agente).
    pub async fn complete(&self, preamble: &str, prompt: &str) -> Result<String> {
        let client = openai::Client::from_env();

        let agent = client
            .agent(&self.chat_model)
            .preamble(preamble)
            .temperature(0.0)
            .build();

        let answer = agent.prompt(prompt).await?;
        Ok(answer)
    }
}
