//! Herramientas del agente: recuperación sobre el índice vectorial y búsqueda
//! web vía SerpAPI. El agente selecciona la herramienta por su nombre exacto.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::llm::LlmEngine;
use crate::vector_store::VectorIndex;

pub const DOC_SEARCH_TOOL: &str = "policy_and_law_search";
pub const WEB_SEARCH_TOOL: &str = "Search";

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Descriptor de una herramienta: nombre único y descripción que guía al
/// agente sobre cuándo usarla.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Conjunto de herramientas disponible para el agente.
pub struct ToolSet {
    specs: Vec<ToolSpec>,
    index: Arc<VectorIndex>,
    llm: LlmEngine,
    web: SerpApiClient,
    top_k: usize,
}

impl ToolSet {
    pub fn new(cfg: &AppConfig, llm: LlmEngine, index: Arc<VectorIndex>) -> Self {
        let specs = vec![
            ToolSpec {
                name: DOC_SEARCH_TOOL,
                description: "Questions about policies and law",
            },
            ToolSpec {
                name: WEB_SEARCH_TOOL,
                description: "Search the web for information about news, articles, and more about Law",
            },
        ];

        let unique: HashSet<&str> = specs.iter().map(|s| s.name).collect();
        debug_assert_eq!(unique.len(), specs.len(), "nombres de herramienta duplicados");

        Self {
            specs,
            index,
            llm,
            web: SerpApiClient::new(cfg.serpapi_api_key.clone()),
            top_k: cfg.retrieval_top_k,
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Lista de nombres para la plantilla del prompt ("a, b").
    pub fn names(&self) -> String {
        self.specs
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ejecuta la herramienta `name` con la consulta `input`.
    /// El llamante debe haber comprobado antes que la herramienta existe.
    pub async fn call(&self, name: &str, input: &str) -> Result<String> {
        match name {
            DOC_SEARCH_TOOL => self.doc_search(input).await,
            WEB_SEARCH_TOOL => self.web.search(input).await,
            other => Err(anyhow!("Herramienta desconocida: {other}")),
        }
    }

    /// Recuperación semántica: vectoriza la consulta, busca los `top_k` chunks
    /// y los concatena en un único bloque de texto para el agente.
    async fn doc_search(&self, query: &str) -> Result<String> {
        let query_vec = self.llm.embed_query(query).await?;
        let results = self.index.search(&query_vec, self.top_k);

        info!(
            "Búsqueda documental: '{}' → {} chunks recuperados",
            query,
            results.len()
        );
        debug!(
            "Coincidencias: {:?}",
            results
                .iter()
                .map(|(score, c)| (c.document_id.as_str(), c.index, *score))
                .collect::<Vec<_>>()
        );

        if results.is_empty() {
            return Ok("No relevant passages were found in the indexed documents.".to_string());
        }

        let block = results
            .iter()
            .map(|(_, chunk)| format!("[{}]\n{}", chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        Ok(block)
    }
}

/// Cliente mínimo de SerpAPI (motor Google) sobre `reqwest`.
pub struct SerpApiClient {
    api_key: String,
    client: Client,
}

impl SerpApiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("No se pudo crear el cliente HTTP");

        Self { api_key, client }
    }

    /// Lanza la búsqueda y reduce la respuesta JSON a un texto breve.
    pub async fn search(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("No se pudo contactar con SerpAPI")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("SerpAPI devolvió {status}: {body}"));
        }

        let data: Value = response
            .json()
            .await
            .context("SerpAPI devolvió un JSON inválido")?;

        extract_search_answer(&data)
            .ok_or_else(|| anyhow!("SerpAPI no devolvió ningún resultado útil"))
    }
}

/// Reduce la respuesta de SerpAPI al mejor texto disponible, por orden de
/// preferencia: answer box, knowledge graph, snippets orgánicos.
fn extract_search_answer(data: &Value) -> Option<String> {
    if let Some(answer_box) = data.get("answer_box") {
        for key in ["answer", "snippet"] {
            if let Some(text) = answer_box.get(key).and_then(Value::as_str) {
                return Some(text.to_string());
            }
        }
    }

    if let Some(description) = data
        .get("knowledge_graph")
        .and_then(|kg| kg.get("description"))
        .and_then(Value::as_str)
    {
        return Some(description.to_string());
    }

    let snippets: Vec<String> = data
        .get("organic_results")?
        .as_array()?
        .iter()
        .take(4)
        .filter_map(|result| result.get("snippet").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    if snippets.is_empty() {
        None
    } else {
        Some(snippets.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn el_answer_box_tiene_prioridad() {
        let data = json!({
            "answer_box": { "answer": "42 días" },
            "organic_results": [{ "snippet": "otro texto" }]
        });
        assert_eq!(extract_search_answer(&data).unwrap(), "42 días");
    }

    #[test]
    fn sin_answer_box_se_usa_el_knowledge_graph() {
        let data = json!({
            "knowledge_graph": { "description": "Definición breve" },
            "organic_results": [{ "snippet": "otro texto" }]
        });
        assert_eq!(extract_search_answer(&data).unwrap(), "Definición breve");
    }

    #[test]
    fn como_ultimo_recurso_se_unen_los_snippets() {
        let data = json!({
            "organic_results": [
                { "snippet": "uno" },
                { "title": "sin snippet" },
                { "snippet": "dos" }
            ]
        });
        assert_eq!(extract_search_answer(&data).unwrap(), "uno\ndos");
    }

    #[test]
    fn respuesta_sin_resultados_no_produce_texto() {
        assert!(extract_search_answer(&json!({})).is_none());
        assert!(extract_search_answer(&json!({ "organic_results": [] })).is_none());
    }
}
