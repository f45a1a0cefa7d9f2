//! Índice vectorial en memoria sobre los chunks del corpus.
//!
//! API pública:
//!   - `VectorIndex::build(&LlmEngine, Vec<Chunk>)`
//!   - `VectorIndex::search(&[f64], usize)`
//!
//! El índice se construye una vez en el arranque y es de sólo lectura después,
//! por lo que puede compartirse entre peticiones sin sincronización.

use anyhow::{anyhow, Result};
use tracing::info;

use crate::llm::LlmEngine;
use crate::models::Chunk;

/// Un chunk indexado junto a su vector de embedding.
#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f64>,
    chunk: Chunk,
}

/// Colección de pares (vector, chunk) con búsqueda por similitud coseno.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Vectoriza todos los chunks y construye el índice.
    /// Cualquier fallo del servicio de embeddings aborta el arranque.
    pub async fn build(llm: &LlmEngine, chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(anyhow!(
                "El corpus no produjo ningún chunk; el índice quedaría vacío"
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = llm.embed_texts(texts).await?;

        let entries = vectors
            .into_iter()
            .zip(chunks)
            .map(|(embedding, chunk)| IndexEntry { embedding, chunk })
            .collect::<Vec<_>>();

        info!("Índice vectorial construido con {} chunks", entries.len());
        Ok(Self { entries })
    }

    /// Devuelve como mucho `k` chunks ordenados por similitud coseno
    /// descendente con el vector de consulta. Orden estable: a igualdad de
    /// puntuación gana el chunk insertado antes.
    pub fn search(&self, query: &[f64], k: usize) -> Vec<(f64, &Chunk)> {
        let mut scored: Vec<(f64, &Chunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), &entry.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn from_raw(pairs: Vec<(Vec<f64>, Chunk)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(embedding, chunk)| IndexEntry { embedding, chunk })
                .collect(),
        }
    }
}

/// Similitud coseno entre dos vectores. Cero si las dimensiones no coinciden
/// o alguno de los dos es nulo.
fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            source: "memoria".to_string(),
            index: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn similitud_coseno_en_casos_conocidos() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-12);
        // Dimensiones distintas o vector nulo: sin similitud.
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn la_busqueda_ordena_por_similitud_descendente() {
        let index = VectorIndex::from_raw(vec![
            (vec![0.0, 1.0], chunk("c1", "perpendicular")),
            (vec![1.0, 0.0], chunk("c2", "exacto")),
            (vec![1.0, 1.0], chunk("c3", "diagonal")),
        ]);

        let results = index.search(&[1.0, 0.0], 3);
        let ids: Vec<&str> = results.iter().map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3", "c1"]);

        let scores: Vec<f64> = results.iter().map(|(s, _)| *s).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn la_busqueda_devuelve_como_mucho_k_resultados() {
        let index = VectorIndex::from_raw(vec![
            (vec![1.0, 0.0], chunk("c1", "a")),
            (vec![0.9, 0.1], chunk("c2", "b")),
            (vec![0.8, 0.2], chunk("c3", "c")),
        ]);

        assert_eq!(index.search(&[1.0, 0.0], 2).len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 3);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn indice_vacio_no_devuelve_nada() {
        let index = VectorIndex::default();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }
}
