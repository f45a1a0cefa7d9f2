//! Modelos de dominio (documentos del corpus, chunks y turnos de conversación).

use chrono::{DateTime, Utc};

/// Un documento cargado del directorio configurado.
/// Inmutable una vez extraído el texto; el chunker lo consume sin modificarlo.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub text: String,
}

/// Un trozo de texto de un documento, unidad de recuperación del índice.
/// Los chunks consecutivos de un mismo documento comparten un solapamiento fijo.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub index: usize,
    pub text: String,
}

/// Rol de un turno dentro del historial de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "System",
            ChatRole::User => "Human",
            ChatRole::Assistant => "AI",
        }
    }
}

/// Un turno del historial de conversación de una sesión.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
