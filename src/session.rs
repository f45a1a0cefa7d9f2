//! Almacén de historiales de conversación por sesión.
//!
//! Estado en memoria del proceso: se pierde al reiniciar. Cada historial vive
//! tras su propio mutex asíncrono, de modo que dos peticiones concurrentes de
//! la misma sesión se serializan y las de sesiones distintas avanzan en
//! paralelo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::models::{ChatRole, ChatTurn};

/// Instrucción de sistema con la que arranca todo historial nuevo.
pub const BASELINE_SYSTEM_PROMPT: &str = "You are a law assistant for question-answering tasks. \
You are given a question about policies and law. \
You need to provide the best answer based on the information you have, and if you need more information, you can ask for it. \
You can only provide information about policies and law. \
You must answer the question in the language that the question is asked in.";

/// Historial de una sesión: turnos ordenados, el de sistema siempre primero.
#[derive(Debug)]
pub struct SessionHistory {
    turns: Vec<ChatTurn>,
}

impl SessionHistory {
    fn new() -> Self {
        Self {
            turns: vec![ChatTurn::new(ChatRole::System, BASELINE_SYSTEM_PROMPT)],
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Registra el intercambio completado y recorta el historial si excede el
    /// límite. El turno de sistema nunca se descarta; se eliminan los turnos
    /// no-sistema más antiguos.
    pub fn append_exchange(&mut self, user: &str, assistant: &str, max_turns: usize) {
        self.turns.push(ChatTurn::new(ChatRole::User, user));
        self.turns.push(ChatTurn::new(ChatRole::Assistant, assistant));

        let non_system = self.turns.len() - 1;
        if non_system > max_turns {
            let excess = non_system - max_turns;
            self.turns.drain(1..1 + excess);
        }

        if let Some(turn) = self.turns.last() {
            debug!(
                "Intercambio registrado a las {} ({} turnos)",
                turn.created_at.to_rfc3339(),
                self.turns.len()
            );
        }
    }

    /// Transcripción de los turnos no-sistema para la plantilla del agente,
    /// una línea "Rol: contenido" por turno.
    pub fn render_transcript(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.role != ChatRole::System)
            .map(|t| format!("{}: {}", t.role.as_str(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Mapa de sesión → historial, compartido entre peticiones.
#[derive(Clone)]
pub struct SessionStore {
    max_turns: usize,
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<SessionHistory>>>>>,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Devuelve el historial de la sesión, creándolo sembrado con la
    /// instrucción de sistema si es la primera vez que se ve el identificador.
    pub fn get_or_create(&self, session_id: &str) -> Arc<tokio::sync::Mutex<SessionHistory>> {
        let mut map = self.inner.lock().expect("mutex del almacén de sesiones envenenado");
        map.entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionHistory::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn una_sesion_nueva_solo_contiene_la_instruccion_de_sistema() {
        let store = SessionStore::new(40);
        let history = store.get_or_create("s1");
        let history = history.lock().await;

        assert_eq!(history.turns().len(), 1);
        assert_eq!(history.turns()[0].role, ChatRole::System);
        assert_eq!(history.turns()[0].content, BASELINE_SYSTEM_PROMPT);
        assert!(history.render_transcript().is_empty());
    }

    #[tokio::test]
    async fn el_mismo_identificador_devuelve_el_mismo_historial() {
        let store = SessionStore::new(40);
        {
            let history = store.get_or_create("s1");
            let mut history = history.lock().await;
            history.append_exchange("pregunta", "respuesta", 40);
        }

        let history = store.get_or_create("s1");
        let history = history.lock().await;
        assert_eq!(history.turns().len(), 3);

        let transcript = history.render_transcript();
        assert_eq!(transcript, "Human: pregunta\nAI: respuesta");
    }

    #[tokio::test]
    async fn sesiones_distintas_no_comparten_historial() {
        let store = SessionStore::new(40);
        {
            let history = store.get_or_create("s1");
            history.lock().await.append_exchange("a", "b", 40);
        }

        let other = store.get_or_create("s2");
        assert_eq!(other.lock().await.turns().len(), 1);
    }

    #[tokio::test]
    async fn el_recorte_conserva_el_turno_de_sistema_y_lo_mas_reciente() {
        let store = SessionStore::new(4);
        let history = store.get_or_create("s1");
        let mut history = history.lock().await;

        for i in 0..5 {
            history.append_exchange(&format!("p{i}"), &format!("r{i}"), 4);
        }

        // 1 turno de sistema + como mucho 4 turnos no-sistema.
        assert_eq!(history.turns().len(), 5);
        assert_eq!(history.turns()[0].role, ChatRole::System);
        assert_eq!(history.turns()[1].content, "p3");
        assert_eq!(history.turns()[4].content, "r4");
    }
}
