//! API HTTP: una única operación de pregunta/respuesta más un health check.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::app_state::AppState;

// --- Payloads y Respuestas de la API ---

/// Cuerpo de `POST /ask`. Ambos campos son obligatorios: si falta alguno,
/// el extractor `Json` de axum rechaza la petición con un 4xx.
#[derive(Debug, Deserialize)]
pub struct AskPayload {
    pub input: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub output: String,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/ask", post(ask_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

// --- Handlers ---

/// Resuelve una pregunta con el agente usando el historial de la sesión y
/// registra el intercambio completado.
#[axum::debug_handler]
async fn ask_handler(
    State(state): State<AppState>,
    Json(payload): Json<AskPayload>,
) -> Result<Json<AskResponse>, (StatusCode, Json<serde_json::Value>)> {
    if payload.input.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "El campo 'input' no puede estar vacío."})),
        ));
    }
    if payload.session_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "El campo 'session_id' no puede estar vacío."})),
        ));
    }

    // El mutex del historial se retiene durante toda la ejecución del agente:
    // peticiones concurrentes de la misma sesión se atienden en orden.
    let history = state.sessions.get_or_create(&payload.session_id);
    let mut history = history.lock().await;

    let transcript = history.render_transcript();
    let result = state.agent.run(&transcript, &payload.input).await;

    match result {
        Ok(answer) => {
            history.append_exchange(&payload.input, &answer, state.sessions.max_turns());
            info!(
                "Sesión '{}': pregunta respondida ({} turnos en el historial)",
                payload.session_id,
                history.turns().len()
            );
            Ok(Json(AskResponse { output: answer }))
        }
        Err(err) => {
            error!("Sesión '{}': el agente falló: {err}", payload.session_id);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("No se pudo responder a la pregunta: {err}")})),
            ))
        }
    }
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model": state.config.openai_model,
        "indexed_chunks": state.index.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn el_payload_exige_ambos_campos() {
        let err = serde_json::from_str::<AskPayload>(r#"{"input": "¿Qué es un pagaré?"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("session_id"));

        let err = serde_json::from_str::<AskPayload>(r#"{"session_id": "s1"}"#).unwrap_err();
        assert!(err.to_string().contains("input"));
    }

    #[test]
    fn un_payload_completo_se_deserializa() {
        let payload: AskPayload =
            serde_json::from_str(r#"{"input": "¿Qué es un pagaré?", "session_id": "s1"}"#)
                .unwrap();
        assert_eq!(payload.session_id, "s1");
    }

    #[test]
    fn la_respuesta_se_serializa_con_el_campo_output() {
        let body = serde_json::to_value(AskResponse { output: "hola".to_string() }).unwrap();
        assert_eq!(body, serde_json::json!({"output": "hola"}));
    }
}
