use std::sync::Arc;

use crate::{
    agent::AgentEngine, config::AppConfig, session::SessionStore, vector_store::VectorIndex,
};

/// Estado compartido entre peticiones. El índice es de sólo lectura tras el
/// arranque; los historiales de sesión llevan su propia sincronización.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub index: Arc<VectorIndex>,
    pub agent: AgentEngine,
    pub sessions: SessionStore,
}
