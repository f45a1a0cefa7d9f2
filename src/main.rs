// Módulos de la aplicación
mod agent;
mod api;
mod app_state;
mod config;
mod ingest;
mod llm;
mod models;
mod session;
mod tools;
mod vector_store;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::agent::AgentEngine;
use crate::app_state::AppState;
use crate::session::SessionStore;
use crate::tools::ToolSet;
use crate::vector_store::VectorIndex;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración (fail-fast si falta alguna clave de API)
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Cargar el corpus documental y trocearlo
    let documents = ingest::load_documents(Path::new(&cfg.docs_path), cfg.docs_skip_errors)
        .expect("Error cargando el corpus documental");
    info!("Cargados {} documentos de {}", documents.len(), cfg.docs_path);

    let chunks = ingest::chunk_documents(&documents, cfg.chunk_size, cfg.chunk_overlap);
    info!("Corpus troceado en {} chunks", chunks.len());

    // 4. Vectorizar el corpus y construir el índice (una vez, en frío)
    let llm = llm::LlmEngine::from_config(&cfg).expect("Error inicializando el motor LLM");
    let index = Arc::new(
        VectorIndex::build(&llm, chunks)
            .await
            .expect("Error construyendo el índice vectorial"),
    );

    // 5. Herramientas y agente
    let tools = Arc::new(ToolSet::new(&cfg, llm.clone(), index.clone()));
    let agent = AgentEngine::new(llm, tools, cfg.agent_max_steps);

    // 6. Estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        index,
        agent,
        sessions: SessionStore::new(cfg.session_max_turns),
    };

    // 7. Router con CORS (el preflight OPTIONS lo responde la capa)
    let app = Router::new()
        .merge(api::create_router(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 8. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor escuchando en http://{}", cfg.server_addr);

    axum::serve(listener, app)
        .await
        .expect("El servidor terminó con error");
}
