//! # Módulo Web — API, Página e Progresso
//!
//! Camada HTTP construída com **Axum** + **Maud** + **HTMX** + **SSE**.
//!
//! ## Rotas
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Browser (HTMX + EventSource)  /  clientes da API JSON        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  GET  /                     → página completa (Maud)         │
//! │  GET  /events               → SSE (progresso da extração)    │
//! │  POST /api/upload           → PDF multipart → data/uploads   │
//! │  POST /api/extract          → extração (cache por chave)     │
//! │  GET  /api/results          → lista de resultados gravados   │
//! │  GET  /api/results/{key}    → linhas de um resultado         │
//! │  POST /api/compare          → grupos entre documentos        │
//! │  GET  /api/compare/export   → CSV de uma comparação          │
//! │  POST /ui/extract           → fragmento HTMX                 │
//! │  POST /ui/compare           → fragmento HTMX                 │
//! │  GET  /ui/results           → fragmento HTMX                 │
//! │  GET  /files/*              → arquivos de extracted_results  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! CORS aberto para qualquer origem: o front pode rodar em outro servidor.
//!
//! ## Submódulos
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | [`state`] | Estado compartilhado (`AppState`) |
//! | [`events`] | Enum de eventos SSE da extração |
//! | [`handlers`] | Handlers Axum e mapeamento de erros |
//! | [`templates`] | Templates Maud |

pub mod events;
pub mod handlers;
pub mod state;
pub mod templates;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use state::AppState;

/// Limite de corpo para uploads de PDF.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Cria o router Axum com todas as rotas da aplicação.
pub fn create_router(state: AppState) -> Router {
    let results_dir = state.config.results_dir();
    Router::new()
        // ── Página e SSE ──────────────────────────────────────
        .route("/", get(handlers::index))
        .route("/events", get(handlers::sse_events))
        // ── API JSON ──────────────────────────────────────────
        .route(
            "/api/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/extract",
            post(handlers::extract).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/results", get(handlers::list_results))
        .route("/api/results/{key}", get(handlers::get_result))
        .route("/api/compare", post(handlers::compare))
        .route("/api/compare/export", get(handlers::export_comparison))
        // ── HTMX fragments ───────────────────────────────────
        .route(
            "/ui/extract",
            post(handlers::ui_extract).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/ui/compare", post(handlers::ui_compare))
        .route("/ui/results", get(handlers::ui_results))
        // ── Arquivos de resultado ─────────────────────────────
        .nest_service("/files", ServeDir::new(results_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
