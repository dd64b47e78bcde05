//! # Estado da Aplicação Web
//!
//! Tudo que os handlers compartilham. Não há estado mutável em memória: os
//! resultados vivem no disco ([`ResultStore`]) e o progresso das execuções
//! passa pelo canal broadcast.
//!
//! ```text
//! AppState
//!  ├── config    (imutável após o startup)
//!  ├── store     (caminhos + formato; o estado real está em data/)
//!  └── events_tx (broadcast → GET /events)
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::persistence::ResultStore;
use crate::web::events::ExtractionEvent;

/// Estado compartilhado da aplicação Axum.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: ResultStore,
    /// Canal broadcast para eventos SSE de extração.
    pub events_tx: broadcast::Sender<ExtractionEvent>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            store: ResultStore::from_config(&config),
            config: Arc::new(config),
            events_tx,
        }
    }
}
