//! # Eventos SSE de Extração
//!
//! Define o enum [`ExtractionEvent`]: todos os eventos emitidos durante uma
//! execução de extração, enviados em tempo real ao navegador via
//! Server-Sent Events (SSE).
//!
//! ## Ciclo de Vida dos Eventos
//!
//! ```text
//! Started → [BatchStarted → BatchCompleted | BatchFailed]×N → Completed
//!                                                    ou → Error
//! ```
//!
//! Batches vazios (sem página com texto suficiente) não emitem
//! `BatchStarted`: só aparecem na contagem `skipped` do `Completed`.
//!
//! ## Serialização
//!
//! `#[serde(tag = "type")]` produz JSON com discriminador:
//!
//! ```json
//! { "type": "BatchCompleted", "document": "acme_2024", "batch": 2, "total": 7, "pages": "Pages 11-20", "metrics": 14 }
//! ```

use serde::Serialize;

/// Evento emitido durante uma execução, enviado via SSE ao navegador.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ExtractionEvent {
    /// Documento aberto e segmentado.
    Started {
        document: String,
        pages: usize,
        /// Número de partes após a segmentação.
        total_batches: usize,
    },

    /// Chamada ao LLM para um batch prestes a começar.
    BatchStarted {
        document: String,
        /// Número do batch (1-indexed).
        batch: usize,
        total: usize,
        pages: String,
        /// Páginas que passaram no filtro de texto mínimo.
        pages_used: usize,
    },

    /// Batch processado; `metrics` conta só as métricas válidas.
    BatchCompleted {
        document: String,
        batch: usize,
        total: usize,
        pages: String,
        metrics: usize,
    },

    /// Batch abandonado (falha transitória ou resposta malformada).
    BatchFailed {
        document: String,
        batch: usize,
        total: usize,
        pages: String,
        message: String,
    },

    /// Execução concluída, com o sumário.
    Completed {
        document: String,
        metrics: usize,
        sections: usize,
        api_calls: usize,
        skipped: usize,
        failed: usize,
        calls_saved: usize,
        total_ms: u64,
    },

    /// Erro fatal: a execução foi abortada e nada foi gravado.
    Error { document: String, message: String },
}
