//! # Pipeline de Extração — Do PDF ao ResultSet
//!
//! Orquestra uma execução completa para um documento:
//!
//! ```text
//! PdfDocument
//!     │
//!     ▼
//! segment(pages_per_part) ──► Part 1, Part 2, ..., Part N
//!     │
//!     ▼  (estritamente em ordem, uma chamada por vez)
//! batch_text ──► vazio? pula (sem chamada)
//!     │
//!     ▼
//! ExtractionClient::extract ──► Ok(seções)  → resolve_batch, cooldown curto
//!                            ├► Transient   → warn, pula batch, cooldown longo
//!                            ├► Parse       → warn, zero métricas, cooldown longo
//!                            └► Config/Auth → aborta a execução inteira
//!     │
//!     ▼
//! aggregate ──► ResultSet + RunSummary
//! ```
//!
//! ## Modos
//!
//! - [`ExtractionMode::Batched`]: texto de páginas em batches (padrão).
//! - [`ExtractionMode::WholeDocument`]: o PDF inteiro vai inline numa única
//!   chamada, como uma parte cobrindo todas as páginas.
//!
//! ## Cooldowns
//!
//! Os cooldowns são `thread::sleep` no thread chamador. Por isso a execução
//! roda em `spawn_blocking`, nunca direto no runtime async.
//!
//! Uma execução abortada não devolve resultado parcial: quem persiste é o
//! chamador, e só com `Ok`.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::aggregator::{aggregate, resolve_batch};
use crate::config::Config;
use crate::core::{DocumentKey, ResultSet};
use crate::error::Result;
use crate::llm::prompts::EXTRACTION_PROMPT;
use crate::llm::{Content, ExtractionClient, LlmBackend};
use crate::pdf::{self, BatchText, Part, PdfDocument};
use crate::web::events::ExtractionEvent;

/// Como o documento é enviado ao LLM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    #[default]
    Batched,
    WholeDocument,
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "batched" | "pages" => Ok(ExtractionMode::Batched),
            "whole" | "whole_document" | "document" => Ok(ExtractionMode::WholeDocument),
            other => Err(format!("unknown extraction mode '{}'", other)),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Batched => f.write_str("batched"),
            ExtractionMode::WholeDocument => f.write_str("whole_document"),
        }
    }
}

/// Parâmetros de uma execução, tirados de [`Config`].
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub pages_per_part: usize,
    pub min_page_chars: usize,
    pub success_cooldown: Duration,
    pub failure_cooldown: Duration,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pages_per_part: config.pages_per_part,
            min_page_chars: config.min_page_chars,
            success_cooldown: config.success_cooldown,
            failure_cooldown: config.failure_cooldown,
        }
    }
}

/// Sumário de uma execução.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub batches: usize,
    pub api_calls: usize,
    /// Batches sem texto suficiente (nenhuma chamada feita).
    pub skipped: usize,
    /// Batches abandonados por `Transient` ou `Parse`.
    pub failed: usize,
    pub sections: usize,
    pub metrics: usize,
    /// Chamadas economizadas versus uma chamada por página.
    pub calls_saved: usize,
    pub total_ms: u64,
}

/// Resultado de uma execução bem-sucedida.
#[derive(Clone, Debug)]
pub struct Extraction {
    pub result: ResultSet,
    pub summary: RunSummary,
}

/// Conteúdo preparado para uma parte.
enum Prepared<'a> {
    Text(BatchText),
    Document { bytes: &'a [u8], pages: usize },
}

impl Prepared<'_> {
    fn content(&self) -> Content<'_> {
        match self {
            Prepared::Text(batch) => Content::Text(&batch.text),
            Prepared::Document { bytes, .. } => Content::Document(bytes),
        }
    }

    fn pages_used(&self) -> usize {
        match self {
            Prepared::Text(batch) => batch.pages_used,
            Prepared::Document { pages, .. } => *pages,
        }
    }
}

/// Executor de extração para um backend LLM.
pub struct Extractor<B> {
    client: ExtractionClient<B>,
    settings: RunSettings,
    events: Option<broadcast::Sender<ExtractionEvent>>,
    pause: Box<dyn Fn(Duration)>,
}

impl<B: LlmBackend> Extractor<B> {
    pub fn new(client: ExtractionClient<B>, settings: RunSettings) -> Self {
        Self {
            client,
            settings,
            events: None,
            pause: Box::new(sleep),
        }
    }

    /// Troca o `thread::sleep` dos cooldowns.
    pub fn with_pause(mut self, pause: impl Fn(Duration) + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// Publica o progresso no canal informado.
    pub fn with_events(mut self, tx: broadcast::Sender<ExtractionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: ExtractionEvent) {
        if let Some(tx) = &self.events {
            // sem assinantes não é erro
            let _ = tx.send(event);
        }
    }

    /// Extrai as métricas de `doc` em batches de páginas.
    ///
    /// # Erros
    ///
    /// `Config` (parâmetro de segmentação inválido, chave ausente) e `Auth`
    /// abortam a execução. Falhas por batch só entram no sumário.
    pub fn run(&self, key: &DocumentKey, doc: &PdfDocument) -> Result<Extraction> {
        let parts = pdf::segment(doc, self.settings.pages_per_part)?;
        let min_chars = self.settings.min_page_chars;
        self.run_parts(key, doc, parts, |part| {
            pdf::batch_text(doc, part, min_chars).map(Prepared::Text)
        })
    }

    /// Envia o PDF inteiro (`bytes`) numa única chamada.
    pub fn run_whole(&self, key: &DocumentKey, doc: &PdfDocument, bytes: &[u8]) -> Result<Extraction> {
        let part = Part::whole(doc.page_count());
        self.run_parts(key, doc, vec![part], |part| {
            Some(Prepared::Document {
                bytes,
                pages: part.len(),
            })
        })
    }

    /// Despacha para [`run()`](Self::run) ou [`run_whole()`](Self::run_whole).
    pub fn run_mode(
        &self,
        mode: ExtractionMode,
        key: &DocumentKey,
        doc: &PdfDocument,
        bytes: &[u8],
    ) -> Result<Extraction> {
        match mode {
            ExtractionMode::Batched => self.run(key, doc),
            ExtractionMode::WholeDocument => self.run_whole(key, doc, bytes),
        }
    }

    fn run_parts<'a, F>(
        &self,
        key: &DocumentKey,
        doc: &PdfDocument,
        parts: Vec<Part>,
        mut prepare: F,
    ) -> Result<Extraction>
    where
        F: FnMut(&Part) -> Option<Prepared<'a>>,
    {
        let span = tracing::info_span!("extraction_run", document = %key);
        let _guard = span.enter();
        let t_total = Instant::now();

        let total = parts.len();
        let mut summary = RunSummary {
            pages: doc.page_count(),
            batches: total,
            ..RunSummary::default()
        };
        tracing::info!(pages = summary.pages, batches = total, "Documento segmentado");
        self.emit(ExtractionEvent::Started {
            document: key.to_string(),
            pages: summary.pages,
            total_batches: total,
        });

        let mut batches = Vec::with_capacity(total);
        for part in parts {
            let pages = part.page_ref();
            let Some(prepared) = prepare(&part) else {
                summary.skipped += 1;
                tracing::debug!(batch = part.index, pages = %pages, "Batch sem texto suficiente, pulado");
                continue;
            };

            tracing::info!(batch = part.index, total, pages = %pages, pages_used = prepared.pages_used(), "Processando batch");
            self.emit(ExtractionEvent::BatchStarted {
                document: key.to_string(),
                batch: part.index,
                total,
                pages: pages.clone(),
                pages_used: prepared.pages_used(),
            });

            summary.api_calls += 1;
            match self.client.extract(EXTRACTION_PROMPT, prepared.content()) {
                Ok(sections) => {
                    let sections = resolve_batch(&part, sections);
                    let metrics: usize = sections.iter().map(|s| s.metrics.len()).sum();
                    tracing::info!(batch = part.index, pages = %pages, metrics, "Batch concluído");
                    self.emit(ExtractionEvent::BatchCompleted {
                        document: key.to_string(),
                        batch: part.index,
                        total,
                        pages,
                        metrics,
                    });
                    batches.push((part, sections));
                    (self.pause)(self.settings.success_cooldown);
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(batch = part.index, pages = %pages, error = %e, "Execução abortada");
                    self.emit(ExtractionEvent::Error {
                        document: key.to_string(),
                        message: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(document = %key, batch = part.index, pages = %pages, error = %e, "Batch falhou, seguindo para o próximo");
                    self.emit(ExtractionEvent::BatchFailed {
                        document: key.to_string(),
                        batch: part.index,
                        total,
                        pages,
                        message: e.to_string(),
                    });
                    (self.pause)(self.settings.failure_cooldown);
                }
            }
        }

        let result = aggregate(batches);
        summary.sections = result.sections.len();
        summary.metrics = result.metric_count();
        summary.calls_saved = summary.pages.saturating_sub(summary.api_calls);
        summary.total_ms = t_total.elapsed().as_millis() as u64;

        tracing::info!(
            metrics = summary.metrics,
            sections = summary.sections,
            api_calls = summary.api_calls,
            skipped = summary.skipped,
            failed = summary.failed,
            calls_saved = summary.calls_saved,
            total_ms = summary.total_ms,
            "Extração completa"
        );
        self.emit(ExtractionEvent::Completed {
            document: key.to_string(),
            metrics: summary.metrics,
            sections: summary.sections,
            api_calls: summary.api_calls,
            skipped: summary.skipped,
            failed: summary.failed,
            calls_saved: summary.calls_saved,
            total_ms: summary.total_ms,
        });

        Ok(Extraction { result, summary })
    }
}

fn sleep(cooldown: Duration) {
    if !cooldown.is_zero() {
        thread::sleep(cooldown);
    }
}
