//! # Módulo Core — Tipos Fundamentais do Domínio
//!
//! Tipos que atravessam todo o pipeline de extração ESG, usados de forma
//! uniforme depois da normalização feita na fronteira do cliente LLM:
//!
//! - [`Metric`] — um fato quantificado (nome, valor com unidade, categoria...)
//! - [`Category`] / [`MetricType`] — enumerações fechadas do schema
//! - [`Section`] — grupo titulado de métricas de uma região do documento
//! - [`ResultSet`] — saída completa de um documento, e sua forma plana [`MetricRow`]
//! - [`DocumentKey`] — identidade normalizada de um documento no store
//! - [`ComparisonGroup`] — agrupamento de métricas equivalentes entre documentos
//!
//! ## Fluxo dos Tipos
//!
//! ```text
//! JSON do LLM ──► Section/Metric ──► (validator) ──► ResultSet ──► MetricRow (CSV/JSON)
//!                                                       │
//!                         MetricRow × N documentos ─────┴──► ComparisonGroup
//! ```

/// Sub-módulo com [`Metric`], [`Section`] e as enumerações do schema.
pub mod metric;

/// Sub-módulo com [`ResultSet`], [`MetricRow`] e [`DocumentKey`].
pub mod result_set;

/// Sub-módulo com [`ComparisonGroup`] e a renderização em tabela.
pub mod comparison;

pub use comparison::{ComparisonGroup, ComparisonTable, GroupEntry};
pub use metric::{Category, Metric, MetricType, Section};
pub use result_set::{DocumentKey, MetricRow, ResultSet};
