//! # ESG Extract — Métricas de Sustentabilidade a partir de PDFs
//!
//! Extrai métricas ESG estruturadas de relatórios em PDF delegando a leitura a
//! um LLM hospedado, valida e agrega o resultado, guarda em arquivos planos e
//! compara métricas equivalentes entre empresas.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ web (Axum + Maud + SSE)                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ pipeline ──► pdf (segmentação) ──► llm (ExtractionClient)    │
//! │     │                                 │                      │
//! │     │                            validator                   │
//! │     ▼                                 │                      │
//! │ aggregator ◄──────────────────────────┘                      │
//! │     │                                                        │
//! │     ▼                                                        │
//! │ persistence (cache CSV/JSON) ◄──► compare (agrupamento)      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ core (Metric, Section, ResultSet, ComparisonGroup)           │
//! │ config · error                                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuração
//!
//! Tudo via variáveis de ambiente (ver [`config`]). A chave `GOOGLE_API_KEY`
//! só é exigida quando uma extração ou comparação chama o LLM.

#![allow(dead_code)]

/// Módulo `aggregator` — concatena os batches em um ResultSet.
mod aggregator;

/// Módulo `compare` — agrupamento semântico de métricas entre documentos.
mod compare;

/// Módulo `config` — configuração a partir do ambiente.
mod config;

/// Módulo `core` — tipos do domínio: Metric, Section, ResultSet, ComparisonGroup.
mod core;

/// Módulo `error` — taxonomia de erros (`EsgError`).
mod error;

/// Módulo `llm` — fronteira com o LLM hospedado (Gemini).
mod llm;

/// Módulo `pdf` — leitura de PDF e segmentação em partes.
mod pdf;

/// Módulo `persistence` — store de resultados e cache em disco.
mod persistence;

/// Módulo `pipeline` — execução de uma extração, batch a batch.
mod pipeline;

/// Módulo `validator` — filtro de métricas ruidosas.
mod validator;

/// Módulo `web` — servidor axum, handlers, templates e SSE.
mod web;

use std::fs;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controla o nível; padrão `info`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🌿 ESG Extract — Starting...");

    let config = Config::from_env().context("invalid configuration")?;
    if config.api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY não definida: extrações e comparações vão falhar até ser configurada");
    }

    for dir in [config.uploads_dir(), config.results_dir(), config.comparisons_dir()] {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    tracing::info!(
        data_dir = %config.data_dir.display(),
        format = %config.store_format,
        extraction_model = %config.extraction_model,
        comparison_model = %config.comparison_model,
        pages_per_part = config.pages_per_part,
        "Configuração carregada"
    );

    let addr = config.bind_addr.clone();
    let app = web::create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
