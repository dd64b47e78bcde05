//! # Configuração — Variáveis de Ambiente → `Config`
//!
//! A configuração é lida **uma única vez** em `main` via [`Config::from_env()`]
//! e depois passada explicitamente a quem precisa (cliente LLM, pipeline,
//! store). Nenhum componente lê o ambiente do processo depois disso.
//!
//! ## Variáveis Reconhecidas
//!
//! | Variável | Default | Campo |
//! |----------|---------|-------|
//! | `GOOGLE_API_KEY` | — | `api_key` |
//! | `ESG_API_BASE` | `https://generativelanguage.googleapis.com/v1beta` | `api_base` |
//! | `ESG_EXTRACTION_MODEL` | `gemini-2.5-flash-lite` | `extraction_model` |
//! | `ESG_COMPARISON_MODEL` | `gemini-2.5-pro` | `comparison_model` |
//! | `ESG_PAGES_PER_PART` | `10` | `pages_per_part` |
//! | `ESG_MIN_PAGE_CHARS` | `100` | `min_page_chars` |
//! | `ESG_SUCCESS_COOLDOWN_MS` | `2000` | `success_cooldown` |
//! | `ESG_FAILURE_COOLDOWN_MS` | `10000` | `failure_cooldown` |
//! | `ESG_REQUEST_TIMEOUT_SECS` | `120` | `request_timeout` |
//! | `ESG_DATA_DIR` | `data` | `data_dir` |
//! | `ESG_STORE_FORMAT` | `csv` | `store_format` |
//! | `ESG_BIND` | `0.0.0.0:3000` | `bind_addr` |
//!
//! A ausência da chave da API **não** falha aqui: vira `EsgError::Config`
//! no primeiro uso do cliente LLM.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EsgError, Result};
use crate::persistence::StoreFormat;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_COMPARISON_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_PAGES_PER_PART: usize = 10;
pub const DEFAULT_MIN_PAGE_CHARS: usize = 100;

/// Configuração de execução, imutável após a construção.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    pub extraction_model: String,
    pub comparison_model: String,
    pub pages_per_part: usize,
    /// Páginas com menos caracteres (após trim) não entram no batch.
    pub min_page_chars: usize,
    /// Pausa após cada chamada bem-sucedida (rate limit).
    pub success_cooldown: Duration,
    /// Pausa mais longa após cada chamada que falhou.
    pub failure_cooldown: Duration,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub store_format: StoreFormat,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            comparison_model: DEFAULT_COMPARISON_MODEL.to_string(),
            pages_per_part: DEFAULT_PAGES_PER_PART,
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            success_cooldown: Duration::from_millis(2_000),
            failure_cooldown: Duration::from_millis(10_000),
            request_timeout: Duration::from_secs(120),
            data_dir: PathBuf::from("data"),
            store_format: StoreFormat::Csv,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Lê a configuração do ambiente do processo.
    ///
    /// # Erros
    ///
    /// `EsgError::Config` se algum valor numérico ou o formato do store
    /// estiver malformado, ou se `ESG_PAGES_PER_PART` for zero.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Variante testável de [`from_env()`](Config::from_env): recebe a função de lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Config {
            api_key: get("GOOGLE_API_KEY").map(|k| k.trim().to_string()),
            api_base: get("ESG_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            extraction_model: get("ESG_EXTRACTION_MODEL").unwrap_or(defaults.extraction_model),
            comparison_model: get("ESG_COMPARISON_MODEL").unwrap_or(defaults.comparison_model),
            pages_per_part: parse_var("ESG_PAGES_PER_PART", get("ESG_PAGES_PER_PART"))?
                .unwrap_or(defaults.pages_per_part),
            min_page_chars: parse_var("ESG_MIN_PAGE_CHARS", get("ESG_MIN_PAGE_CHARS"))?
                .unwrap_or(defaults.min_page_chars),
            success_cooldown: parse_var("ESG_SUCCESS_COOLDOWN_MS", get("ESG_SUCCESS_COOLDOWN_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(defaults.success_cooldown),
            failure_cooldown: parse_var("ESG_FAILURE_COOLDOWN_MS", get("ESG_FAILURE_COOLDOWN_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(defaults.failure_cooldown),
            request_timeout: parse_var("ESG_REQUEST_TIMEOUT_SECS", get("ESG_REQUEST_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            data_dir: get("ESG_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            store_format: parse_var("ESG_STORE_FORMAT", get("ESG_STORE_FORMAT"))?
                .unwrap_or(defaults.store_format),
            bind_addr: get("ESG_BIND").unwrap_or(defaults.bind_addr),
        };

        if config.pages_per_part < 1 {
            return Err(EsgError::Config(
                "ESG_PAGES_PER_PART must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    /// Chave da API, exigida apenas no primeiro uso do serviço LLM.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            EsgError::Config("no Google API key provided (set GOOGLE_API_KEY)".into())
        })
    }

    /// Diretório onde os PDFs enviados são guardados.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Diretório das tabelas extraídas por documento.
    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("extracted_results")
    }

    /// Diretório do cache de comparações.
    pub fn comparisons_dir(&self) -> PathBuf {
        self.data_dir.join("cached_json")
    }
}

fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.trim()
            .parse::<T>()
            .map_err(|e| EsgError::Config(format!("invalid value for {}: '{}' ({})", name, v, e)))
    })
    .transpose()
}
