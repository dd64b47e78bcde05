//! # Validador de Métricas — Filtrando Ruído do LLM
//!
//! O LLM frequentemente devolve "métricas" que não são métricas: razão
//! social, endereço, período do relatório, URLs, o próprio título do
//! documento. [`is_valid()`] é uma função pura e total que rejeita esse ruído.
//!
//! ## Regras (todas precisam passar)
//!
//! | # | Regra |
//! |---|-------|
//! | 1 | `metric_name` e `value` presentes (garantido pela coerção em [`crate::llm::schema`]) |
//! | 2 | `metric_name` com ≥ 3 caracteres após trim |
//! | 3 | `value` não vazio e com pelo menos um dígito |
//! | 4 | `metric_name` não casa com a denylist de metadados |
//! | 5 | `value` não é um ano isolado (`^\d{4}$`) |
//! | 6 | `value` não contém `http`, `www.`, `report`, `document` |
//!
//! A rejeição é **silenciosa**: nada de erro, a métrica simplesmente some.
//! Seções que ficam sem métricas somem junto ([`sanitize_sections()`]).

use std::sync::LazyLock;

use regex::Regex;

use crate::core::{Metric, Section};

/// Padrões de nomes que indicam metadado, não métrica (testados em minúsculas).
const NAME_DENYLIST: &[&str] = &[
    r"^(legal name|company name|organization|report|document|title)",
    r"^(location|address|headquarters|contact|email|phone)",
    r"^(frequency|period|date|year published|reporting period)",
    r"^https?://",
    r"@\w+\.",
    r"^\d{4}\s+(annual|sustainability|report)",
];

/// Substrings que denunciam um valor que é referência a documento.
const VALUE_DENYLIST: &[&str] = &["http", "www.", "report", "document"];

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NAME_DENYLIST
        .iter()
        .map(|p| Regex::new(p).expect("invalid regex"))
        .collect()
});

static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("invalid regex"));

/// `true` se a métrica carrega um fato quantificado de verdade.
pub fn is_valid(metric: &Metric) -> bool {
    let name = metric.metric_name.trim();
    let value = metric.value.trim();

    if name.chars().count() < 3 {
        return false;
    }
    if value.is_empty() || !value.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let name_lower = name.to_lowercase();
    if NAME_PATTERNS.iter().any(|re| re.is_match(&name_lower)) {
        return false;
    }

    if BARE_YEAR.is_match(value) {
        return false;
    }

    let value_lower = value.to_lowercase();
    !VALUE_DENYLIST.iter().any(|s| value_lower.contains(s))
}

/// Filtra métricas inválidas e descarta seções que ficaram vazias.
///
/// A ordem das seções e das métricas dentro delas é preservada.
pub fn sanitize_sections(sections: Vec<Section>) -> Vec<Section> {
    sections
        .into_iter()
        .filter_map(|mut section| {
            let before = section.metrics.len();
            section.metrics.retain(is_valid);
            let rejected = before - section.metrics.len();
            if rejected > 0 {
                tracing::debug!(title = %section.title, rejected, "Métricas inválidas filtradas");
            }
            (!section.metrics.is_empty()).then_some(section)
        })
        .collect()
}
