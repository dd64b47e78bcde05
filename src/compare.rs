//! # Comparador — Agrupamento Semântico entre Documentos
//!
//! Dado N resultados planos e uma categoria, pede ao LLM que agrupe métricas
//! equivalentes ("Scope 1 emissions" ≈ "Direct GHG emissions") entre os
//! documentos.
//!
//! ```text
//! [(key_1, rows_1), ..., (key_n, rows_n)], "Environmental"
//!     │  filtro por categoria (rótulo normalizado: "Supply Chain" = supply_chain)
//!     ▼
//! < 2 conjuntos não vazios? ──► InsufficientInput (sem chamada)
//!     │
//!     ▼
//! prompt + tabelas JSON ──► LLM ──► cercas removidas ──► array JSON?
//!     │                                                    └ não → Parse
//!     ▼
//! filtro de proveniência ──► Vec<ComparisonGroup>
//! ```
//!
//! ## Proveniência
//!
//! Uma entrada em `dataset_i` só é mantida se a tabela `i` tiver uma linha
//! com o mesmo nome (sem caixa, com trim) e o mesmo valor (com trim). Assim
//! nenhum valor inventado pelo LLM chega ao resultado. Grupos que ficam sem
//! nenhuma entrada são descartados.
//!
//! `dataset_i` corresponde à i-ésima entrada, inclusive às que ficaram vazias
//! após o filtro.

use serde::Serialize;
use serde_json::Value;

use crate::core::{ComparisonGroup, DocumentKey, GroupEntry, MetricRow};
use crate::error::{EsgError, Result};
use crate::llm::fence::strip_fences;
use crate::llm::prompts::comparison_prompt;
use crate::llm::{LlmBackend, LlmRequest, RequestPart};

/// Linha enviada ao LLM, sem os campos de layout do documento.
#[derive(Serialize)]
struct TableRow<'a> {
    metric: &'a str,
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

impl<'a> From<&'a MetricRow> for TableRow<'a> {
    fn from(row: &'a MetricRow) -> Self {
        Self {
            metric: &row.name,
            value: &row.value,
            year: row.year,
            unit: row.unit.as_deref(),
            scope: row.scope.as_deref(),
        }
    }
}

pub struct Comparator<B> {
    backend: B,
    model: String,
}

impl<B: LlmBackend> Comparator<B> {
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Agrupa as métricas de `category` entre os conjuntos informados.
    ///
    /// # Erros
    ///
    /// - `InsufficientInput` com menos de 2 conjuntos não vazios após o filtro.
    /// - `Parse` se a resposta não for um array JSON (nada parcial é devolvido).
    /// - Erros do backend (`Config`, `Auth`, `Transient`) sobem intactos.
    pub fn compare(&self, datasets: &[(DocumentKey, Vec<MetricRow>)], category: &str) -> Result<Vec<ComparisonGroup>> {
        let filtered = filter_category(datasets, category);
        ensure_enough(&filtered, category)?;

        let tables: Vec<Vec<TableRow<'_>>> = filtered
            .iter()
            .map(|rows| rows.iter().map(|r| TableRow::from(*r)).collect())
            .collect();
        let tables_json = serde_json::to_string(&tables)
            .map_err(|e| EsgError::Parse(format!("failed to encode comparison input: {}", e)))?;

        let prompt = comparison_prompt(category, filtered.len());
        let request = LlmRequest::text(&self.model, &prompt)
            .with_part(RequestPart::Text(&tables_json))
            .expecting_json(None);

        tracing::info!(category, datasets = filtered.len(), "Comparando métricas entre documentos");
        let raw = self.backend.generate(&request)?;
        let groups = parse_groups(&raw, filtered.len())?;

        let kept: Vec<ComparisonGroup> = groups
            .into_iter()
            .filter_map(|g| keep_sourced(g, &filtered))
            .collect();
        tracing::info!(category, groups = kept.len(), "Comparação concluída");
        Ok(kept)
    }
}

fn filter_category<'a>(datasets: &'a [(DocumentKey, Vec<MetricRow>)], category: &str) -> Vec<Vec<&'a MetricRow>> {
    datasets
        .iter()
        .map(|(_, rows)| rows.iter().filter(|r| r.matches_category(category)).collect())
        .collect()
}

fn ensure_enough(filtered: &[Vec<&MetricRow>], category: &str) -> Result<()> {
    let non_empty = filtered.iter().filter(|rows| !rows.is_empty()).count();
    if non_empty < 2 {
        return Err(EsgError::InsufficientInput(format!(
            "need at least 2 datasets with '{}' metrics, found {}",
            category, non_empty
        )));
    }
    Ok(())
}

/// Verifica, sem chamar o LLM, se os conjuntos bastam para uma comparação.
pub fn ensure_comparable(datasets: &[(DocumentKey, Vec<MetricRow>)], category: &str) -> Result<()> {
    ensure_enough(&filter_category(datasets, category), category)
}

/// Interpreta a resposta como array de grupos com até `datasets` colunas.
///
/// Elementos que não são grupos bem formados são ignorados; qualquer coisa
/// que não seja um array é `Parse`.
fn parse_groups(raw: &str, datasets: usize) -> Result<Vec<ComparisonGroup>> {
    let value: Value = serde_json::from_str(strip_fences(raw).trim())
        .map_err(|e| EsgError::Parse(format!("comparison output is not JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(EsgError::Parse("comparison output is not a JSON array".into()));
    };
    Ok(items
        .iter()
        .filter_map(|item| {
            let group = item
                .as_object()
                .and_then(|obj| ComparisonGroup::with_dataset_limit(obj, datasets));
            if group.is_none() {
                tracing::debug!(%item, "Grupo de comparação malformado ignorado");
            }
            group
        })
        .collect())
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn is_sourced(entry: &GroupEntry, rows: &[&MetricRow]) -> bool {
    rows.iter()
        .any(|r| same_text(&r.name, &entry.metric) && r.value.trim() == entry.value.trim())
}

/// Aplica o filtro de proveniência e alinha os datasets às entradas.
fn keep_sourced(mut group: ComparisonGroup, filtered: &[Vec<&MetricRow>]) -> Option<ComparisonGroup> {
    group.datasets.resize_with(filtered.len(), Vec::new);
    for (entries, rows) in group.datasets.iter_mut().zip(filtered) {
        entries.retain(|e| is_sourced(e, rows));
    }
    group
        .datasets
        .iter()
        .any(|entries| !entries.is_empty())
        .then_some(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Category;
    use crate::llm::testing::ScriptedBackend;

    fn row(name: &str, value: &str, category: Category) -> MetricRow {
        MetricRow {
            title: "Climate".into(),
            page_ref: "Pages 1-10".into(),
            category: Some(category),
            name: name.into(),
            value: value.into(),
            year: Some(2023),
            metric_type: None,
            scope: None,
            unit: None,
        }
    }

    fn datasets() -> Vec<(DocumentKey, Vec<MetricRow>)> {
        vec![
            (
                DocumentKey::from_filename("a.csv"),
                vec![
                    row("Scope 1 emissions", "10 kt", Category::Environmental),
                    row("Women in leadership", "31%", Category::Social),
                ],
            ),
            (
                DocumentKey::from_filename("b.csv"),
                vec![row("Direct GHG emissions", "12 kt", Category::Environmental)],
            ),
        ]
    }

    #[test]
    fn single_dataset_is_insufficient_without_calling() {
        let backend = ScriptedBackend::new();
        let comparator = Comparator::new(&backend, "pro");
        let err = comparator.compare(&datasets()[..1], "environmental").unwrap_err();
        assert!(matches!(err, EsgError::InsufficientInput(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn empty_after_filter_counts_as_missing() {
        let backend = ScriptedBackend::new();
        let comparator = Comparator::new(&backend, "pro");
        let err = comparator.compare(&datasets(), "Social").unwrap_err();
        assert!(matches!(err, EsgError::InsufficientInput(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn precheck_matches_compare() {
        assert!(ensure_comparable(&datasets(), "ENVIRONMENTAL").is_ok());
        assert!(ensure_comparable(&datasets(), "social").is_err());
    }

    #[test]
    fn groups_equivalent_metrics_across_documents() {
        let backend = ScriptedBackend::new().reply(
            r#"```json
            [{"common_metric": "GHG Emissions",
              "dataset_1": [{"metric": "Scope 1 emissions", "value": "10 kt"}],
              "dataset_2": [{"metric": "Direct GHG emissions", "value": "12 kt"}]}]
            ```"#,
        );
        let comparator = Comparator::new(&backend, "pro");
        let groups = comparator.compare(&datasets(), "Environmental").unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].common_metric, "GHG Emissions");
        assert_eq!(groups[0].datasets[0], vec![GroupEntry::new("Scope 1 emissions", "10 kt")]);
        assert_eq!(groups[0].datasets[1], vec![GroupEntry::new("Direct GHG emissions", "12 kt")]);

        let prompt = &backend.prompts.borrow()[0];
        assert!(prompt.contains("Direct GHG emissions"));
        assert!(!prompt.contains("Women in leadership"));
        assert_eq!(backend.models.borrow()[0], "pro");
    }

    #[test]
    fn fabricated_values_are_dropped() {
        let backend = ScriptedBackend::new().reply(
            r#"[{"common_metric": "GHG",
                 "dataset_1": [{"metric": "scope 1 emissions ", "value": "10 kt"}],
                 "dataset_2": [{"metric": "Direct GHG emissions", "value": "99 kt"}]},
                {"common_metric": "Invented",
                 "dataset_1": [{"metric": "Made up", "value": "1"}],
                 "dataset_2": []}]"#,
        );
        let groups = Comparator::new(&backend, "pro").compare(&datasets(), "environmental").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].datasets[0].len(), 1);
        assert!(groups[0].datasets[1].is_empty());
    }

    #[test]
    fn out_of_range_dataset_keys_are_ignored() {
        let backend = ScriptedBackend::new().reply(
            r#"[{"common_metric": "GHG",
                 "dataset_1": [{"metric": "Scope 1 emissions", "value": "10 kt"}],
                 "dataset_99999999999": []}]"#,
        );
        let groups = Comparator::new(&backend, "pro").compare(&datasets(), "environmental").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].datasets.len(), 2);
        assert_eq!(groups[0].datasets[0], vec![GroupEntry::new("Scope 1 emissions", "10 kt")]);
    }

    #[test]
    fn category_labels_are_normalized() {
        let supply = |name: &str| {
            (
                DocumentKey::from_filename(name),
                vec![row("Suppliers audited", "85%", Category::SupplyChain)],
            )
        };
        let sets = vec![supply("a.csv"), supply("b.csv")];
        for label in ["Supply Chain", "supply-chain", "supply_chain"] {
            assert!(ensure_comparable(&sets, label).is_ok(), "{}", label);
        }
    }

    #[test]
    fn non_array_output_is_parse_error() {
        for reply in [r#"{"common_metric": "GHG", "dataset_1": []}"#, "no idea"] {
            let backend = ScriptedBackend::new().reply(reply);
            let err = Comparator::new(&backend, "pro")
                .compare(&datasets(), "environmental")
                .unwrap_err();
            assert!(matches!(err, EsgError::Parse(_)), "{}", reply);
        }
    }
}
