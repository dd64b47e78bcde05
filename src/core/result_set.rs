//! # ResultSet — Saída Completa de um Documento
//!
//! Um [`ResultSet`] é a sequência ordenada de [`Section`]s de um documento.
//! É criado uma vez por execução de extração e nunca alterado no lugar:
//! uma nova extração substitui o arquivo inteiro.
//!
//! ## Forma Plana (Persistência)
//!
//! Para gravação em CSV/JSON o ResultSet é achatado em [`MetricRow`]s, uma
//! linha por métrica, levando o título e a página da seção:
//!
//! ```text
//! title, page_ref, category, name, value, year, type, scope, unit
//! ```
//!
//! [`ResultSet::from_rows()`] reagrupa linhas consecutivas com o mesmo
//! `(title, page_ref)` em uma seção, de modo que `to_rows → from_rows → to_rows`
//! reproduz exatamente as mesmas linhas.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metric::{Category, Metric, MetricType, Section};

/// Identidade normalizada de um documento: minúsculas, espaços → `_`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Chave a partir do nome do arquivo, sem diretório e sem extensão `.pdf`/`.csv`/`.json`.
    ///
    /// `"Ingredion 2024 Sustainability Report.pdf"` → `ingredion_2024_sustainability_report`
    pub fn from_filename(filename: &str) -> Self {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .trim();
        let lower = base.to_lowercase();
        let stem = [".pdf", ".csv", ".json"]
            .iter()
            .find_map(|ext| lower.strip_suffix(ext))
            .unwrap_or(lower.as_str());
        Self::normalize(stem)
    }

    /// Chave declarada pelo usuário: `<empresa>_<ano>`.
    pub fn for_company(company: &str, year: i32) -> Self {
        Self::normalize(&format!("{}_{}", company.trim().to_lowercase(), year))
    }

    fn normalize(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        // ".." nunca pode virar um caminho relativo
        Self(key.replace("..", "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uma linha da tabela persistida.
///
/// A ordem dos campos define a ordem das colunas no CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub title: String,
    #[serde(default)]
    pub page_ref: String,
    #[serde(default)]
    pub category: Option<Category>,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(rename = "type", default)]
    pub metric_type: Option<MetricType>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl MetricRow {
    fn from_metric(section: &Section, metric: &Metric) -> Self {
        Self {
            title: section.title.clone(),
            page_ref: section.page_ref.clone().unwrap_or_default(),
            category: metric.category,
            name: metric.metric_name.clone(),
            value: metric.value.clone(),
            year: metric.year,
            metric_type: metric.metric_type,
            scope: metric.scope.clone(),
            unit: metric.unit.clone(),
        }
    }

    fn to_metric(&self) -> Metric {
        Metric {
            metric_name: self.name.clone(),
            value: self.value.clone(),
            category: self.category,
            metric_type: self.metric_type,
            year: self.year,
            unit: self.unit.clone(),
            scope: self.scope.clone(),
        }
    }

    /// Compara a categoria com um rótulo livre ("Supply Chain", "supply-chain",
    /// "SUPPLY_CHAIN"). Rótulos desconhecidos não casam com nada.
    pub fn matches_category(&self, category: &str) -> bool {
        match (self.category, category.parse::<Category>()) {
            (Some(own), Ok(wanted)) => own == wanted,
            _ => false,
        }
    }
}

/// Saída estruturada completa de um documento.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub sections: Vec<Section>,
}

impl ResultSet {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn metric_count(&self) -> usize {
        self.sections.iter().map(|s| s.metrics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.metric_count() == 0
    }

    /// Achata em uma linha por métrica, preservando a ordem.
    pub fn to_rows(&self) -> Vec<MetricRow> {
        self.sections
            .iter()
            .flat_map(|s| s.metrics.iter().map(move |m| MetricRow::from_metric(s, m)))
            .collect()
    }

    /// Reconstrói as seções a partir das linhas planas.
    pub fn from_rows(rows: &[MetricRow]) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        for row in rows {
            let page_ref = Some(row.page_ref.clone()).filter(|p| !p.is_empty());
            match sections.last_mut() {
                Some(last) if last.title == row.title && last.page_ref == page_ref => {
                    last.metrics.push(row.to_metric());
                }
                _ => sections.push(Section {
                    title: row.title.clone(),
                    page_ref,
                    metrics: vec![row.to_metric()],
                }),
            }
        }
        Self { sections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_filename_normalizes() {
        let key = DocumentKey::from_filename("reports/Ingredion 2024 Sustainability Report.PDF");
        assert_eq!(key.as_str(), "ingredion_2024_sustainability_report");
    }

    #[test]
    fn key_for_company_and_year() {
        assert_eq!(DocumentKey::for_company("Acme Foods ", 2023).as_str(), "acme_foods_2023");
    }

    #[test]
    fn key_cannot_escape_directory() {
        let key = DocumentKey::from_filename("..");
        assert!(!key.as_str().contains(".."));
    }

    fn sample() -> ResultSet {
        let mut energy = Section::new(
            "Energy",
            vec![
                Metric::new("Renewable electricity", "62%").with_category(Category::Energy),
                Metric::new("Energy use", "1.2 TWh").with_year(2023),
            ],
        );
        energy.page_ref = Some("Pages 1-10".into());
        let mut people = Section::new("People", vec![Metric::new("Women in leadership", "41%")]);
        people.page_ref = Some("Pages 11-20".into());
        ResultSet::new(vec![energy, people])
    }

    #[test]
    fn rows_carry_section_context_in_order() {
        let rows = sample().to_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, "Energy");
        assert_eq!(rows[1].year, Some(2023));
        assert_eq!(rows[2].page_ref, "Pages 11-20");
    }

    #[test]
    fn rows_regroup_into_sections() {
        let set = sample();
        assert_eq!(ResultSet::from_rows(&set.to_rows()), set);
        assert_eq!(ResultSet::from_rows(&[]), ResultSet::default());
    }

    #[test]
    fn category_match_ignores_case() {
        let rows = sample().to_rows();
        assert!(rows[0].matches_category("Energy"));
        assert!(!rows[1].matches_category("energy"));
    }

    #[test]
    fn category_match_accepts_spaced_and_dashed_labels() {
        let mut row = sample().to_rows().remove(0);
        row.category = Some(Category::SupplyChain);
        assert!(row.matches_category("Supply Chain"));
        assert!(row.matches_category(" supply-chain "));
        assert!(!row.matches_category("supply"));
        assert!(!row.matches_category(""));
    }
}
