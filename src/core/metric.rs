//! # Metric e Section — O Schema de um Fato ESG
//!
//! Uma [`Metric`] é um único fato extraído: um nome descritivo e um valor
//! **com a unidade embutida** (`"28%"`, `"$14M"`, `"1,200 tons"`), mais campos
//! opcionais de classificação. Uma [`Section`] agrupa métricas de uma mesma
//! região do documento sob um título.
//!
//! ## Enumerações Tolerantes
//!
//! [`Category`] e [`MetricType`] são serializadas em `snake_case`, mas a
//! desserialização aceita variações de caixa e separador (`"Supply Chain"`,
//! `"supply-chain"`), porque os valores vêm de um LLM ou de CSVs editados à mão.
//! Uma categoria desconhecida e não vazia vira [`Category::Other`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Categoria ESG de uma métrica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Environmental,
    Emissions,
    Energy,
    Water,
    Waste,
    Social,
    Governance,
    Safety,
    SupplyChain,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Environmental,
        Category::Emissions,
        Category::Energy,
        Category::Water,
        Category::Waste,
        Category::Social,
        Category::Governance,
        Category::Safety,
        Category::SupplyChain,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Environmental => "environmental",
            Category::Emissions => "emissions",
            Category::Energy => "energy",
            Category::Water => "water",
            Category::Waste => "waste",
            Category::Social => "social",
            Category::Governance => "governance",
            Category::Safety => "safety",
            Category::SupplyChain => "supply_chain",
            Category::Other => "other",
        }
    }

    /// Interpreta um rótulo livre. `None` só para texto vazio.
    pub fn parse_lenient(raw: &str) -> Option<Category> {
        let key = normalize_label(raw);
        if key.is_empty() {
            return None;
        }
        Some(
            Category::ALL
                .into_iter()
                .find(|c| c.as_str() == key)
                .unwrap_or(Category::Other),
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_label(s);
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Natureza do valor reportado: meta, realizado ou linha de base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricType {
    Target,
    Actual,
    Baseline,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Target => "target",
            MetricType::Actual => "actual",
            MetricType::Baseline => "baseline",
        }
    }

    /// Como [`Category::parse_lenient`], mas tipos desconhecidos ficam sem valor.
    pub fn parse_lenient(raw: &str) -> Option<MetricType> {
        match normalize_label(raw).as_str() {
            "target" => Some(MetricType::Target),
            "actual" => Some(MetricType::Actual),
            "baseline" => Some(MetricType::Baseline),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

// Serde manual: escreve o rótulo canônico, lê de forma tolerante.

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Category::parse_lenient(&raw).ok_or_else(|| serde::de::Error::custom("empty category"))
    }
}

impl Serialize for MetricType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MetricType::parse_lenient(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown metric type '{}'", raw)))
    }
}

/// Um fato ESG extraído.
///
/// Só entra num [`crate::core::ResultSet`] depois de passar por
/// [`crate::validator::is_valid()`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Nome descritivo (ex: "Scope 1 GHG Emissions").
    pub metric_name: String,
    /// Valor com unidade embutida (ex: "25,000 tons").
    pub value: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub metric_type: Option<MetricType>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Metric {
    /// Métrica mínima com nome e valor; os demais campos ficam vazios.
    pub fn new(metric_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            value: value.into(),
            category: None,
            metric_type: None,
            year: None,
            unit: None,
            scope: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Grupo titulado de métricas extraídas de uma região do documento.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Referência de páginas legível (ex: "Pages 1-10").
    #[serde(default)]
    pub page_ref: Option<String>,
    pub metrics: Vec<Metric>,
}

impl Section {
    pub fn new(title: impl Into<String>, metrics: Vec<Metric>) -> Self {
        Self {
            title: title.into(),
            page_ref: None,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_is_case_and_separator_insensitive() {
        assert_eq!(Category::parse_lenient("Environmental"), Some(Category::Environmental));
        assert_eq!(Category::parse_lenient("Supply Chain"), Some(Category::SupplyChain));
        assert_eq!(Category::parse_lenient("supply-chain"), Some(Category::SupplyChain));
        assert_eq!(Category::parse_lenient("biodiversity"), Some(Category::Other));
        assert_eq!(Category::parse_lenient("  "), None);
    }

    #[test]
    fn strict_category_parse_rejects_unknown() {
        assert_eq!("Social".parse::<Category>(), Ok(Category::Social));
        assert!("biodiversity".parse::<Category>().is_err());
    }

    #[test]
    fn metric_type_unknown_is_unset() {
        assert_eq!(MetricType::parse_lenient("TARGET"), Some(MetricType::Target));
        assert_eq!(MetricType::parse_lenient("estimate"), None);
    }

    #[test]
    fn metric_serializes_canonical_labels() {
        let m = Metric::new("Water withdrawn", "3.2 ML").with_category(Category::SupplyChain);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["category"], "supply_chain");
        assert!(json["metric_type"].is_null());
    }
}
