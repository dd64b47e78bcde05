//! # ComparisonGroup — Métricas Equivalentes Entre Documentos
//!
//! Um [`ComparisonGroup`] associa um rótulo de tópico comum a, para cada
//! documento participante, o subconjunto das suas métricas que trata desse
//! mesmo tópico. O comparador só agrupa: nenhum valor é transformado.
//!
//! ## Formato Persistido
//!
//! ```json
//! { "common_metric": "GHG Emissions",
//!   "dataset_1": [ { "metric": "Scope 1 emissions", "value": "12,000 tCO2e" } ],
//!   "dataset_2": [ { "metric": "Direct GHG emissions", "value": "9,400 tCO2e" } ] }
//! ```
//!
//! As chaves `dataset_N` são 1-indexed e seguem a ordem dos documentos
//! selecionados. Por isso Serialize/Deserialize são manuais.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Uma métrica referenciada dentro de um grupo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub metric: String,
    pub value: String,
}

impl GroupEntry {
    pub fn new(metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
        }
    }

    /// Lê `{metric, value}` de um objeto JSON, aceitando `metric_name`/`name`
    /// como sinônimos e valores numéricos.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let metric = ["metric", "metric_name", "name"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(scalar_to_string))?;
        let value = obj.get("value").and_then(scalar_to_string)?;
        Some(Self { metric, value })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tópico comum e, por documento, as métricas que o descrevem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparisonGroup {
    pub common_metric: String,
    /// `datasets[i]` corresponde a `dataset_{i+1}`.
    pub datasets: Vec<Vec<GroupEntry>>,
}

impl ComparisonGroup {
    /// Converte um objeto `{common_metric, dataset_1, ...}`.
    ///
    /// O número de datasets é limitado pela quantidade de chaves `dataset_N`
    /// presentes. Veja [`with_dataset_limit()`](Self::with_dataset_limit).
    pub fn from_json_object(obj: &Map<String, Value>) -> Option<Self> {
        let keys = obj.keys().filter(|k| k.starts_with("dataset_")).count();
        Self::with_dataset_limit(obj, keys)
    }

    /// Como [`from_json_object()`](Self::from_json_object), ignorando qualquer
    /// `dataset_N` com `N > limit`.
    ///
    /// Datasets ausentes no meio da numeração viram listas vazias.
    /// Retorna `None` sem `common_metric` ou sem nenhum `dataset_N` aceito.
    pub fn with_dataset_limit(obj: &Map<String, Value>, limit: usize) -> Option<Self> {
        let common_metric = obj.get("common_metric").and_then(scalar_to_string)?;

        let mut numbered: Vec<(usize, Vec<GroupEntry>)> = obj
            .iter()
            .filter_map(|(k, v)| {
                let n = k.strip_prefix("dataset_")?.parse::<usize>().ok()?;
                if n == 0 || n > limit {
                    return None;
                }
                let entries = v
                    .as_array()
                    .map(|items| items.iter().filter_map(GroupEntry::from_json).collect())
                    .unwrap_or_default();
                Some((n, entries))
            })
            .collect();
        if numbered.is_empty() {
            return None;
        }
        numbered.sort_by_key(|(n, _)| *n);

        // limitado por `limit`
        let len = numbered.last().map(|(n, _)| *n).unwrap_or(0);
        let mut datasets = vec![Vec::new(); len];
        for (n, entries) in numbered {
            datasets[n - 1] = entries;
        }
        Some(Self {
            common_metric,
            datasets,
        })
    }

    /// Renderiza o grupo como tabela: um par `(metric, value)` de colunas por
    /// documento, com células vazias até a lista mais longa.
    pub fn to_table(&self, labels: &[String]) -> ComparisonTable {
        let headers = (0..self.datasets.len())
            .flat_map(|i| {
                let label = labels
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("dataset_{}", i + 1));
                [format!("{} metric", label), format!("{} value", label)]
            })
            .collect();

        let height = self.datasets.iter().map(Vec::len).max().unwrap_or(0);
        let rows = (0..height)
            .map(|r| {
                self.datasets
                    .iter()
                    .flat_map(|entries| match entries.get(r) {
                        Some(e) => [e.metric.clone(), e.value.clone()],
                        None => [String::new(), String::new()],
                    })
                    .collect::<Vec<String>>()
            })
            .collect();

        ComparisonTable {
            title: self.common_metric.clone(),
            headers,
            rows,
        }
    }
}

impl Serialize for ComparisonGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.datasets.len()))?;
        map.serialize_entry("common_metric", &self.common_metric)?;
        for (i, entries) in self.datasets.iter().enumerate() {
            map.serialize_entry(&format!("dataset_{}", i + 1), entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComparisonGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = Map::<String, Value>::deserialize(deserializer)?;
        ComparisonGroup::from_json_object(&obj)
            .ok_or_else(|| D::Error::custom("expected common_metric and dataset_N keys"))
    }
}

/// Tabela pronta para exibição, com todas as linhas do mesmo tamanho.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group() -> ComparisonGroup {
        ComparisonGroup {
            common_metric: "GHG Emissions".into(),
            datasets: vec![
                vec![
                    GroupEntry::new("Scope 1 emissions", "12,000 tCO2e"),
                    GroupEntry::new("Scope 2 emissions", "4,100 tCO2e"),
                ],
                vec![GroupEntry::new("Direct GHG emissions", "9,400 tCO2e")],
            ],
        }
    }

    #[test]
    fn serializes_numbered_dataset_keys() {
        let value = serde_json::to_value(group()).unwrap();
        assert_eq!(value["common_metric"], "GHG Emissions");
        assert_eq!(value["dataset_2"][0]["metric"], "Direct GHG emissions");
        let back: ComparisonGroup = serde_json::from_value(value).unwrap();
        assert_eq!(back, group());
    }

    #[test]
    fn dataset_numbering_is_numeric_not_lexical() {
        let mut obj = Map::new();
        obj.insert("common_metric".into(), json!("Water"));
        for n in 1..=10 {
            obj.insert(format!("dataset_{}", n), json!([{ "metric": format!("m{}", n), "value": n }]));
        }
        let group = ComparisonGroup::from_json_object(&obj).unwrap();
        assert_eq!(group.datasets.len(), 10);
        assert_eq!(group.datasets[9][0], GroupEntry::new("m10", "10"));
    }

    #[test]
    fn huge_dataset_index_is_ignored() {
        let obj = json!({
            "common_metric": "GHG",
            "dataset_1": [{ "metric": "Scope 1", "value": "10 kt" }],
            "dataset_99999999999": []
        });
        let obj = obj.as_object().unwrap();

        let group = ComparisonGroup::from_json_object(obj).unwrap();
        assert_eq!(group.datasets.len(), 1);

        let limited = ComparisonGroup::with_dataset_limit(obj, 3).unwrap();
        assert_eq!(limited.datasets, vec![vec![GroupEntry::new("Scope 1", "10 kt")]]);

        let only_huge = json!({ "common_metric": "GHG", "dataset_4000000000": [] });
        assert!(ComparisonGroup::from_json_object(only_huge.as_object().unwrap()).is_none());
    }

    #[test]
    fn cached_group_with_huge_index_deserializes_bounded() {
        let raw = r#"{"common_metric": "Water", "dataset_2": [], "dataset_18446744073709551615": []}"#;
        let group: ComparisonGroup = serde_json::from_str(raw).unwrap();
        assert_eq!(group.datasets, vec![Vec::new(), Vec::new()]);
    }

    #[test]
    fn table_pads_shorter_columns() {
        let table = group().to_table(&["acme".into(), "globex".into()]);
        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.headers[2], "globex metric");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["Scope 2 emissions", "4,100 tCO2e", "", ""]);
        assert!(table.rows.iter().all(|r| r.len() == 4));
    }

    #[test]
    fn entry_accepts_metric_name_alias() {
        let entry = GroupEntry::from_json(&json!({ "metric_name": " Water use ", "value": 42.5 }));
        assert_eq!(entry, Some(GroupEntry::new("Water use", "42.5")));
    }
}
