//! # Schema — Coerção da Saída do LLM em `Section`/`Metric`
//!
//! A resposta do LLM é **entrada não confiável**, mesmo quando enviamos um
//! `responseSchema`: campos podem faltar, anos vêm como string, valores como
//! número, categorias com caixa diferente. Esta é a única fronteira onde o
//! JSON solto vira os tipos do domínio; daqui para frente ninguém inspeciona
//! formato.
//!
//! ## Regras de Coerção
//!
//! | Entrada | Tratamento |
//! |---------|------------|
//! | Array de objetos | cada objeto vira uma `Section` candidata |
//! | Objeto único | normalizado para array de um elemento |
//! | Outro JSON / texto inválido | `EsgError::Parse` |
//! | Seção sem `title` string ou sem `metrics` array | descartada |
//! | Métrica sem `metric_name` ou `value` | descartada |
//! | `value` numérico | convertido para string |
//! | `year` como `"2030"` ou `2030.0` | `2030` |
//! | categoria desconhecida | [`Category::Other`] |

use serde_json::{json, Map, Value};

use super::fence::strip_fences;
use crate::core::{Category, Metric, MetricType, Section};
use crate::error::{EsgError, Result};

/// Faz o parse do texto cru em seções, removendo cercas markdown antes.
///
/// # Erros
///
/// `EsgError::Parse` se o texto não for JSON ou não for array/objeto.
pub fn parse_sections(raw: &str) -> Result<Vec<Section>> {
    let items = parse_json_items(raw)?;
    let total = items.len();
    let sections: Vec<Section> = items.iter().filter_map(coerce_section).collect();
    if sections.len() < total {
        tracing::debug!(
            dropped = total - sections.len(),
            "Seções sem title/metrics descartadas"
        );
    }
    Ok(sections)
}

/// JSON cru → lista de itens (array, ou objeto único embrulhado).
pub fn parse_json_items(raw: &str) -> Result<Vec<Value>> {
    let cleaned = strip_fences(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| EsgError::Parse(format!("{} (output starts with: {:?})", e, preview(cleaned))))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => Ok(vec![Value::Object(obj)]),
        other => Err(EsgError::Parse(format!(
            "expected a JSON array or object, got {}",
            json_kind(&other)
        ))),
    }
}

fn coerce_section(value: &Value) -> Option<Section> {
    let obj = value.as_object()?;
    let title = obj.get("title")?.as_str()?.trim().to_string();
    let metrics = obj
        .get("metrics")?
        .as_array()?
        .iter()
        .filter_map(coerce_metric)
        .collect();
    Some(Section {
        title,
        page_ref: optional_text(obj, "page_ref"),
        metrics,
    })
}

fn coerce_metric(value: &Value) -> Option<Metric> {
    let obj = value.as_object()?;
    let metric_name = scalar_text(obj.get("metric_name")?)?;
    let value = scalar_text(obj.get("value")?)?;
    Some(Metric {
        metric_name,
        value,
        category: optional_text(obj, "category").and_then(|c| Category::parse_lenient(&c)),
        metric_type: optional_text(obj, "metric_type").and_then(|t| MetricType::parse_lenient(&t)),
        year: obj.get("year").and_then(coerce_year),
        unit: optional_text(obj, "unit"),
        scope: optional_text(obj, "scope"),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Campo textual opcional: vazio ou `null` viram `None`.
fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(scalar_text)
        .filter(|s| !s.is_empty())
}

fn coerce_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

/// `responseSchema` enviado junto da chamada de extração (subconjunto OpenAPI do Gemini).
pub fn sections_response_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING", "description": "Section title or topic" },
                "page_ref": { "type": "STRING", "nullable": true, "description": "Page # or section reference" },
                "metrics": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "metric_name": { "type": "STRING", "description": "The name of the metric" },
                            "value": { "type": "STRING", "description": "The numeric value with units (e.g., '50%', '1,200 tons')" },
                            "year": { "type": "INTEGER", "nullable": true, "description": "Target or reporting year" },
                            "category": { "type": "STRING", "nullable": true, "enum": categories },
                            "metric_type": { "type": "STRING", "nullable": true, "enum": ["target", "actual", "baseline"] },
                            "scope": { "type": "STRING", "nullable": true, "description": "e.g. 'Scope 1', 'Scope 2'" },
                            "unit": { "type": "STRING", "nullable": true, "description": "e.g. '%', 'tons', 'GWh', 'CO2e'" }
                        },
                        "required": ["metric_name", "value"]
                    }
                }
            },
            "required": ["title", "metrics"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_array_is_parsed() {
        let raw = r#"```json
[{"title": "Climate", "page_ref": "p. 12", "metrics": [
  {"metric_name": "Scope 1 emissions", "value": "12,000 tCO2e", "year": "2023",
   "category": "Emissions", "metric_type": "actual", "scope": "Scope 1"}
]}]
```"#;
        let sections = parse_sections(raw).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].page_ref.as_deref(), Some("p. 12"));
        let m = &sections[0].metrics[0];
        assert_eq!(m.year, Some(2023));
        assert_eq!(m.category, Some(Category::Emissions));
        assert_eq!(m.metric_type, Some(MetricType::Actual));
        assert_eq!(m.unit, None);
    }

    #[test]
    fn single_object_becomes_one_section() {
        let raw = r#"{"title": "Water", "metrics": [{"metric_name": "Water use", "value": 42}]}"#;
        let sections = parse_sections(raw).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].metrics[0].value, "42");
        assert_eq!(sections[0].page_ref, None);
    }

    #[test]
    fn malformed_output_is_parse_error() {
        assert!(matches!(parse_sections("I could not find metrics."), Err(EsgError::Parse(_))));
        assert!(matches!(parse_sections("\"just a string\""), Err(EsgError::Parse(_))));
    }

    #[test]
    fn incomplete_items_are_dropped() {
        let raw = r#"[
            {"metrics": []},
            {"title": "Safety", "metrics": [
                {"metric_name": "LTIR"},
                {"value": "0.4"},
                {"metric_name": "LTIR", "value": "0.4", "year": 2023.0, "category": ""}
            ]}
        ]"#;
        let sections = parse_sections(raw).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].metrics.len(), 1);
        assert_eq!(sections[0].metrics[0].year, Some(2023));
        assert_eq!(sections[0].metrics[0].category, None);
    }

    #[test]
    fn response_schema_lists_categories() {
        let schema = sections_response_schema();
        let enums = &schema["items"]["properties"]["metrics"]["items"]["properties"]["category"]["enum"];
        assert_eq!(enums.as_array().unwrap().len(), 10);
    }
}
