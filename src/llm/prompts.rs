//! Prompts enviados ao LLM.
//!
//! O placeholder `{text}` no prompt de extração recebe o texto do batch (ou
//! uma referência ao documento anexado, no modo documento inteiro).

/// Placeholder substituído pelo conteúdo do batch.
pub const TEXT_PLACEHOLDER: &str = "{text}";

pub const EXTRACTION_PROMPT: &str = r#"
You're an expert sustainability analyst specializing in ESG metrics extraction.
Extract all relevant metrics, targets, and KPIs from the text and format them to the provided schema.

CRITICAL EXTRACTION RULES:
1. Extract ONLY metrics with actual numeric values
2. Include the numeric value WITH units in the 'value' field (e.g., '50%', '1,200 tons', '42 hours')
3. Category must be one of: environmental, emissions, energy, water, waste, social, governance, safety, supply_chain, or other
4. Metric type should be: target, actual, or baseline
5. For percentages: include the % symbol (e.g., '28%')
6. For currency: include currency symbol (e.g., '$14M')
7. For targets: set metric_type='target' and include target year
8. For historical data: set metric_type='actual' or 'baseline'

DO NOT extract:
- Company names, addresses, or contact information
- Document titles or report names
- Generic statements without numbers
- URLs or email addresses

Text to analyze:
{text}
"#;

/// Texto colocado no lugar de `{text}` quando o PDF vai como anexo.
pub const ATTACHED_DOCUMENT_NOTE: &str = "(the attached PDF document)";

/// Substitui o placeholder do template pelo conteúdo.
pub fn render(template: &str, content: &str) -> String {
    template.replace(TEXT_PLACEHOLDER, content)
}

/// Prompt de agrupamento semântico para `n` tabelas da categoria `category`.
///
/// As tabelas em si vão como uma segunda parte da requisição, em JSON.
pub fn comparison_prompt(category: &str, datasets: usize) -> String {
    let keys: Vec<String> = (1..=datasets).map(|i| format!("\"dataset_{}\"", i)).collect();
    format!(
        r#"
You are an ESG data analyst. I will give you {datasets} sustainability metric tables as a JSON array,
one table per company report, in order.
Group the metrics for the category "{category}" by the underlying topic they measure,
matching on meaning rather than exact name (for example "Scope 1 emissions" and
"Direct GHG emissions" describe the same topic). Consider the year when deciding.

Return ONLY a JSON array. Each element must be an object with:
- "common_metric": a short label for the shared topic
- {keys}: for each table, the list of its matching metrics as {{"metric": ..., "value": ...}},
  copied verbatim from that table (use an empty list when a table has no match)

Only include topics that appear in at least two tables. Do not change any values.
"#,
        datasets = datasets,
        category = category,
        keys = keys.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_embeds_text() {
        let prompt = render(EXTRACTION_PROMPT, "=== Page 3 ===\nScope 1: 12 kt");
        assert!(prompt.contains("=== Page 3 ==="));
        assert!(!prompt.contains(TEXT_PLACEHOLDER));
    }

    #[test]
    fn comparison_prompt_names_every_dataset() {
        let prompt = comparison_prompt("Social", 3);
        assert!(prompt.contains("\"dataset_1\", \"dataset_2\", \"dataset_3\""));
        assert!(prompt.contains("\"Social\""));
    }
}
