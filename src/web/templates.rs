//! # Templates Maud — Página de Extração e Comparação
//!
//! HTML renderizado no servidor com [`maud`](https://maud.lambda.xyz/).
//! A página usa HTMX: os formulários postam em `/ui/*` e recebem fragmentos
//! prontos para inserir no DOM.
//!
//! ## Templates Disponíveis
//!
//! | Função | Tipo | Descrição |
//! |--------|------|-----------|
//! | [`full_page()`] | Página completa | Resultados, extração, comparação, progresso |
//! | [`results_table()`] | Fragmento | Lista de resultados gravados |
//! | [`extract_result()`] | Fragmento | Resposta de uma extração |
//! | [`comparison_view()`] | Fragmento | Uma tabela por grupo de comparação |
//! | [`error_message()`] | Fragmento | Alerta de erro |
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────── header ─────────────────────┐
//! │ ESG Metrics Extractor                       │
//! ├──────────────────────┬──────────────────────┤
//! │ Extrair              │ Comparar             │
//! │ [PDF][empresa][ano]  │ [☑ docs][categoria]  │
//! │ [modo][force][▶]     │ [force][▶]           │
//! │ Progresso (SSE)      │ Tabelas por grupo    │
//! ├──────────────────────┴──────────────────────┤
//! │ Resultados gravados (chave, formato, linhas)│
//! └─────────────────────────────────────────────┘
//! ```

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::core::{Category, ComparisonTable};
use crate::persistence::StoredResult;

use super::handlers::ExtractResponse;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f6f7f4; color: #1f2a1f; }
header { background: #2f5d3a; color: white; padding: 1rem 2rem; }
main { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; padding: 1.5rem 2rem; }
section { background: white; border-radius: 8px; padding: 1rem 1.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
section.wide { grid-column: 1 / span 2; }
label { display: block; margin: .5rem 0 .2rem; font-weight: 600; }
table { border-collapse: collapse; width: 100%; margin: .5rem 0 1rem; font-size: .9rem; }
th, td { border: 1px solid #d8ddd5; padding: .3rem .5rem; text-align: left; }
th { background: #eef2ec; }
.alert { background: #fde8e8; border: 1px solid #e4a0a0; padding: .6rem; border-radius: 6px; }
.ok { background: #e7f4e9; border: 1px solid #9fcea8; padding: .6rem; border-radius: 6px; }
#feed { font-family: monospace; font-size: .8rem; max-height: 12rem; overflow-y: auto; }
"#;

/// Página principal.
pub fn full_page(results: &[StoredResult]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "ESG Metrics Extractor" }
                style { (PreEscaped(STYLE)) }
                script src="https://unpkg.com/htmx.org@2.0.4" {}
            }
            body {
                header {
                    h1 { "ESG Metrics Extractor" }
                    p { "Extract sustainability metrics from PDF reports and compare them across companies." }
                }
                main {
                    section {
                        h2 { "Extract" }
                        form hx-post="/ui/extract" hx-target="#extract-result" hx-encoding="multipart/form-data" {
                            label for="file" { "PDF report" }
                            input type="file" id="file" name="file" accept="application/pdf" required;
                            label for="company" { "Company" }
                            input type="text" id="company" name="company" placeholder="Acme Foods";
                            label for="year" { "Year" }
                            input type="number" id="year" name="year" placeholder="2024";
                            label for="mode" { "Mode" }
                            select id="mode" name="mode" {
                                option value="batched" selected { "Page batches" }
                                option value="whole" { "Whole document" }
                            }
                            label { input type="checkbox" name="force" value="true"; " Extract again even if results exist" }
                            button type="submit" { "Extract" }
                        }
                        div id="extract-result" {}
                        h3 { "Progress" }
                        div id="feed" {}
                    }
                    section {
                        h2 { "Compare" }
                        form hx-post="/ui/compare" hx-target="#comparison" hx-encoding="multipart/form-data" {
                            label { "Documents" }
                            @if results.is_empty() {
                                p { em { "No extracted results yet." } }
                            }
                            @for result in results {
                                label {
                                    input type="checkbox" name="files" value=(result.key.as_str());
                                    " " (result.key.as_str())
                                }
                            }
                            label for="category" { "Category" }
                            select id="category" name="category" {
                                @for category in Category::ALL {
                                    option value=(category.as_str()) { (category.as_str()) }
                                }
                            }
                            label { input type="checkbox" name="force" value="true"; " Recompute" }
                            button type="submit" { "Compare" }
                        }
                        div id="comparison" {}
                    }
                    section class="wide" hx-get="/ui/results" hx-trigger="extracted from:body" {
                        (results_table(results))
                    }
                }
                (PreEscaped(r#"<script>
const feed = document.getElementById('feed');
const source = new EventSource('/events');
source.onmessage = function(e) {
  const ev = JSON.parse(e.data);
  let line = ev.type + ' ' + (ev.document || '');
  if (ev.pages && ev.batch) line += ' [' + ev.batch + '/' + ev.total + '] ' + ev.pages;
  if (ev.metrics !== undefined) line += ' metrics=' + ev.metrics;
  if (ev.message) line += ' ' + ev.message;
  const div = document.createElement('div');
  div.textContent = line;
  feed.appendChild(div);
  feed.scrollTop = feed.scrollHeight;
  if (ev.type === 'Completed') document.body.dispatchEvent(new Event('extracted'));
};
</script>"#))
            }
        }
    }
}

/// Tabela dos resultados gravados, com link para o arquivo.
pub fn results_table(results: &[StoredResult]) -> Markup {
    html! {
        h2 { "Stored results" }
        @if results.is_empty() {
            p { em { "Nothing extracted yet." } }
        } @else {
            table {
                thead { tr { th { "Key" } th { "Format" } th { "Metrics" } th { "Modified" } } }
                tbody {
                    @for result in results {
                        tr {
                            td { a href=(format!("/files/{}.{}", result.key, result.format)) { (result.key.as_str()) } }
                            td { (result.format.extension()) }
                            td { (result.rows) }
                            td {
                                @if let Some(modified) = result.modified {
                                    (modified.format("%Y-%m-%d %H:%M UTC").to_string())
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn extract_result(response: &ExtractResponse) -> Markup {
    html! {
        div class="ok" {
            p { strong { (response.key.as_str()) } ": " (response.message) }
            @if let Some(summary) = &response.summary {
                ul {
                    li { "Metrics: " (summary.metrics) " in " (summary.sections) " sections" }
                    li { "API calls: " (summary.api_calls) " (" (summary.calls_saved) " saved vs. one per page)" }
                    li { "Batches skipped: " (summary.skipped) ", failed: " (summary.failed) }
                }
            }
        }
    }
}

/// Uma tabela por grupo, com colunas `(metric, value)` por documento.
pub fn comparison_view(category: &str, export_href: &str, tables: &[ComparisonTable]) -> Markup {
    html! {
        @if tables.is_empty() {
            p { "No common " (category) " metrics found." }
        } @else {
            p { a href=(export_href) { "Download CSV" } }
            @for table in tables {
                h3 { (table.title) }
                table {
                    thead { tr { @for header in &table.headers { th { (header) } } } }
                    tbody {
                        @for row in &table.rows {
                            tr { @for cell in row { td { (cell) } } }
                        }
                    }
                }
            }
        }
    }
}

pub fn error_message(message: &str) -> Markup {
    html! {
        div class="alert" { (message) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComparisonGroup, DocumentKey, GroupEntry};
    use crate::persistence::StoreFormat;

    #[test]
    fn comparison_rows_are_padded() {
        let group = ComparisonGroup {
            common_metric: "Water".into(),
            datasets: vec![
                vec![GroupEntry::new("Withdrawal", "3 ML"), GroupEntry::new("Recycled", "12%")],
                vec![GroupEntry::new("Water use", "4 ML")],
            ],
        };
        let table = group.to_table(&["a".to_string(), "b".to_string()]);
        let html = comparison_view("water", "/x.csv", &[table]).into_string();
        assert!(html.contains("<th>a metric</th>"));
        assert_eq!(html.matches("<td></td>").count(), 2);
    }

    #[test]
    fn page_lists_stored_results() {
        let results = vec![StoredResult {
            key: DocumentKey::for_company("Acme", 2024),
            format: StoreFormat::Csv,
            rows: 12,
            modified: None,
            path: "data/extracted_results/acme_2024.csv".into(),
        }];
        let html = full_page(&results).into_string();
        assert!(html.contains("value=\"acme_2024\""));
        assert!(html.contains("/files/acme_2024.csv"));
    }

    #[test]
    fn messages_are_escaped() {
        let html = error_message("<script>").into_string();
        assert!(html.contains("&lt;script&gt;"));
    }
}
