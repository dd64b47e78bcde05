//! Remoção de cercas markdown em volta do JSON devolvido pelo LLM.
//!
//! O modelo frequentemente responde com
//!
//! ```text
//! ```json
//! [ { "title": ... } ]
//! ```
//! ```
//!
//! mesmo quando pedimos `application/json`. Este passo é puramente textual:
//! remove o marcador de abertura (com tag de linguagem opcional) e o de
//! fechamento, e faz trim. O parse estrito vem depois, em um único lugar.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("invalid regex"));

/// Retorna o conteúdo do primeiro bloco cercado, ou o texto inteiro sem espaços nas pontas.
///
/// Uma cerca de abertura sem fechamento (resposta truncada) também é removida.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(inner) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        // pula a tag de linguagem da primeira linha
        return match rest.find('\n') {
            Some(nl) => rest[nl + 1..].trim(),
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()).trim(),
        };
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_is_only_trimmed() {
        assert_eq!(strip_fences("  [1, 2]\n"), "[1, 2]");
    }

    #[test]
    fn json_tagged_fence() {
        assert_eq!(strip_fences("```json\n[{\"a\": 1}]\n```"), "[{\"a\": 1}]");
    }

    #[test]
    fn untagged_fence_with_surrounding_prose() {
        let raw = "Here are the metrics:\n```\n{\"title\": \"x\"}\n```\nLet me know!";
        assert_eq!(strip_fences(raw), "{\"title\": \"x\"}");
    }

    #[test]
    fn unterminated_fence() {
        assert_eq!(strip_fences("```json\n[1,"), "[1,");
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(strip_fences("```json [] ```"), "[]");
    }
}
