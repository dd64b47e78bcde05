//! # ExtractionClient — Uma Chamada de Extração
//!
//! Envolve exatamente **uma** chamada ao LLM: monta o prompt, pede JSON no
//! schema de seções, e devolve `Vec<Section>` já coerido por
//! [`super::schema::parse_sections()`].
//!
//! Não há retry aqui. Erros sobem intactos para o chamador, que aplica a
//! política por batch (cooldown, pular, abortar) em [`crate::pipeline`].

use super::prompts::{self, ATTACHED_DOCUMENT_NOTE};
use super::schema::{parse_sections, sections_response_schema};
use super::{LlmBackend, LlmRequest, RequestPart};
use crate::core::Section;
use crate::error::Result;

/// O que acompanha o prompt de uma chamada.
#[derive(Clone, Copy, Debug)]
pub enum Content<'a> {
    /// Texto do batch, embutido no lugar de `{text}`.
    Text(&'a str),
    /// PDF inteiro enviado como anexo inline.
    Document(&'a [u8]),
}

pub struct ExtractionClient<B> {
    backend: B,
    model: String,
}

impl<B: LlmBackend> ExtractionClient<B> {
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executa uma chamada e devolve as seções encontradas.
    ///
    /// # Erros
    ///
    /// Repassa `Config`/`Auth`/`Transient` do backend e `Parse` quando o
    /// texto devolvido não é JSON de seções.
    pub fn extract(&self, prompt_template: &str, content: Content<'_>) -> Result<Vec<Section>> {
        let prompt = match content {
            Content::Text(text) => prompts::render(prompt_template, text),
            Content::Document(_) => prompts::render(prompt_template, ATTACHED_DOCUMENT_NOTE),
        };

        let mut request = LlmRequest::text(&self.model, &prompt)
            .expecting_json(Some(sections_response_schema()));
        if let Content::Document(bytes) = content {
            request = request.with_part(RequestPart::Inline {
                mime_type: "application/pdf",
                data: bytes,
            });
        }

        let raw = self.backend.generate(&request)?;
        parse_sections(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EsgError;
    use crate::llm::prompts::EXTRACTION_PROMPT;
    use crate::llm::testing::ScriptedBackend;

    #[test]
    fn text_is_embedded_in_prompt() {
        let backend = ScriptedBackend::new().reply(
            r#"[{"title": "Energy", "metrics": [{"metric_name": "Renewables", "value": "40%"}]}]"#,
        );
        let client = ExtractionClient::new(&backend, "model-x");
        let sections = client.extract(EXTRACTION_PROMPT, Content::Text("=== Page 1 ===\nRenewables 40%")).unwrap();
        assert_eq!(sections[0].metrics[0].value, "40%");
        assert!(backend.prompts.borrow()[0].contains("=== Page 1 ==="));
        assert_eq!(backend.models.borrow()[0], "model-x");
    }

    #[test]
    fn document_mode_references_attachment() {
        let backend = ScriptedBackend::new().reply("[]");
        let client = ExtractionClient::new(&backend, "model-x");
        let sections = client.extract(EXTRACTION_PROMPT, Content::Document(b"%PDF")).unwrap();
        assert!(sections.is_empty());
        assert!(backend.prompts.borrow()[0].contains(ATTACHED_DOCUMENT_NOTE));
    }

    #[test]
    fn bad_json_is_not_retried() {
        let backend = ScriptedBackend::new().reply("not json").reply("[]");
        let client = ExtractionClient::new(&backend, "model-x");
        let err = client.extract(EXTRACTION_PROMPT, Content::Text("x")).unwrap_err();
        assert!(matches!(err, EsgError::Parse(_)));
        assert_eq!(backend.calls(), 1);
    }
}
