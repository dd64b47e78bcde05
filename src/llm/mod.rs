//! # Camada LLM — A Fronteira com o Serviço Externo
//!
//! O LLM hospedado é tratado como uma caixa-preta:
//! `call(model, prompt, payload) → texto cru`. Tudo que volta é entrada não
//! confiável e passa por [`schema`] antes de virar tipo do domínio.
//!
//! ## Sub-módulos
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | [`gemini`] | Backend HTTP real (Gemini `generateContent`, reqwest blocking) |
//! | [`client`] | [`ExtractionClient`] — uma chamada de extração, texto → seções |
//! | [`schema`] | Coerção do JSON cru em `Section`/`Metric` + `responseSchema` |
//! | [`fence`] | Remoção de cercas markdown antes do parse |
//! | [`prompts`] | Prompts de extração e de comparação |
//!
//! ## Por que um trait?
//!
//! O pipeline e o comparador dependem só de [`LlmBackend`]; os testes usam um
//! backend roteirizado em memória, sem rede.

pub mod client;
pub mod fence;
pub mod gemini;
pub mod prompts;
pub mod schema;

use serde_json::Value;

use crate::error::Result;

pub use client::{Content, ExtractionClient};
pub use gemini::GeminiBackend;

/// Uma parte da requisição: texto livre ou documento binário inline.
#[derive(Clone, Debug)]
pub enum RequestPart<'a> {
    Text(&'a str),
    Inline { mime_type: &'a str, data: &'a [u8] },
}

/// Requisição ao LLM, independente do provedor.
#[derive(Clone, Debug)]
pub struct LlmRequest<'a> {
    pub model: &'a str,
    pub parts: Vec<RequestPart<'a>>,
    /// Pede `application/json` como tipo da resposta.
    pub json_output: bool,
    /// Schema de resposta sugerido; a resposta continua sendo validada.
    pub response_schema: Option<Value>,
}

impl<'a> LlmRequest<'a> {
    pub fn text(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            parts: vec![RequestPart::Text(prompt)],
            json_output: false,
            response_schema: None,
        }
    }

    pub fn with_part(mut self, part: RequestPart<'a>) -> Self {
        self.parts.push(part);
        self
    }

    pub fn expecting_json(mut self, schema: Option<Value>) -> Self {
        self.json_output = true;
        self.response_schema = schema;
        self
    }
}

/// Chamada síncrona a um LLM.
///
/// Implementações devem mapear falhas para a taxonomia do crate:
/// credencial ausente → `Config`, credencial rejeitada → `Auth`,
/// rede/rate limit/5xx → `Transient`, resposta sem texto → `Parse`.
pub trait LlmBackend {
    fn generate(&self, request: &LlmRequest<'_>) -> Result<String>;
}

impl<T: LlmBackend + ?Sized> LlmBackend for &T {
    fn generate(&self, request: &LlmRequest<'_>) -> Result<String> {
        (**self).generate(request)
    }
}
