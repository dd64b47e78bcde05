//! # Backend Gemini — `generateContent` via reqwest blocking
//!
//! Implementação de [`LlmBackend`] para a API REST do Gemini:
//!
//! ```text
//! POST {api_base}/models/{model}:generateContent
//! x-goog-api-key: <chave>
//! { "contents": [{ "role": "user", "parts": [ {text} | {inline_data} ... ] }],
//!   "generationConfig": { "responseMimeType": "application/json", "responseSchema": ... } }
//! ```
//!
//! ## Mapeamento de Erros
//!
//! | Situação | Erro |
//! |----------|------|
//! | chave ausente na config | `Config` (no primeiro uso, em [`GeminiBackend::new()`]) |
//! | 401 / 403 / `API_KEY_INVALID` | `Auth` |
//! | falha de rede, 408, 429, 5xx | `Transient` |
//! | demais 4xx (modelo inexistente, schema inválido) | `Config` |
//! | 200 sem texto (ex: bloqueado por safety) | `Parse` |
//!
//! O cliente é **blocking**: deve ser criado e usado dentro de
//! `spawn_blocking`, nunca direto no runtime async.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{LlmBackend, LlmRequest, RequestPart};
use crate::config::Config;
use crate::error::{EsgError, Result};

pub struct GeminiBackend {
    client: HttpClient,
    api_key: String,
    api_base: String,
}

impl GeminiBackend {
    /// Cria o backend a partir da configuração.
    ///
    /// # Erros
    ///
    /// `EsgError::Config` se não houver chave de API configurada.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EsgError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| EsgError::Config("API key contains invalid characters".into()))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }
}

/// Corpo da requisição `generateContent`.
pub(crate) fn request_body(request: &LlmRequest<'_>) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::Inline { mime_type, data } => json!({
                "inline_data": { "mime_type": mime_type, "data": STANDARD.encode(data) }
            }),
        })
        .collect();

    let mut body = json!({ "contents": [{ "role": "user", "parts": parts }] });
    if request.json_output {
        let mut generation = json!({ "responseMimeType": "application/json" });
        if let Some(schema) = &request.response_schema {
            generation["responseSchema"] = schema.clone();
        }
        body["generationConfig"] = generation;
    }
    body
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Concatena os textos do primeiro candidato.
fn response_text(body: GenerateResponse) -> Result<String> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| EsgError::Parse("response has no candidates".into()))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(EsgError::Parse(format!(
            "response has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

fn classify_failure(status: StatusCode, body: &str) -> EsgError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| match e.error.status {
            Some(s) => format!("{}: {}", s, e.error.message),
            None => e.error.message,
        })
        .unwrap_or_else(|_| body.chars().take(200).collect());

    let message = format!("{} ({})", detail, status);
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("API_KEY_INVALID")
    {
        EsgError::Auth(message)
    } else if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        EsgError::Transient(message)
    } else if status.is_client_error() {
        // modelo inexistente ou schema inválido
        EsgError::Config(message)
    } else {
        EsgError::Transient(message)
    }
}

impl LlmBackend for GeminiBackend {
    fn generate(&self, request: &LlmRequest<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, request.model);
        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(&request_body(request))
            .send()
            .map_err(|e| EsgError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_failure(status, &body));
        }
        let body: GenerateResponse = response
            .json()
            .map_err(|e| EsgError::Parse(format!("unexpected response envelope: {}", e)))?;
        response_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_fails_on_construction() {
        let err = GeminiBackend::new(&Config::default()).err().unwrap();
        assert!(matches!(err, EsgError::Config(_)));
    }

    #[test]
    fn body_contains_parts_and_generation_config() {
        let pdf = b"%PDF-1.7";
        let request = LlmRequest::text("gemini-2.5-flash-lite", "Extract metrics")
            .with_part(RequestPart::Inline { mime_type: "application/pdf", data: pdf })
            .expecting_json(Some(json!({ "type": "ARRAY" })));
        let body = request_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Extract metrics");
        assert_eq!(parts[1]["inline_data"]["data"], STANDARD.encode(pdf));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn plain_text_request_has_no_generation_config() {
        let body = request_body(&LlmRequest::text("m", "hi"));
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert!(matches!(classify_failure(StatusCode::FORBIDDEN, ""), EsgError::Auth(_)));
        let invalid_key = r#"{"error": {"message": "API key not valid", "status": "INVALID_ARGUMENT",
            "details": [{"reason": "API_KEY_INVALID"}]}}"#;
        assert!(matches!(classify_failure(StatusCode::BAD_REQUEST, invalid_key), EsgError::Auth(_)));
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "quota", "status": "RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, EsgError::Transient(ref m) if m.contains("RESOURCE_EXHAUSTED")));
        assert!(matches!(classify_failure(StatusCode::REQUEST_TIMEOUT, ""), EsgError::Transient(_)));
        assert!(matches!(classify_failure(StatusCode::SERVICE_UNAVAILABLE, "overloaded"), EsgError::Transient(_)));
    }

    #[test]
    fn bad_request_and_unknown_model_are_config_errors() {
        let unknown_model = r#"{"error": {"message": "models/gemini-typo is not found", "status": "NOT_FOUND"}}"#;
        let err = classify_failure(StatusCode::NOT_FOUND, unknown_model);
        assert!(matches!(err, EsgError::Config(ref m) if m.contains("gemini-typo")));
        assert!(err.is_fatal());

        let bad_schema = r#"{"error": {"message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(classify_failure(StatusCode::BAD_REQUEST, bad_schema), EsgError::Config(_)));
    }

    #[test]
    fn candidate_text_is_concatenated() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "[{\"a\"" }, { "text": ": 1}]" }] } }]
        }))
        .unwrap();
        assert_eq!(response_text(body).unwrap(), "[{\"a\": 1}]");
    }

    #[test]
    fn blocked_response_is_parse_error() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert!(matches!(response_text(body), Err(EsgError::Parse(m)) if m.contains("SAFETY")));
    }
}
