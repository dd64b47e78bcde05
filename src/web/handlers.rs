//! # Handlers HTTP — API JSON, Fragmentos HTMX e SSE
//!
//! Cada função pública é um handler Axum mapeado em
//! [`super::create_router()`].
//!
//! | Handler | Rota | Retorno |
//! |---------|------|---------|
//! | `index` | GET `/` | HTML completo |
//! | `sse_events` | GET `/events` | SSE (progresso das extrações) |
//! | `upload` | POST `/api/upload` | JSON `{filename, saved_to}` |
//! | `extract` | POST `/api/extract` | JSON (`exists` ou `success`) |
//! | `list_results` | GET `/api/results` | JSON |
//! | `get_result` | GET `/api/results/{key}` | JSON (linhas) |
//! | `compare` | POST `/api/compare` | JSON (grupos + tabelas) |
//! | `export_comparison` | GET `/api/compare/export` | CSV |
//! | `ui_extract` / `ui_compare` / `ui_results` | `/ui/*` | Fragmentos HTMX |
//!
//! ## Trabalho Bloqueante
//!
//! Extração e comparação chamam o LLM com reqwest blocking e dormem nos
//! cooldowns, então rodam em `spawn_blocking`. O backend Gemini é criado
//! dentro da task: a chave ausente só vira erro quando alguém extrai.
//!
//! ## Mapeamento de Erros
//!
//! | Erro | Status |
//! |------|--------|
//! | `Config`, `Auth` | 500 (mensagem verbatim) |
//! | `InsufficientInput` | 422 |
//! | `Parse` | 502 |
//! | `Transient` | 503 |
//! | `Io`, `Pdf` | 400 |
//! | `Csv`, `Json` | 500 |

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures_util::stream::StreamExt;
use maud::Markup;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;

use super::events::ExtractionEvent;
use super::state::AppState;
use super::templates;
use crate::compare::{ensure_comparable, Comparator};
use crate::core::{ComparisonGroup, ComparisonTable, DocumentKey, MetricRow};
use crate::error::EsgError;
use crate::llm::{ExtractionClient, GeminiBackend};
use crate::pdf::PdfDocument;
use crate::persistence::{self, ComparisonKey, StoredResult};
use crate::pipeline::{ExtractionMode, Extractor, RunSettings, RunSummary};

/// Converte Markup do Maud para `Html<String>` do Axum.
fn markup_to_html(markup: Markup) -> Html<String> {
    Html(markup.into_string())
}

/// Erro devolvido pela API.
#[derive(Debug)]
pub enum ApiError {
    Esg(EsgError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<EsgError> for ApiError {
    fn from(e: EsgError) -> Self {
        ApiError::Esg(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Esg(e) => match e {
                EsgError::Config(_) | EsgError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
                EsgError::InsufficientInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EsgError::Parse(_) => StatusCode::BAD_GATEWAY,
                EsgError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                EsgError::Io { .. } | EsgError::Pdf { .. } => StatusCode::BAD_REQUEST,
                EsgError::Csv { .. } | EsgError::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Esg(e) => e.to_string(),
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.message(), "Requisição falhou");
        } else {
            tracing::warn!(status = %status, error = %self.message(), "Requisição rejeitada");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("background task failed: {}", e))
}

// ─── Páginas e SSE ───────────────────────────────────────────────

/// GET `/` — página com resultados, extração e comparação.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let results = stored_results(&state);
    markup_to_html(templates::full_page(&results))
}

fn stored_results(state: &AppState) -> Vec<StoredResult> {
    state.store.list_results().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falha ao listar resultados");
        Vec::new()
    })
}

/// GET `/events` — stream SSE dos eventos de extração.
///
/// Keep-alive a cada 15s; mensagens atrasadas (buffer cheio) são descartadas.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.events_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(SseEvent::default().data(data)))
            }
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// ─── Upload ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub saved_to: String,
}

/// POST `/api/upload` — guarda o PDF em `data/uploads/`.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if !matches!(field.name(), Some("file") | Some("pdf")) {
            continue;
        }
        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        tracing::info!(size_bytes = bytes.len(), filename = %filename, "PDF upload recebido");
        let path = persistence::save_upload(&state.config.uploads_dir(), &filename, &bytes)?;
        return Ok(Json(UploadResponse {
            filename,
            saved_to: path.display().to_string(),
        }));
    }
    Err(ApiError::BadRequest("no 'file' field in upload".into()))
}

// ─── Extração ────────────────────────────────────────────────────

/// Campos do formulário de extração.
#[derive(Default)]
struct ExtractForm {
    filename: Option<String>,
    bytes: Option<Bytes>,
    company: Option<String>,
    year: Option<String>,
    force: bool,
    mode: ExtractionMode,
}

impl ExtractForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ExtractForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" | "pdf" => {
                    form.filename = field.file_name().map(str::to_string);
                    form.bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?);
                }
                "company" | "year" | "force" | "mode" => {
                    let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                    let text = text.trim().to_string();
                    match name.as_str() {
                        "company" => form.company = Some(text).filter(|t| !t.is_empty()),
                        "year" => form.year = Some(text).filter(|t| !t.is_empty()),
                        "force" => form.force = parse_flag(&text),
                        _ => form.mode = text.parse().map_err(ApiError::BadRequest)?,
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    /// `<empresa>_<ano>` quando a empresa foi informada, senão o nome do arquivo.
    fn key(&self) -> Result<DocumentKey, ApiError> {
        match &self.company {
            Some(company) => {
                let year = self
                    .year
                    .as_deref()
                    .ok_or_else(|| ApiError::BadRequest("'year' is required with 'company'".into()))?;
                let year: i32 = year
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid year '{}'", year)))?;
                Ok(DocumentKey::for_company(company, year))
            }
            None => Ok(DocumentKey::from_filename(
                self.filename.as_deref().unwrap_or("document.pdf"),
            )),
        }
    }
}

fn parse_flag(text: &str) -> bool {
    matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    /// `"exists"` (nada foi feito) ou `"success"`.
    pub status: &'static str,
    pub key: DocumentKey,
    pub message: String,
    pub metrics: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

async fn run_extract(state: &AppState, form: ExtractForm) -> Result<ExtractResponse, ApiError> {
    let key = form.key()?;
    if !form.force && state.store.exists(&key) {
        let metrics = state.store.load_rows(&key)?.map(|rows| rows.len()).unwrap_or(0);
        return Ok(ExtractResponse {
            status: "exists",
            message: format!(
                "Results for '{}' already exist. Extract again with force to overwrite them.",
                key
            ),
            key,
            metrics,
            summary: None,
        });
    }

    let bytes = form
        .bytes
        .ok_or_else(|| ApiError::BadRequest("no 'file' field in request".into()))?;
    let filename = form.filename.unwrap_or_else(|| "document.pdf".to_string());
    let saved = persistence::save_upload(&state.config.uploads_dir(), &filename, &bytes)?;
    tracing::info!(document = %key, path = %saved.display(), size_bytes = bytes.len(), mode = %form.mode, "Extração solicitada");

    let config = state.config.clone();
    let store = state.store.clone();
    let tx = state.events_tx.clone();
    let (force, mode) = (form.force, form.mode);
    let task_key = key.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let run = || -> crate::error::Result<_> {
            let doc = PdfDocument::from_bytes(filename, &bytes)?;
            let backend = GeminiBackend::new(&config)?;
            let extractor = Extractor::new(
                ExtractionClient::new(backend, &config.extraction_model),
                RunSettings::from_config(&config),
            )
            .with_events(tx.clone());

            let mut summary = None;
            let result = store.get_or_compute(&task_key, force, || {
                let extraction = extractor.run_mode(mode, &task_key, &doc, &bytes)?;
                summary = Some(extraction.summary);
                Ok(extraction.result)
            })?;
            Ok((result.into_inner(), summary))
        };
        let outcome = run();
        if let Err(e) = &outcome {
            let _ = tx.send(ExtractionEvent::Error {
                document: task_key.to_string(),
                message: e.to_string(),
            });
        }
        outcome
    })
    .await
    .map_err(join_error)??;

    let (result, summary) = outcome;
    Ok(ExtractResponse {
        status: "success",
        message: format!("Extracted {} metrics from {} sections.", result.metric_count(), result.sections.len()),
        key,
        metrics: result.metric_count(),
        summary,
    })
}

/// POST `/api/extract` — extrai (ou reaproveita) as métricas de um PDF.
///
/// Campos multipart: `file`, `company`, `year`, `force`, `mode`.
pub async fn extract(State(state): State<AppState>, multipart: Multipart) -> Result<Json<ExtractResponse>, ApiError> {
    let form = ExtractForm::read(multipart).await?;
    run_extract(&state, form).await.map(Json)
}

/// POST `/ui/extract` — como `/api/extract`, devolvendo um fragmento HTML.
pub async fn ui_extract(State(state): State<AppState>, multipart: Multipart) -> Html<String> {
    let outcome = match ExtractForm::read(multipart).await {
        Ok(form) => run_extract(&state, form).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(response) => markup_to_html(templates::extract_result(&response)),
        Err(e) => markup_to_html(templates::error_message(&e.message())),
    }
}

// ─── Resultados ──────────────────────────────────────────────────

/// GET `/api/results` — chave, formato, linhas e data de cada resultado.
pub async fn list_results(State(state): State<AppState>) -> Result<Json<Vec<StoredResult>>, ApiError> {
    Ok(Json(state.store.list_results()?))
}

/// GET `/api/results/{key}` — linhas planas de um resultado.
pub async fn get_result(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<Vec<MetricRow>>, ApiError> {
    let key = DocumentKey::from_filename(&key);
    state
        .store
        .load_rows(&key)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no results for '{}'", key)))
}

/// GET `/ui/results` — fragmento com a tabela de resultados.
pub async fn ui_results(State(state): State<AppState>) -> Html<String> {
    markup_to_html(templates::results_table(&stored_results(&state)))
}

// ─── Comparação ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub files: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    /// `"cached"` ou `"computed"`.
    pub status: &'static str,
    pub category: String,
    /// Ordem dos documentos: `dataset_i` é o i-ésimo.
    pub documents: Vec<DocumentKey>,
    pub groups: Vec<ComparisonGroup>,
    pub tables: Vec<ComparisonTable>,
}

fn labels(key: &ComparisonKey) -> Vec<String> {
    key.documents().iter().map(|d| d.to_string()).collect()
}

/// Link de exportação com `files` repetido, parâmetros percent-encoded.
fn export_href(key: &ComparisonKey) -> String {
    let mut url = reqwest::Url::parse("http://localhost/api/compare/export")
        .expect("static base url");
    {
        let mut query = url.query_pairs_mut();
        for doc in key.documents() {
            query.append_pair("files", doc.as_str());
        }
        query.append_pair("category", key.category());
    }
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

async fn run_compare(state: &AppState, request: CompareRequest) -> Result<(ComparisonKey, CompareResponse), ApiError> {
    let category = request.category.trim().to_string();
    if category.is_empty() {
        return Err(ApiError::BadRequest("'category' is required".into()));
    }
    let documents: Vec<DocumentKey> = request
        .files
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| DocumentKey::from_filename(f))
        .collect();
    let key = ComparisonKey::new(&category, &documents);

    let config = state.config.clone();
    let store = state.store.clone();
    let task_key = key.clone();
    let force = request.force;
    let task_category = category.clone();

    let cached = tokio::task::spawn_blocking(move || {
        store.get_or_compare(&task_key, force, || {
            let mut datasets = Vec::with_capacity(task_key.documents().len());
            for doc in task_key.documents() {
                let rows = store
                    .load_rows(doc)?
                    .ok_or_else(|| EsgError::InsufficientInput(format!("no extracted results for '{}'", doc)))?;
                datasets.push((doc.clone(), rows));
            }
            ensure_comparable(&datasets, &task_category)?;
            let backend = GeminiBackend::new(&config)?;
            Comparator::new(backend, &config.comparison_model).compare(&datasets, &task_category)
        })
    })
    .await
    .map_err(join_error)??;

    let status = if cached.is_hit() { "cached" } else { "computed" };
    let groups = cached.into_inner();
    let labels = labels(&key);
    let tables = groups.iter().map(|g| g.to_table(&labels)).collect();
    let response = CompareResponse {
        status,
        category,
        documents: key.documents().to_vec(),
        groups,
        tables,
    };
    Ok((key, response))
}

/// POST `/api/compare` — `{files, category, force}` → grupos de métricas equivalentes.
pub async fn compare(State(state): State<AppState>, Json(request): Json<CompareRequest>) -> Result<Json<CompareResponse>, ApiError> {
    run_compare(&state, request).await.map(|(_, response)| Json(response))
}

impl CompareRequest {
    /// Lê o formulário multipart da página (`files` repetido).
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut request = CompareRequest {
            files: Vec::new(),
            category: String::new(),
            force: false,
        };
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            match name.as_str() {
                "files" => request.files.push(text),
                "category" => request.category = text,
                "force" => request.force = parse_flag(&text),
                _ => {}
            }
        }
        Ok(request)
    }
}

/// POST `/ui/compare` — formulário multipart (`files` repetido), fragmento HTML.
pub async fn ui_compare(State(state): State<AppState>, multipart: Multipart) -> Html<String> {
    let outcome = match CompareRequest::read(multipart).await {
        Ok(request) => run_compare(&state, request).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok((key, response)) => markup_to_html(templates::comparison_view(
            &response.category,
            &export_href(&key),
            &response.tables,
        )),
        Err(e) => markup_to_html(templates::error_message(&e.message())),
    }
}

/// Parâmetros de exportação: `files` repetido, uma chave por ocorrência.
#[derive(Debug, Default, PartialEq)]
pub struct ExportQuery {
    pub files: Vec<String>,
    pub category: String,
}

impl ExportQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut query = ExportQuery::default();
        for (name, value) in pairs {
            match name.as_str() {
                "files" if !value.trim().is_empty() => query.files.push(value),
                "category" => query.category = value,
                _ => {}
            }
        }
        if query.category.trim().is_empty() {
            return Err(ApiError::BadRequest("'category' is required".into()));
        }
        Ok(query)
    }

    fn key(&self) -> ComparisonKey {
        let documents: Vec<DocumentKey> = self.files.iter().map(|f| DocumentKey::from_filename(f.trim())).collect();
        ComparisonKey::new(&self.category, &documents)
    }
}

/// GET `/api/compare/export` — CSV de uma comparação já calculada.
pub async fn export_comparison(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let key = ExportQuery::from_pairs(pairs)?.key();
    let groups = state
        .store
        .load_comparison(&key)?
        .ok_or_else(|| ApiError::NotFound(format!("no comparison cached as '{}'", key.file_name())))?;

    let path = state.store.export_comparison_csv(&key, &groups)?;
    let body = tokio::fs::read(&path)
        .await
        .map_err(|e| EsgError::io(&path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "comparison.csv".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        body,
    )
        .into_response())
}
