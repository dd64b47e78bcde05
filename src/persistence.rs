//! # Persistência — Store em Arquivos Planos e Cache de Extração
//!
//! Não existe banco: tudo são arquivos em `data/`.
//!
//! ```text
//! data/
//!   ├── uploads/                     PDFs enviados
//!   ├── extracted_results/<key>.csv  ResultSet plano (ou .json)
//!   └── cached_json/common_metrics_<categoria>_<k1>_<k2>.json
//! ```
//!
//! ## Semântica do Cache
//!
//! - A chave de extração é a [`DocumentKey`]; a de comparação é
//!   [`ComparisonKey`] (documentos ordenados + categoria).
//! - Se o artefato existe, ele é devolvido **incondicionalmente**: o cache
//!   nunca expira e não revalida contra o PDF. Só `force = true` recomputa.
//! - Num miss, o valor computado é gravado **antes** de ser devolvido, e o
//!   valor devolvido é exatamente o que uma leitura posterior produziria.
//! - Se a computação falha, nada é gravado.
//!
//! ## ⚠️ Concorrência
//!
//! Sem lock e sem escrita atômica: duas execuções com a mesma chave terminam
//! em last-writer-wins. Aceitável com um único usuário interativo.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::core::{ComparisonGroup, DocumentKey, MetricRow, ResultSet};
use crate::error::{EsgError, Result};

/// Colunas da tabela plana, na ordem de [`MetricRow`].
pub const ROW_HEADERS: [&str; 9] = [
    "title", "page_ref", "category", "name", "value", "year", "type", "scope", "unit",
];

/// Formato do arquivo de resultado por documento.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    Csv,
    Json,
}

impl StoreFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Csv => "csv",
            StoreFormat::Json => "json",
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(StoreFormat::Csv),
            "json" => Some(StoreFormat::Json),
            _ => None,
        }
    }
}

impl FromStr for StoreFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(StoreFormat::Csv),
            "json" => Ok(StoreFormat::Json),
            other => Err(format!("expected 'csv' or 'json', got '{}'", other)),
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Chave do cache de comparação: categoria + documentos ordenados.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComparisonKey {
    category: String,
    documents: Vec<DocumentKey>,
}

impl ComparisonKey {
    pub fn new(category: &str, documents: &[DocumentKey]) -> Self {
        let mut documents = documents.to_vec();
        documents.sort();
        documents.dedup();
        Self {
            category: DocumentKey::from_filename(category).as_str().to_string(),
            documents,
        }
    }

    pub fn documents(&self) -> &[DocumentKey] {
        &self.documents
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn file_name(&self) -> String {
        let joined: Vec<&str> = self.documents.iter().map(DocumentKey::as_str).collect();
        format!("common_metrics_{}_{}.json", self.category, joined.join("_"))
    }
}

/// Valor devolvido pelo cache, indicando se houve hit.
#[derive(Clone, Debug, PartialEq)]
pub enum Cached<T> {
    Hit(T),
    Computed(T),
}

impl<T> Cached<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Cached::Hit(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Cached::Hit(v) | Cached::Computed(v) => v,
        }
    }
}

/// Resumo de um resultado gravado, para listagem.
#[derive(Clone, Debug, Serialize)]
pub struct StoredResult {
    pub key: DocumentKey,
    pub format: StoreFormat,
    pub rows: usize,
    pub modified: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Store de resultados e comparações em disco.
#[derive(Clone, Debug)]
pub struct ResultStore {
    results_dir: PathBuf,
    comparisons_dir: PathBuf,
    format: StoreFormat,
}

impl ResultStore {
    pub fn new(results_dir: impl Into<PathBuf>, comparisons_dir: impl Into<PathBuf>, format: StoreFormat) -> Self {
        Self {
            results_dir: results_dir.into(),
            comparisons_dir: comparisons_dir.into(),
            format,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.results_dir(), config.comparisons_dir(), config.store_format)
    }

    /// Caminho onde `key` é gravado no formato configurado.
    pub fn result_path(&self, key: &DocumentKey) -> PathBuf {
        self.results_dir
            .join(format!("{}.{}", key.as_str(), self.format.extension()))
    }

    /// Arquivo existente para `key`, em qualquer formato (preferindo o configurado).
    pub fn find_result(&self, key: &DocumentKey) -> Option<PathBuf> {
        let preferred = self.result_path(key);
        if preferred.is_file() {
            return Some(preferred);
        }
        [StoreFormat::Csv, StoreFormat::Json]
            .iter()
            .map(|f| self.results_dir.join(format!("{}.{}", key.as_str(), f.extension())))
            .find(|p| p.is_file())
    }

    pub fn exists(&self, key: &DocumentKey) -> bool {
        self.find_result(key).is_some()
    }

    /// Carrega as linhas de `key`, ou `None` se não houver resultado gravado.
    pub fn load_rows(&self, key: &DocumentKey) -> Result<Option<Vec<MetricRow>>> {
        self.find_result(key).map(|p| read_rows(&p)).transpose()
    }

    /// Grava o ResultSet plano de `key`, substituindo qualquer versão anterior.
    pub fn save_result(&self, key: &DocumentKey, result: &ResultSet) -> Result<PathBuf> {
        let path = self.result_path(key);
        ensure_parent(&path)?;
        write_rows(&path, &result.to_rows())?;
        tracing::info!(document = %key, path = %path.display(), metrics = result.metric_count(), "Resultado gravado");
        Ok(path)
    }

    /// Devolve o resultado gravado de `key`, ou computa, grava e devolve.
    ///
    /// Com `force = true` o artefato existente é ignorado e sobrescrito.
    pub fn get_or_compute<F>(&self, key: &DocumentKey, force: bool, compute: F) -> Result<Cached<ResultSet>>
    where
        F: FnOnce() -> Result<ResultSet>,
    {
        if !force {
            if let Some(rows) = self.load_rows(key)? {
                tracing::info!(document = %key, rows = rows.len(), "Cache hit: resultado já extraído");
                return Ok(Cached::Hit(ResultSet::from_rows(&rows)));
            }
        }
        let computed = compute()?;
        self.save_result(key, &computed)?;
        // mesma normalização de um hit
        Ok(Cached::Computed(ResultSet::from_rows(&computed.to_rows())))
    }

    /// Lista os resultados gravados, ordenados pela chave.
    pub fn list_results(&self) -> Result<Vec<StoredResult>> {
        let entries = match fs::read_dir(&self.results_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EsgError::io(&self.results_dir, e)),
        };

        let mut results = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| EsgError::io(&self.results_dir, e))?.path();
            let Some(format) = StoreFormat::from_path(&path) else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let rows = match read_rows(&path) {
                Ok(rows) => rows.len(),
                Err(e) => {
                    tracing::warn!(error = %e, "Resultado ilegível ignorado na listagem");
                    continue;
                }
            };
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            results.push(StoredResult {
                key: DocumentKey::from_filename(stem),
                format,
                rows,
                modified,
                path,
            });
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    pub fn comparison_path(&self, key: &ComparisonKey) -> PathBuf {
        self.comparisons_dir.join(key.file_name())
    }

    /// Grupos já calculados para `key`, se houver.
    pub fn load_comparison(&self, key: &ComparisonKey) -> Result<Option<Vec<ComparisonGroup>>> {
        let path = self.comparison_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Cache de comparação, mesma semântica de [`get_or_compute()`](Self::get_or_compute).
    pub fn get_or_compare<F>(&self, key: &ComparisonKey, force: bool, compute: F) -> Result<Cached<Vec<ComparisonGroup>>>
    where
        F: FnOnce() -> Result<Vec<ComparisonGroup>>,
    {
        let path = self.comparison_path(key);
        if !force {
            if let Some(groups) = self.load_comparison(key)? {
                tracing::info!(path = %path.display(), "Cache hit: comparação já calculada");
                return Ok(Cached::Hit(groups));
            }
        }
        let groups = compute()?;
        ensure_parent(&path)?;
        write_json(&path, &groups)?;
        tracing::info!(path = %path.display(), groups = groups.len(), "Comparação gravada");
        Ok(Cached::Computed(groups))
    }

    /// Exporta os grupos como CSV: `common_metric` e um par de colunas
    /// `metric`/`value` por documento, uma linha por posição da lista mais longa.
    pub fn export_comparison_csv(&self, key: &ComparisonKey, groups: &[ComparisonGroup]) -> Result<PathBuf> {
        let path = self.comparison_path(key).with_extension("csv");
        ensure_parent(&path)?;
        let labels: Vec<String> = key.documents().iter().map(|d| d.to_string()).collect();

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_err(&path))?;
        let mut header = vec!["common_metric".to_string()];
        for label in &labels {
            header.push(format!("{} metric", label));
            header.push(format!("{} value", label));
        }
        writer.write_record(&header).map_err(csv_err(&path))?;

        for group in groups {
            let table = group.to_table(&labels);
            for cells in &table.rows {
                let mut record = vec![table.title.as_str()];
                record.extend(cells.iter().map(String::as_str));
                record.resize(header.len(), "");
                writer.write_record(&record).map_err(csv_err(&path))?;
            }
        }
        writer.flush().map_err(|e| EsgError::io(&path, e))?;
        Ok(path)
    }
}

/// Lê uma tabela plana, escolhendo o formato pela extensão.
pub fn read_rows(path: &Path) -> Result<Vec<MetricRow>> {
    match StoreFormat::from_path(path) {
        Some(StoreFormat::Json) => read_json(path),
        _ => read_csv(path),
    }
}

/// Grava uma tabela plana, escolhendo o formato pela extensão.
pub fn write_rows(path: &Path, rows: &[MetricRow]) -> Result<()> {
    match StoreFormat::from_path(path) {
        Some(StoreFormat::Json) => write_json(path, rows),
        _ => write_csv(path, rows),
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> EsgError + '_ {
    move |source| EsgError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn read_csv(path: &Path) -> Result<Vec<MetricRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err(path))?;
    reader
        .deserialize()
        .map(|row| row.map_err(csv_err(path)))
        .collect()
}

fn write_csv(path: &Path, rows: &[MetricRow]) -> Result<()> {
    // cabeçalho explícito para que uma tabela vazia ainda tenha as colunas
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err(path))?;
    writer.write_record(ROW_HEADERS).map_err(csv_err(path))?;
    for row in rows {
        writer.serialize(row).map_err(csv_err(path))?;
    }
    writer.flush().map_err(|e| EsgError::io(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| EsgError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| EsgError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| EsgError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| EsgError::io(path, e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EsgError::io(parent, e))?;
    }
    Ok(())
}

/// Guarda um PDF enviado em `dir`, usando só o nome do arquivo (sem diretórios).
pub fn save_upload(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());
    fs::create_dir_all(dir).map_err(|e| EsgError::io(dir, e))?;
    let path = dir.join(name);
    fs::write(&path, bytes).map_err(|e| EsgError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempfile::TempDir;

    use super::*;
    use crate::core::{Category, GroupEntry, Metric, MetricType, Section};

    fn store(dir: &TempDir, format: StoreFormat) -> ResultStore {
        ResultStore::new(dir.path().join("extracted_results"), dir.path().join("cached_json"), format)
    }

    fn sample(sections: usize) -> ResultSet {
        let sections = (0..sections)
            .map(|i| {
                let mut metric = Metric::new(format!("Scope {} emissions", i + 1), format!("{},000 tCO2e", i + 3));
                metric.category = Some(Category::Emissions);
                metric.metric_type = Some(MetricType::Actual);
                metric.year = Some(2023);
                metric.scope = Some(format!("Scope {}", i + 1));
                metric.unit = Some("tCO2e".into());
                let mut section = Section::new(
                    format!("Climate, part \"{}\"", i),
                    vec![metric, Metric::new("Renewable share", "41%")],
                );
                section.page_ref = Some(format!("Pages {}-{}", i * 10 + 1, i * 10 + 10));
                section
            })
            .collect();
        ResultSet::new(sections)
    }

    #[test]
    fn flat_table_round_trips_in_both_formats() {
        let dir = TempDir::new().unwrap();
        for format in [StoreFormat::Csv, StoreFormat::Json] {
            let store = store(&dir, format);
            for n in [0, 1, 3] {
                let key = DocumentKey::from_filename(&format!("doc {}.pdf", n));
                let set = sample(n);
                let path = store.save_result(&key, &set).unwrap();
                assert_eq!(path.extension().unwrap(), format.extension());
                let rows = read_rows(&path).unwrap();
                assert_eq!(rows, set.to_rows());
            }
        }
    }

    #[test]
    fn csv_has_expected_header_even_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Csv);
        let path = store.save_result(&DocumentKey::from_filename("empty.pdf"), &ResultSet::default()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.trim(), "title,page_ref,category,name,value,year,type,scope,unit");
    }

    #[test]
    fn second_call_is_a_hit_without_computing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Csv);
        let key = DocumentKey::from_filename("Acme Report.pdf");
        let calls = Cell::new(0);

        let first = store
            .get_or_compute(&key, false, || {
                calls.set(calls.get() + 1);
                Ok(sample(2))
            })
            .unwrap();
        let bytes_after_first = fs::read(store.result_path(&key)).unwrap();

        let second = store
            .get_or_compute(&key, false, || {
                calls.set(calls.get() + 1);
                Ok(sample(5))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(!first.is_hit());
        assert!(second.is_hit());
        assert_eq!(first.into_inner(), second.into_inner());
        assert_eq!(fs::read(store.result_path(&key)).unwrap(), bytes_after_first);
    }

    #[test]
    fn force_recomputes_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Json);
        let key = DocumentKey::for_company("Acme", 2024);
        store.get_or_compute(&key, false, || Ok(sample(1))).unwrap();
        let forced = store.get_or_compute(&key, true, || Ok(sample(2))).unwrap();
        assert!(!forced.is_hit());
        assert_eq!(store.load_rows(&key).unwrap().unwrap().len(), 4);
    }

    #[test]
    fn failed_compute_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Csv);
        let key = DocumentKey::from_filename("x.pdf");
        let err = store
            .get_or_compute(&key, false, || Err(EsgError::Auth("bad key".into())))
            .unwrap_err();
        assert!(matches!(err, EsgError::Auth(_)));
        assert!(!store.exists(&key));
    }

    #[test]
    fn finds_results_in_either_format() {
        let dir = TempDir::new().unwrap();
        let json_store = store(&dir, StoreFormat::Json);
        let key = DocumentKey::from_filename("legacy.pdf");
        json_store.save_result(&key, &sample(1)).unwrap();

        let csv_store = store(&dir, StoreFormat::Csv);
        assert!(csv_store.exists(&key));
        assert_eq!(csv_store.load_rows(&key).unwrap().unwrap().len(), 2);

        let listed = csv_store.list_results().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].format, StoreFormat::Json);
        assert_eq!(listed[0].rows, 2);
    }

    #[test]
    fn listing_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir, StoreFormat::Csv).list_results().unwrap().is_empty());
    }

    #[test]
    fn comparison_key_is_order_independent() {
        let a = DocumentKey::from_filename("b corp.csv");
        let b = DocumentKey::from_filename("a corp.csv");
        let k1 = ComparisonKey::new("Social", &[a.clone(), b.clone()]);
        let k2 = ComparisonKey::new("social", &[b, a]);
        assert_eq!(k1, k2);
        assert_eq!(k1.file_name(), "common_metrics_social_a_corp_b_corp.json");
    }

    #[test]
    fn comparison_cache_hits_after_first_compute() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Csv);
        let key = ComparisonKey::new(
            "Environmental",
            &[DocumentKey::from_filename("a.csv"), DocumentKey::from_filename("b.csv")],
        );
        let groups = vec![ComparisonGroup {
            common_metric: "GHG Emissions".into(),
            datasets: vec![vec![GroupEntry::new("GHG", "10 kt")], vec![GroupEntry::new("GHG total", "12 kt")]],
        }];
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(groups.clone())
        };
        let first = store.get_or_compare(&key, false, compute).unwrap();
        let second = store.get_or_compare(&key, false, || unreachable!()).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(second.is_hit());
        assert_eq!(first.into_inner(), second.into_inner());
    }

    #[test]
    fn comparison_export_pads_shorter_lists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, StoreFormat::Csv);
        let key = ComparisonKey::new(
            "energy",
            &[DocumentKey::from_filename("a.csv"), DocumentKey::from_filename("b.csv")],
        );
        let groups = vec![ComparisonGroup {
            common_metric: "Renewables".into(),
            datasets: vec![
                vec![GroupEntry::new("Solar", "12%"), GroupEntry::new("Wind", "8%")],
                vec![GroupEntry::new("Renewable share", "25%")],
            ],
        }];
        let path = store.export_comparison_csv(&key, &groups).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "common_metric,a metric,a value,b metric,b value");
        assert_eq!(lines[1], "Renewables,Solar,12%,Renewable share,25%");
        assert_eq!(lines[2], "Renewables,Wind,8%,,");
    }

    #[test]
    fn upload_keeps_only_file_name() {
        let dir = TempDir::new().unwrap();
        let path = save_upload(dir.path(), "../../etc/report.pdf", b"%PDF").unwrap();
        assert_eq!(path, dir.path().join("report.pdf"));
    }
}
