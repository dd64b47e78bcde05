//! # Segmentação de PDF — Do Documento aos Batches de Páginas
//!
//! Um relatório de sustentabilidade tem facilmente 100+ páginas. Mandar tudo
//! em uma única chamada estoura contexto e limites de tamanho da API, e mandar
//! uma página por chamada desperdiça cota. Este módulo divide o documento em
//! [`Part`]s contíguas de `pages_per_part` páginas.
//!
//! ## Pipeline
//!
//! ```text
//! PDF (bytes)
//!   ├── 1. Extrair texto por página → pdf_extract
//!   ├── 2. Normalizar Unicode (NFC) → normalize_pdf_text()
//!   ├── 3. Segmentar em Parts → segment()
//!   └── 4. Montar texto do batch → batch_text()
//!          └── páginas com < min_page_chars são puladas;
//!              batch vazio não gera chamada
//! ```
//!
//! ## Exemplo
//!
//! ```text
//! 23 páginas, pages_per_part = 10
//! → Part 1: páginas 1-10
//! → Part 2: páginas 11-20
//! → Part 3: páginas 21-23
//! ```

use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::error::{EsgError, Result};

/// Normaliza texto extraído de PDF para NFC.
///
/// Caracteres como "é" podem vir decompostos ("e" + acento combinante)
/// dependendo do PDF; NFC garante uma representação única.
pub fn normalize_pdf_text(text: &str) -> String {
    text.nfc().collect()
}

/// Documento carregado, com o texto de cada página.
///
/// Páginas sem texto extraível continuam presentes (string vazia), para
/// que a numeração de páginas bata com o original.
#[derive(Clone, Debug)]
pub struct PdfDocument {
    name: String,
    pages: Vec<String>,
}

impl PdfDocument {
    /// Abre um PDF do disco.
    ///
    /// # Erros
    ///
    /// `EsgError::Io` se o arquivo não puder ser lido, `EsgError::Pdf` se o
    /// conteúdo não for um PDF legível.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| EsgError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, &bytes)
    }

    /// Extrai o texto página a página de um PDF em memória.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
            EsgError::Pdf {
                document: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let pages: Vec<String> = pages.iter().map(|p| normalize_pdf_text(p)).collect();
        tracing::debug!(document = %name, pages = pages.len(), "Texto extraído por página");
        Ok(Self { name, pages })
    }

    /// Documento a partir de textos já extraídos (uma string por página).
    pub fn from_pages(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Texto da página `number` (1-indexed).
    pub fn page(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(String::as_str)
    }
}

/// Faixa contígua de páginas enviada como uma unidade ao LLM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Part {
    /// Número do batch (1-indexed).
    pub index: usize,
    /// Primeira página (1-indexed, inclusiva).
    pub start_page: usize,
    /// Última página (inclusiva).
    pub end_page: usize,
}

impl Part {
    /// Uma única parte cobrindo o documento inteiro.
    pub fn whole(page_count: usize) -> Self {
        Self {
            index: 1,
            start_page: 1,
            end_page: page_count,
        }
    }

    pub fn len(&self) -> usize {
        self.end_page + 1 - self.start_page
    }

    /// Referência padrão de páginas para seções sem `page_ref`.
    pub fn page_ref(&self) -> String {
        format!("Pages {}-{}", self.start_page, self.end_page)
    }
}

/// Divide `doc` em partes de `pages_per_part` páginas (a última pode ser menor).
///
/// # Erros
///
/// `EsgError::Config` se `pages_per_part < 1`.
pub fn segment(doc: &PdfDocument, pages_per_part: usize) -> Result<Vec<Part>> {
    segment_pages(doc.page_count(), pages_per_part)
}

/// Como [`segment()`], a partir só do número de páginas.
pub fn segment_pages(page_count: usize, pages_per_part: usize) -> Result<Vec<Part>> {
    if pages_per_part < 1 {
        return Err(EsgError::Config(format!(
            "pages_per_part must be at least 1, got {}",
            pages_per_part
        )));
    }
    Ok((0..page_count)
        .step_by(pages_per_part)
        .enumerate()
        .map(|(i, start)| Part {
            index: i + 1,
            start_page: start + 1,
            end_page: (start + pages_per_part).min(page_count),
        })
        .collect())
}

/// Texto montado para uma chamada de extração.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchText {
    pub text: String,
    /// Páginas que de fato entraram no texto.
    pub pages_used: usize,
}

/// Monta o texto de uma parte, pulando páginas com menos de `min_page_chars`
/// caracteres (após trim). Retorna `None` se nenhuma página sobrar.
///
/// Cada página entra como `=== Page N ===` seguida do seu texto.
pub fn batch_text(doc: &PdfDocument, part: &Part, min_page_chars: usize) -> Option<BatchText> {
    let framed: Vec<String> = (part.start_page..=part.end_page)
        .filter_map(|n| {
            let text = doc.page(n)?;
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.chars().count() < min_page_chars {
                return None;
            }
            Some(format!("=== Page {} ===\n{}\n", n, text))
        })
        .collect();

    if framed.is_empty() {
        return None;
    }
    Some(BatchText {
        pages_used: framed.len(),
        text: framed.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pages: &[&str]) -> PdfDocument {
        PdfDocument::from_pages("test.pdf", pages.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn parts_cover_all_pages_without_overlap() {
        for page_count in 0..40 {
            for per_part in 1..12 {
                let parts = segment_pages(page_count, per_part).unwrap();
                let mut next = 1;
                for (i, part) in parts.iter().enumerate() {
                    assert_eq!(part.index, i + 1);
                    assert_eq!(part.start_page, next);
                    assert!(part.end_page >= part.start_page);
                    if i + 1 < parts.len() {
                        assert_eq!(part.len(), per_part);
                    } else {
                        assert!(part.len() <= per_part);
                    }
                    next = part.end_page + 1;
                }
                assert_eq!(next, page_count + 1);
            }
        }
    }

    #[test]
    fn last_part_may_be_shorter() {
        let parts = segment_pages(23, 10).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], Part { index: 3, start_page: 21, end_page: 23 });
        assert_eq!(parts[2].page_ref(), "Pages 21-23");
    }

    #[test]
    fn zero_pages_per_part_is_config_error() {
        assert!(matches!(segment_pages(5, 0), Err(EsgError::Config(_))));
    }

    #[test]
    fn short_pages_are_skipped_in_batch_text() {
        let long = "x".repeat(120);
        let d = doc(&["", &long, "cover", &long]);
        let parts = segment(&d, 2).unwrap();

        let first = batch_text(&d, &parts[0], 100).unwrap();
        assert_eq!(first.pages_used, 1);
        assert!(first.text.starts_with("=== Page 2 ==="));

        let second = batch_text(&d, &parts[1], 100).unwrap();
        assert!(second.text.contains("=== Page 4 ==="));
        assert!(!second.text.contains("cover"));
    }

    #[test]
    fn empty_batch_yields_none() {
        let d = doc(&["  ", "short"]);
        let parts = segment(&d, 5).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(batch_text(&d, &parts[0], 100).is_none());
    }

    #[test]
    fn nfc_recomposes_accents() {
        assert_eq!(normalize_pdf_text("e\u{0301}missions"), "\u{00e9}missions");
    }

    #[test]
    fn unreadable_bytes_are_pdf_error() {
        let err = PdfDocument::from_bytes("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, EsgError::Pdf { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PdfDocument::open(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, EsgError::Io { .. }));
    }
}
