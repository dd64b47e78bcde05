//! # Erros — Taxonomia de Falhas da Extração
//!
//! Todas as operações do domínio retornam [`Result<T>`] com um [`EsgError`].
//! As variantes seguem a política de propagação do pipeline:
//!
//! | Variante | Gravidade | Política |
//! |----------|-----------|----------|
//! | `Config` | fatal | aborta a operação inteira, mensagem exibida como está |
//! | `Auth` | fatal | credencial rejeitada, nunca repetida |
//! | `Io` / `Pdf` | fatal por documento | não afeta outros documentos |
//! | `Transient` | recuperável | cooldown, descarta só o batch atual |
//! | `Parse` | recuperável no batch | batch conta como zero métricas; aborta comparação |
//! | `InsufficientInput` | reportado | nada é computado nem gravado no cache |
//!
//! Falhas de validação de métricas **não** são erros: são filtradas em silêncio
//! por [`crate::validator`].

use std::path::PathBuf;

use thiserror::Error;

/// Atalho para resultados do domínio.
pub type Result<T> = std::result::Result<T, EsgError>;

/// Erro do pipeline de extração e comparação de métricas ESG.
#[derive(Debug, Error)]
pub enum EsgError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read PDF '{document}': {reason}")]
    Pdf { document: String, reason: String },

    #[error("LLM service rejected the credential: {0}")]
    Auth(String),

    #[error("LLM call failed, retry later: {0}")]
    Transient(String),

    #[error("LLM output could not be parsed: {0}")]
    Parse(String),

    #[error("insufficient input for comparison: {0}")]
    InsufficientInput(String),

    #[error("CSV error in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EsgError {
    /// Constrói um `Io` anexando o caminho envolvido.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EsgError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` quando o erro deve abortar a execução do documento inteiro.
    ///
    /// `Transient` e `Parse` são tratados por batch pelo pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EsgError::Transient(_) | EsgError::Parse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_level_errors_are_not_fatal() {
        assert!(!EsgError::Transient("429".into()).is_fatal());
        assert!(!EsgError::Parse("bad json".into()).is_fatal());
    }

    #[test]
    fn config_and_auth_are_fatal() {
        assert!(EsgError::Config("missing key".into()).is_fatal());
        assert!(EsgError::Auth("401".into()).is_fatal());
        assert!(EsgError::InsufficientInput("one set".into()).is_fatal());
    }

    #[test]
    fn io_message_includes_path() {
        let err = EsgError::io(
            "data/x.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("data/x.csv"));
    }
}
