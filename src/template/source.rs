//! Backing sources for per-language template tables.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::TemplateTable;

const MAX_LANGUAGE_CODE_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum TemplateSourceError {
    #[error("Invalid language code: {0:?}")]
    InvalidLanguage(String),

    #[error("No template definitions for language {0}")]
    Missing(String),

    #[error("Failed to read template definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse template definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where template tables come from.
///
/// Implementations must be safe to re-read: the store may call
/// `read_table` for the same language concurrently or repeatedly.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn read_table(&self, language: &str) -> Result<TemplateTable, TemplateSourceError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Reads `{dir}/{language}.json`.
pub struct FileTemplateSource {
    dir: PathBuf,
}

impl FileTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, language: &str) -> Result<PathBuf, TemplateSourceError> {
        validate_language(language)?;
        Ok(self.dir.join(format!("{}.json", language)))
    }
}

#[async_trait]
impl TemplateSource for FileTemplateSource {
    async fn read_table(&self, language: &str) -> Result<TemplateTable, TemplateSourceError> {
        let path = self.path_for(language)?;

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TemplateSourceError::Missing(language.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let table: TemplateTable = serde_json::from_slice(&raw)?;

        tracing::debug!(
            language = %language,
            path = %path.display(),
            templates = table.len(),
            "Read template definitions"
        );

        Ok(table)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Language codes become file names, so only a conservative alphabet is allowed.
fn validate_language(language: &str) -> Result<(), TemplateSourceError> {
    let valid = !language.is_empty()
        && language.len() <= MAX_LANGUAGE_CODE_LEN
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(TemplateSourceError::InvalidLanguage(language.to_string()))
    }
}
