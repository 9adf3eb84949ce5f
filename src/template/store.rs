//! Per-language template table cache with default-language fallback.

use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;

use crate::metrics::TemplateMetrics;

use super::{TemplateError, TemplateResult, TemplateSource, TemplateTable};

/// Table returned by [`TemplateStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Arc<TemplateTable>,
    /// The requested language failed to load and the default language's
    /// table was returned instead
    pub is_fallback: bool,
}

impl Deref for LoadedTable {
    type Target = TemplateTable;

    fn deref(&self) -> &TemplateTable {
        &self.table
    }
}

/// Loads and caches template tables, one per language.
///
/// Tables are cached whole behind an `Arc`, so concurrent readers always see
/// a complete table. Concurrent first loads of the same language may both
/// hit the source; the last insert wins, which is harmless because the
/// source is re-readable.
///
/// Failed loads are not cached. A language whose definitions are broken is
/// re-read on every request until it loads successfully.
pub struct TemplateStore {
    source: Arc<dyn TemplateSource>,
    default_language: String,
    tables: DashMap<String, Arc<TemplateTable>>,
}

impl TemplateStore {
    pub fn new(source: Arc<dyn TemplateSource>, default_language: impl Into<String>) -> Self {
        Self {
            source,
            default_language: default_language.into(),
            tables: DashMap::new(),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn is_default_language(&self, language: &str) -> bool {
        language == self.default_language
    }

    /// Get the table for `language`.
    ///
    /// If the language cannot be loaded and is not the default language, the
    /// default language's table is returned instead. Only a failure to load
    /// the default language is an error.
    pub async fn load(&self, language: &str) -> TemplateResult<LoadedTable> {
        match self.load_exact(language).await {
            Ok(table) => Ok(LoadedTable {
                table,
                is_fallback: false,
            }),
            Err(err) if !self.is_default_language(language) => {
                TemplateMetrics::record_load("fallback");
                tracing::warn!(
                    language = %language,
                    default_language = %self.default_language,
                    error = %err,
                    "Template definitions unavailable, falling back to default language"
                );
                // One step only: the default language has no further fallback
                let table = self.load_exact(&self.default_language).await?;
                Ok(LoadedTable {
                    table,
                    is_fallback: true,
                })
            }
            Err(err) => {
                tracing::error!(
                    language = %language,
                    source = %self.source.describe(),
                    error = %err,
                    "Failed to load default language template definitions"
                );
                Err(err)
            }
        }
    }

    /// Load the default language eagerly.
    pub async fn warm(&self) -> TemplateResult<Arc<TemplateTable>> {
        self.load_exact(&self.default_language).await
    }

    /// Languages currently held in the cache, sorted
    pub fn cached_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        languages.sort();
        languages
    }

    /// Number of templates cached for a language, if loaded
    pub fn template_count(&self, language: &str) -> Option<usize> {
        self.tables.get(language).map(|t| t.len())
    }

    async fn load_exact(&self, language: &str) -> TemplateResult<Arc<TemplateTable>> {
        if let Some(table) = self.cached(language) {
            TemplateMetrics::record_load("hit");
            return Ok(table);
        }

        let table = match self.source.read_table(language).await {
            Ok(table) => Arc::new(table),
            Err(source) => {
                TemplateMetrics::record_load("error");
                return Err(TemplateError::LoadFailed {
                    language: language.to_string(),
                    source,
                });
            }
        };

        self.tables.insert(language.to_string(), Arc::clone(&table));
        TemplateMetrics::record_load("loaded");

        tracing::info!(
            language = %language,
            templates = table.len(),
            "Template definitions loaded"
        );

        Ok(table)
    }

    fn cached(&self, language: &str) -> Option<Arc<TemplateTable>> {
        // Clone out so no shard guard is held across an await
        self.tables.get(language).map(|entry| Arc::clone(entry.value()))
    }
}
