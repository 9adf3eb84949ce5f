//! Provider template resolution.
//!
//! This module provides:
//! - Template definitions loaded per language from a [`TemplateSource`]
//! - [`TemplateStore`], a per-language cache with default-language fallback
//! - [`TemplateResolver`], which binds named variables into ordered,
//!   provider-shaped [`BuiltPayload`]s
//!
//! # Example
//!
//! ```ignore
//! let source = Arc::new(FileTemplateSource::new("templates"));
//! let store = Arc::new(TemplateStore::new(source, "en"));
//! let resolver = TemplateResolver::new(store);
//!
//! let mut variables = Variables::new();
//! variables.insert("code".into(), "123456".into());
//!
//! let payload = resolver.resolve("verification_code", "pt_BR", &variables).await?;
//! ```

mod payload;
mod resolver;
mod source;
mod store;
mod types;

use thiserror::Error;

pub use payload::{BuiltPayload, Component, LanguageDescriptor, Parameter};
pub use resolver::{bind, TemplateResolver};
pub use source::{FileTemplateSource, TemplateSource, TemplateSourceError};
pub use store::{LoadedTable, TemplateStore};
pub use types::{
    ButtonKind, ButtonParameters, TemplateDefinition, TemplateTable, VariableValue, Variables,
};

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The default language's definitions could not be loaded
    #[error("Failed to load templates for language {language}: {source}")]
    LoadFailed {
        language: String,
        #[source]
        source: TemplateSourceError,
    },

    /// Neither the requested nor the default language defines the template
    #[error("Template {template_id} not found for language {language}")]
    NotFound {
        template_id: String,
        language: String,
    },
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;
