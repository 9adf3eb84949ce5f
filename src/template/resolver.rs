//! Binds caller variables into provider template payloads.

use std::sync::Arc;

use crate::metrics::TemplateMetrics;

use super::{
    BuiltPayload, Component, LanguageDescriptor, Parameter, TemplateDefinition, TemplateError,
    TemplateResult, TemplateStore, Variables,
};

/// Resolves `(template_id, language, variables)` into a [`BuiltPayload`].
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<TemplateStore>,
}

impl TemplateResolver {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    /// Resolve a template, falling back to the default language when the
    /// requested language does not define `template_id`.
    #[tracing::instrument(name = "template.resolve", skip(self, variables))]
    pub async fn resolve(
        &self,
        template_id: &str,
        language: &str,
        variables: &Variables,
    ) -> TemplateResult<BuiltPayload> {
        let table = self.store.load(language).await?;

        let payload = match table.get(template_id) {
            Some(definition) => bind(template_id, definition, variables),
            // Already the default language's table
            None if table.is_fallback || self.store.is_default_language(language) => {
                return Err(not_found(template_id, language));
            }
            None => {
                let default_language = self.store.default_language();
                tracing::warn!(
                    template_id = %template_id,
                    language = %language,
                    default_language = %default_language,
                    "Template missing for language, using default language"
                );
                TemplateMetrics::record_language_fallback();

                let table = self.store.load(default_language).await?;
                let definition = table
                    .get(template_id)
                    .ok_or_else(|| not_found(template_id, language))?;
                bind(template_id, definition, variables)
            }
        };

        TemplateMetrics::record_resolved();
        Ok(payload)
    }
}

fn not_found(template_id: &str, language: &str) -> TemplateError {
    TemplateMetrics::record_not_found();
    TemplateError::NotFound {
        template_id: template_id.to_string(),
        language: language.to_string(),
    }
}

/// Build the payload for one definition.
///
/// Segment order is header, body, then buttons by ascending index.
/// Parameter order always follows the definition; unknown caller variables
/// are ignored and missing ones bind as empty strings.
pub fn bind(template_id: &str, definition: &TemplateDefinition, variables: &Variables) -> BuiltPayload {
    let mut components = Vec::new();

    if let Some(order) = definition.header_parameter_order.as_deref() {
        if !order.is_empty() {
            components.push(Component::Header {
                parameters: bind_parameters(template_id, order, variables),
            });
        }
    }

    if !definition.body_parameter_order.is_empty() {
        components.push(Component::Body {
            parameters: bind_parameters(template_id, &definition.body_parameter_order, variables),
        });
    }

    if let Some(buttons) = definition.button_parameters.as_ref() {
        let mut buttons: Vec<_> = buttons
            .iter()
            .filter(|b| !b.parameter_order.is_empty())
            .collect();
        buttons.sort_by_key(|b| b.index);

        for button in buttons {
            components.push(Component::Button {
                sub_type: button.kind,
                index: button.index,
                parameters: bind_parameters(template_id, &button.parameter_order, variables),
            });
        }
    }

    BuiltPayload {
        name: definition.provider_template_name.clone(),
        language: LanguageDescriptor {
            code: definition.language_code.clone(),
        },
        components: if components.is_empty() {
            None
        } else {
            Some(components)
        },
    }
}

fn bind_parameters(template_id: &str, order: &[String], variables: &Variables) -> Vec<Parameter> {
    order
        .iter()
        .map(|name| match variables.get(name) {
            Some(value) => Parameter::text(value.to_text()),
            None => {
                tracing::debug!(
                    template_id = %template_id,
                    variable = %name,
                    "Template variable missing, binding empty string"
                );
                Parameter::text("")
            }
        })
        .collect()
}
