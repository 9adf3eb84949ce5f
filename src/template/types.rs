//! Template definition types as stored in per-language definition files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Kind of button a parameterised button segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    QuickReply,
    Url,
}

/// Parameter binding for a single template button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonParameters {
    /// Position of the button within the approved template
    pub index: u32,

    #[serde(rename = "type")]
    pub kind: ButtonKind,

    /// Variable names bound positionally into the button
    #[serde(rename = "parameters", default)]
    pub parameter_order: Vec<String>,
}

/// One provider-approved template, as registered with the vendor.
///
/// Parameter orders list variable names; the resolver binds caller values
/// into these positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    /// Vendor-assigned template name
    #[serde(rename = "metaTemplateName")]
    pub provider_template_name: String,

    pub language_code: String,

    #[serde(rename = "parameterOrder", default)]
    pub body_parameter_order: Vec<String>,

    #[serde(
        rename = "headerParameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub header_parameter_order: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_parameters: Option<Vec<ButtonParameters>>,
}

/// All template definitions for one language, keyed by internal template id.
///
/// Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateTable {
    templates: HashMap<String, TemplateDefinition>,
}

impl TemplateTable {
    pub fn new(templates: HashMap<String, TemplateDefinition>) -> Self {
        Self { templates }
    }

    pub fn get(&self, template_id: &str) -> Option<&TemplateDefinition> {
        self.templates.get(template_id)
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl FromIterator<(String, TemplateDefinition)> for TemplateTable {
    fn from_iter<I: IntoIterator<Item = (String, TemplateDefinition)>>(iter: I) -> Self {
        Self {
            templates: iter.into_iter().collect(),
        }
    }
}

/// A caller-supplied variable value.
///
/// Numbers are bound using their decimal string form; floats without a
/// fractional part are written as integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Number(serde_json::Number),
}

impl VariableValue {
    pub fn to_text(&self) -> String {
        match self {
            VariableValue::Text(s) => s.clone(),
            VariableValue::Number(n) => match n.as_f64() {
                // 1.0 binds as "1"
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => {
                    if f == 0.0 {
                        "0".to_string()
                    } else {
                        format!("{:.0}", f)
                    }
                }
                _ => n.to_string(),
            },
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::Text(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Number(value.into())
    }
}

impl From<u64> for VariableValue {
    fn from(value: u64) -> Self {
        VariableValue::Number(value.into())
    }
}

/// Named variables supplied to a resolution call.
pub type Variables = HashMap<String, VariableValue>;
