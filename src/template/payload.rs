//! Provider-shaped template payload produced by the resolver.

use serde::{Deserialize, Serialize};

use super::ButtonKind;

/// A bound template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Parameter {
    Text { text: String },
}

impl Parameter {
    pub fn text(value: impl Into<String>) -> Self {
        Parameter::Text { text: value.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Parameter::Text { text } => text,
        }
    }
}

/// A template segment with its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Header {
        parameters: Vec<Parameter>,
    },
    Body {
        parameters: Vec<Parameter>,
    },
    Button {
        sub_type: ButtonKind,
        #[serde(with = "index_as_string")]
        index: u32,
        parameters: Vec<Parameter>,
    },
}

impl Component {
    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Component::Header { parameters }
            | Component::Body { parameters }
            | Component::Button { parameters, .. } => parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDescriptor {
    pub code: String,
}

/// Fully bound template message, ready to hand to the provider.
///
/// `components` is omitted entirely when no segment has parameters; some
/// providers reject an empty component array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltPayload {
    pub name: String,
    pub language: LanguageDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
}

impl BuiltPayload {
    pub fn header(&self) -> Option<&Component> {
        self.find(|c| matches!(c, Component::Header { .. }))
    }

    pub fn body(&self) -> Option<&Component> {
        self.find(|c| matches!(c, Component::Body { .. }))
    }

    fn find(&self, predicate: impl Fn(&Component) -> bool) -> Option<&Component> {
        self.components.as_ref()?.iter().find(|c| predicate(c))
    }
}

/// Providers expect button indexes as strings.
mod index_as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(index)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
