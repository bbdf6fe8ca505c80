use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::autosave::config::FREQUENCY_FIELD;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub String);

impl InterfaceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declarative description of an interface extension, as handed to the
/// host's extension registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceManifest {
    pub id: InterfaceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the component the host mounts for this interface.
    pub component: String,
    #[serde(default)]
    pub hide_label: bool,
    #[serde(default)]
    pub hide_loader: bool,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub local_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionField {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub name: String,
    #[serde(default)]
    pub meta: FieldMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    String,
    Boolean,
}

impl FieldType {
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
        }
    }

    pub fn accepts(&self, value: &toml::Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Integer, toml::Value::Integer(_))
                | (FieldType::String, toml::Value::String(_))
                | (FieldType::Boolean, toml::Value::Boolean(_))
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<FieldWidth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldWidth {
    Half,
    Full,
    Fill,
}

impl InterfaceManifest {
    /// The autosave interface: a label-less presentation field whose only
    /// option is the save frequency.
    pub fn autosave() -> Self {
        Self {
            id: InterfaceId::new("autosave"),
            name: "Autosave".to_string(),
            icon: Some("save".to_string()),
            description: Some(
                "Attempt to automatically save changes to an item in near-realtime.".to_string(),
            ),
            component: "autosave".to_string(),
            hide_label: true,
            hide_loader: true,
            types: vec!["alias".to_string()],
            local_types: vec!["presentation".to_string()],
            group: Some("presentation".to_string()),
            options: vec![OptionField {
                field: FREQUENCY_FIELD.to_string(),
                kind: FieldType::Integer,
                name: "Autosave Frequency".to_string(),
                meta: FieldMeta {
                    width: Some(FieldWidth::Half),
                    interface: Some("input".to_string()),
                    note: Some("Frequency to save changes in milliseconds".to_string()),
                },
            }],
        }
    }

    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn option(&self, field: &str) -> Option<&OptionField> {
        self.options.iter().find(|option| option.field == field)
    }

    /// Structural checks the registry runs before accepting a manifest.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.component.trim().is_empty() {
            return Err("component must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if option.field.trim().is_empty() {
                return Err("option field names must not be empty".to_string());
            }
            if !seen.insert(option.field.as_str()) {
                return Err(format!("duplicate option field: {}", option.field));
            }
        }

        if let Some(group) = &self.group
            && !self.local_types.is_empty()
            && !self.local_types.contains(group)
        {
            return Err(format!(
                "group {group} is not one of the local types ({})",
                self.local_types.join(", ")
            ));
        }

        Ok(())
    }
}
