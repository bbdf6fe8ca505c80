use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, RegistryError};
use crate::interface::manifest::{InterfaceId, InterfaceManifest};

/// Option values for one mounted interface, checked against its declared
/// option fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
    values: HashMap<String, toml::Value>,
}

impl ResolvedOptions {
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(toml::Value::as_integer)
    }

    pub fn string(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(toml::Value::as_str)
    }

    pub fn boolean(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(toml::Value::as_bool)
    }
}

#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    interfaces: HashMap<InterfaceId, InterfaceManifest>,
}

impl ExtensionRegistry {
    /// Registry holding the interfaces this crate ships.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        registry.register(InterfaceManifest::autosave())?;
        Ok(registry)
    }

    pub fn register(&mut self, manifest: InterfaceManifest) -> Result<&InterfaceManifest, RegistryError> {
        manifest
            .validate()
            .map_err(|reason| RegistryError::InvalidManifest {
                id: manifest.id.to_string(),
                reason,
            })?;

        if self.interfaces.contains_key(&manifest.id) {
            return Err(RegistryError::DuplicateInterface(manifest.id.to_string()));
        }

        tracing::debug!(id = %manifest.id, "interface registered");
        let id = manifest.id.clone();
        Ok(&*self.interfaces.entry(id).or_insert(manifest))
    }

    /// Register the manifest stored in `interface.toml` under `root_dir`.
    pub fn register_from_dir(&mut self, root_dir: &Path) -> Result<&InterfaceManifest, RegistryError> {
        let manifest_path = root_dir.join("interface.toml");
        let raw = fs::read_to_string(&manifest_path).map_err(|source| ConfigError::Read {
            path: manifest_path.clone(),
            source,
        })?;

        let manifest =
            InterfaceManifest::from_toml_str(&raw, &manifest_path.display().to_string())?;
        self.register(manifest)
    }

    pub fn get(&self, id: &str) -> Option<&InterfaceManifest> {
        self.interfaces.get(&InterfaceId::new(id))
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Check host-supplied option values against the interface's declared
    /// fields. Unknown keys are dropped; a value of the wrong type is an
    /// invalid configuration.
    pub fn resolve_options(
        &self,
        id: &str,
        values: &HashMap<String, toml::Value>,
    ) -> Result<ResolvedOptions, RegistryError> {
        let manifest = self
            .get(id)
            .ok_or_else(|| RegistryError::UnknownInterface(id.to_string()))?;

        let mut resolved = ResolvedOptions::default();
        for (key, value) in values {
            let Some(field) = manifest.option(key) else {
                tracing::warn!(interface = id, option = %key, "ignoring undeclared option");
                continue;
            };

            if !field.kind.accepts(value) {
                return Err(ConfigError::invalid(
                    key.clone(),
                    format!("expected {}, got {}", field.kind.label(), value.type_str()),
                )
                .into());
            }

            resolved.values.insert(key.clone(), value.clone());
        }

        Ok(resolved)
    }

    pub fn summary_notification(&self) -> String {
        format!("interfaces: {} registered", self.interface_count())
    }

    pub fn list_notifications(&self) -> Vec<String> {
        if self.interfaces.is_empty() {
            return vec!["interfaces: none registered".to_string()];
        }

        let mut rows: Vec<String> = self
            .interfaces
            .values()
            .map(|manifest| {
                let options: Vec<&str> = manifest
                    .options
                    .iter()
                    .map(|option| option.field.as_str())
                    .collect();
                format!(
                    "interface {} [{}] group={} options=[{}]",
                    manifest.id,
                    manifest.name,
                    manifest.group.as_deref().unwrap_or("-"),
                    options.join(", ")
                )
            })
            .collect();

        rows.sort();
        rows
    }
}
