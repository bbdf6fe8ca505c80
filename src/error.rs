use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a save target. Never escapes the component; it becomes
/// [`SaveStatus::Failed`](crate::autosave::SaveStatus::Failed).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("save failed: {cause}")]
pub struct SaveError {
    cause: String,
}

impl SaveError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot determine home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("interface already registered: {0}")]
    DuplicateInterface(String),

    #[error("unknown interface: {0}")]
    UnknownInterface(String),

    #[error("manifest {id}: {reason}")]
    InvalidManifest { id: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
