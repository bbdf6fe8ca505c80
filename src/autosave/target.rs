use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ropey::Rope;

use crate::error::SaveError;

/// Persistence collaborator the autosave component hands snapshots to.
///
/// Called on a worker thread, never on the host event loop. Implementations
/// own their own timeouts.
pub trait SaveTarget<S>: Send + Sync + 'static {
    fn save(&self, state: &S) -> Result<(), SaveError>;
}

/// Writes rope snapshots to a file through a temporary sibling and a rename,
/// so readers never observe a half-written item.
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling the snapshot is written to before the rename. The item's full
    /// file name is kept so items differing only by extension never share it.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("item"));
        name.push(".autosave-tmp");
        self.path.with_file_name(name)
    }

    /// Read the item back, or `None` if it has never been saved.
    pub fn load(&self) -> Result<Option<Rope>, SaveError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(Rope::from_str(&text)))
    }
}

impl SaveTarget<Rope> for FileTarget {
    fn save(&self, rope: &Rope) -> Result<(), SaveError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let written = write_rope(&tmp, rope).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&tmp)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                tracing::warn!("failed to remove {}: {cleanup}", tmp.display());
            }
            return Err(SaveError::new(format!("{}: {err}", self.path.display())));
        }
        Ok(())
    }
}

fn write_rope(path: &Path, rope: &Rope) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for chunk in rope.chunks() {
        writer.write_all(chunk.as_bytes())?;
    }
    writer.flush()
}
