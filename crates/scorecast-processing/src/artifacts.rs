//! Artifact persistence.
//!
//! Fitted preprocessors and trained models are written as JSON envelopes
//! tagged with their kind and format version. Every write goes to a sibling
//! temporary file first and is renamed over the target only once the payload
//! has been fully written, so a failed run never leaves a truncated artifact
//! behind.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Current envelope format version.
pub const FORMAT_VERSION: u32 = 1;

/// What an artifact file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Preprocessor,
    Model,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Preprocessor => "preprocessor",
            ArtifactKind::Model => "model",
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: ArtifactKind,
    format_version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    kind: ArtifactKind,
    format_version: u32,
    payload: T,
}

/// Serialize `value` into an artifact file at `path`.
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, kind: ArtifactKind, value: &T) -> Result<()> {
    let path = path.as_ref();
    let bytes = serde_json::to_vec_pretty(&EnvelopeRef {
        kind,
        format_version: FORMAT_VERSION,
        payload: value,
    })?;

    write_atomic(path, |writer| {
        writer.write_all(&bytes)?;
        writer.write_all(b"\n")?;
        Ok(())
    })?;

    debug!("Wrote {} artifact to {}", kind.as_str(), path.display());
    Ok(())
}

/// Load an artifact file written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>, kind: ArtifactKind) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::ArtifactNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read(path)?;
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(&content).map_err(|e| PipelineError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if envelope.kind != kind {
        return Err(PipelineError::Artifact {
            path: path.display().to_string(),
            reason: format!(
                "expected a {} artifact, found a {} artifact",
                kind.as_str(),
                envelope.kind.as_str()
            ),
        });
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(PipelineError::Artifact {
            path: path.display().to_string(),
            reason: format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                envelope.format_version
            ),
        });
    }

    serde_json::from_value(envelope.payload).map_err(|e| PipelineError::Artifact {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Write a file through a temporary sibling and rename it into place.
///
/// Parent directories are created as needed. If `write` fails the target is
/// left untouched and the temporary file is removed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    let result = File::create(&tmp_path)
        .map_err(PipelineError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&tmp_path, path).map_err(PipelineError::from));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A directory holding the artifacts of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a file name inside the store.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Save `value` under `name`, returning the written path.
    pub fn save<T: Serialize>(&self, name: impl AsRef<Path>, kind: ArtifactKind, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        save_object(&path, kind, value)?;
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: impl AsRef<Path>, kind: ArtifactKind) -> Result<T> {
        load_object(self.path(name), kind)
    }
}
