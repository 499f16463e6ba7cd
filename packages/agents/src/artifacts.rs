//! Filesystem artifact store.
//!
//! Every save writes a new version: `report.md` becomes `report_v1.md`,
//! then `report_v2.md`, and so on. Nothing is overwritten.

use std::path::{Path, PathBuf};

use resonance_agents_models::ArtifactInfo;

use crate::AgentError;

/// Directory used when `ARTIFACTS_DIR` is unset.
pub const DEFAULT_ARTIFACTS_DIR: &str = "data/artifacts";

/// Versioned file storage for generated reports, images and packages.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store from `ARTIFACTS_DIR`, defaulting to
    /// [`DEFAULT_ARTIFACTS_DIR`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("ARTIFACTS_DIR").unwrap_or_else(|_| DEFAULT_ARTIFACTS_DIR.to_string()),
        )
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves `bytes` as the next version of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidInput`] for an empty name, or an I/O
    /// error if the file cannot be written.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<ArtifactInfo, AgentError> {
        let name = sanitize(name);
        if name.is_empty() {
            return Err(AgentError::InvalidInput {
                message: "artifact name is empty".to_string(),
            });
        }

        std::fs::create_dir_all(&self.root)?;

        let version = self
            .list()?
            .iter()
            .filter(|a| a.name == name)
            .map(|a| a.version)
            .max()
            .unwrap_or(0)
            + 1;
        let filename = versioned_filename(&name, version);
        std::fs::write(self.root.join(&filename), bytes)?;

        log::info!("Saved artifact {filename} ({} bytes)", bytes.len());

        Ok(ArtifactInfo {
            filename,
            name,
            version,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Lists every artifact, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ArtifactInfo>, AgentError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(ToString::to_string) else {
                continue;
            };
            if let Some((name, version)) = parse_versioned_filename(&filename) {
                artifacts.push(ArtifactInfo {
                    filename,
                    name,
                    version,
                    size_bytes: metadata.len(),
                });
            }
        }
        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(artifacts)
    }

    /// Latest version of `name`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list`].
    pub fn latest(&self, name: &str) -> Result<Option<ArtifactInfo>, AgentError> {
        let name = sanitize(name);
        Ok(self
            .list()?
            .into_iter()
            .filter(|a| a.name == name)
            .max_by_key(|a| a.version))
    }

    /// Reads an artifact by its versioned file name.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidInput`] if `filename` is not a plain
    /// file name, or an I/O error if it cannot be read.
    pub fn load(&self, filename: &str) -> Result<Vec<u8>, AgentError> {
        if filename.is_empty() || sanitize(filename) != filename {
            return Err(AgentError::InvalidInput {
                message: format!("invalid artifact name: {filename}"),
            });
        }
        Ok(std::fs::read(self.root.join(filename))?)
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes
/// `_`. Leading dots are dropped.
fn sanitize(name: &str) -> String {
    name.trim()
        .trim_start_matches('.')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn versioned_filename(name: &str, version: u32) -> String {
    match split_extension(name) {
        (stem, Some(ext)) => format!("{stem}_v{version}.{ext}"),
        (stem, None) => format!("{stem}_v{version}"),
    }
}

/// Inverse of [`versioned_filename`].
fn parse_versioned_filename(filename: &str) -> Option<(String, u32)> {
    let (stem, ext) = split_extension(filename);
    let (base, version) = stem.rsplit_once("_v")?;
    let version: u32 = version.parse().ok()?;
    if base.is_empty() || version == 0 {
        return None;
    }
    Some(match ext {
        Some(ext) => (format!("{base}.{ext}"), version),
        None => (base.to_string(), version),
    })
}
