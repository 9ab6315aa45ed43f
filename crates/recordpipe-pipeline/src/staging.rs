//! Where record bodies wait between production and consumption.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

/// Errors raised by a [`Stage`].
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Identifier is empty, `.`/`..`, or contains a path separator or NUL.
    #[error("invalid staging identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("failed to create staging directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write staged artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read staged artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove staged artifact {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Nothing is staged under this identifier.
    #[error("no staged artifact named {0:?}")]
    Missing(String),
}

pub type Result<T> = std::result::Result<T, StagingError>;

/// Handle to one staged body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    identifier: String,
    path: Option<PathBuf>,
}

impl StagedArtifact {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Backing file, for stages that write to disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Storage for record bodies keyed by identifier.
///
/// Identifiers must be unique among artifacts staged at the same time;
/// staging twice under one identifier overwrites the first body.
pub trait Stage: Send + Sync {
    /// Store `bytes` under `identifier`.
    fn stage(&self, identifier: &str, bytes: &[u8]) -> Result<StagedArtifact>;

    /// Handle for an identifier staged elsewhere (e.g. by another thread).
    fn locate(&self, identifier: &str) -> Result<StagedArtifact>;

    /// Read a staged body back.
    fn load(&self, artifact: &StagedArtifact) -> Result<Vec<u8>>;

    /// Remove a staged body.
    fn unstage(&self, artifact: StagedArtifact) -> Result<()>;
}

fn validate_identifier(identifier: &str) -> Result<()> {
    let invalid = identifier.is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StagingError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// One file per identifier inside a single directory.
#[derive(Debug, Clone)]
pub struct DirectoryStage {
    root: PathBuf,
}

impl DirectoryStage {
    /// Use `root` as the staging directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StagingError::Prepare {
            path: root.clone(),
            source,
        })?;
        debug!(path = %root.display(), "staging directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact(&self, identifier: &str) -> Result<StagedArtifact> {
        validate_identifier(identifier)?;
        Ok(StagedArtifact {
            identifier: identifier.to_string(),
            path: Some(self.root.join(identifier)),
        })
    }

    fn path_of(&self, artifact: &StagedArtifact) -> PathBuf {
        artifact
            .path
            .clone()
            .unwrap_or_else(|| self.root.join(&artifact.identifier))
    }
}

impl Stage for DirectoryStage {
    fn stage(&self, identifier: &str, bytes: &[u8]) -> Result<StagedArtifact> {
        let artifact = self.artifact(identifier)?;
        let path = self.path_of(&artifact);
        fs::write(&path, bytes).map_err(|source| StagingError::Write { path, source })?;
        Ok(artifact)
    }

    fn locate(&self, identifier: &str) -> Result<StagedArtifact> {
        self.artifact(identifier)
    }

    fn load(&self, artifact: &StagedArtifact) -> Result<Vec<u8>> {
        let path = self.path_of(artifact);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StagingError::Missing(artifact.identifier.clone()),
            _ => StagingError::Read { path, source },
        })
    }

    fn unstage(&self, artifact: StagedArtifact) -> Result<()> {
        let path = self.path_of(&artifact);
        fs::remove_file(&path).map_err(|source| StagingError::Remove { path, source })
    }
}

/// In-memory stage, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStage {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies currently staged.
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Stage for MemoryStage {
    fn stage(&self, identifier: &str, bytes: &[u8]) -> Result<StagedArtifact> {
        let artifact = self.locate(identifier)?;
        self.artifacts
            .lock()
            .insert(identifier.to_string(), bytes.to_vec());
        Ok(artifact)
    }

    fn locate(&self, identifier: &str) -> Result<StagedArtifact> {
        validate_identifier(identifier)?;
        Ok(StagedArtifact {
            identifier: identifier.to_string(),
            path: None,
        })
    }

    fn load(&self, artifact: &StagedArtifact) -> Result<Vec<u8>> {
        self.artifacts
            .lock()
            .get(&artifact.identifier)
            .cloned()
            .ok_or_else(|| StagingError::Missing(artifact.identifier.clone()))
    }

    fn unstage(&self, artifact: StagedArtifact) -> Result<()> {
        match self.artifacts.lock().remove(&artifact.identifier) {
            Some(_) => Ok(()),
            None => Err(StagingError::Missing(artifact.identifier)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "recordpipe-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn directory_stage_roundtrip() {
        let dir = temp_dir("stage");
        let stage = DirectoryStage::new(&dir).expect("stage dir should be creatable");

        let artifact = stage.stage("student1.xml", b"<ITStudent/>").unwrap();
        assert_eq!(artifact.path(), Some(dir.join("student1.xml").as_path()));
        assert!(dir.join("student1.xml").exists());

        let located = stage.locate("student1.xml").unwrap();
        assert_eq!(stage.load(&located).unwrap(), b"<ITStudent/>");

        stage.unstage(located).unwrap();
        assert!(!dir.join("student1.xml").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_stage_rejects_path_like_identifiers() {
        let dir = temp_dir("reject");
        let stage = DirectoryStage::new(&dir).unwrap();

        for bad in ["", ".", "..", "../escape.xml", "nested/file.xml", "win\\file.xml"] {
            let err = stage.stage(bad, b"x").unwrap_err();
            assert!(
                matches!(err, StagingError::InvalidIdentifier(ref id) if id == bad),
                "{bad:?} should be rejected"
            );
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_stage_missing_artifact() {
        let dir = temp_dir("missing");
        let stage = DirectoryStage::new(&dir).unwrap();

        let artifact = stage.locate("student7.xml").unwrap();
        let err = stage.load(&artifact).unwrap_err();
        assert!(matches!(err, StagingError::Missing(_)));

        let err = stage.unstage(artifact).unwrap_err();
        assert!(matches!(err, StagingError::Remove { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn memory_stage_roundtrip() {
        let stage = MemoryStage::new();
        let artifact = stage.stage("a.xml", b"body").unwrap();
        assert_eq!(stage.len(), 1);
        assert_eq!(stage.load(&artifact).unwrap(), b"body");

        stage.unstage(artifact.clone()).unwrap();
        assert!(stage.is_empty());
        assert!(matches!(
            stage.unstage(artifact).unwrap_err(),
            StagingError::Missing(_)
        ));
    }
}
