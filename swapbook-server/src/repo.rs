//! On-disk node state: the data directory and the identity key.

use std::path::{Path, PathBuf};
use swapbook_sdk::{Keypair, SignatureError, Signer};
use thiserror::Error;

/// File holding the node's Ed25519 key as PKCS#8.
pub const KEY_FILE_NAME: &str = "priv.key";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("cannot determine a home directory")]
    NoHomeDirectory,
    #[error("data directory io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid identity key at {path}: {source}")]
    InvalidKey {
        path: PathBuf,
        #[source]
        source: SignatureError,
    },
    #[error("failed to generate identity key: {0}")]
    KeyGeneration(#[source] SignatureError),
}

/// Platform default for the data directory.
///
/// `~/Library/Application Support/atomicswaps` on macOS, `~/.atomicswaps`
/// on Linux and `~/atomicswaps` elsewhere.
pub fn default_data_dir() -> Result<PathBuf, RepoError> {
    let home = dirs::home_dir().ok_or(RepoError::NoHomeDirectory)?;
    Ok(if cfg!(target_os = "macos") {
        home.join("Library")
            .join("Application Support")
            .join("atomicswaps")
    } else if cfg!(target_os = "linux") {
        home.join(".atomicswaps")
    } else {
        home.join("atomicswaps")
    })
}

/// An opened data directory.
#[derive(Debug, Clone)]
pub struct Repo {
    path: PathBuf,
}

impl Repo {
    /// Open `path`, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path).map_err(|source| RepoError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_path(&self) -> PathBuf {
        self.path.join(KEY_FILE_NAME)
    }

    /// Load the identity key, generating and persisting one on first start.
    pub fn load_or_create_key(&self) -> Result<Keypair, RepoError> {
        let path = self.key_path();
        match std::fs::read(&path) {
            Ok(bytes) => {
                let keypair = Keypair::from_pkcs8(&bytes).map_err(|source| {
                    RepoError::InvalidKey {
                        path: path.clone(),
                        source,
                    }
                })?;
                tracing::info!(peer = %keypair.peer_id(), "Loaded identity key");
                Ok(keypair)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let keypair = Keypair::generate().map_err(RepoError::KeyGeneration)?;
                write_private(&path, keypair.pkcs8()).map_err(|source| RepoError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(peer = %keypair.peer_id(), path = %path.display(), "Generated new identity key");
                Ok(keypair)
            }
            Err(source) => Err(RepoError::Io { path, source }),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}
