use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::{AppError, ErrorKind};

pub const MAX_VALUE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("storage I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl KvError {
    fn io(path: &Path, e: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::new(ErrorKind::Unknown, "Could not access saved sign-in data")
            .with_internal(e.to_string())
    }
}

/// Persistent slot for one opaque string that survives restarts.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Result<Option<SecretString>, KvError>;
    async fn set(&self, value: SecretString) -> Result<(), KvError>;
    async fn clear(&self) -> Result<(), KvError>;
}

fn check_size(value: &SecretString) -> Result<(), KvError> {
    let size = value.expose_secret().len();
    if size > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size,
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

/// Process-lifetime store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(value.into())),
        }
    }

    /// Raw stored value, for inspection.
    #[must_use]
    pub fn peek(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<SecretString>, KvError> {
        Ok(self.peek().map(SecretString::new))
    }

    async fn set(&self, value: SecretString) -> Result<(), KvError> {
        check_size(&value)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(value.expose_secret().clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), KvError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Single-file store. Writes go to a sibling temp file and are renamed
/// into place so a crash never leaves a half-written value.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<SecretString>, KvError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(SecretString::new(contents))),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvError::io(&self.path, &e)),
        }
    }

    async fn set(&self, value: SecretString) -> Result<(), KvError> {
        check_size(&value)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KvError::io(parent, &e))?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, value.expose_secret().as_bytes())
            .await
            .map_err(|e| KvError::io(&tmp, &e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| KvError::io(&tmp, &e))?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| KvError::io(&self.path, &e))
    }

    async fn clear(&self) -> Result<(), KvError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(KvError::io(&self.path, &e)),
        }
    }
}
