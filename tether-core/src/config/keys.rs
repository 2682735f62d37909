use std::path::PathBuf;

use crate::error::ConfigError;
use crate::value::{SecretValue, Value};

/// Reads SSH key material. Any failure is fatal to plan construction.
pub trait KeyLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Vec<u8>, ConfigError>;
}

/// Filesystem loader; a leading `~/` is expanded from `HOME`.
#[derive(Debug, Clone, Default)]
pub struct FsKeyLoader;

impl FsKeyLoader {
    pub fn expand(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(path)
    }
}

impl KeyLoader for FsKeyLoader {
    fn load(&self, path: &str) -> Result<Vec<u8>, ConfigError> {
        let full = Self::expand(path);
        let bytes = std::fs::read(&full).map_err(|e| ConfigError::KeyMaterial {
            path: full.clone(),
            message: e.to_string(),
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::KeyMaterial {
                path: full,
                message: "file is empty".to_string(),
            });
        }
        Ok(bytes)
    }
}

/// A public key, whitespace-trimmed, as a plain value.
pub fn load_public_key(loader: &dyn KeyLoader, path: &str) -> Result<Value, ConfigError> {
    let bytes = loader.load(path)?;
    Ok(Value::plain(String::from_utf8_lossy(&bytes).trim().to_string()))
}

/// A private key as a sensitive value.
pub fn load_private_key(loader: &dyn KeyLoader, path: &str) -> Result<Value, ConfigError> {
    let bytes = loader.load(path)?;
    Ok(Value::from_secret(SecretValue::from_bytes(bytes)))
}
