use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::value::{Datum, SecretValue};

/// Read-only configuration consulted while a plan is being built.
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<String>;

    /// Sources that keep secrets apart from plain values override this.
    fn get_secret(&self, key: &str) -> Option<SecretValue> {
        self.get(key).map(SecretValue::from_string)
    }
}

#[derive(Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    pub fn new(layers: Vec<Box<dyn ConfigSource>>) -> Self {
        Self { layers }
    }

    pub fn push(&mut self, layer: Box<dyn ConfigSource>) {
        self.layers.push(layer);
    }
}

impl ConfigSource for LayeredSource {
    fn name(&self) -> &str {
        "layered"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|l| l.get(key))
    }

    fn get_secret(&self, key: &str) -> Option<SecretValue> {
        self.layers.iter().find_map(|l| l.get_secret(key))
    }
}

/// Environment lookup. `ssh_private_key_path` with prefix `TETHER_` reads
/// `TETHER_SSH_PRIVATE_KEY_PATH`.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    pub prefix: Option<String>,
}

impl EnvSource {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub fn env_key(&self, key: &str) -> String {
        let normalized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        match &self.prefix {
            Some(p) => format!("{p}{normalized}"),
            None => normalized,
        }
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.env_key(key)).ok()
    }
}

#[derive(Default)]
pub struct MapSource {
    values: BTreeMap<String, String>,
    secrets: BTreeMap<String, SecretValue>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets
            .insert(key.into(), SecretValue::from_string(value.into()));
        self
    }

    /// Parses `KEY=VALUE` pairs; entries without `=` are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::new();
        for p in pairs {
            if let Some((k, v)) = p.split_once('=') {
                out.values.insert(k.trim().to_string(), v.to_string());
            }
        }
        out
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        "map"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn get_secret(&self, key: &str) -> Option<SecretValue> {
        self.secrets
            .get(key)
            .cloned()
            .or_else(|| self.get(key).map(SecretValue::from_string))
    }
}

/// A YAML or JSON file of `key: value` pairs with an optional `secrets:` section.
///
/// ```yaml
/// ssh_public_key_path: ~/.ssh/id_ed25519.pub
/// secrets:
///   root: correct-horse-battery-staple
/// ```
pub struct FileSource {
    path: PathBuf,
    values: BTreeMap<String, String>,
    secrets: BTreeMap<String, SecretValue>,
}

#[derive(serde::Deserialize)]
struct FileLayout {
    #[serde(default)]
    secrets: BTreeMap<String, Datum>,
    #[serde(flatten)]
    values: BTreeMap<String, Datum>,
}

impl FileSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let source_err = |message: String| ConfigError::Source {
            source_name: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(&path).map_err(|e| source_err(e.to_string()))?;
        // YAML is a superset of JSON, so one parser covers both.
        let layout: FileLayout =
            serde_yaml::from_str(&content).map_err(|e| source_err(e.to_string()))?;

        Ok(Self {
            values: layout
                .values
                .into_iter()
                .map(|(k, v)| (k, v.render()))
                .collect(),
            secrets: layout
                .secrets
                .into_iter()
                .map(|(k, v)| (k, SecretValue::from_string(v.render())))
                .collect(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn get_secret(&self, key: &str) -> Option<SecretValue> {
        self.secrets
            .get(key)
            .cloned()
            .or_else(|| self.get(key).map(SecretValue::from_string))
    }
}
