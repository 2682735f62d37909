use std::collections::BTreeMap;

use crate::value::Datum;

/// On-disk plan description.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDocument {
    pub name: String,

    /// Defaults for plain configuration keys. Secrets cannot be defaulted here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, Datum>,

    /// Provider programs keyed by kind prefix (`linode` serves `linode:instance`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exports: BTreeMap<String, ExportSpec>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionSpec {
    pub name: String,
    /// Runs over SSH when present, locally otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSpec>,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive_output: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

/// A node input: either a literal datum or a binding resolved at build time or run time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    Literal(Datum),
    Binding(BindingSpec),
}

/// Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSpec {
    /// `node.output` of another node; resolved during the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Configuration key holding the path of a public key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Configuration key holding the path of a private key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<'a> {
    From { node: &'a str, key: &'a str },
    Config(&'a str),
    Secret(&'a str),
    PublicKey(&'a str),
    PrivateKey(&'a str),
}

impl BindingSpec {
    pub fn binding(&self) -> Result<Binding<'_>, String> {
        let set = [
            self.from.is_some(),
            self.config.is_some(),
            self.secret.is_some(),
            self.public_key.is_some(),
            self.private_key.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        if set != 1 {
            return Err(format!(
                "binding must set exactly one of from/config/secret/public_key/private_key ({set} set)"
            ));
        }

        if let Some(r) = &self.from {
            let (node, key) = split_ref(r)?;
            return Ok(Binding::From { node, key });
        }
        if let Some(k) = &self.config {
            return Ok(Binding::Config(k));
        }
        if let Some(k) = &self.secret {
            return Ok(Binding::Secret(k));
        }
        if let Some(k) = &self.public_key {
            return Ok(Binding::PublicKey(k));
        }
        match &self.private_key {
            Some(k) => Ok(Binding::PrivateKey(k)),
            None => Err("empty binding".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ExportSpec {
    /// `node.output`
    Ref(String),
    Detailed {
        from: String,
        #[serde(default)]
        reveal: bool,
    },
}

impl ExportSpec {
    pub fn reference(&self) -> &str {
        match self {
            ExportSpec::Ref(r) => r,
            ExportSpec::Detailed { from, .. } => from,
        }
    }

    pub fn reveal(&self) -> bool {
        matches!(self, ExportSpec::Detailed { reveal: true, .. })
    }
}

/// Splits `node.output` at the last `.`.
pub fn split_ref(r: &str) -> Result<(&str, &str), String> {
    match r.rsplit_once('.') {
        Some((node, key)) if !node.is_empty() && !key.is_empty() => Ok((node, key)),
        _ => Err(format!("expected `node.output`, got `{r}`")),
    }
}
