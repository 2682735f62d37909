use std::collections::{BTreeMap, BTreeSet};

use crate::template::Template;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Resource,
    Action,
}

/// A declared unit of infrastructure created through a resource provider.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub name: String,
    /// Provider key, e.g. `linode:instance`.
    pub kind: String,
    /// Inputs known at declaration time. Late-bound inputs arrive through edges.
    pub inputs: BTreeMap<String, Value>,
    pub outputs: Vec<String>,
    pub sensitive_outputs: BTreeSet<String>,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            inputs: BTreeMap::new(),
            outputs: Vec::new(),
            sensitive_outputs: BTreeSet::new(),
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.outputs.contains(&key) {
            self.outputs.push(key);
        }
        self
    }

    pub fn sensitive_output(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self = self.output(key.clone());
        self.sensitive_outputs.insert(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local,
    Remote(RemoteTarget),
}

/// Connection parameters for a remote command. Every field that may depend on a late-bound
/// value (typically the host address) is a template over the action's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: Template,
    pub port: u16,
    pub user: Template,
    /// Path to a private key file.
    pub identity: Option<Template>,
}

impl RemoteTarget {
    pub fn new(host: Template) -> Self {
        Self {
            host,
            port: 22,
            user: Template::literal("root"),
            identity: None,
        }
    }
}

/// A declared command execution whose captured stdout becomes its `stdout` output.
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub name: String,
    pub target: Target,
    pub command: Template,
    pub env: BTreeMap<String, Template>,
    pub inputs: BTreeMap<String, Value>,
    /// Re-marks the captured stdout as sensitive. Off by default: sensitivity of inputs does
    /// not propagate to the output.
    pub sensitive_output: bool,
}

impl ActionNode {
    pub const STDOUT: &'static str = "stdout";

    pub fn new(name: impl Into<String>, command: Template) -> Self {
        Self {
            name: name.into(),
            target: Target::Local,
            command,
            env: BTreeMap::new(),
            inputs: BTreeMap::new(),
            sensitive_output: false,
        }
    }

    pub fn remote(mut self, target: RemoteTarget) -> Self {
        self.target = Target::Remote(target);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: Template) -> Self {
        self.env.insert(key.into(), value);
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn sensitive_output(mut self, sensitive: bool) -> Self {
        self.sensitive_output = sensitive;
        self
    }

    /// Every placeholder referenced by the command, environment and connection templates.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        let mut out: BTreeSet<&str> = self.command.placeholders().collect();
        for t in self.env.values() {
            out.extend(t.placeholders());
        }
        if let Target::Remote(r) = &self.target {
            out.extend(r.host.placeholders());
            out.extend(r.user.placeholders());
            if let Some(identity) = &r.identity {
                out.extend(identity.placeholders());
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Resource(ResourceNode),
    Action(ActionNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Resource(r) => &r.name,
            Node::Action(a) => &a.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Resource(_) => NodeKind::Resource,
            Node::Action(_) => NodeKind::Action,
        }
    }

    pub fn static_inputs(&self) -> &BTreeMap<String, Value> {
        match self {
            Node::Resource(r) => &r.inputs,
            Node::Action(a) => &a.inputs,
        }
    }

    pub fn declares_output(&self, key: &str) -> bool {
        match self {
            Node::Resource(r) => r.outputs.iter().any(|o| o == key),
            Node::Action(_) => key == ActionNode::STDOUT,
        }
    }

    pub fn output_keys(&self) -> Vec<&str> {
        match self {
            Node::Resource(r) => r.outputs.iter().map(String::as_str).collect(),
            Node::Action(_) => vec![ActionNode::STDOUT],
        }
    }

    pub fn is_sensitive_output(&self, key: &str) -> bool {
        match self {
            Node::Resource(r) => r.sensitive_outputs.contains(key),
            Node::Action(a) => a.sensitive_output && key == ActionNode::STDOUT,
        }
    }
}
