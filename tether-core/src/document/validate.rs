use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::document::{split_ref, ActionSpec, InputSpec, PlanDocument, ResourceSpec};
use crate::error::{ValidationError, Violation};
use crate::template::Template;

pub(crate) static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid"));
static KIND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+(:[A-Za-z0-9_\-\.]+)*$").expect("valid"));

/// Collects every problem in a document instead of stopping at the first.
///
/// References to other nodes are only checked for shape here; whether they exist is a graph
/// concern.
pub struct Validator {
    violations: Vec<Violation>,
    names: BTreeSet<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            names: BTreeSet::new(),
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    pub fn validate_document(&mut self, doc: &PlanDocument) {
        if doc.name.trim().is_empty() {
            self.push("name", "must not be empty");
        }
        if doc.resources.is_empty() && doc.actions.is_empty() {
            self.push("$", "plan declares no resources or actions");
        }

        for (key, p) in &doc.providers {
            let path = format!("providers.{key}");
            if !NAME_RE.is_match(key) {
                self.push(&path, "provider key must match ^[A-Za-z0-9_\\-]+$");
            }
            if p.command.trim().is_empty() {
                self.push(format!("{path}.command"), "must not be empty");
            }
        }

        for (i, r) in doc.resources.iter().enumerate() {
            self.validate_resource(&format!("resources[{i}]"), r);
        }
        for (i, a) in doc.actions.iter().enumerate() {
            self.validate_action(&format!("actions[{i}]"), a);
        }

        for (name, e) in &doc.exports {
            if let Err(msg) = split_ref(e.reference()) {
                self.push(format!("exports.{name}"), msg);
            }
        }
    }

    fn validate_resource(&mut self, path: &str, r: &ResourceSpec) {
        self.validate_name(path, &r.name);
        if !KIND_RE.is_match(&r.kind) {
            self.push(
                format!("{path}.kind"),
                "must look like `provider:type` (e.g. `linode:instance`)",
            );
        }

        let mut seen = BTreeSet::new();
        for (i, o) in r.outputs.iter().enumerate() {
            if !NAME_RE.is_match(o) {
                self.push(format!("{path}.outputs[{i}]"), "invalid output key");
            }
            if !seen.insert(o.as_str()) {
                self.push(format!("{path}.outputs[{i}]"), format!("duplicate output `{o}`"));
            }
        }
        for (i, o) in r.sensitive_outputs.iter().enumerate() {
            if !seen.contains(o.as_str()) {
                self.push(
                    format!("{path}.sensitive_outputs[{i}]"),
                    format!("`{o}` is not a declared output"),
                );
            }
        }

        self.validate_inputs(path, &r.inputs);
        self.validate_depends_on(path, &r.depends_on);
    }

    fn validate_action(&mut self, path: &str, a: &ActionSpec) {
        self.validate_name(path, &a.name);

        if a.command.trim().is_empty() {
            self.push(format!("{path}.command"), "must not be empty");
        } else {
            self.validate_template(&format!("{path}.command"), &a.command);
        }
        for (k, v) in &a.env {
            if k.is_empty() || k.contains('=') {
                self.push(format!("{path}.env.{k}"), "invalid environment variable name");
            }
            self.validate_template(&format!("{path}.env.{k}"), v);
        }
        if let Some(remote) = &a.remote {
            if remote.host.trim().is_empty() {
                self.push(format!("{path}.remote.host"), "must not be empty");
            }
            if remote.port == 0 {
                self.push(format!("{path}.remote.port"), "must be in 1..=65535");
            }
            self.validate_template(&format!("{path}.remote.host"), &remote.host);
            self.validate_template(&format!("{path}.remote.user"), &remote.user);
            if let Some(identity) = &remote.identity {
                self.validate_template(&format!("{path}.remote.identity"), identity);
            }
        }

        self.validate_inputs(path, &a.inputs);
        self.validate_depends_on(path, &a.depends_on);
    }

    fn validate_name(&mut self, path: &str, name: &str) {
        if !NAME_RE.is_match(name) {
            self.push(format!("{path}.name"), "must match ^[A-Za-z0-9_\\-]+$");
        }
        if !self.names.insert(name.to_string()) {
            self.push(format!("{path}.name"), format!("duplicate node name `{name}`"));
        }
    }

    fn validate_inputs(&mut self, path: &str, inputs: &BTreeMap<String, InputSpec>) {
        for (key, input) in inputs {
            let input_path = format!("{path}.inputs.{key}");
            if key.is_empty() || key.contains(char::is_whitespace) {
                self.push(&input_path, "invalid input key");
            }
            if let InputSpec::Binding(b) = input {
                if let Err(msg) = b.binding() {
                    self.push(&input_path, msg);
                }
            }
        }
    }

    fn validate_depends_on(&mut self, path: &str, deps: &[String]) {
        for (i, d) in deps.iter().enumerate() {
            if !NAME_RE.is_match(d) {
                self.push(format!("{path}.depends_on[{i}]"), "must be a node name");
            }
        }
    }

    fn validate_template(&mut self, path: &str, source: &str) {
        if let Err(e) = Template::parse(source) {
            self.push(path, e.to_string());
        }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }
}

pub fn validate_document(doc: &PlanDocument) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    v.validate_document(doc);
    v.finish()
}
