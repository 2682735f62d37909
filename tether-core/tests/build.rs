use std::collections::BTreeMap;
use std::io::Write;

use tether_core::config::MapSource;
use tether_core::{
    plan_from_str, BuildError, ConfigError, Datum, DocumentFormat, FsKeyLoader, KeyLoader, Node,
    PlanDocument, PlanBuilder, StructuralError, Target, Value, ValueStore,
};

const PLAN: &str = r#"
name: linode-tailscale
config:
  region: eu-central
  image: linode/debian12
resources:
  - name: vm
    kind: linode:instance
    inputs:
      region: { config: region }
      image: { config: image }
      root_pass: { secret: root }
      authorized_keys: { public_key: ssh_public_key }
    outputs: [ip_address]
  - name: domain
    kind: linode:domain
    inputs:
      domain: example.org
    outputs: [id]
  - name: record_a
    kind: linode:record
    inputs:
      domain_id: { from: domain.id }
      target: { from: vm.ip_address }
      record_type: A
    outputs: [id]
actions:
  - name: ansible_reqs
    remote:
      host: "{$ip}"
      identity: "{$key_path}"
    command: "apt-get update && apt-get install -y python3"
    inputs:
      ip: { from: vm.ip_address }
      key_path: { config: ssh_private_key }
  - name: envs
    command: "envsubst < vars.tpl > vars.yml"
    env:
      TS_AUTHKEY: "{$ts}"
    inputs:
      ts: { secret: tailscale_key }
  - name: playbook
    command: "ansible-playbook -i {$ip}, main.yml"
    inputs:
      ip: { from: vm.ip_address }
    depends_on: [ansible_reqs, envs]
exports:
  deps-out: ansible_reqs.stdout
  instanceIpAddress: vm.ip_address
"#;

struct StaticKeys;

impl KeyLoader for StaticKeys {
    fn load(&self, path: &str) -> Result<Vec<u8>, ConfigError> {
        Ok(format!("ssh-ed25519 AAAA {path}\n").into_bytes())
    }
}

fn store() -> ValueStore {
    let source = MapSource::new()
        .set("ssh_public_key", "~/.ssh/id.pub")
        .set("ssh_private_key", "~/.ssh/id")
        .secret("root", "hunter2")
        .secret("tailscale_key", "tskey-abc");
    let doc: PlanDocument = serde_yaml::from_str(PLAN).unwrap();
    ValueStore::new(Box::new(source)).with_defaults(doc.config)
}

#[test]
fn builds_the_provisioning_plan() {
    let plan = plan_from_str(PLAN, DocumentFormat::Auto, &store(), &StaticKeys).unwrap();

    assert_eq!(plan.name(), "linode-tailscale");
    assert_eq!(
        plan.topological_order(),
        &["vm", "domain", "record_a", "ansible_reqs", "envs", "playbook"]
    );
    assert_eq!(plan.dependencies("record_a"), &["vm", "domain"]);
    assert_eq!(plan.dependencies("playbook"), &["vm", "ansible_reqs", "envs"]);
    assert_eq!(plan.exports().len(), 2);

    let Some(Node::Resource(vm)) = plan.node("vm") else {
        panic!("vm is a resource");
    };
    assert_eq!(vm.inputs["region"], Value::plain("eu-central"));
    assert!(vm.inputs["root_pass"].is_sensitive());
    assert_eq!(
        vm.inputs["authorized_keys"].expose_text(),
        "ssh-ed25519 AAAA ~/.ssh/id.pub"
    );

    let Some(Node::Action(reqs)) = plan.node("ansible_reqs") else {
        panic!("ansible_reqs is an action");
    };
    let Target::Remote(remote) = &reqs.target else {
        panic!("ansible_reqs runs remotely");
    };
    assert_eq!(remote.port, 22);
    assert_eq!(remote.user.as_str(), "root");
}

#[test]
fn building_twice_gives_the_same_order() {
    let a = plan_from_str(PLAN, DocumentFormat::Yaml, &store(), &StaticKeys).unwrap();
    let b = plan_from_str(PLAN, DocumentFormat::Yaml, &store(), &StaticKeys).unwrap();
    assert_eq!(a.topological_order(), b.topological_order());
    assert_eq!(a.levels(), b.levels());
}

#[test]
fn missing_secret_aborts_construction_without_leaking() {
    let source = MapSource::new()
        .set("region", "eu-central")
        .set("image", "linode/debian12")
        .set("ssh_public_key", "id.pub")
        .set("ssh_private_key", "id")
        .secret("tailscale_key", "tskey-abc");
    let store = ValueStore::new(Box::new(source));
    let err = plan_from_str(PLAN, DocumentFormat::Yaml, &store, &StaticKeys).unwrap_err();
    match &err {
        BuildError::Config(ConfigError::Missing { key }) => assert_eq!(key, "root"),
        other => panic!("expected missing root, got {other:?}"),
    }
    assert!(!err.to_string().contains("tskey-abc"));
}

#[test]
fn unreadable_key_file_aborts_construction() {
    let source = MapSource::new()
        .set("ssh_public_key", "/definitely/not/here.pub")
        .set("ssh_private_key", "/definitely/not/here")
        .secret("root", "hunter2")
        .secret("tailscale_key", "tskey-abc");
    let store = ValueStore::new(Box::new(source));
    let err = plan_from_str(PLAN, DocumentFormat::Yaml, &store, &FsKeyLoader).unwrap_err();
    assert!(matches!(err, BuildError::Config(ConfigError::KeyMaterial { .. })));
}

#[test]
fn reads_real_key_files() {
    let mut key = tempfile::NamedTempFile::new().unwrap();
    writeln!(key, "ssh-ed25519 AAAAC3 ops@example").unwrap();
    let path = key.path().to_str().unwrap().to_string();

    let source = MapSource::new()
        .set("ssh_public_key", path.as_str())
        .set("ssh_private_key", path.as_str())
        .secret("root", "hunter2")
        .secret("tailscale_key", "tskey-abc");
    let mut defaults = BTreeMap::new();
    defaults.insert("region".to_string(), Datum::from("eu-central"));
    defaults.insert("image".to_string(), Datum::from("linode/debian12"));
    let store = ValueStore::new(Box::new(source)).with_defaults(defaults);

    let plan = plan_from_str(PLAN, DocumentFormat::Yaml, &store, &FsKeyLoader).unwrap();
    let Some(Node::Resource(vm)) = plan.node("vm") else {
        panic!("vm is a resource");
    };
    assert_eq!(
        vm.inputs["authorized_keys"],
        Value::plain("ssh-ed25519 AAAAC3 ops@example")
    );
}

#[test]
fn dangling_reference_is_a_structural_error() {
    let yaml = r#"
name: p
actions:
  - name: a
    command: "echo {$x}"
    inputs:
      x: { from: ghost.stdout }
"#;
    let store = ValueStore::new(Box::new(MapSource::new()));
    let err = plan_from_str(yaml, DocumentFormat::Yaml, &store, &StaticKeys).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Structural(StructuralError::UnknownNode { ref name }) if name == "ghost"
    ));
}

#[test]
fn unbound_placeholder_is_a_structural_error() {
    let yaml = r#"
name: p
actions:
  - name: a
    command: "echo {$x}"
"#;
    let doc: PlanDocument = serde_yaml::from_str(yaml).unwrap();
    let store = ValueStore::new(Box::new(MapSource::new()));
    let err = PlanBuilder::new(&store, &StaticKeys).build(&doc).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Structural(StructuralError::UnboundPlaceholder { .. })
    ));
}

#[test]
fn invalid_document_reports_violations() {
    let yaml = r#"
name: p
actions:
  - name: "has space"
    command: ""
"#;
    let store = ValueStore::new(Box::new(MapSource::new()));
    let err = plan_from_str(yaml, DocumentFormat::Yaml, &store, &StaticKeys).unwrap_err();
    let BuildError::Validation(v) = err else {
        panic!("expected validation error");
    };
    assert_eq!(v.violations.len(), 2);
}
