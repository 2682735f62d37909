use std::collections::BTreeMap;

use tether_core::{
    ActionNode, DependencyGraph, Export, ResourceNode, StructuralError, Template, Value,
};

fn action(name: &str, cmd: &str) -> ActionNode {
    ActionNode::new(name, Template::parse(cmd).unwrap())
}

/// vm -> {dns_a, dns_cname, ansible_reqs}; envs; playbook after ansible_reqs and envs.
fn provisioning_graph() -> DependencyGraph {
    let mut g = DependencyGraph::new();
    g.add_resource_node(
        ResourceNode::new("vm", "linode:instance")
            .input("region", Value::plain("eu-central"))
            .input("root_pass", Value::sensitive("hunter2"))
            .output("ip_address"),
    );
    g.add_resource_node(ResourceNode::new("domain", "linode:domain").output("id"));
    g.add_resource_node(
        ResourceNode::new("dns_a", "linode:record")
            .input("type", Value::plain("A"))
            .output("id"),
    );
    g.add_action_node(action("ansible_reqs", "ansible-galaxy install -r requirements.yml"));
    g.add_action_node(action("envs", "envsubst < vars.tpl > vars.yml"));
    g.add_action_node(action("playbook", "ansible-playbook -i {$ip}, main.yml"));

    g.add_edge("vm", "ip_address", "dns_a", "target");
    g.add_edge("domain", "id", "dns_a", "domain_id");
    g.add_edge("vm", "ip_address", "playbook", "ip");
    g.add_ordering("vm", "ansible_reqs");
    g.add_ordering("ansible_reqs", "playbook");
    g.add_ordering("envs", "playbook");
    g
}

fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
}

#[test]
fn validate_returns_a_topological_order() {
    let g = provisioning_graph();
    let order = g.validate().unwrap();
    assert_eq!(order.len(), 6);

    let plan = g.into_plan("p", BTreeMap::new()).unwrap();
    for e in plan.edges() {
        assert!(position(&order, &e.producer) < position(&order, &e.consumer));
    }
    for o in plan.orderings() {
        assert!(position(&order, &o.before) < position(&order, &o.after));
    }
}

#[test]
fn construction_is_idempotent() {
    let a = provisioning_graph().validate().unwrap();
    let b = provisioning_graph().validate().unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a,
        vec!["vm", "domain", "dns_a", "ansible_reqs", "envs", "playbook"]
    );
}

#[test]
fn cycle_fails_validation_with_its_path() {
    let mut g = provisioning_graph();
    g.add_ordering("playbook", "vm");
    match g.validate() {
        Err(StructuralError::Cycle { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"vm".to_string()));
            assert!(path.contains(&"playbook".to_string()));
            assert!(!path.contains(&"domain".to_string()));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn cycle_prevents_plan_construction() {
    let mut g = provisioning_graph();
    g.add_edge("playbook", "stdout", "envs", "x");
    assert!(matches!(
        g.into_plan("p", BTreeMap::new()),
        Err(StructuralError::Cycle { .. })
    ));
}

#[test]
fn unknown_ordering_target_is_reported() {
    let mut g = provisioning_graph();
    g.add_ordering("firewall", "playbook");
    assert_eq!(
        g.validate().unwrap_err(),
        StructuralError::UnknownNode {
            name: "firewall".into()
        }
    );
}

#[test]
fn exports_must_reference_declared_outputs() {
    let mut exports = BTreeMap::new();
    exports.insert("ip".to_string(), Export::new("vm", "ipv6"));
    let err = provisioning_graph().into_plan("p", exports).unwrap_err();
    assert!(matches!(err, StructuralError::UnknownExport { .. }));

    let mut exports = BTreeMap::new();
    exports.insert("deps-out".to_string(), Export::new("ansible_reqs", "stdout"));
    exports.insert("ip".to_string(), Export::new("vm", "ip_address"));
    let plan = provisioning_graph().into_plan("p", exports).unwrap();
    assert_eq!(plan.exports().len(), 2);
}

#[test]
fn plan_redactor_knows_static_secrets() {
    let plan = provisioning_graph().into_plan("p", BTreeMap::new()).unwrap();
    let scrubbed = plan.redactor().scrub("login failed for root:hunter2");
    assert_eq!(scrubbed, "login failed for root:<redacted>");
}

#[test]
fn dot_output_lists_edges() {
    let plan = provisioning_graph().into_plan("p", BTreeMap::new()).unwrap();
    let dot = plan.to_dot();
    assert!(dot.starts_with("digraph tether {"));
    assert!(dot.contains("\"vm\" -> \"playbook\" [label=\"ip_address -> ip\"];"));
    assert!(dot.contains("\"envs\" -> \"playbook\" [style=dashed];"));
}
