use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{DependencyEdge, Node, NodeKind, OrderingEdge};
use crate::value::Redactor;

/// A named plan output: `node.key`, optionally revealed even when sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    pub node: String,
    pub key: String,
    /// Explicit unmark: a sensitive value is exported in clear text.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reveal: bool,
}

impl Export {
    pub fn new(node: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            key: key.into(),
            reveal: false,
        }
    }

    pub fn revealed(mut self) -> Self {
        self.reveal = true;
        self
    }
}

/// A validated, immutable dependency graph.
#[derive(Debug, Clone)]
pub struct Plan {
    pub(super) name: String,
    pub(super) nodes: Vec<Node>,
    pub(super) index: HashMap<String, usize>,
    pub(super) edges: Vec<DependencyEdge>,
    pub(super) orderings: Vec<OrderingEdge>,
    pub(super) order: Vec<String>,
    pub(super) levels: Vec<Vec<String>>,
    pub(super) depends_on: BTreeMap<String, Vec<String>>,
    pub(super) dependents: BTreeMap<String, Vec<String>>,
    pub(super) exports: BTreeMap<String, Export>,
}

impl Plan {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Position of a node in declaration order.
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn orderings(&self) -> &[OrderingEdge] {
        &self.orderings
    }

    /// Edges feeding `consumer`.
    pub fn inbound_edges<'a>(&'a self, consumer: &'a str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.consumer == consumer)
    }

    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Groups of nodes whose producers all sit in earlier groups.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Direct producers of `name` (data and ordering edges), in declaration order.
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.depends_on.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct consumers of `name`, in declaration order.
    pub fn dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exports(&self) -> &BTreeMap<String, Export> {
        &self.exports
    }

    /// A redactor seeded with every sensitive static input in the plan.
    pub fn redactor(&self) -> Redactor {
        let mut r = Redactor::new();
        for n in &self.nodes {
            for v in n.static_inputs().values() {
                r.track(v);
            }
        }
        r
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            name: self.name.clone(),
            order: self.order.clone(),
            levels: self.levels.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSummary {
                    name: n.name().to_string(),
                    kind: n.kind(),
                    depends_on: self.dependencies(n.name()).to_vec(),
                    outputs: n.output_keys().into_iter().map(str::to_string).collect(),
                })
                .collect(),
            exports: self.exports.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub order: Vec<String>,
    pub levels: Vec<Vec<String>>,
    pub nodes: Vec<NodeSummary>,
    pub exports: BTreeMap<String, Export>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub kind: NodeKind,
    pub depends_on: Vec<String>,
    pub outputs: Vec<String>,
}
