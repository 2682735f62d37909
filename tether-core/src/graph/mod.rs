mod dot;
mod node;
mod plan;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::StructuralError;

pub use node::{ActionNode, Node, NodeKind, RemoteTarget, ResourceNode, Target};
pub use plan::{Export, NodeSummary, Plan, PlanSummary};

/// `(producer, output_key) → (consumer, input_key)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DependencyEdge {
    pub producer: String,
    pub output_key: String,
    pub consumer: String,
    pub input_key: String,
}

/// Pure ordering: `after` may not start before `before` has finished. No value flows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrderingEdge {
    pub before: String,
    pub after: String,
}

/// Mutable graph under construction.
///
/// Nodes and edges may be added in any order; name references are only checked by
/// [`DependencyGraph::validate`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<DependencyEdge>,
    orderings: Vec<OrderingEdge>,
    duplicates: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource_node(&mut self, node: ResourceNode) {
        self.add_node(Node::Resource(node));
    }

    pub fn add_action_node(&mut self, node: ActionNode) {
        self.add_node(Node::Action(node));
    }

    fn add_node(&mut self, node: Node) {
        let name = node.name().to_string();
        if self.index.contains_key(&name) {
            self.duplicates.push(name);
            return;
        }
        self.index.insert(name, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn add_edge(
        &mut self,
        producer: impl Into<String>,
        output_key: impl Into<String>,
        consumer: impl Into<String>,
        input_key: impl Into<String>,
    ) {
        self.edges.push(DependencyEdge {
            producer: producer.into(),
            output_key: output_key.into(),
            consumer: consumer.into(),
            input_key: input_key.into(),
        });
    }

    pub fn add_ordering(&mut self, before: impl Into<String>, after: impl Into<String>) {
        self.orderings.push(OrderingEdge {
            before: before.into(),
            after: after.into(),
        });
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Checks references and acyclicity; returns a topological order with ties broken by
    /// declaration order.
    pub fn validate(&self) -> Result<Vec<String>, StructuralError> {
        self.check_references()?;
        let deps = self.dependency_indices();
        let order = topo_order_dfs(&deps, |i| self.nodes[i].name())?;
        Ok(order.into_iter().map(|i| self.nodes[i].name().to_string()).collect())
    }

    /// Validates and freezes the graph.
    pub fn into_plan(
        self,
        name: impl Into<String>,
        exports: BTreeMap<String, Export>,
    ) -> Result<Plan, StructuralError> {
        let order = self.validate()?;
        for (export_name, e) in &exports {
            let Some(&idx) = self.index.get(&e.node) else {
                return Err(StructuralError::UnknownNode {
                    name: e.node.clone(),
                });
            };
            if !self.nodes[idx].declares_output(&e.key) {
                return Err(StructuralError::UnknownExport {
                    name: export_name.clone(),
                    node: e.node.clone(),
                    key: e.key.clone(),
                });
            }
        }

        let deps = self.dependency_indices();
        let mut depends_on = BTreeMap::new();
        let mut dependents: BTreeMap<String, Vec<String>> = self
            .nodes
            .iter()
            .map(|n| (n.name().to_string(), Vec::new()))
            .collect();
        for (i, ds) in deps.iter().enumerate() {
            let name = self.nodes[i].name().to_string();
            for &d in ds {
                if let Some(v) = dependents.get_mut(self.nodes[d].name()) {
                    v.push(name.clone());
                }
            }
            depends_on.insert(
                name,
                ds.iter().map(|&d| self.nodes[d].name().to_string()).collect(),
            );
        }
        // Dependents were pushed in consumer declaration order already.
        let levels = compute_levels(&order, &depends_on);

        Ok(Plan {
            name: name.into(),
            nodes: self.nodes,
            index: self.index,
            edges: self.edges,
            orderings: self.orderings,
            order,
            levels,
            depends_on,
            dependents,
            exports,
        })
    }

    fn check_references(&self) -> Result<(), StructuralError> {
        if let Some(name) = self.duplicates.first() {
            return Err(StructuralError::DuplicateNode { name: name.clone() });
        }

        let mut bound: BTreeSet<(&str, &str)> = BTreeSet::new();
        for n in &self.nodes {
            for key in n.static_inputs().keys() {
                bound.insert((n.name(), key));
            }
        }

        for e in &self.edges {
            let producer = self.lookup(&e.producer)?;
            let consumer = self.lookup(&e.consumer)?;
            if !producer.declares_output(&e.output_key) {
                return Err(StructuralError::UnknownOutput {
                    node: e.producer.clone(),
                    key: e.output_key.clone(),
                });
            }
            if !bound.insert((consumer.name(), e.input_key.as_str())) {
                return Err(StructuralError::DuplicateInput {
                    node: e.consumer.clone(),
                    key: e.input_key.clone(),
                });
            }
        }

        for o in &self.orderings {
            self.lookup(&o.before)?;
            self.lookup(&o.after)?;
        }

        for n in &self.nodes {
            if let Node::Action(a) = n {
                for p in a.placeholders() {
                    if !bound.contains(&(a.name.as_str(), p)) {
                        return Err(StructuralError::UnboundPlaceholder {
                            node: a.name.clone(),
                            placeholder: p.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Node, StructuralError> {
        self.index
            .get(name)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| StructuralError::UnknownNode {
                name: name.to_string(),
            })
    }

    /// Producer indices per node, deduplicated and sorted by declaration order.
    fn dependency_indices(&self) -> Vec<Vec<usize>> {
        let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];
        let pairs = self
            .edges
            .iter()
            .map(|e| (&e.producer, &e.consumer))
            .chain(self.orderings.iter().map(|o| (&o.before, &o.after)));
        for (producer, consumer) in pairs {
            if let (Some(&p), Some(&c)) = (self.index.get(producer), self.index.get(consumer)) {
                deps[c].insert(p);
            }
        }
        deps.into_iter().map(|s| s.into_iter().collect()).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

fn topo_order_dfs<'a>(
    deps: &[Vec<usize>],
    name_of: impl Fn(usize) -> &'a str,
) -> Result<Vec<usize>, StructuralError> {
    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut order = Vec::with_capacity(deps.len());
    for root in 0..deps.len() {
        visit(root, deps, &mut marks, &mut order, &name_of)?;
    }
    Ok(order)
}

/// Post-order walk from `root` over producer links. Each stack frame is a node on the current
/// path and the position of the next producer to look at.
fn visit<'a>(
    root: usize,
    deps: &[Vec<usize>],
    marks: &mut [Mark],
    order: &mut Vec<usize>,
    name_of: &impl Fn(usize) -> &'a str,
) -> Result<(), StructuralError> {
    if marks[root] != Mark::Unvisited {
        return Ok(());
    }
    marks[root] = Mark::OnPath;
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

    while let Some(frame) = stack.last_mut() {
        let idx = frame.0;
        let Some(&next) = deps[idx].get(frame.1) else {
            stack.pop();
            marks[idx] = Mark::Done;
            order.push(idx);
            continue;
        };
        frame.1 += 1;

        match marks[next] {
            Mark::Done => {}
            Mark::Unvisited => {
                marks[next] = Mark::OnPath;
                stack.push((next, 0));
            }
            Mark::OnPath => {
                let start = stack.iter().position(|&(i, _)| i == next).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..]
                    .iter()
                    .map(|&(i, _)| name_of(i).to_string())
                    .collect();
                cycle.push(name_of(next).to_string());
                // The walk follows consumer -> producer; report in data-flow direction.
                cycle.reverse();
                return Err(StructuralError::Cycle { path: cycle });
            }
        }
    }
    Ok(())
}

fn compute_levels(topo: &[String], depends_on: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut level: BTreeMap<&str, usize> = BTreeMap::new();
    for node in topo {
        let deps = depends_on.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
        let l = deps
            .iter()
            .filter_map(|d| level.get(d.as_str()).copied())
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        level.insert(node, l);
    }

    let max_level = level.values().copied().max().unwrap_or(0);
    let mut levels = vec![Vec::<String>::new(); max_level + 1];
    for node in topo {
        levels[level[node.as_str()]].push(node.clone());
    }
    if topo.is_empty() {
        levels.clear();
    }
    levels
}
