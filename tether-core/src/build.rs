use std::collections::BTreeMap;

use crate::config::{load_private_key, load_public_key, KeyLoader, ValueStore};
use crate::document::{
    parse_plan_str, split_ref, validate_document, Binding, DocumentFormat, ExportSpec, InputSpec,
    PlanDocument, RemoteSpec,
};
use crate::error::{BuildError, StructuralError, ValidationError, Violation};
use crate::graph::{ActionNode, DependencyGraph, Export, Plan, RemoteTarget, ResourceNode};
use crate::template::Template;
use crate::value::Value;

/// Turns a plan document into a validated [`Plan`].
///
/// Configuration, secrets and key material are resolved while building; any missing value
/// aborts construction before a graph exists.
pub struct PlanBuilder<'a> {
    store: &'a ValueStore,
    keys: &'a dyn KeyLoader,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(store: &'a ValueStore, keys: &'a dyn KeyLoader) -> Self {
        Self { store, keys }
    }

    pub fn build(&self, doc: &PlanDocument) -> Result<Plan, BuildError> {
        validate_document(doc)?;

        let mut graph = DependencyGraph::new();

        for r in &doc.resources {
            let mut node = ResourceNode::new(&r.name, &r.kind);
            for (key, input) in &r.inputs {
                if let Some(v) = self.resolve_input(&mut graph, &r.name, key, input)? {
                    node = node.input(key, v);
                }
            }
            for o in &r.outputs {
                node = node.output(o);
            }
            for o in &r.sensitive_outputs {
                node = node.sensitive_output(o);
            }
            for d in &r.depends_on {
                graph.add_ordering(d, &r.name);
            }
            graph.add_resource_node(node);
        }

        for a in &doc.actions {
            let mut node = ActionNode::new(&a.name, template(&a.name, &a.command)?)
                .sensitive_output(a.sensitive_output);
            if let Some(remote) = &a.remote {
                node = node.remote(remote_target(&a.name, remote)?);
            }
            for (k, v) in &a.env {
                node = node.env(k, template(&a.name, v)?);
            }
            for (key, input) in &a.inputs {
                if let Some(v) = self.resolve_input(&mut graph, &a.name, key, input)? {
                    node = node.input(key, v);
                }
            }
            for d in &a.depends_on {
                graph.add_ordering(d, &a.name);
            }
            graph.add_action_node(node);
        }

        let exports = exports(&doc.exports)?;
        let plan = graph.into_plan(&doc.name, exports)?;
        tracing::debug!(
            plan = %plan.name(),
            nodes = plan.nodes().len(),
            edges = plan.edges().len(),
            "plan built"
        );
        Ok(plan)
    }

    /// Resolves a static input now, or records an edge and returns `None` for a late-bound one.
    fn resolve_input(
        &self,
        graph: &mut DependencyGraph,
        node: &str,
        key: &str,
        input: &InputSpec,
    ) -> Result<Option<Value>, BuildError> {
        let spec = match input {
            InputSpec::Literal(d) => return Ok(Some(Value::plain(d.clone()))),
            InputSpec::Binding(b) => b,
        };
        // Shape was checked by document validation.
        let binding = spec.binding().map_err(|message| {
            ValidationError::new(vec![Violation::new(format!("{node}.inputs.{key}"), message)])
        })?;

        let value = match binding {
            Binding::From {
                node: producer,
                key: output,
            } => {
                graph.add_edge(producer, output, node, key);
                return Ok(None);
            }
            Binding::Config(k) => self.store.require(k)?,
            Binding::Secret(k) => self.store.require_secret(k)?,
            Binding::PublicKey(k) => {
                let path = self.store.require(k)?;
                load_public_key(self.keys, &path.expose_text())?
            }
            Binding::PrivateKey(k) => {
                let path = self.store.require(k)?;
                load_private_key(self.keys, &path.expose_text())?
            }
        };
        Ok(Some(value))
    }
}

fn template(node: &str, source: &str) -> Result<Template, StructuralError> {
    Template::parse(source).map_err(|source| StructuralError::Template {
        node: node.to_string(),
        source,
    })
}

fn remote_target(node: &str, spec: &RemoteSpec) -> Result<RemoteTarget, StructuralError> {
    let mut target = RemoteTarget::new(template(node, &spec.host)?);
    target.port = spec.port;
    target.user = template(node, &spec.user)?;
    target.identity = spec
        .identity
        .as_deref()
        .map(|i| template(node, i))
        .transpose()?;
    Ok(target)
}

fn exports(specs: &BTreeMap<String, ExportSpec>) -> Result<BTreeMap<String, Export>, BuildError> {
    let mut out = BTreeMap::new();
    for (name, spec) in specs {
        let (node, key) =
            split_ref(spec.reference()).map_err(|_| StructuralError::UnknownExport {
                name: name.clone(),
                node: spec.reference().to_string(),
                key: String::new(),
            })?;
        let mut export = Export::new(node, key);
        if spec.reveal() {
            export = export.revealed();
        }
        out.insert(name.clone(), export);
    }
    Ok(out)
}

/// Parses, validates and builds in one step.
pub fn plan_from_str(
    input: &str,
    format: DocumentFormat,
    store: &ValueStore,
    keys: &dyn KeyLoader,
) -> Result<Plan, BuildError> {
    let parsed = parse_plan_str(input, format)?;
    PlanBuilder::new(store, keys).build(&parsed.document)
}
