use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tether_core::{ActionNode, Node, Plan, Redactor, ResourceNode, Value, ValueState};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::NodeError;
use crate::executor::concurrency::ConcurrencyLimits;
use crate::executor::events::{Event, EventSink};
use crate::executor::report::{
    ExecutionReport, ExportedValue, NodeOutcome, NodeReport, RunStatus, SkipReason,
};
use crate::executor::types::ExecutorConfig;
use crate::provider::ResourceProvider;
use crate::runner::{ActionRunner, PreparedAction};
use crate::transport::CommandTransport;

/// Runs a [`Plan`] to completion.
///
/// One coordinator owns every piece of run state. Each ready node runs as its own tokio task
/// and reports back only through its join handle, so a node is dispatched at most once and
/// every completion is observed exactly once.
pub struct Executor {
    config: ExecutorConfig,
    provider: Arc<dyn ResourceProvider>,
    runner: ActionRunner,
    event_sink: Arc<dyn EventSink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeState {
    Waiting,
    Running,
    Done,
}

enum TaskOutcome {
    /// The deadline passed while the node waited for a concurrency permit.
    NotStarted,
    Finished {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration_ms: u64,
        result: Result<BTreeMap<String, Value>, NodeError>,
    },
}

/// Everything a task needs, cloned out of the coordinator.
#[derive(Clone)]
struct TaskDeps {
    run_id: Uuid,
    provider: Arc<dyn ResourceProvider>,
    runner: ActionRunner,
    limits: Arc<ConcurrencyLimits>,
    event_sink: Arc<dyn EventSink>,
    deadline: Option<Instant>,
    start_log: Arc<Mutex<Vec<String>>>,
}

struct RunState<'p> {
    plan: &'p Plan,
    states: Vec<NodeState>,
    remaining: Vec<usize>,
    outcomes: Vec<Option<NodeOutcome>>,
    timings: Vec<(Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<u64>)>,
    outputs: Vec<BTreeMap<String, Value>>,
    slots: BTreeMap<String, ValueState>,
    redactor: Redactor,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        provider: Arc<dyn ResourceProvider>,
        transport: Arc<dyn CommandTransport>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            provider,
            runner: ActionRunner::new(transport),
            event_sink,
        }
    }

    pub async fn run(&self, plan: &Plan) -> ExecutionReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let deps = TaskDeps {
            run_id,
            provider: self.provider.clone(),
            runner: self.runner.clone(),
            limits: Arc::new(ConcurrencyLimits::new(
                self.config.max_concurrency,
                &self.config.per_host_concurrency,
            )),
            event_sink: self.event_sink.clone(),
            deadline,
            start_log: Arc::new(Mutex::new(Vec::new())),
        };

        tracing::info!(%run_id, plan = %plan.name(), nodes = plan.nodes().len(), "run started");
        self.event_sink
            .emit(Event::RunStarted {
                run_id,
                plan: plan.name().to_string(),
                nodes: plan.nodes().len(),
            })
            .await;

        let mut state = RunState::new(plan);
        let mut in_flight = FuturesUnordered::new();
        let mut deadline_passed = false;

        self.dispatch_ready(&mut state, &deps, &mut in_flight).await;

        while !in_flight.is_empty() {
            tokio::select! {
                Some((idx, joined)) = in_flight.next() => {
                    self.complete(&mut state, run_id, idx, joined).await;
                }
                _ = wait_for(deadline), if !deadline_passed => {
                    tracing::warn!(%run_id, "deadline passed; no further nodes will start");
                    deadline_passed = true;
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                deadline_passed = true;
            }
            if !deadline_passed {
                self.dispatch_ready(&mut state, &deps, &mut in_flight).await;
            }
        }

        // Nodes that never became ready: only possible when the deadline cut dispatch short.
        for idx in 0..plan.nodes().len() {
            if state.states[idx] == NodeState::Waiting {
                let reason = if deadline_passed {
                    SkipReason::Timeout
                } else {
                    // Unreachable for a validated plan.
                    SkipReason::UpstreamFailed {
                        node: plan.dependencies(plan.nodes()[idx].name()).join(","),
                    }
                };
                self.skip(&mut state, run_id, idx, reason).await;
            }
        }

        let status = state.status();
        let start_order = deps.start_log.lock().await.clone();
        let exports = state.exports();
        let finished_at = Utc::now();

        tracing::info!(%run_id, status = status.as_str(), "run finished");
        self.event_sink
            .emit(Event::RunFinished { run_id, status })
            .await;

        state.into_report(run_id, status, started_at, finished_at, start_order, exports)
    }

    async fn dispatch_ready(
        &self,
        state: &mut RunState<'_>,
        deps: &TaskDeps,
        in_flight: &mut FuturesUnordered<NamedHandle>,
    ) {
        let plan = state.plan;
        for (idx, node) in plan.nodes().iter().enumerate() {
            if state.states[idx] != NodeState::Waiting || state.remaining[idx] != 0 {
                continue;
            }
            let inputs = match state.collect_inputs(idx) {
                Ok(inputs) => inputs,
                Err(e) => {
                    state.states[idx] = NodeState::Running;
                    self.fail(state, deps.run_id, idx, e).await;
                    continue;
                }
            };
            state.states[idx] = NodeState::Running;
            tracing::debug!(node = %node.name(), "dispatching");

            let node = node.clone();
            let deps = deps.clone();
            let handle = tokio::spawn(async move { run_node(node, inputs, deps).await });
            in_flight.push(NamedHandle::new(idx, handle));
        }
    }

    async fn complete(
        &self,
        state: &mut RunState<'_>,
        run_id: Uuid,
        idx: usize,
        joined: Result<TaskOutcome, tokio::task::JoinError>,
    ) {
        match joined {
            Ok(TaskOutcome::NotStarted) => {
                self.skip(state, run_id, idx, SkipReason::Timeout).await;
            }
            Ok(TaskOutcome::Finished {
                started_at,
                finished_at,
                duration_ms,
                result,
            }) => {
                state.timings[idx] = (Some(started_at), Some(finished_at), Some(duration_ms));
                match result {
                    Ok(outputs) => self.succeed(state, run_id, idx, outputs, duration_ms).await,
                    Err(e) => self.fail(state, run_id, idx, e).await,
                }
            }
            Err(join) => {
                self.fail(state, run_id, idx, NodeError::Internal(format!("task failed: {join}")))
                    .await;
            }
        }
    }

    async fn succeed(
        &self,
        state: &mut RunState<'_>,
        run_id: Uuid,
        idx: usize,
        outputs: BTreeMap<String, Value>,
        duration_ms: u64,
    ) {
        let plan = state.plan;
        let node = &plan.nodes()[idx];
        for (key, value) in &outputs {
            state.redactor.track(value);
            state
                .slots
                .insert(slot(node.name(), key), ValueState::Resolved(value.clone()));
        }
        state.outputs[idx] = outputs;
        state.outcomes[idx] = Some(match node {
            Node::Resource(_) => NodeOutcome::Created,
            Node::Action(_) => NodeOutcome::Completed,
        });
        state.states[idx] = NodeState::Done;

        for dependent in plan.dependents(node.name()) {
            if let Some(d) = plan.declaration_index(dependent) {
                state.remaining[d] = state.remaining[d].saturating_sub(1);
            }
        }

        tracing::info!(%run_id, node = %node.name(), duration_ms, "node succeeded");
        self.event_sink
            .emit(Event::NodeSucceeded {
                run_id,
                node: node.name().to_string(),
                duration_ms,
            })
            .await;
    }

    async fn fail(&self, state: &mut RunState<'_>, run_id: Uuid, idx: usize, error: NodeError) {
        let plan = state.plan;
        let name = plan.nodes()[idx].name().to_string();
        let message = state.redactor.scrub(&error.to_string());

        for key in plan.nodes()[idx].output_keys() {
            state
                .slots
                .insert(slot(&name, key), ValueState::Failed(message.clone()));
        }
        state.outcomes[idx] = Some(NodeOutcome::Failed {
            error: message.clone(),
        });
        state.states[idx] = NodeState::Done;

        tracing::error!(%run_id, node = %name, error = %message, "node failed");
        self.event_sink
            .emit(Event::NodeFailed {
                run_id,
                node: name.clone(),
                error: message,
            })
            .await;

        // Every transitive dependent is skipped; nothing else is touched.
        let mut queue: VecDeque<&str> = plan.dependents(&name).iter().map(String::as_str).collect();
        while let Some(dependent) = queue.pop_front() {
            let Some(d) = plan.declaration_index(dependent) else {
                continue;
            };
            if state.states[d] != NodeState::Waiting {
                continue;
            }
            self.skip(
                state,
                run_id,
                d,
                SkipReason::UpstreamFailed { node: name.clone() },
            )
            .await;
            queue.extend(plan.dependents(dependent).iter().map(String::as_str));
        }
    }

    async fn skip(&self, state: &mut RunState<'_>, run_id: Uuid, idx: usize, reason: SkipReason) {
        let name = state.plan.nodes()[idx].name().to_string();
        for key in state.plan.nodes()[idx].output_keys() {
            state
                .slots
                .insert(slot(&name, key), ValueState::Failed(format!("skipped: {reason}")));
        }
        state.states[idx] = NodeState::Done;
        tracing::warn!(%run_id, node = %name, %reason, "node skipped");
        self.event_sink
            .emit(Event::NodeSkipped {
                run_id,
                node: name,
                reason: reason.to_string(),
            })
            .await;
        state.outcomes[idx] = Some(NodeOutcome::Skipped { skip: reason });
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn run_node(node: Node, inputs: BTreeMap<String, Value>, deps: TaskDeps) -> TaskOutcome {
    let prepared = match &node {
        Node::Action(a) => match deps.runner.prepare(a, &inputs) {
            Ok(p) => Some(p),
            Err(e) => return finished_early(e),
        },
        Node::Resource(_) => None,
    };

    // Both permits are held before the deadline check so a node queued on either one is
    // skipped rather than started late.
    let _permit = match deps.limits.acquire().await {
        Ok(p) => p,
        Err(e) => return finished_early(NodeError::Internal(e.to_string())),
    };
    let host = prepared.as_ref().and_then(|p| p.target.host());
    let _host = match deps.limits.acquire_host(host).await {
        Ok(p) => p,
        Err(e) => return finished_early(NodeError::Internal(e.to_string())),
    };
    if deps.deadline.is_some_and(|d| Instant::now() >= d) {
        return TaskOutcome::NotStarted;
    }

    deps.start_log.lock().await.push(node.name().to_string());
    let started_at = Utc::now();
    let clock = Instant::now();
    deps.event_sink
        .emit(Event::NodeStarted {
            run_id: deps.run_id,
            node: node.name().to_string(),
            kind: node.kind(),
        })
        .await;

    let result = match (&node, &prepared) {
        (Node::Resource(r), _) => create_resource(r, &inputs, &deps).await,
        (Node::Action(_), Some(p)) => run_action(p, &deps).await,
        (Node::Action(a), None) => Err(NodeError::Internal(format!(
            "action {} was not prepared",
            a.name
        ))),
    };

    TaskOutcome::Finished {
        started_at,
        finished_at: Utc::now(),
        duration_ms: clock.elapsed().as_millis() as u64,
        result,
    }
}

fn finished_early(error: NodeError) -> TaskOutcome {
    let now = Utc::now();
    TaskOutcome::Finished {
        started_at: now,
        finished_at: now,
        duration_ms: 0,
        result: Err(error),
    }
}

async fn create_resource(
    resource: &ResourceNode,
    inputs: &BTreeMap<String, Value>,
    deps: &TaskDeps,
) -> Result<BTreeMap<String, Value>, NodeError> {
    tracing::info!(node = %resource.name, kind = %resource.kind, "creating resource");
    let mut created = deps
        .provider
        .create(&resource.kind, &resource.name, inputs)
        .await?;

    let mut outputs = BTreeMap::new();
    for key in &resource.outputs {
        let value = created.remove(key).ok_or_else(|| NodeError::MissingOutput {
            node: resource.name.clone(),
            key: key.clone(),
        })?;
        let value = if resource.sensitive_outputs.contains(key) {
            value.mark_sensitive()
        } else {
            value
        };
        outputs.insert(key.clone(), value);
    }
    if !created.is_empty() {
        tracing::debug!(
            node = %resource.name,
            ignored = ?created.keys().collect::<Vec<_>>(),
            "provider returned undeclared outputs"
        );
    }
    Ok(outputs)
}

async fn run_action(
    prepared: &PreparedAction,
    deps: &TaskDeps,
) -> Result<BTreeMap<String, Value>, NodeError> {
    let stdout = deps.runner.invoke(prepared).await?;
    let mut outputs = BTreeMap::new();
    outputs.insert(ActionNode::STDOUT.to_string(), stdout);
    Ok(outputs)
}

fn slot(node: &str, key: &str) -> String {
    format!("{node}.{key}")
}

/// A join handle tagged with the node it runs.
struct NamedHandle {
    idx: usize,
    handle: JoinHandle<TaskOutcome>,
}

impl NamedHandle {
    fn new(idx: usize, handle: JoinHandle<TaskOutcome>) -> Self {
        Self { idx, handle }
    }
}

impl std::future::Future for NamedHandle {
    type Output = (usize, Result<TaskOutcome, tokio::task::JoinError>);

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let idx = self.idx;
        std::pin::Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| (idx, joined))
    }
}

impl<'p> RunState<'p> {
    fn new(plan: &'p Plan) -> Self {
        let n = plan.nodes().len();
        let mut slots = BTreeMap::new();
        for node in plan.nodes() {
            for key in node.output_keys() {
                slots.insert(slot(node.name(), key), ValueState::Pending);
            }
        }
        Self {
            plan,
            states: vec![NodeState::Waiting; n],
            remaining: plan
                .nodes()
                .iter()
                .map(|node| plan.dependencies(node.name()).len())
                .collect(),
            outcomes: vec![None; n],
            timings: vec![(None, None, None); n],
            outputs: vec![BTreeMap::new(); n],
            slots,
            redactor: plan.redactor(),
        }
    }

    fn collect_inputs(&self, idx: usize) -> Result<BTreeMap<String, Value>, NodeError> {
        let node = &self.plan.nodes()[idx];
        let mut inputs = node.static_inputs().clone();
        for edge in self.plan.inbound_edges(node.name()) {
            let value = self
                .slots
                .get(&slot(&edge.producer, &edge.output_key))
                .and_then(ValueState::resolved)
                .ok_or_else(|| NodeError::UnresolvedInput {
                    node: node.name().to_string(),
                    input: edge.input_key.clone(),
                })?;
            inputs.insert(edge.input_key.clone(), value.clone());
        }
        Ok(inputs)
    }

    fn status(&self) -> RunStatus {
        let mut failed = false;
        for outcome in self.outcomes.iter().flatten() {
            match outcome {
                NodeOutcome::Skipped {
                    skip: SkipReason::Timeout,
                } => return RunStatus::TimedOut,
                NodeOutcome::Failed { .. } | NodeOutcome::Skipped { .. } => failed = true,
                NodeOutcome::Created | NodeOutcome::Completed => {}
            }
        }
        if failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    fn exports(&self) -> BTreeMap<String, ExportedValue> {
        self.plan
            .exports()
            .iter()
            .map(|(name, export)| {
                let value = match self.slots.get(&slot(&export.node, &export.key)) {
                    Some(ValueState::Resolved(v)) if export.reveal => {
                        ExportedValue::Value(v.clone().unmark())
                    }
                    Some(ValueState::Resolved(v)) => ExportedValue::Value(v.clone()),
                    Some(ValueState::Failed(reason)) => ExportedValue::Unavailable {
                        reason: reason.clone(),
                    },
                    Some(ValueState::Pending) | None => ExportedValue::Unavailable {
                        reason: "never resolved".to_string(),
                    },
                };
                (name.clone(), value)
            })
            .collect()
    }

    fn into_report(
        self,
        run_id: Uuid,
        status: RunStatus,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        start_order: Vec<String>,
        exports: BTreeMap<String, ExportedValue>,
    ) -> ExecutionReport {
        let nodes = self
            .plan
            .nodes()
            .iter()
            .zip(self.outcomes)
            .zip(self.timings)
            .zip(self.outputs)
            .map(|(((node, outcome), (started, finished, duration)), outputs)| NodeReport {
                name: node.name().to_string(),
                kind: node.kind(),
                outcome: outcome.unwrap_or(NodeOutcome::Failed {
                    error: "node was never scheduled".to_string(),
                }),
                started_at: started,
                finished_at: finished,
                duration_ms: duration,
                outputs,
            })
            .collect();

        ExecutionReport {
            run_id,
            plan: self.plan.name().to_string(),
            status,
            started_at,
            finished_at,
            nodes,
            start_order,
            slots: self.slots,
            exports,
        }
    }
}
