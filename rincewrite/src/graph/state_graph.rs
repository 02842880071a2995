//! State graph: nodes + explicit edges (from → to), interrupt points, retry policy.
//!
//! Add nodes with `add_node`, define the flow with `add_edge(from, to)` using
//! `START` and `END` for graph entry/exit, mark pause points with
//! `with_interrupt_before`, then `compile` or `compile_with_checkpointer` to get a
//! `CompiledStateGraph`.
//!
//! Edges may form cycles (e.g. `chat -> user_action -> chat`) as long as every
//! cycle passes through an interrupt point.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use dashmap::DashMap;

use crate::graph::compile_error::CompilationError;
use crate::graph::compiled::CompiledStateGraph;
use crate::graph::node::Node;
use crate::graph::retry::RetryPolicy;
use crate::memory::Checkpointer;

/// Sentinel for graph entry: use as `from_id` in `add_edge(START, first_node_id)`.
pub const START: &str = "__start__";

/// Sentinel for graph exit: use as `to_id` in `add_edge(last_node_id, END)`.
pub const END: &str = "__end__";

/// State graph: nodes plus explicit edges.
///
/// Generic over state type `S`. Build with `add_node` / `add_edge(from, to)`,
/// then `compile()` to obtain an executable graph.
///
/// **Interaction**: Accepts `Arc<dyn Node<S>>`; produces `CompiledStateGraph<S>`.
pub struct StateGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    /// Edges (from_id, to_id). A node may have at most one outgoing edge.
    edges: Vec<(String, String)>,
    /// Nodes the run pauses in front of.
    interrupt_before: HashSet<String>,
    /// Retry policy for node execution. Default is `RetryPolicy::None`.
    retry_policy: RetryPolicy,
    /// Retry policy for checkpoint writes. Default is `RetryPolicy::store_default()`.
    store_retry_policy: RetryPolicy,
}

impl<S> Default for StateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            interrupt_before: HashSet::new(),
            retry_policy: RetryPolicy::None,
            store_retry_policy: RetryPolicy::store_default(),
        }
    }

    /// Pause before running any of `nodes`.
    ///
    /// A run that reaches one of these nodes stops, persists the state with the
    /// node as `next`, and reports `Interrupted`. Resuming starts at that node (or,
    /// with `invoke_with_update`, at its successor).
    pub fn with_interrupt_before<I, T>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.interrupt_before
            .extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Attaches a retry policy for node execution.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use rincewrite::graph::{StateGraph, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let graph = StateGraph::<String>::new()
    ///     .with_retry_policy(RetryPolicy::exponential(
    ///         3,
    ///         Duration::from_millis(100),
    ///         Duration::from_secs(5),
    ///         2.0,
    ///     ));
    /// ```
    pub fn with_retry_policy(self, retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            ..self
        }
    }

    /// Overrides the backoff used when a checkpoint write fails.
    pub fn with_store_retry_policy(self, store_retry_policy: RetryPolicy) -> Self {
        Self {
            store_retry_policy,
            ..self
        }
    }

    /// Adds a node; replaces any node with the same id.
    pub fn add_node(&mut self, id: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        self.nodes.insert(id.into(), node);
        self
    }

    /// Adds an edge from `from_id` to `to_id`.
    ///
    /// Use `START` for graph entry and `END` for graph exit. Both ids (except
    /// START/END) must be registered via `add_node` before `compile()`.
    pub fn add_edge(&mut self, from_id: impl Into<String>, to_id: impl Into<String>) -> &mut Self {
        self.edges.push((from_id.into(), to_id.into()));
        self
    }

    /// Builds the executable graph without persistence.
    pub fn compile(self) -> Result<CompiledStateGraph<S>, CompilationError> {
        self.compile_internal(None)
    }

    /// Builds the executable graph with a checkpointer for persistence (thread_id in config).
    ///
    /// When a call carries `config.thread_id`, a checkpoint is written after every
    /// completed node and at every interrupt.
    pub fn compile_with_checkpointer(
        self,
        checkpointer: Arc<dyn Checkpointer<S>>,
    ) -> Result<CompiledStateGraph<S>, CompilationError> {
        self.compile_internal(Some(checkpointer))
    }

    fn compile_internal(
        self,
        checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    ) -> Result<CompiledStateGraph<S>, CompilationError> {
        for (from, to) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(CompilationError::NodeNotFound(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(CompilationError::NodeNotFound(to.clone()));
            }
        }

        let start_edges: Vec<String> = self
            .edges
            .iter()
            .filter(|(f, _)| f == START)
            .map(|(_, t)| t.clone())
            .collect();
        let first = match start_edges.as_slice() {
            [] => return Err(CompilationError::MissingStart),
            [only] => only.clone(),
            _ => return Err(CompilationError::MultipleStart(start_edges)),
        };
        if first == END {
            return Err(CompilationError::NodeNotFound(END.to_string()));
        }

        let mut next_map: HashMap<String, String> = HashMap::new();
        for (from, to) in self.edges.iter().filter(|(f, _)| f != START) {
            if next_map.insert(from.clone(), to.clone()).is_some() {
                return Err(CompilationError::DuplicateEdge(from.clone()));
            }
        }

        let mut interrupts: Vec<&String> = self.interrupt_before.iter().collect();
        interrupts.sort();
        for id in interrupts {
            if !self.nodes.contains_key(id) {
                return Err(CompilationError::UnknownInterruptNode(id.clone()));
            }
        }

        if let Some(cycle) = find_uninterrupted_cycle(&next_map, &self.interrupt_before) {
            return Err(CompilationError::CycleWithoutInterrupt(cycle));
        }

        Ok(CompiledStateGraph {
            nodes: self.nodes,
            first_node_id: first,
            next_map,
            interrupt_before: self.interrupt_before,
            checkpointer,
            retry_policy: self.retry_policy,
            store_retry_policy: self.store_retry_policy,
            thread_locks: Arc::new(DashMap::new()),
        })
    }
}

/// Walks the single-successor edge map from every node and returns the first
/// cycle that contains no interrupt point, as `[a, b, ..., a]`.
fn find_uninterrupted_cycle(
    next_map: &HashMap<String, String>,
    interrupt_before: &HashSet<String>,
) -> Option<Vec<String>> {
    let mut starts: Vec<&String> = next_map.keys().collect();
    starts.sort();
    let mut done: HashSet<&str> = HashSet::new();

    for start in starts {
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashMap<&str, usize> = HashMap::new();
        let mut current = start.as_str();
        loop {
            if done.contains(current) {
                break;
            }
            if let Some(&pos) = on_path.get(current) {
                let cycle = &path[pos..];
                if !cycle.iter().any(|id| interrupt_before.contains(*id)) {
                    let mut out: Vec<String> = cycle.iter().map(|s| s.to_string()).collect();
                    out.push(current.to_string());
                    return Some(out);
                }
                break;
            }
            on_path.insert(current, path.len());
            path.push(current);
            match next_map.get(current) {
                Some(next) if next != END => current = next.as_str(),
                _ => break,
            }
        }
        done.extend(path);
    }
    None
}
