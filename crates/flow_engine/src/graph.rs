//! Node table and control-plane entry points.
//!
//! The graph owns its nodes (in a `Slab` keyed by `NodeId`), the engine
//! configuration and the processing sequence shared by its nodes. Topology
//! is fixed during build; afterwards the graph is driven by applying
//! visitors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{ArmState, ChannelName, EngineConfig, EngineError, GroupId};
use slab::Slab;
use tracing::{debug, instrument, warn};

use crate::channel::AnyChannel;
use crate::node::{Filter, FilterNode, InputInfo, NodeId, NodeSettings};
use crate::visitor::{GraphOp, Visitor};

/// Graph-wide processing order counter.
///
/// Each node draws one value the first time it completes a frame while debug
/// timings are on, which shows the order nodes actually ran in.
#[derive(Debug, Default)]
pub struct ProcessingSequence(AtomicU64);

impl ProcessingSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index, starting at 0
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// A built processing graph
pub struct Graph {
    config: EngineConfig,
    settings: NodeSettings,
    nodes: Slab<Arc<FilterNode>>,
    sequence: Arc<ProcessingSequence>,
    graph_index: u32,
}

impl Graph {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_index(config, 0)
    }

    /// Graph with an explicit index, used in node names when several graphs run side by side
    pub fn with_index(config: EngineConfig, graph_index: u32) -> Self {
        Self {
            settings: NodeSettings::from(&config),
            config,
            nodes: Slab::new(),
            sequence: Arc::new(ProcessingSequence::new()),
            graph_index,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sequence(&self) -> &Arc<ProcessingSequence> {
        &self.sequence
    }

    pub fn graph_index(&self) -> u32 {
        self.graph_index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Instantiate `filter` as a new node
    pub fn add_node(&mut self, filter: impl Filter) -> Result<NodeId, EngineError> {
        self.add_boxed(Box::new(filter))
    }

    #[instrument(
        level = "debug",
        name = "graph_add_node",
        skip(self, filter),
        fields(type_name = filter.type_name())
    )]
    pub fn add_boxed(&mut self, filter: Box<dyn Filter>) -> Result<NodeId, EngineError> {
        let node = FilterNode::new(filter, self.settings.clone(), self.sequence.clone())?;
        let entry = self.nodes.vacant_entry();
        let id = NodeId(entry.key());
        node.bind(id);
        node.set_graph_index(self.graph_index);
        entry.insert(node);
        metrics::gauge!("flow_graph_nodes", "graph" => self.graph_index.to_string())
            .set(self.nodes.len() as f64);
        debug!(node = %id, "node added");
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Arc<FilterNode>, EngineError> {
        self.nodes.get(id.0).ok_or(EngineError::UnknownNode(id.0))
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Arc<FilterNode>)> {
        self.nodes.iter().map(|(key, node)| (NodeId(key), node))
    }

    /// Output channel `output` of node `from`
    pub fn channel(&self, from: NodeId, output: &str) -> Result<Arc<dyn AnyChannel>, EngineError> {
        self.node(from)?.output(output)
    }

    /// Wire output `output` of `from` into `to` under `group`
    #[instrument(
        level = "debug",
        name = "graph_connect",
        skip(self),
        fields(from = %from, to = %to, group = %group)
    )]
    pub fn connect(
        &self,
        from: NodeId,
        output: &str,
        to: NodeId,
        group: GroupId,
    ) -> Result<(), EngineError> {
        let channel = self.channel(from, output)?;
        let target = self.node(to)?;
        target.connect(channel, group).inspect_err(|e| {
            warn!(error = %e, "connect failed");
        })
    }

    pub fn inputs_of(&self, id: NodeId) -> Result<Vec<InputInfo>, EngineError> {
        Ok(self.node(id)?.inputs())
    }

    pub fn outputs_of(&self, id: NodeId) -> Result<Vec<ChannelName>, EngineError> {
        Ok(self.node(id)?.outputs())
    }

    /// Upstream-first order (Kahn). Nodes on a cycle follow in insertion order.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let capacity = self.nodes.capacity();
        let mut indegree = vec![0usize; capacity];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); capacity];

        for (key, node) in self.nodes.iter() {
            for input in node.inputs() {
                if let Some(owner) = input.owner {
                    if self.nodes.contains(owner.0) {
                        downstream[owner.0].push(key);
                        indegree[key] += 1;
                    }
                }
            }
        }

        let mut ready: VecDeque<usize> = self
            .nodes
            .iter()
            .filter(|(key, _)| indegree[*key] == 0)
            .map(|(key, _)| key)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut placed = vec![false; capacity];

        while let Some(key) = ready.pop_front() {
            placed[key] = true;
            order.push(NodeId(key));
            for &next in &downstream[key] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < self.nodes.len() {
            warn!(
                placed = order.len(),
                total = self.nodes.len(),
                "graph has a cycle, remaining nodes appended in insertion order"
            );
            order.extend(
                self.nodes
                    .iter()
                    .filter(|(key, _)| !placed[*key])
                    .map(|(key, _)| NodeId(key)),
            );
        }
        order
    }

    /// Visit every node in insertion order
    #[instrument(level = "trace", name = "graph_apply", skip_all)]
    pub fn apply(&self, visitor: &mut dyn Visitor) {
        for node in self.nodes.iter().map(|(_, node)| node) {
            visitor.visit(node);
        }
    }

    /// Visit the given nodes in the given order
    pub fn apply_in_order(&self, visitor: &mut dyn Visitor, order: &[NodeId]) -> Result<(), EngineError> {
        for &id in order {
            visitor.visit(self.node(id)?);
        }
        Ok(())
    }

    /// Arm every node; starting a cycle or series also restarts the processing sequence
    pub fn arm(&self, state: ArmState) {
        if state.restarts_frames() {
            self.sequence.reset();
        }
        metrics::counter!("flow_graph_arm_total", "state" => format!("{state:?}")).increment(1);
        self.apply(&mut GraphOp::Arm(state));
    }

    /// Dispose every node, downstream first
    pub fn dispose(&self) {
        let mut order = self.topological_order();
        order.reverse();
        // Ids come from our own table, lookups cannot fail.
        let _ = self.apply_in_order(&mut GraphOp::Dispose, &order);
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("graph_index", &self.graph_index)
            .field("nodes", &self.nodes.len())
            .field("ring_depth", &self.config.ring_depth)
            .finish()
    }
}
