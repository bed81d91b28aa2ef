//! The compiled graph: detailed work items and the edges between them.
//!
//! Items live in a petgraph arena; their [`ItemId`]s stay valid for the
//! lifetime of one compilation and are discarded with it.

use crate::declaration::{GenerationStore, MaterialId, MaterialSubset, VarLabel};
use crate::placement::ProcessId;
use crate::traversal::{ExecutionOrder, ParallelGroups};
use crate::work_unit::UnitId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tessera_grid::{IndexRange, IntVector, RegionId};
use tracing::debug;

/// Identifier of a detailed work item.
pub type ItemId = NodeIndex;

/// Where a detailed item comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    /// Instantiated from a work unit.
    Unit(UnitId),
    /// Synthetic producer of prior-generation data for one region (or of a
    /// global value when the item has no region).
    PriorGenerationSend,
}

/// A work unit instantiated on concrete regions and materials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedWorkItem {
    /// Origin of the item.
    pub source: ItemSource,
    /// Name of the originating unit.
    pub name: String,
    /// Bound regions; empty for global items.
    pub regions: Vec<RegionId>,
    /// Bound materials; `None` for global items.
    pub materials: Option<MaterialSubset>,
    /// Process that runs the item.
    pub process: ProcessId,
    /// Sorted order of the originating unit.
    pub sorted_order: usize,
    /// Synchronization phase of the originating unit.
    pub phase: Option<u32>,
}

impl DetailedWorkItem {
    /// The originating unit, if the item is not synthetic.
    #[must_use]
    pub const fn unit(&self) -> Option<UnitId> {
        match self.source {
            ItemSource::Unit(id) => Some(id),
            ItemSource::PriorGenerationSend => None,
        }
    }
}

impl fmt::Display for DetailedWorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.regions.is_empty() {
            let regions: Vec<String> = self.regions.iter().map(ToString::to_string).collect();
            write!(f, "@{}", regions.join(","))?;
        }
        if let Some(materials) = &self.materials {
            let ids: Vec<String> = materials.iter().map(|m| m.to_string()).collect();
            write!(f, " m[{}]", ids.join(","))?;
        }
        write!(f, " on {} (order {})", self.process, self.sorted_order)
    }
}

/// When an edge applies across repeated executions of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeCondition {
    /// Every execution.
    Always,
    /// Only the first execution.
    FirstIterationOnly,
    /// Every execution after the first.
    SubsequentIterationsOnly,
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// The consumer reads data written by the producer.
    Data,
    /// The consumer modifies a value the producer reads; the read must
    /// finish first.
    ModifyOrdering,
}

/// Producer-to-consumer edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Transferred label.
    pub label: VarLabel,
    /// Binding of the consuming access.
    pub store: GenerationStore,
    /// Producing region, `None` for domain-wide values.
    pub region: Option<RegionId>,
    /// Transferred materials; empty for global values.
    pub materials: Vec<MaterialId>,
    /// Cells to transfer, in the producer's index space.
    pub range: Option<IndexRange>,
    /// Periodic offset of the virtual neighbor the consumer sees.
    pub virtual_offset: IntVector,
    /// Iteration condition.
    pub condition: EdgeCondition,
    /// Edge kind.
    pub kind: EdgeKind,
}

impl DependencyEdge {
    fn same_transfer(&self, other: &Self) -> bool {
        self.label == other.label
            && self.store == other.store
            && self.region == other.region
            && self.range == other.range
            && self.virtual_offset == other.virtual_offset
            && self.condition == other.condition
            && self.kind == other.kind
    }
}

/// Key identifying one stored value for scrub counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScrubKey {
    /// Label.
    pub label: VarLabel,
    /// Store binding the consumers read.
    pub store: GenerationStore,
    /// Producing region.
    pub region: Option<RegionId>,
    /// Material.
    pub material: Option<MaterialId>,
}

/// Counts describing a compiled graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    /// Items instantiated from units.
    pub unit_items: usize,
    /// Synthetic prior-generation send items.
    pub send_items: usize,
    /// Data edges.
    pub data_edges: usize,
    /// Modify ordering edges.
    pub ordering_edges: usize,
    /// Edges restricted to the first execution.
    pub first_iteration_edges: usize,
    /// Edges restricted to later executions.
    pub subsequent_iteration_edges: usize,
}

/// Detailed items and dependency edges of one compilation.
#[derive(Debug, Clone, Default)]
pub struct DetailedGraph {
    graph: DiGraph<DetailedWorkItem, DependencyEdge>,
    unit_items: Vec<ItemId>,
    send_items: Vec<ItemId>,
}

impl DetailedGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Unit items must be added in sorted order.
    pub fn add_item(&mut self, item: DetailedWorkItem) -> ItemId {
        let is_send = item.source == ItemSource::PriorGenerationSend;
        debug!(item = %item, "Added detailed item");
        let id = self.graph.add_node(item);
        if is_send {
            self.send_items.push(id);
        } else {
            self.unit_items.push(id);
        }
        id
    }

    /// Add an edge, merging materials into an existing edge carrying the
    /// same transfer between the same pair of items.
    pub fn add_edge(&mut self, producer: ItemId, consumer: ItemId, edge: DependencyEdge) -> EdgeIndex {
        let existing = self
            .graph
            .edges_connecting(producer, consumer)
            .find(|e| e.weight().same_transfer(&edge))
            .map(|e| e.id());

        if let Some(index) = existing {
            if let Some(weight) = self.graph.edge_weight_mut(index) {
                for m in edge.materials {
                    if !weight.materials.contains(&m) {
                        weight.materials.push(m);
                    }
                }
                weight.materials.sort_unstable();
            }
            return index;
        }

        debug!(
            label = %edge.label,
            producer = %self.graph[producer],
            consumer = %self.graph[consumer],
            condition = ?edge.condition,
            kind = ?edge.kind,
            "Added dependency edge"
        );
        self.graph.add_edge(producer, consumer, edge)
    }

    /// Item by id.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&DetailedWorkItem> {
        self.graph.node_weight(id)
    }

    /// Unit items in sorted order.
    #[must_use]
    pub fn unit_items(&self) -> &[ItemId] {
        &self.unit_items
    }

    /// Synthetic send items in creation order.
    #[must_use]
    pub fn send_items(&self) -> &[ItemId] {
        &self.send_items
    }

    /// Sends first, then unit items in sorted order.
    #[must_use]
    pub fn execution_order(&self) -> ExecutionOrder {
        self.send_items
            .iter()
            .chain(&self.unit_items)
            .copied()
            .collect()
    }

    /// Every item of the given unit.
    pub fn items_of(&self, unit: UnitId) -> impl Iterator<Item = (ItemId, &DetailedWorkItem)> {
        self.unit_items
            .iter()
            .map(|&id| (id, &self.graph[id]))
            .filter(move |(_, item)| item.unit() == Some(unit))
    }

    /// Number of items including sends.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every edge as (producer, consumer, edge).
    pub fn edges(&self) -> impl Iterator<Item = (ItemId, ItemId, &DependencyEdge)> {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    /// Edges into `id` as (producer, edge).
    pub fn incoming(&self, id: ItemId) -> impl Iterator<Item = (ItemId, &DependencyEdge)> {
        self.graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
    }

    /// Edges out of `id` as (consumer, edge).
    pub fn outgoing(&self, id: ItemId) -> impl Iterator<Item = (ItemId, &DependencyEdge)> {
        self.graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
    }

    /// Wavefronts of items with no dependencies between them, as seen by the
    /// first execution. Every item of group N depends only on items of
    /// earlier groups.
    #[must_use]
    pub fn parallel_groups(&self) -> ParallelGroups {
        let applies = |e: &DependencyEdge| e.condition != EdgeCondition::SubsequentIterationsOnly;

        let mut level: HashMap<ItemId, usize> = HashMap::new();
        let mut pending: HashMap<ItemId, usize> = self
            .graph
            .node_indices()
            .map(|id| {
                let deps = self
                    .graph
                    .edges_directed(id, Direction::Incoming)
                    .filter(|e| applies(e.weight()))
                    .count();
                (id, deps)
            })
            .collect();

        let mut ready: Vec<ItemId> = self
            .execution_order()
            .into_iter()
            .filter(|id| pending.get(id) == Some(&0))
            .collect();
        let mut groups: ParallelGroups = Vec::new();

        while let Some(id) = ready.pop() {
            let depth = level.get(&id).copied().unwrap_or(0);
            if depth >= groups.len() {
                groups.resize(depth + 1, Vec::new());
            }
            groups[depth].push(id);

            for edge in self.graph.edges_directed(id, Direction::Outgoing) {
                if !applies(edge.weight()) {
                    continue;
                }
                let target = edge.target();
                let entry = level.entry(target).or_insert(0);
                *entry = (*entry).max(depth + 1);
                if let Some(count) = pending.get_mut(&target) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(target);
                    }
                }
            }
        }

        for group in &mut groups {
            group.sort_unstable();
        }
        groups
    }

    /// Number of consuming data edges per stored value.
    #[must_use]
    pub fn scrub_counts(&self) -> HashMap<ScrubKey, usize> {
        let mut counts = HashMap::new();
        for (_, _, edge) in self.edges() {
            if edge.kind != EdgeKind::Data {
                continue;
            }
            let materials: Vec<Option<MaterialId>> = if edge.materials.is_empty() {
                vec![None]
            } else {
                edge.materials.iter().copied().map(Some).collect()
            };
            for material in materials {
                let key = ScrubKey {
                    label: edge.label.clone(),
                    store: edge.store,
                    region: edge.region,
                    material,
                };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Item and edge counts.
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            unit_items: self.unit_items.len(),
            send_items: self.send_items.len(),
            ..GraphSummary::default()
        };
        for (_, _, edge) in self.edges() {
            match edge.kind {
                EdgeKind::Data => summary.data_edges += 1,
                EdgeKind::ModifyOrdering => summary.ordering_edges += 1,
            }
            match edge.condition {
                EdgeCondition::Always => {}
                EdgeCondition::FirstIterationOnly => summary.first_iteration_edges += 1,
                EdgeCondition::SubsequentIterationsOnly => summary.subsequent_iteration_edges += 1,
            }
        }
        summary
    }
}
