//! Dependency resolution between detailed work items.
//!
//! For every consumed access of every item the resolver works out which
//! regions hold the cells it needs, looks up the nearest preceding producer
//! of each one and adds a [`DependencyEdge`]. Accesses bound to a prior
//! generation are served by synthetic send items, created on first use.

use crate::config::CompileConfig;
use crate::declaration::{
    AccessDeclaration, AccessKind, Domain, GenerationStore, GhostType, MaterialId, RegionSet, VarLabel,
};
use crate::detailed::{DependencyEdge, DetailedGraph, DetailedWorkItem, EdgeCondition, EdgeKind, ItemId, ItemSource};
use crate::placement::PlacementOracle;
use crate::producer_index::{ProducerEntry, ProducerIndex, material_keys};
use crate::work_unit::{PlacementPolicy, UnitId, WorkUnit};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use tessera_grid::{Grid, IndexRange, IntVector, Level, Region, RegionId};
use tracing::{debug, instrument, trace, warn};

/// Name given to synthetic prior-generation send items.
pub const SEND_ITEM_NAME: &str = "send_old_data";

/// One region supplying part of an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Supplying region; `None` for global values.
    pub region: Option<RegionId>,
    /// Cells needed from it, in its own index space.
    pub range: Option<IndexRange>,
    /// Periodic offset of the virtual copy the consumer sees.
    pub offset: IntVector,
}

impl Target {
    const GLOBAL: Self = Self {
        region: None,
        range: None,
        offset: IntVector::ZERO,
    };
}

type ReadKey = (VarLabel, Option<RegionId>, Option<MaterialId>);

#[derive(Debug, Clone, Copy)]
struct Reader {
    item: ItemId,
    unit: Option<UnitId>,
    producer: ItemId,
}

/// Adds dependency edges to a built graph.
pub struct DependencyResolver<'a, P: PlacementOracle + ?Sized> {
    grid: &'a Grid,
    oracle: &'a P,
    config: &'a CompileConfig,
    units: &'a [WorkUnit],
    index: &'a ProducerIndex,
    sends: HashMap<Option<RegionId>, ItemId>,
    readers: HashMap<ReadKey, Vec<Reader>>,
    warned_same_unit: bool,
}

impl<'a, P: PlacementOracle + ?Sized> DependencyResolver<'a, P> {
    /// Create a resolver over sorted `units` and the producers recorded for
    /// their items.
    #[must_use]
    pub fn new(
        grid: &'a Grid,
        oracle: &'a P,
        config: &'a CompileConfig,
        units: &'a [WorkUnit],
        index: &'a ProducerIndex,
    ) -> Self {
        Self {
            grid,
            oracle,
            config,
            units,
            index,
            sends: HashMap::new(),
            readers: HashMap::new(),
            warned_same_unit: false,
        }
    }

    /// Resolve every requires and modifies access of every unit item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedDependency`] when a new-store value has no
    /// producer and is not safely remote, [`Error::LevelOutOfRange`] for
    /// accesses stepping off the grid, and [`Error::UnknownRegion`] for
    /// items bound to regions the grid does not have.
    #[instrument(skip_all, fields(items = graph.unit_items().len()))]
    pub fn resolve(mut self, graph: &mut DetailedGraph) -> Result<()> {
        let units = self.units;
        let items: Vec<ItemId> = graph.unit_items().to_vec();
        for id in items {
            let Some(item) = graph.item(id).cloned() else {
                continue;
            };
            let Some(unit) = item.unit().and_then(|u| units.get(u.0)) else {
                continue;
            };
            for decl in unit.required().iter().chain(unit.modified()) {
                self.resolve_access(graph, id, &item, unit, decl)?;
            }
        }

        debug!(
            edges = graph.edge_count(),
            sends = self.sends.len(),
            "Resolved dependencies"
        );
        Ok(())
    }

    fn resolve_access(
        &mut self,
        graph: &mut DetailedGraph,
        id: ItemId,
        item: &DetailedWorkItem,
        unit: &WorkUnit,
        decl: &AccessDeclaration,
    ) -> Result<()> {
        let targets = self.targets(item, unit, decl)?;
        let materials = material_keys(decl, item);
        trace!(item = %item, access = %decl, targets = targets.len(), "Resolving access");

        for target in &targets {
            for &material in &materials {
                if !unit.is_new_like(decl.store) {
                    self.link_prior_generation(graph, id, item, decl, target, material);
                    continue;
                }

                let producers = self.producers(decl, target, material, item.sorted_order);
                if producers.is_empty() {
                    if self.is_remote(item, target) {
                        trace!(item = %item, label = %decl.label, region = ?target.region, "Skipped remote dependency");
                        continue;
                    }
                    return Err(self.unresolved(graph, item, decl, target, material));
                }

                for producer in producers {
                    if producer.item == id {
                        continue;
                    }
                    graph.add_edge(
                        producer.item,
                        id,
                        edge(decl, target, material, EdgeCondition::Always, EdgeKind::Data),
                    );
                    let key = (decl.label.clone(), target.region, material);
                    if decl.kind == AccessKind::Modifies {
                        self.order_after_readers(graph, id, item, decl, &key, producer.item);
                    } else {
                        self.readers.entry(key).or_default().push(Reader {
                            item: id,
                            unit: item.unit(),
                            producer: producer.item,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn producers(
        &self,
        decl: &AccessDeclaration,
        target: &Target,
        material: Option<MaterialId>,
        order: usize,
    ) -> Vec<ProducerEntry> {
        if decl.label.is_reduction() {
            self.index
                .find_all_producers(&decl.label, None, material, order)
        } else {
            self.index
                .find_producer(&decl.label, target.region, material, order)
                .into_iter()
                .collect()
        }
    }

    /// Serve a prior-generation access from the send item of the target
    /// region. Under iterative reuse an old-store value the graph produces
    /// comes from the send only on the first execution.
    fn link_prior_generation(
        &mut self,
        graph: &mut DetailedGraph,
        id: ItemId,
        item: &DetailedWorkItem,
        decl: &AccessDeclaration,
        target: &Target,
        material: Option<MaterialId>,
    ) {
        let send = self.send_item(graph, target.region);
        let last = if self.config.iterative && decl.store == GenerationStore::OldStore {
            let region = if decl.label.is_reduction() { None } else { target.region };
            self.index
                .find_producer(&decl.label, region, material, usize::MAX)
        } else {
            None
        };

        match last {
            Some(producer) => {
                graph.add_edge(
                    send,
                    id,
                    edge(decl, target, material, EdgeCondition::FirstIterationOnly, EdgeKind::Data),
                );
                // An item reading its own previous output needs no edge.
                if producer.item != id {
                    graph.add_edge(
                        producer.item,
                        id,
                        edge(decl, target, material, EdgeCondition::SubsequentIterationsOnly, EdgeKind::Data),
                    );
                }
                trace!(item = %item, label = %decl.label, "Split old-store access across iterations");
            }
            None => {
                graph.add_edge(
                    send,
                    id,
                    edge(decl, target, material, EdgeCondition::Always, EdgeKind::Data),
                );
            }
        }
    }

    /// Readers of the value a modify overwrites must run before it.
    fn order_after_readers(
        &mut self,
        graph: &mut DetailedGraph,
        id: ItemId,
        item: &DetailedWorkItem,
        decl: &AccessDeclaration,
        key: &ReadKey,
        producer: ItemId,
    ) {
        let Some(readers) = self.readers.get(key) else {
            return;
        };
        let readers: Vec<Reader> = readers
            .iter()
            .copied()
            .filter(|r| r.producer == producer && r.item != id)
            .collect();

        for reader in readers {
            let same_unit = reader.unit.is_some() && reader.unit == item.unit();
            let per_region = item
                .unit()
                .and_then(|u| self.units.get(u.0))
                .is_some_and(|u| u.policy() == PlacementPolicy::PerRegion);
            if same_unit && per_region {
                if self.config.warn_same_unit_modify && !self.warned_same_unit {
                    warn!(
                        unit = %item.name,
                        label = %decl.label,
                        "Work unit modifies a value its own per-region instances read; no ordering is added"
                    );
                    self.warned_same_unit = true;
                }
                continue;
            }
            graph.add_edge(
                reader.item,
                id,
                DependencyEdge {
                    label: decl.label.clone(),
                    store: decl.store,
                    region: key.1,
                    materials: key.2.into_iter().collect(),
                    range: None,
                    virtual_offset: IntVector::ZERO,
                    condition: EdgeCondition::Always,
                    kind: EdgeKind::ModifyOrdering,
                },
            );
        }
    }

    /// The send item of `region`, created on first use.
    fn send_item(&mut self, graph: &mut DetailedGraph, region: Option<RegionId>) -> ItemId {
        if let Some(&id) = self.sends.get(&region) {
            return id;
        }
        let process = region
            .and_then(|r| self.oracle.region_owner(r))
            .unwrap_or_else(|| self.oracle.local_process());
        let id = graph.add_item(DetailedWorkItem {
            source: ItemSource::PriorGenerationSend,
            name: SEND_ITEM_NAME.to_string(),
            regions: region.into_iter().collect(),
            materials: None,
            process,
            sorted_order: 0,
            phase: None,
        });
        self.sends.insert(region, id);
        id
    }

    /// Both ends of a missing dependency belong to other processes.
    fn is_remote(&self, item: &DetailedWorkItem, target: &Target) -> bool {
        let local = self.oracle.local_process();
        let remote_producer = target
            .region
            .and_then(|r| self.oracle.region_owner(r))
            .is_some_and(|p| p != local);
        item.process != local && remote_producer
    }

    fn unresolved(
        &self,
        graph: &DetailedGraph,
        item: &DetailedWorkItem,
        decl: &AccessDeclaration,
        target: &Target,
        material: Option<MaterialId>,
    ) -> Error {
        let region = if decl.label.is_reduction() { None } else { target.region };
        let partial_match = self
            .index
            .find_following(&decl.label, region, material, item.sorted_order)
            .and_then(|e| graph.item(e.item))
            .map(ToString::to_string);
        Error::UnresolvedDependency {
            label: decl.label.name.clone(),
            store: decl.store,
            consumer: item.to_string(),
            region: target.region,
            material,
            partial_match,
        }
    }

    /// Regions supplying the cells `decl` needs on `item`, with the exact
    /// range taken from each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LevelOutOfRange`] or [`Error::UnknownRegion`].
    pub fn targets(&self, item: &DetailedWorkItem, unit: &WorkUnit, decl: &AccessDeclaration) -> Result<Vec<Target>> {
        if decl.label.is_reduction() {
            return Ok(vec![Target::GLOBAL]);
        }

        let bound: Vec<RegionId> = item
            .regions
            .iter()
            .copied()
            .filter(|&r| decl.regions.as_ref().is_none_or(|set: &RegionSet| set.contains(r)))
            .collect();
        if item.regions.is_empty() {
            if decl.domain == Domain::WholeDomain {
                let level = unit.level(self.grid).unwrap_or(0);
                let level = self.grid.level(level).ok_or_else(|| Error::LevelOutOfRange {
                    unit: unit.name().to_string(),
                    level,
                    offset: 0,
                })?;
                return Ok(whole_level(level.regions()));
            }
            if !unit.is_global() {
                return Ok(Vec::new());
            }
            return Ok(vec![Target::GLOBAL]);
        }

        let mut merged: BTreeMap<(RegionId, IntVector), IndexRange> = BTreeMap::new();
        for id in bound {
            let region = self.grid.region(id).ok_or_else(|| Error::UnknownRegion {
                unit: unit.name().to_string(),
                region: id,
            })?;
            for target in self.targets_of(unit, decl, region)? {
                if let (Some(r), Some(range)) = (target.region, target.range) {
                    merged
                        .entry((r, target.offset))
                        .and_modify(|hull| *hull = hull.union_hull(&range))
                        .or_insert(range);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|((region, offset), range)| Target {
                region: Some(region),
                range: Some(range),
                offset,
            })
            .collect())
    }

    fn targets_of(&self, unit: &WorkUnit, decl: &AccessDeclaration, region: &Region) -> Result<Vec<Target>> {
        let offset = decl.domain.level_offset();
        let target_level = i64::try_from(region.level)
            .ok()
            .and_then(|l| l.checked_add(offset))
            .and_then(|l| usize::try_from(l).ok())
            .and_then(|l| self.grid.level(l))
            .ok_or_else(|| Error::LevelOutOfRange {
                unit: unit.name().to_string(),
                level: region.level,
                offset,
            })?;

        if decl.domain == Domain::WholeDomain {
            return Ok(whole_level(target_level.regions()));
        }
        if offset == 0 && !decl.ghost.is_ghosted() {
            return Ok(vec![Target {
                region: Some(region.id),
                range: Some(region.range),
                offset: IntVector::ZERO,
            }]);
        }

        let own = self.grid.level(region.level).map_or(region.range, Level::domain);
        let extent = decl.ghost.extent;
        let needed: Vec<IndexRange> = match decl.ghost.kind {
            GhostType::None => vec![region.range],
            GhostType::CornerAdjacent => vec![region.range.dilate(extent)],
            GhostType::FaceAdjacent => (0..3).map(|axis| region.range.dilate_axis(axis, extent)).collect(),
            GhostType::DomainWide => vec![own],
        };

        let remapped: Vec<IndexRange> = needed
            .iter()
            .filter_map(|range| {
                let to = target_level.index();
                match offset {
                    0 => Some(*range),
                    o if o < 0 => self.grid.coarsen_range(range, region.level, to),
                    _ => self.grid.refine_range(range, region.level, to),
                }
            })
            .collect();

        let mut targets = Vec::new();
        for range in &remapped {
            targets.extend(overlapping(target_level, range, IntVector::ZERO));
            if decl.ghost.is_ghosted() {
                for shift in target_level.periodic_shifts() {
                    targets.extend(overlapping(target_level, &range.translate(-shift), shift));
                }
            }
        }
        Ok(targets)
    }
}

fn whole_level(regions: &[Region]) -> Vec<Target> {
    regions
        .iter()
        .map(|r| Target {
            region: Some(r.id),
            range: Some(r.range),
            offset: IntVector::ZERO,
        })
        .collect()
}

fn overlapping(level: &Level, range: &IndexRange, offset: IntVector) -> Vec<Target> {
    level
        .select_overlapping(range)
        .into_iter()
        .filter_map(|r| {
            range.intersect(&r.range).map(|cells| Target {
                region: Some(r.id),
                range: Some(cells),
                offset,
            })
        })
        .collect()
}

fn edge(
    decl: &AccessDeclaration,
    target: &Target,
    material: Option<MaterialId>,
    condition: EdgeCondition,
    kind: EdgeKind,
) -> DependencyEdge {
    DependencyEdge {
        label: decl.label.clone(),
        store: decl.store,
        region: target.region,
        materials: material.into_iter().collect(),
        range: target.range,
        virtual_offset: target.offset,
        condition,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DetailedGraphBuilder;
    use crate::declaration::MaterialSet;
    use crate::placement::{ProcessId, StaticPlacement};
    use crate::sorter::sort_units;

    fn cube(low: i32, high: i32) -> IndexRange {
        IndexRange::new(IntVector::splat(low), IntVector::splat(high))
    }

    /// Two 4^3 regions side by side along x.
    fn pair(periodic: bool) -> Grid {
        let regions = vec![
            Region::new(RegionId(0), 0, cube(0, 4)),
            Region::new(
                RegionId(1),
                0,
                IndexRange::new(IntVector::new(4, 0, 0), IntVector::new(8, 4, 4)),
            ),
        ];
        let level = Level::new(0, IntVector::ONE, [periodic, false, false], regions).unwrap();
        Grid::new(vec![level]).unwrap()
    }

    fn per_region(name: &str, regions: &[u32]) -> WorkUnit {
        WorkUnit::new(name, PlacementPolicy::PerRegion)
            .on_regions(regions.iter().copied().map(RegionId).collect())
            .with_materials(MaterialSet::single([0]))
    }

    fn compile(grid: &Grid, config: &CompileConfig, units: Vec<WorkUnit>) -> Result<DetailedGraph> {
        let placement = StaticPlacement::serial(grid);
        let sorted = sort_units(units)?;
        let (mut graph, index) = DetailedGraphBuilder::new(grid, &placement, config).build(&sorted)?;
        DependencyResolver::new(grid, &placement, config, &sorted, &index).resolve(&mut graph)?;
        Ok(graph)
    }

    fn edges_named<'g>(graph: &'g DetailedGraph, from: &str, to: &str) -> Vec<&'g DependencyEdge> {
        graph
            .edges()
            .filter(|(p, c, _)| {
                graph.item(*p).is_some_and(|i| i.name == from) && graph.item(*c).is_some_and(|i| i.name == to)
            })
            .map(|(_, _, e)| e)
            .collect()
    }

    #[test]
    fn test_ghost_free_read_covers_own_region() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("b", &[0]).requires(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("a", &[0]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        let edges = edges_named(&graph, "a", "b");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].range, Some(cube(0, 4)));
        assert_eq!(edges[0].condition, EdgeCondition::Always);
        assert_eq!(edges[0].materials, vec![0]);
    }

    #[test]
    fn test_corner_ghost_reaches_neighbor_slab() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("a", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("b", &[0]).requires(
                    AccessDeclaration::new(VarLabel::cell("x")).ghost(GhostType::CornerAdjacent, 1),
                ),
            ],
        )
        .unwrap();

        let mut ranges: Vec<(Option<RegionId>, Option<IndexRange>)> =
            edges_named(&graph, "a", "b").iter().map(|e| (e.region, e.range)).collect();
        ranges.sort_by_key(|(r, _)| *r);
        assert_eq!(
            ranges,
            vec![
                (Some(RegionId(0)), Some(cube(0, 4))),
                (
                    Some(RegionId(1)),
                    Some(IndexRange::new(IntVector::new(4, 0, 0), IntVector::new(5, 4, 4)))
                ),
            ]
        );
    }

    #[test]
    fn test_periodic_neighbor_has_virtual_offset() {
        let grid = pair(true);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("a", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("b", &[0]).requires(
                    AccessDeclaration::new(VarLabel::cell("x")).ghost(GhostType::FaceAdjacent, 1),
                ),
            ],
        )
        .unwrap();

        let wrapped: Vec<&DependencyEdge> = edges_named(&graph, "a", "b")
            .into_iter()
            .filter(|e| e.virtual_offset != IntVector::ZERO)
            .collect();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].region, Some(RegionId(1)));
        assert_eq!(wrapped[0].virtual_offset, IntVector::new(-8, 0, 0));
        assert_eq!(
            wrapped[0].range,
            Some(IndexRange::new(IntVector::new(7, 0, 0), IntVector::new(8, 4, 4)))
        );
    }

    #[test]
    fn test_missing_local_producer_is_fatal() {
        let grid = pair(false);
        let err = compile(
            &grid,
            &CompileConfig::default(),
            vec![per_region("b", &[0]).requires(AccessDeclaration::new(VarLabel::cell("x")))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_remote_consumer_and_producer_are_skipped() {
        let grid = pair(false);
        let owners = [(RegionId(0), ProcessId(1)), (RegionId(1), ProcessId(1))]
            .into_iter()
            .collect();
        let placement = StaticPlacement::new(ProcessId(0), owners);
        let config = CompileConfig::default();
        let sorted =
            sort_units(vec![per_region("b", &[0]).requires(AccessDeclaration::new(VarLabel::cell("x")))])
                .unwrap();
        let (mut graph, index) = DetailedGraphBuilder::new(&grid, &placement, &config)
            .build(&sorted)
            .unwrap();
        DependencyResolver::new(&grid, &placement, &config, &sorted, &index)
            .resolve(&mut graph)
            .unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_old_store_read_uses_one_send_per_region() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("b", &[0, 1]).requires(
                    AccessDeclaration::new(VarLabel::cell("x")).store(GenerationStore::OldStore),
                ),
                per_region("c", &[0]).requires(
                    AccessDeclaration::new(VarLabel::cell("y")).store(GenerationStore::OldStore),
                ),
            ],
        )
        .unwrap();
        assert_eq!(graph.send_items().len(), 2);
        assert_eq!(edges_named(&graph, SEND_ITEM_NAME, "b").len(), 2);
        assert_eq!(edges_named(&graph, SEND_ITEM_NAME, "c").len(), 1);
    }

    #[test]
    fn test_iterative_old_read_splits_edges() {
        let grid = pair(false);
        let config = CompileConfig {
            iterative: true,
            ..CompileConfig::default()
        };
        let graph = compile(
            &grid,
            &config,
            vec![
                per_region("read", &[0]).requires(
                    AccessDeclaration::new(VarLabel::cell("x")).store(GenerationStore::OldStore),
                ),
                per_region("write", &[0]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        let first = edges_named(&graph, SEND_ITEM_NAME, "read");
        let later = edges_named(&graph, "write", "read");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].condition, EdgeCondition::FirstIterationOnly);
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].condition, EdgeCondition::SubsequentIterationsOnly);
    }

    #[test]
    fn test_modify_waits_for_earlier_readers() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("make", &[0]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("read", &[0]).requires(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("bump", &[0]).modifies(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        assert_eq!(edges_named(&graph, "make", "bump").len(), 1);
        let ordering = edges_named(&graph, "read", "bump");
        assert_eq!(ordering.len(), 1);
        assert_eq!(ordering[0].kind, EdgeKind::ModifyOrdering);
    }

    #[test]
    fn test_same_unit_modify_adds_no_ordering() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("make", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("smooth", &[0, 1])
                    .requires(AccessDeclaration::new(VarLabel::cell("x")).ghost(GhostType::CornerAdjacent, 1))
                    .modifies(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();
        assert!(
            graph
                .edges()
                .all(|(_, _, e)| e.kind != EdgeKind::ModifyOrdering)
        );
    }

    #[test]
    fn test_coarser_level_out_of_range() {
        let grid = pair(false);
        let err = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("a", &[0]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("b", &[0]).requires(
                    AccessDeclaration::new(VarLabel::cell("x")).domain(Domain::CoarserLevel { offset: 1 }),
                ),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::LevelOutOfRange { offset: -1, .. }));
    }

    #[test]
    fn test_reduction_collects_every_producer() {
        let grid = pair(false);
        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("partial", &[0, 1]).computes(AccessDeclaration::new(VarLabel::reduction("sum"))),
                WorkUnit::new("total", PlacementPolicy::OncePerProcess)
                    .requires(AccessDeclaration::new(VarLabel::reduction("sum"))),
            ],
        )
        .unwrap();
        let edges = edges_named(&graph, "partial", "total");
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.region.is_none()));
    }

    /// Four 4^3 regions along x owned by P0, P0, P1 and P2, every one in the
    /// neighborhood of P0.
    fn strip_of_four() -> (Grid, StaticPlacement) {
        let regions = (0..4)
            .map(|i| {
                Region::new(
                    RegionId(i as u32),
                    0,
                    IndexRange::new(IntVector::new(4 * i, 0, 0), IntVector::new(4 * i + 4, 4, 4)),
                )
            })
            .collect();
        let grid = Grid::new(vec![Level::new(0, IntVector::ONE, [false; 3], regions).unwrap()]).unwrap();
        let owners = [(0, 0), (1, 0), (2, 1), (3, 2)]
            .into_iter()
            .map(|(r, p)| (RegionId(r), ProcessId(p)))
            .collect();
        let placement = StaticPlacement::with_halo(&grid, ProcessId(0), owners, 16);
        (grid, placement)
    }

    fn once_per_process(name: &str, regions: &[u32]) -> WorkUnit {
        WorkUnit::new(name, PlacementPolicy::OncePerProcess)
            .on_regions(regions.iter().copied().map(RegionId).collect())
            .with_materials(MaterialSet::single([0]))
    }

    fn compile_with(grid: &Grid, placement: &StaticPlacement, units: Vec<WorkUnit>) -> Result<DetailedGraph> {
        let config = CompileConfig::default();
        let sorted = sort_units(units)?;
        let (mut graph, index) = DetailedGraphBuilder::new(grid, placement, &config).build(&sorted)?;
        DependencyResolver::new(grid, placement, &config, &sorted, &index).resolve(&mut graph)?;
        Ok(graph)
    }

    #[test]
    fn test_once_per_process_producer_feeds_region_from_owner() {
        let (grid, placement) = strip_of_four();
        let graph = compile_with(
            &grid,
            &placement,
            vec![
                once_per_process("solve", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                per_region("use", &[0]).requires(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        let producers: Vec<&DetailedWorkItem> = graph
            .edges()
            .filter(|(_, c, _)| graph.item(*c).is_some_and(|i| i.name == "use"))
            .filter_map(|(p, _, _)| graph.item(p))
            .collect();
        assert_eq!(producers.len(), 1);
        assert_eq!(producers[0].process, ProcessId(0));
        assert_eq!(producers[0].regions, vec![RegionId(0), RegionId(1)]);
    }

    #[test]
    fn test_processes_owning_nothing_do_not_clash() {
        let (grid, placement) = strip_of_four();
        let config = CompileConfig::default();
        let sorted = sort_units(vec![
            once_per_process("solve", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
        ])
        .unwrap();
        let (graph, index) = DetailedGraphBuilder::new(&grid, &placement, &config)
            .build(&sorted)
            .unwrap();

        let empty = graph
            .unit_items()
            .iter()
            .filter_map(|&id| graph.item(id))
            .filter(|i| i.regions.is_empty())
            .count();
        assert_eq!(empty, 2);

        let x = VarLabel::cell("x");
        assert!(index.produces(&x, Some(RegionId(0)), Some(0)));
        assert!(index.produces(&x, Some(RegionId(1)), Some(0)));
        assert!(!index.produces(&x, Some(RegionId(2)), Some(0)));
        assert!(!index.produces(&x, None, Some(0)));
    }

    #[test]
    fn test_once_per_process_reader_owning_nothing_reads_nothing() {
        let (grid, placement) = strip_of_four();
        let graph = compile_with(
            &grid,
            &placement,
            vec![
                per_region("make", &[0, 1]).computes(AccessDeclaration::new(VarLabel::cell("x"))),
                once_per_process("solve", &[0, 1]).requires(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        let readers: Vec<ProcessId> = edges_between(&graph, "make", "solve");
        assert_eq!(readers, vec![ProcessId(0), ProcessId(0)]);
    }

    fn edges_between(graph: &DetailedGraph, from: &str, to: &str) -> Vec<ProcessId> {
        graph
            .edges()
            .filter(|(p, _, _)| graph.item(*p).is_some_and(|i| i.name == from))
            .filter_map(|(_, c, _)| graph.item(c).filter(|i| i.name == to))
            .map(|i| i.process)
            .collect()
    }

    #[test]
    fn test_iterative_self_update_reads_send_only_first() {
        let grid = pair(false);
        let config = CompileConfig {
            iterative: true,
            ..CompileConfig::default()
        };
        let graph = compile(
            &grid,
            &config,
            vec![
                per_region("step", &[0])
                    .requires(AccessDeclaration::new(VarLabel::cell("x")).store(GenerationStore::OldStore))
                    .computes(AccessDeclaration::new(VarLabel::cell("x"))),
            ],
        )
        .unwrap();

        let first = edges_named(&graph, SEND_ITEM_NAME, "step");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].condition, EdgeCondition::FirstIterationOnly);
        assert!(edges_named(&graph, "step", "step").is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_region_less_whole_domain_read_follows_unit_level() {
        let coarse = Level::new(0, IntVector::ONE, [false; 3], vec![Region::new(RegionId(0), 0, cube(0, 4))]).unwrap();
        let fine = Level::new(
            1,
            IntVector::splat(2),
            [false; 3],
            vec![
                Region::new(RegionId(1), 1, cube(0, 4)),
                Region::new(
                    RegionId(2),
                    1,
                    IndexRange::new(IntVector::new(4, 0, 0), IntVector::new(8, 4, 4)),
                ),
            ],
        )
        .unwrap();
        let grid = Grid::new(vec![coarse, fine]).unwrap();

        let graph = compile(
            &grid,
            &CompileConfig::default(),
            vec![
                per_region("fine", &[1, 2]).computes(AccessDeclaration::new(VarLabel::cell("phi"))),
                WorkUnit::new("gather", PlacementPolicy::OncePerProcess).on_level(1).requires(
                    AccessDeclaration::new(VarLabel::cell("phi"))
                        .domain(Domain::WholeDomain)
                        .materials([0]),
                ),
            ],
        )
        .unwrap();

        let mut regions: Vec<Option<RegionId>> =
            edges_named(&graph, "fine", "gather").iter().map(|e| e.region).collect();
        regions.sort();
        assert_eq!(regions, vec![Some(RegionId(1)), Some(RegionId(2))]);
    }
}
