//! Expansion of sorted work units into detailed work items.

use crate::config::CompileConfig;
use crate::declaration::{MaterialSubset, RegionSet};
use crate::detailed::{DetailedGraph, DetailedWorkItem, ItemSource};
use crate::placement::{PlacementOracle, ProcessId};
use crate::producer_index::ProducerIndex;
use crate::work_unit::{PlacementPolicy, UnitId, WorkUnit};
use crate::{Error, Result};
use std::collections::BTreeSet;
use tessera_grid::{Grid, RegionId};
use tracing::{debug, instrument};

/// Instantiates work units against the regions and materials they cover.
pub struct DetailedGraphBuilder<'a, P: PlacementOracle + ?Sized> {
    grid: &'a Grid,
    oracle: &'a P,
    config: &'a CompileConfig,
}

impl<'a, P: PlacementOracle + ?Sized> DetailedGraphBuilder<'a, P> {
    /// Create a builder.
    #[must_use]
    pub const fn new(grid: &'a Grid, oracle: &'a P, config: &'a CompileConfig) -> Self {
        Self {
            grid,
            oracle,
            config,
        }
    }

    /// Instantiate every unit of `units`, which must already be sorted, then
    /// record every compute and modify in a fresh producer index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPlacement`] for units binding only one of
    /// regions and materials, [`Error::UnknownRegion`] for regions not on
    /// the grid, and [`Error::DuplicateProducer`] from the producer index.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn build(&self, units: &[WorkUnit]) -> Result<(DetailedGraph, ProducerIndex)> {
        let mut graph = DetailedGraph::new();
        for (idx, unit) in units.iter().enumerate() {
            self.instantiate(UnitId(idx), unit, &mut graph)?;
        }

        let mut index = ProducerIndex::new();
        for &id in graph.unit_items() {
            let Some(item) = graph.item(id) else {
                continue;
            };
            let Some(unit) = item.unit().and_then(|u| units.get(u.0)) else {
                continue;
            };
            // A process owning none of the unit's regions still takes part in
            // domain-wide work but produces nothing region-bound.
            let owns_nothing = !unit.is_global() && item.regions.is_empty();
            for decl in unit.produced() {
                if owns_nothing && !decl.is_domain_wide() {
                    continue;
                }
                index.record(&graph, id, decl)?;
            }
        }

        debug!(
            items = graph.item_count(),
            producer_keys = index.len(),
            "Built detailed graph"
        );
        Ok((graph, index))
    }

    fn instantiate(&self, id: UnitId, unit: &WorkUnit, graph: &mut DetailedGraph) -> Result<()> {
        let (regions, materials) = match (unit.regions(), unit.materials()) {
            (Some(r), Some(m)) => (Some(r), m.subsets()),
            (None, None) => (None, &[][..]),
            (Some(_), None) => {
                return Err(Error::MissingPlacement {
                    unit: unit.name().to_string(),
                    present: "a region set",
                    missing: "a material set",
                });
            }
            (None, Some(_)) => {
                return Err(Error::MissingPlacement {
                    unit: unit.name().to_string(),
                    present: "a material set",
                    missing: "a region set",
                });
            }
        };

        if let Some(regions) = regions {
            for region in regions.iter() {
                if self.grid.region(region).is_none() {
                    return Err(Error::UnknownRegion {
                        unit: unit.name().to_string(),
                        region,
                    });
                }
            }
        }

        let regions = match regions {
            Some(regions) if unit.policy() != PlacementPolicy::Synchronizing => regions,
            _ => {
                let item = self.item(id, unit, Vec::new(), None, None);
                graph.add_item(item);
                return Ok(());
            }
        };

        match unit.policy() {
            PlacementPolicy::PerRegion => {
                let local = self.oracle.local_neighborhood_subset(regions);
                for region in local.iter() {
                    for subset in materials {
                        let item = self.item(id, unit, vec![region], Some(subset.clone()), None);
                        graph.add_item(item);
                    }
                }
            }
            PlacementPolicy::OncePerProcess => {
                for process in self.oracle.neighborhood_processes() {
                    let owned = self.owned_by(regions, |p| p == process);
                    for subset in materials {
                        let item = self.item(id, unit, owned.clone(), Some(subset.clone()), Some(process));
                        graph.add_item(item);
                    }
                }
            }
            PlacementPolicy::OutputOnce => {
                let neighborhood = self.oracle.neighborhood_processes();
                for (output, group) in self.output_groups() {
                    if !neighborhood.contains(&output) {
                        continue;
                    }
                    let owned = self.owned_by(regions, |p| group.contains(&p));
                    if owned.is_empty() {
                        continue;
                    }
                    for subset in materials {
                        let item = self.item(id, unit, owned.clone(), Some(subset.clone()), Some(output));
                        graph.add_item(item);
                    }
                }
            }
            PlacementPolicy::Synchronizing => {}
        }
        Ok(())
    }

    fn item(
        &self,
        id: UnitId,
        unit: &WorkUnit,
        regions: Vec<RegionId>,
        materials: Option<MaterialSubset>,
        process: Option<ProcessId>,
    ) -> DetailedWorkItem {
        let mut item = DetailedWorkItem {
            source: ItemSource::Unit(id),
            name: unit.name().to_string(),
            regions,
            materials,
            process: self.oracle.local_process(),
            sorted_order: unit.sorted_order().unwrap_or(id.0),
            phase: unit.phase(),
        };
        item.process = process.unwrap_or_else(|| self.oracle.assign_process(&item));
        item
    }

    fn owned_by(&self, regions: &RegionSet, owner: impl Fn(ProcessId) -> bool) -> Vec<RegionId> {
        regions
            .iter()
            .filter(|&r| self.oracle.region_owner(r).is_some_and(&owner))
            .collect()
    }

    /// Consecutive blocks of `output_group_size` processes, keyed by the
    /// lowest process of each block.
    fn output_groups(&self) -> Vec<(ProcessId, BTreeSet<ProcessId>)> {
        let size = self.config.output_group_size.max(1);
        let total = self.oracle.num_processes();
        (0..total)
            .step_by(size as usize)
            .map(|first| {
                let members = (first..(first + size).min(total)).map(ProcessId).collect();
                (ProcessId(first), members)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{AccessDeclaration, MaterialSet, VarLabel};
    use crate::placement::StaticPlacement;
    use crate::sorter::sort_units;
    use std::collections::HashMap;
    use tessera_grid::{IndexRange, IntVector, Level, Region};

    /// Four regions along x owned by processes 0,0,1,2.
    fn fixture() -> (Grid, StaticPlacement) {
        let regions = (0..4)
            .map(|i: i32| {
                Region::new(
                    RegionId(i as u32),
                    0,
                    IndexRange::new(IntVector::new(i * 4, 0, 0), IntVector::new(i * 4 + 4, 4, 4)),
                )
            })
            .collect();
        let grid = Grid::new(vec![Level::new(0, IntVector::ONE, [false; 3], regions).unwrap()])
            .unwrap();
        let owners: HashMap<_, _> = [(0, 0), (1, 0), (2, 1), (3, 2)]
            .into_iter()
            .map(|(r, p)| (RegionId(r), ProcessId(p)))
            .collect();
        let placement = StaticPlacement::with_halo(&grid, ProcessId(0), owners, 1);
        (grid, placement)
    }

    fn all_regions() -> RegionSet {
        (0..4).map(RegionId).collect()
    }

    fn build(units: Vec<WorkUnit>, config: &CompileConfig) -> Result<(DetailedGraph, ProducerIndex)> {
        let (grid, placement) = fixture();
        let sorted = sort_units(units)?;
        DetailedGraphBuilder::new(&grid, &placement, config).build(&sorted)
    }

    #[test]
    fn test_per_region_skips_regions_outside_neighborhood() {
        let unit = WorkUnit::new("advect", PlacementPolicy::PerRegion)
            .on_regions(all_regions())
            .with_materials(MaterialSet::new(vec![
                MaterialSubset::new([0]),
                MaterialSubset::new([1, 2]),
            ]));
        let (graph, _) = build(vec![unit], &CompileConfig::default()).unwrap();

        // regions 0, 1, 2 are in the neighborhood; 3 is not
        assert_eq!(graph.unit_items().len(), 6);
        let processes: Vec<u32> = graph
            .unit_items()
            .iter()
            .filter_map(|&id| graph.item(id))
            .map(|i| i.process.0)
            .collect();
        assert_eq!(processes, vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_once_per_process_covers_each_neighbor() {
        let unit = WorkUnit::new("solve", PlacementPolicy::OncePerProcess)
            .on_regions(all_regions())
            .with_materials(MaterialSet::single([0]));
        let (graph, _) = build(vec![unit], &CompileConfig::default()).unwrap();

        let items: Vec<&DetailedWorkItem> =
            graph.unit_items().iter().filter_map(|&id| graph.item(id)).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].process, ProcessId(0));
        assert_eq!(items[0].regions, vec![RegionId(0), RegionId(1)]);
        assert_eq!(items[1].process, ProcessId(1));
        assert_eq!(items[1].regions, vec![RegionId(2)]);
    }

    #[test]
    fn test_output_once_per_group() {
        let unit = WorkUnit::new("output", PlacementPolicy::OutputOnce)
            .on_regions(all_regions())
            .with_materials(MaterialSet::single([0]));
        let config = CompileConfig {
            output_group_size: 2,
            ..CompileConfig::default()
        };
        let (graph, _) = build(vec![unit], &config).unwrap();

        // groups {0,1} -> P0 and {2} -> P2; P2 is outside the neighborhood
        let items: Vec<&DetailedWorkItem> =
            graph.unit_items().iter().filter_map(|&id| graph.item(id)).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].process, ProcessId(0));
        assert_eq!(items[0].regions, vec![RegionId(0), RegionId(1), RegionId(2)]);
    }

    #[test]
    fn test_output_once_skips_empty_groups() {
        let unit = WorkUnit::new("output", PlacementPolicy::OutputOnce)
            .on_regions(RegionSet::new([RegionId(2)]))
            .with_materials(MaterialSet::single([0]));
        let (graph, _) = build(vec![unit], &CompileConfig::default()).unwrap();

        // one group per process; only P1 owns region 2
        let items: Vec<&DetailedWorkItem> =
            graph.unit_items().iter().filter_map(|&id| graph.item(id)).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].process, ProcessId(1));
    }

    #[test]
    fn test_synchronizing_is_global() {
        let unit = WorkUnit::new("reduce", PlacementPolicy::Synchronizing)
            .on_regions(all_regions())
            .with_materials(MaterialSet::single([0]))
            .computes(AccessDeclaration::new(VarLabel::reduction("dt")));
        let (graph, index) = build(vec![unit], &CompileConfig::default()).unwrap();
        assert_eq!(graph.unit_items().len(), 1);
        let item = graph.item(graph.unit_items()[0]).unwrap();
        assert!(item.regions.is_empty());
        assert!(item.materials.is_none());
        assert_eq!(item.phase, Some(0));
        assert!(index.produces(&VarLabel::reduction("dt"), None, None));
    }

    #[test]
    fn test_unplaced_unit_runs_once() {
        let unit = WorkUnit::new("setup", PlacementPolicy::PerRegion);
        let (graph, _) = build(vec![unit], &CompileConfig::default()).unwrap();
        assert_eq!(graph.unit_items().len(), 1);
    }

    #[test]
    fn test_regions_without_materials_is_fatal() {
        let unit = WorkUnit::new("broken", PlacementPolicy::PerRegion).on_regions(all_regions());
        let err = build(vec![unit], &CompileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingPlacement { .. }));

        let unit = WorkUnit::new("broken", PlacementPolicy::PerRegion)
            .with_materials(MaterialSet::single([0]));
        let err = build(vec![unit], &CompileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("a material set without a region set"));
    }

    #[test]
    fn test_unknown_region_is_fatal() {
        let unit = WorkUnit::new("stray", PlacementPolicy::PerRegion)
            .on_regions(RegionSet::new([RegionId(42)]))
            .with_materials(MaterialSet::single([0]));
        let err = build(vec![unit], &CompileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownRegion { region: RegionId(42), .. }));
    }

    #[test]
    fn test_duplicate_computes_detected_while_recording() {
        let make = |name: &str| {
            WorkUnit::new(name, PlacementPolicy::PerRegion)
                .on_regions(all_regions())
                .with_materials(MaterialSet::single([0]))
                .computes(AccessDeclaration::new(VarLabel::cell("x")))
        };
        let err = build(vec![make("c"), make("d")], &CompileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateProducer { .. }));
    }
}
