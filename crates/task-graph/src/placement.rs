//! The placement oracle: which process owns which region.
//!
//! Compilation only ever reads from the oracle. Each process builds the part
//! of the graph that touches its neighborhood, and the oracle is what decides
//! what "local" means.

use crate::declaration::RegionSet;
use crate::detailed::DetailedWorkItem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tessera_grid::{Grid, IndexRange, RegionId};

/// Process (rank) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Region ownership and neighborhood queries.
pub trait PlacementOracle {
    /// The compiling process.
    fn local_process(&self) -> ProcessId;

    /// Total number of processes.
    fn num_processes(&self) -> u32;

    /// Processes owning at least one region in the local neighborhood,
    /// including the local process.
    fn neighborhood_processes(&self) -> BTreeSet<ProcessId>;

    /// Owner of a region, `None` if the region is unknown.
    fn region_owner(&self, region: RegionId) -> Option<ProcessId>;

    /// True if `process` owns `region`.
    fn regions_owned_by(&self, region: RegionId, process: ProcessId) -> bool {
        self.region_owner(region) == Some(process)
    }

    /// Members of `regions` that lie in the local neighborhood.
    fn local_neighborhood_subset(&self, regions: &RegionSet) -> RegionSet;

    /// Process that runs `item`: the owner of its first region, or the local
    /// process for items without regions.
    fn assign_process(&self, item: &DetailedWorkItem) -> ProcessId {
        item.regions
            .first()
            .and_then(|&r| self.region_owner(r))
            .unwrap_or_else(|| self.local_process())
    }
}

/// Oracle backed by a fixed ownership table.
#[derive(Debug, Clone)]
pub struct StaticPlacement {
    local: ProcessId,
    num_processes: u32,
    owners: HashMap<RegionId, ProcessId>,
    neighborhood: BTreeSet<RegionId>,
}

impl StaticPlacement {
    /// Oracle whose neighborhood is every region in `owners`.
    #[must_use]
    pub fn new(local: ProcessId, owners: HashMap<RegionId, ProcessId>) -> Self {
        let num_processes = owners
            .values()
            .chain(std::iter::once(&local))
            .map(|p| p.0 + 1)
            .max()
            .unwrap_or(1);
        let neighborhood = owners.keys().copied().collect();
        Self {
            local,
            num_processes,
            owners,
            neighborhood,
        }
    }

    /// Single process owning every region of `grid`.
    #[must_use]
    pub fn serial(grid: &Grid) -> Self {
        let owners = grid.regions().map(|r| (r.id, ProcessId(0))).collect();
        Self::new(ProcessId(0), owners)
    }

    /// Oracle whose neighborhood is the local regions plus every region
    /// within `halo` cells of one of them, on the same level or on adjacent
    /// levels.
    #[must_use]
    pub fn with_halo(
        grid: &Grid,
        local: ProcessId,
        owners: HashMap<RegionId, ProcessId>,
        halo: i32,
    ) -> Self {
        let mut placement = Self::new(local, owners);
        let mut neighborhood = BTreeSet::new();

        for region in grid.regions() {
            if placement.owners.get(&region.id) != Some(&local) {
                continue;
            }
            neighborhood.insert(region.id);

            let reach = region.range.dilate(halo);
            let mut probe = |level: usize, range: IndexRange| {
                if let Some(lvl) = grid.level(level) {
                    let mut ranges = vec![range];
                    ranges.extend(lvl.periodic_shifts().into_iter().map(|s| range.translate(-s)));
                    for r in &ranges {
                        neighborhood.extend(lvl.select_overlapping(r).iter().map(|n| n.id));
                    }
                }
            };

            probe(region.level, reach);
            if region.level > 0
                && let Some(coarse) = grid.coarsen_range(&reach, region.level, region.level - 1)
            {
                probe(region.level - 1, coarse);
            }
            if let Some(fine) = grid.refine_range(&reach, region.level, region.level + 1) {
                probe(region.level + 1, fine);
            }
        }

        placement.neighborhood = neighborhood;
        placement
    }

    /// Override the neighborhood.
    #[must_use]
    pub fn with_neighborhood(mut self, regions: impl IntoIterator<Item = RegionId>) -> Self {
        self.neighborhood = regions.into_iter().collect();
        self
    }

    /// Override the process count.
    #[must_use]
    pub fn with_num_processes(mut self, num_processes: u32) -> Self {
        self.num_processes = num_processes.max(self.num_processes);
        self
    }

    /// True if `region` is in the neighborhood.
    #[must_use]
    pub fn in_neighborhood(&self, region: RegionId) -> bool {
        self.neighborhood.contains(&region)
    }
}

impl PlacementOracle for StaticPlacement {
    fn local_process(&self) -> ProcessId {
        self.local
    }

    fn num_processes(&self) -> u32 {
        self.num_processes
    }

    fn neighborhood_processes(&self) -> BTreeSet<ProcessId> {
        self.neighborhood
            .iter()
            .filter_map(|r| self.owners.get(r).copied())
            .chain(std::iter::once(self.local))
            .collect()
    }

    fn region_owner(&self, region: RegionId) -> Option<ProcessId> {
        self.owners.get(&region).copied()
    }

    fn local_neighborhood_subset(&self, regions: &RegionSet) -> RegionSet {
        regions.iter().filter(|r| self.in_neighborhood(*r)).collect()
    }
}
