//! Generation-store bookkeeping for graphs executed more than once.
//!
//! Each work unit carries a [`GenerationMap`] that says which physical store
//! every logical binding refers to. Re-executing a graph for the next step, or
//! inside a nested graph, only rewrites these maps.

use crate::declaration::GenerationStore;
use crate::work_unit::{PlacementPolicy, WorkUnit};
use serde::{Deserialize, Serialize};
use tessera_grid::Grid;
use tracing::debug;

/// Physical store index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreIndex(pub u32);

/// Physical store for each logical binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationMap {
    stores: [StoreIndex; 6],
}

impl Default for GenerationMap {
    /// Old-like bindings on store 0, new-like bindings on store 1.
    fn default() -> Self {
        let old = StoreIndex(0);
        let new = StoreIndex(1);
        Self {
            stores: [old, new, old, new, old, new],
        }
    }
}

impl GenerationMap {
    /// Physical store of a binding.
    #[must_use]
    pub const fn get(&self, store: GenerationStore) -> StoreIndex {
        self.stores[store.slot()]
    }

    /// Point a binding at a physical store.
    pub fn set(&mut self, store: GenerationStore, index: StoreIndex) {
        self.stores[store.slot()] = index;
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, store: GenerationStore, index: StoreIndex) -> Self {
        self.set(store, index);
        self
    }
}

/// Rewrites every unit's bindings for a new execution of the graph.
pub struct GenerationRemapper<'a> {
    grid: &'a Grid,
    intermediate: bool,
}

impl<'a> GenerationRemapper<'a> {
    /// Create a remapper. `intermediate` marks graphs that run several
    /// finer-level steps per coarse step.
    #[must_use]
    pub const fn new(grid: &'a Grid, intermediate: bool) -> Self {
        Self { grid, intermediate }
    }

    /// Coarsest level touched by a region-bound unit; once-per-process units
    /// span every level and pin it to 0.
    #[must_use]
    pub fn coarsest_active_level(&self, units: &[WorkUnit]) -> Option<usize> {
        units
            .iter()
            .filter_map(|unit| match unit.policy() {
                PlacementPolicy::OncePerProcess => Some(0),
                PlacementPolicy::PerRegion => unit.level(self.grid),
                PlacementPolicy::OutputOnce | PlacementPolicy::Synchronizing => None,
            })
            .min()
    }

    /// Apply `map` to every unit. Returns true if any binding changed.
    ///
    /// In intermediate graphs a unit finer than the coarsest active level
    /// reads its coarse-new data from the same store it writes.
    pub fn remap(&self, units: &mut [WorkUnit], map: &GenerationMap) -> bool {
        let coarsest = self
            .intermediate
            .then(|| self.coarsest_active_level(units))
            .flatten();

        let mut changed = false;
        for unit in units.iter_mut() {
            let mut unit_map = *map;
            if let (Some(coarsest), Some(level)) = (coarsest, unit.level(self.grid))
                && level > coarsest
            {
                unit_map.set(
                    GenerationStore::CoarseNewStore,
                    map.get(GenerationStore::NewStore),
                );
            }
            if *unit.generations() != unit_map {
                debug!(unit = unit.name(), ?unit_map, "Remapped generation stores");
                unit.set_generations(unit_map);
                changed = true;
            }
        }
        changed
    }
}
