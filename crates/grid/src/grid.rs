//! The multi-level grid and range remapping between its levels.

use crate::{Error, IndexRange, Level, Region, RegionId, Result};
use std::collections::HashMap;
use tracing::debug;

/// Every level of a problem, coarsest first.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    levels: Vec<Level>,
    lookup: HashMap<RegionId, (usize, usize)>,
}

impl Grid {
    /// Assemble a grid from levels ordered coarsest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a region id appears more than once.
    pub fn new(levels: Vec<Level>) -> Result<Self> {
        let mut lookup = HashMap::new();
        for (level_idx, level) in levels.iter().enumerate() {
            for (slot, region) in level.regions().iter().enumerate() {
                if lookup.insert(region.id, (level_idx, slot)).is_some() {
                    return Err(Error::DuplicateRegion { id: region.id });
                }
            }
        }
        debug!(
            levels = levels.len(),
            regions = lookup.len(),
            "Assembled grid"
        );
        Ok(Self { levels, lookup })
    }

    /// Number of levels.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Level by index.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// All levels, coarsest first.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Region by id.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        let &(level, slot) = self.lookup.get(&id)?;
        self.levels.get(level)?.regions().get(slot)
    }

    /// Iterate every region of every level.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.levels.iter().flat_map(Level::regions)
    }

    /// Map `range` from level `from` down to the coarser level `to` through
    /// each intermediate refinement ratio. Returns `None` if either level
    /// does not exist or `to` is finer than `from`.
    #[must_use]
    pub fn coarsen_range(&self, range: &IndexRange, from: usize, to: usize) -> Option<IndexRange> {
        if to > from || from >= self.levels.len() {
            return None;
        }
        let mut mapped = *range;
        for level in self.levels[to + 1..=from].iter().rev() {
            mapped = mapped.coarsen(level.refinement_ratio());
        }
        Some(mapped)
    }

    /// Map `range` from level `from` up to the finer level `to`.
    #[must_use]
    pub fn refine_range(&self, range: &IndexRange, from: usize, to: usize) -> Option<IndexRange> {
        if to < from || to >= self.levels.len() {
            return None;
        }
        let mut mapped = *range;
        for level in &self.levels[from + 1..=to] {
            mapped = mapped.refine(level.refinement_ratio());
        }
        Some(mapped)
    }
}
