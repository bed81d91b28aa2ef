//! Resolution levels and their spatial region index.

use crate::{Error, IndexRange, IntVector, Region, Result};

/// One resolution level of the grid.
///
/// Regions are kept sorted by their low x corner so that overlap queries can
/// sweep a bounded window instead of scanning the whole level.
#[derive(Debug, Clone)]
pub struct Level {
    index: usize,
    refinement_ratio: IntVector,
    periodic: [bool; 3],
    regions: Vec<Region>,
    domain: IndexRange,
    widest_x: i32,
}

impl Level {
    /// Create a level. `refinement_ratio` is relative to the next coarser
    /// level and is ignored for level 0.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive ratio, empty regions, or regions
    /// recorded against another level.
    pub fn new(
        index: usize,
        refinement_ratio: IntVector,
        periodic: [bool; 3],
        mut regions: Vec<Region>,
    ) -> Result<Self> {
        if !refinement_ratio.is_positive() {
            return Err(Error::InvalidRefinementRatio {
                level: index,
                ratio: refinement_ratio,
            });
        }

        let mut domain = IndexRange::new(IntVector::ZERO, IntVector::ZERO);
        let mut widest_x = 0;
        for region in &regions {
            if region.level != index {
                return Err(Error::LevelMismatch {
                    id: region.id,
                    expected: region.level,
                    actual: index,
                });
            }
            if region.range.is_empty() {
                return Err(Error::EmptyRegion {
                    id: region.id,
                    range: region.range,
                });
            }
            domain = domain.union_hull(&region.range);
            widest_x = widest_x.max(region.range.extent().x);
        }

        regions.sort_by_key(|r| (r.range.low.x, r.id));

        Ok(Self {
            index,
            refinement_ratio,
            periodic,
            regions,
            domain,
            widest_x,
        })
    }

    /// Level index, 0 is the coarsest.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Ratio between this level and the next coarser one.
    #[must_use]
    pub const fn refinement_ratio(&self) -> IntVector {
        self.refinement_ratio
    }

    /// Periodic flag per axis.
    #[must_use]
    pub const fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Bounding box of every region on the level.
    #[must_use]
    pub const fn domain(&self) -> IndexRange {
        self.domain
    }

    /// Regions sorted by low x corner.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// All regions sharing at least one cell with `range`.
    #[must_use]
    pub fn select_overlapping(&self, range: &IndexRange) -> Vec<&Region> {
        if range.is_empty() {
            return Vec::new();
        }
        let window_start = range.low.x.saturating_sub(self.widest_x);
        let first = self
            .regions
            .partition_point(|r| r.range.low.x < window_start);

        self.regions[first..]
            .iter()
            .take_while(|r| r.range.low.x < range.high.x)
            .filter(|r| r.range.overlaps(range))
            .collect()
    }

    /// Every non-zero virtual offset produced by wrapping periodic axes.
    ///
    /// A region translated by one of these offsets is the periodic image that
    /// sits just outside the domain.
    #[must_use]
    pub fn periodic_shifts(&self) -> Vec<IntVector> {
        let extent = self.domain.extent();
        let steps = |axis: usize| -> &'static [i32] {
            if self.periodic[axis] { &[-1, 0, 1] } else { &[0] }
        };

        let mut shifts = Vec::new();
        for &sx in steps(0) {
            for &sy in steps(1) {
                for &sz in steps(2) {
                    let shift = IntVector::new(sx, sy, sz) * extent;
                    if shift != IntVector::ZERO {
                        shifts.push(shift);
                    }
                }
            }
        }
        shifts
    }
}
