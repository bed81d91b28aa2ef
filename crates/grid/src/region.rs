//! Regions: the unit of spatial decomposition and process ownership.

use crate::IndexRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid-wide unique region identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A box of cells on one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Identifier.
    pub id: RegionId,
    /// Index of the owning level.
    pub level: usize,
    /// Cells covered by this region.
    pub range: IndexRange,
}

impl Region {
    /// Create a region.
    #[must_use]
    pub const fn new(id: RegionId, level: usize, range: IndexRange) -> Self {
        Self { id, level, range }
    }
}
