//! Error types for grid construction.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::{IndexRange, IntVector, RegionId};
use miette::Diagnostic;
use thiserror::Error;

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling levels and grids.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum Error {
    /// Two regions share an id.
    #[error("Region {id} is defined more than once")]
    #[diagnostic(
        code(tessera::grid::duplicate_region),
        help("Region ids must be unique across every level of the grid")
    )]
    DuplicateRegion {
        /// The repeated id.
        id: RegionId,
    },

    /// A region covers no cells.
    #[error("Region {id} has an empty range {range}")]
    #[diagnostic(code(tessera::grid::empty_region))]
    EmptyRegion {
        /// The offending region.
        id: RegionId,
        /// Its range.
        range: IndexRange,
    },

    /// A refinement ratio has a non-positive component.
    #[error("Level {level} has invalid refinement ratio {ratio}")]
    #[diagnostic(
        code(tessera::grid::refinement_ratio),
        help("Every component of a refinement ratio must be at least 1")
    )]
    InvalidRefinementRatio {
        /// Level index.
        level: usize,
        /// The rejected ratio.
        ratio: IntVector,
    },

    /// A region was handed to a level other than the one it names.
    #[error("Region {id} belongs to level {expected} but was added to level {actual}")]
    #[diagnostic(code(tessera::grid::level_mismatch))]
    LevelMismatch {
        /// The region.
        id: RegionId,
        /// Level recorded on the region.
        expected: usize,
        /// Level it was added to.
        actual: usize,
    },
}
