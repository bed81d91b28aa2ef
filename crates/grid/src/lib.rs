//! Index-space geometry for tessera.
//!
//! This crate describes the spatial side of a task graph: integer cell
//! coordinates, half-open boxes of cells, regions (the unit of process
//! ownership), resolution levels with their spatial region index, and the
//! grid that ties levels together through refinement ratios.
//!
//! # Key Types
//!
//! - [`IndexRange`]: A half-open box of cells with intersection, dilation and
//!   coarsen/refine mapping
//! - [`Level`]: Regions of one resolution, with overlap queries and periodic
//!   images
//! - [`Grid`]: All levels, region lookup and range remapping across levels
//!
//! # Example
//!
//! ```ignore
//! use tessera_grid::{Grid, IndexRange, IntVector, Level, Region, RegionId};
//!
//! let range = IndexRange::new(IntVector::ZERO, IntVector::splat(8));
//! let level = Level::new(0, IntVector::ONE, [false; 3], vec![
//!     Region::new(RegionId(0), 0, range),
//! ])?;
//! let grid = Grid::new(vec![level])?;
//! ```

mod error;
mod grid;
mod index;
mod level;
mod region;

pub use error::{Error, Result};
pub use grid::Grid;
pub use index::{IndexRange, IntVector};
pub use level::Level;
pub use region::{Region, RegionId};
