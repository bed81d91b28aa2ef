//! Task graph compilation for region-decomposed simulations.
//!
//! Work units declare the data they require, modify and compute. Compiling
//! them produces a serial order, one detailed work item per region and
//! material subset, and the producer-to-consumer edges between items,
//! including halo exchanges, coarse/fine transfers and prior-generation
//! reads.
//!
//! # Key Types
//!
//! - [`WorkUnit`]: a schedulable operation and its [`AccessDeclaration`]s
//! - [`GraphCompilation`]: one compilation against a grid and a [`PlacementOracle`]
//! - [`CompiledGraph`] / [`DetailedGraph`]: the resolved items and edges
//!
//! # Example
//!
//! ```ignore
//! use tessera_task_graph::{
//!     AccessDeclaration, GhostType, GraphCompilation, MaterialSet, PlacementPolicy, StaticPlacement,
//!     VarLabel, WorkUnit,
//! };
//!
//! let regions = grid.regions().map(|r| r.id).collect();
//! let units = vec![
//!     WorkUnit::new("advect", PlacementPolicy::PerRegion)
//!         .on_regions(regions)
//!         .with_materials(MaterialSet::single([0]))
//!         .requires(AccessDeclaration::new(VarLabel::cell("u")).ghost(GhostType::FaceAdjacent, 1))
//!         .computes(AccessDeclaration::new(VarLabel::cell("u_next"))),
//! ];
//!
//! let placement = StaticPlacement::serial(&grid);
//! let compiled = GraphCompilation::new(&grid, &placement).compile(units)?;
//! for group in compiled.graph().parallel_groups() {
//!     // hand each wavefront to the executor
//! }
//! ```

mod builder;
mod compilation;
mod config;
mod declaration;
mod detailed;
mod error;
mod generation;
mod placement;
mod producer_index;
mod resolver;
mod sorter;
mod traversal;
mod validation;
mod work_unit;

pub use builder::DetailedGraphBuilder;
pub use compilation::{CompiledGraph, GraphCompilation};
pub use config::CompileConfig;
pub use declaration::{
    AccessDeclaration, AccessKind, Domain, GenerationStore, Ghost, GhostType, MaterialId,
    MaterialSet, MaterialSubset, RegionSet, VarKind, VarLabel,
};
pub use detailed::{
    DependencyEdge, DetailedGraph, DetailedWorkItem, EdgeCondition, EdgeKind, GraphSummary,
    ItemId, ItemSource, ScrubKey,
};
pub use error::{Error, Result};
pub use generation::{GenerationMap, GenerationRemapper, StoreIndex};
pub use placement::{PlacementOracle, ProcessId, StaticPlacement};
pub use producer_index::{ProducerEntry, ProducerIndex};
pub use resolver::{DependencyResolver, SEND_ITEM_NAME, Target};
pub use sorter::{TopologicalSorter, sort_units};
pub use traversal::{ExecutionOrder, ParallelGroups};
pub use validation::{ValidationResult, validate_units};
pub use work_unit::{PlacementPolicy, UnitId, WorkUnit};

pub use tessera_grid as grid;
