//! One graph compilation, from declared units to a resolved graph.

use crate::builder::DetailedGraphBuilder;
use crate::config::CompileConfig;
use crate::detailed::{DetailedGraph, GraphSummary};
use crate::generation::{GenerationMap, GenerationRemapper};
use crate::placement::PlacementOracle;
use crate::resolver::DependencyResolver;
use crate::sorter::sort_units;
use crate::validation::validate_units;
use crate::work_unit::WorkUnit;
use crate::Result;
use tessera_grid::Grid;
use tracing::{info, instrument};

/// Everything one compilation reads. Built fresh for each compilation and
/// dropped afterwards; nothing carries over between compilations.
pub struct GraphCompilation<'a, P: PlacementOracle + ?Sized> {
    grid: &'a Grid,
    oracle: &'a P,
    config: CompileConfig,
}

impl<'a, P: PlacementOracle + ?Sized> GraphCompilation<'a, P> {
    /// Create a compilation context with the default configuration.
    #[must_use]
    pub fn new(grid: &'a Grid, oracle: &'a P) -> Self {
        Self {
            grid,
            oracle,
            config: CompileConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Sort, instantiate and resolve `units`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration or validation error, or any error of
    /// sorting, building or resolution. Nothing partial is returned.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn compile(&self, units: Vec<WorkUnit>) -> Result<CompiledGraph> {
        self.config.validate()?;
        validate_units(&units, self.grid).into_result()?;

        let units = sort_units(units)?;
        let (mut graph, index) = DetailedGraphBuilder::new(self.grid, self.oracle, &self.config).build(&units)?;
        DependencyResolver::new(self.grid, self.oracle, &self.config, &units, &index).resolve(&mut graph)?;

        let summary = graph.summary();
        info!(
            units = units.len(),
            items = summary.unit_items,
            sends = summary.send_items,
            data_edges = summary.data_edges,
            ordering_edges = summary.ordering_edges,
            "Compiled task graph"
        );
        Ok(CompiledGraph { units, graph })
    }

    /// Apply `map` to every unit, then compile.
    ///
    /// # Errors
    ///
    /// See [`compile`](Self::compile).
    pub fn compile_with_generations(&self, mut units: Vec<WorkUnit>, map: &GenerationMap) -> Result<CompiledGraph> {
        GenerationRemapper::new(self.grid, self.config.intermediate).remap(&mut units, map);
        self.compile(units)
    }

    /// Rebind the generation stores of an already compiled graph for its
    /// next execution. Returns true if any unit changed; remapping with an
    /// unchanged map is a no-op.
    pub fn remap_generations(&self, compiled: &mut CompiledGraph, map: &GenerationMap) -> bool {
        GenerationRemapper::new(self.grid, self.config.intermediate).remap(&mut compiled.units, map)
    }
}

/// Result of a compilation: the sorted units and the resolved graph.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    units: Vec<WorkUnit>,
    graph: DetailedGraph,
}

impl CompiledGraph {
    /// Units in sorted order; `UnitId(n)` is the n-th entry.
    #[must_use]
    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// The detailed graph.
    #[must_use]
    pub const fn graph(&self) -> &DetailedGraph {
        &self.graph
    }

    /// Item and edge counts.
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        self.graph.summary()
    }

    /// Split into units and graph.
    #[must_use]
    pub fn into_parts(self) -> (Vec<WorkUnit>, DetailedGraph) {
        (self.units, self.graph)
    }
}
