//! Work units: declarative descriptions of one schedulable operation.

use crate::declaration::{AccessDeclaration, AccessKind, GenerationStore, MaterialSet, RegionSet};
use crate::generation::GenerationMap;
use serde::{Deserialize, Serialize};
use tessera_grid::Grid;

/// How a work unit is instantiated into detailed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementPolicy {
    /// One item per (region, material subset).
    PerRegion,
    /// One item per process in the neighborhood.
    OncePerProcess,
    /// One item per output group.
    OutputOnce,
    /// One global item; ordered by phase across processes.
    Synchronizing,
}

/// Position of a work unit in the sorted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub usize);

/// A schedulable operation and the data it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    name: String,
    policy: PlacementPolicy,
    requires: Vec<AccessDeclaration>,
    modifies: Vec<AccessDeclaration>,
    computes: Vec<AccessDeclaration>,
    regions: Option<RegionSet>,
    materials: Option<MaterialSet>,
    #[serde(default)]
    level: Option<usize>,
    #[serde(default)]
    generations: GenerationMap,
    #[serde(skip)]
    sorted_order: Option<usize>,
    #[serde(skip)]
    phase: Option<u32>,
}

impl WorkUnit {
    /// Create a unit with no accesses and no placement.
    #[must_use]
    pub fn new(name: impl Into<String>, policy: PlacementPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            requires: Vec::new(),
            modifies: Vec::new(),
            computes: Vec::new(),
            regions: None,
            materials: None,
            level: None,
            generations: GenerationMap::default(),
            sorted_order: None,
            phase: None,
        }
    }

    /// Add a read.
    #[must_use]
    pub fn requires(mut self, mut decl: AccessDeclaration) -> Self {
        decl.kind = AccessKind::Requires;
        self.requires.push(decl);
        self
    }

    /// Add an in-place read-then-write.
    #[must_use]
    pub fn modifies(mut self, mut decl: AccessDeclaration) -> Self {
        decl.kind = AccessKind::Modifies;
        self.modifies.push(decl);
        self
    }

    /// Add a write. Computed values always land in the new store.
    #[must_use]
    pub fn computes(mut self, mut decl: AccessDeclaration) -> Self {
        decl.kind = AccessKind::Computes;
        decl.store = GenerationStore::NewStore;
        self.computes.push(decl);
        self
    }

    /// Bind to regions.
    #[must_use]
    pub fn on_regions(mut self, regions: RegionSet) -> Self {
        self.regions = Some(regions);
        self
    }

    /// Bind to materials.
    #[must_use]
    pub fn with_materials(mut self, materials: MaterialSet) -> Self {
        self.materials = Some(materials);
        self
    }

    /// Pin a unit without regions to a level, so its whole-domain reads
    /// cover that level.
    #[must_use]
    pub fn on_level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    /// Unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placement policy.
    #[must_use]
    pub const fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// True for globally ordered units.
    #[must_use]
    pub fn is_synchronizing(&self) -> bool {
        self.policy == PlacementPolicy::Synchronizing
    }

    /// True when the unit is instantiated as one item not tied to regions.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.regions.is_none() || self.is_synchronizing()
    }

    /// Read declarations.
    #[must_use]
    pub fn required(&self) -> &[AccessDeclaration] {
        &self.requires
    }

    /// Modify declarations.
    #[must_use]
    pub fn modified(&self) -> &[AccessDeclaration] {
        &self.modifies
    }

    /// Compute declarations.
    #[must_use]
    pub fn computed(&self) -> &[AccessDeclaration] {
        &self.computes
    }

    /// Requires followed by modifies: everything that consumes a value.
    pub fn consumed(&self) -> impl Iterator<Item = &AccessDeclaration> {
        self.requires.iter().chain(&self.modifies)
    }

    /// Computes followed by modifies: everything that produces a value.
    pub fn produced(&self) -> impl Iterator<Item = &AccessDeclaration> {
        self.computes.iter().chain(&self.modifies)
    }

    /// Bound regions.
    #[must_use]
    pub const fn regions(&self) -> Option<&RegionSet> {
        self.regions.as_ref()
    }

    /// Bound materials.
    #[must_use]
    pub const fn materials(&self) -> Option<&MaterialSet> {
        self.materials.as_ref()
    }

    /// Position in the sorted list, once sorted.
    #[must_use]
    pub const fn sorted_order(&self) -> Option<usize> {
        self.sorted_order
    }

    pub(crate) fn set_sorted_order(&mut self, order: usize) {
        self.sorted_order = Some(order);
    }

    /// Synchronization phase, for synchronizing units once sorted.
    #[must_use]
    pub const fn phase(&self) -> Option<u32> {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Option<u32>) {
        self.phase = phase;
    }

    /// Current generation bindings.
    #[must_use]
    pub const fn generations(&self) -> &GenerationMap {
        &self.generations
    }

    pub(crate) fn set_generations(&mut self, map: GenerationMap) {
        self.generations = map;
    }

    /// True when `store` resolves to the store this unit writes, so its
    /// producer must be found inside the graph.
    #[must_use]
    pub fn is_new_like(&self, store: GenerationStore) -> bool {
        self.generations.get(store) == self.generations.get(GenerationStore::NewStore)
    }

    /// The pinned level, else the level of the first bound region.
    #[must_use]
    pub fn level(&self, grid: &Grid) -> Option<usize> {
        if self.level.is_some() {
            return self.level;
        }
        let first = self.regions.as_ref()?.iter().next()?;
        grid.region(first).map(|r| r.level)
    }
}
