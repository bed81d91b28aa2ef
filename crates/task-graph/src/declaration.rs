//! Declarative access model: what each work unit reads, writes and modifies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tessera_grid::RegionId;

/// Identifier of a material (a species or phase carried on the grid).
pub type MaterialId = u32;

/// How the values of a label are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarKind {
    /// Cell-centered field.
    Cell,
    /// Node-centered field.
    Node,
    /// Face-centered field.
    Face,
    /// Global reduction value. Labels of this kind synchronize every
    /// process and may be produced once per region.
    Reduction,
}

/// Name and kind of a data value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarLabel {
    /// Label name, unique per kind.
    pub name: String,
    /// Layout of the values.
    pub kind: VarKind,
}

impl VarLabel {
    /// Create a label.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Cell-centered label.
    #[must_use]
    pub fn cell(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Cell)
    }

    /// Reduction label.
    #[must_use]
    pub fn reduction(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Reduction)
    }

    /// True for synchronizing (reduction) values.
    #[must_use]
    pub fn is_reduction(&self) -> bool {
        self.kind == VarKind::Reduction
    }
}

impl fmt::Display for VarLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Logical generation store an access is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStore {
    /// State at the start of the step.
    OldStore,
    /// State being produced by this graph.
    NewStore,
    /// Old state of the next coarser level.
    CoarseOldStore,
    /// New state of the next coarser level.
    CoarseNewStore,
    /// Old state of the enclosing graph.
    ParentOldStore,
    /// New state of the enclosing graph.
    ParentNewStore,
}

impl GenerationStore {
    /// All bindings, in map slot order.
    pub const ALL: [Self; 6] = [
        Self::OldStore,
        Self::NewStore,
        Self::CoarseOldStore,
        Self::CoarseNewStore,
        Self::ParentOldStore,
        Self::ParentNewStore,
    ];

    /// Slot of this binding in a [`GenerationMap`](crate::GenerationMap).
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::OldStore => 0,
            Self::NewStore => 1,
            Self::CoarseOldStore => 2,
            Self::CoarseNewStore => 3,
            Self::ParentOldStore => 4,
            Self::ParentNewStore => 5,
        }
    }
}

/// Which kind of access a declaration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessKind {
    /// Read.
    Requires,
    /// Read, then write in place.
    Modifies,
    /// Write a fresh value.
    Computes,
}

/// The spatial domain an access refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// The regions the item is bound to.
    #[default]
    RegionBound,
    /// Regions `offset` levels coarser than the item's level.
    CoarserLevel {
        /// Number of levels to step down, at least 1.
        offset: u32,
    },
    /// Regions `offset` levels finer than the item's level.
    FinerLevel {
        /// Number of levels to step up, at least 1.
        offset: u32,
    },
    /// Every region of the level.
    WholeDomain,
}

impl Domain {
    /// Signed level offset: negative for coarser, positive for finer.
    #[must_use]
    pub fn level_offset(self) -> i64 {
        match self {
            Self::CoarserLevel { offset } => -i64::from(offset),
            Self::FinerLevel { offset } => i64::from(offset),
            Self::RegionBound | Self::WholeDomain => 0,
        }
    }
}

/// Shape of the halo read around a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GhostType {
    /// No halo.
    #[default]
    None,
    /// Neighbors sharing a face; edge and corner neighbors are excluded.
    FaceAdjacent,
    /// Every neighbor touching the dilated box.
    CornerAdjacent,
    /// The whole level.
    DomainWide,
}

/// Halo type and width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ghost {
    /// Halo shape.
    pub kind: GhostType,
    /// Width in cells.
    pub extent: i32,
}

impl Ghost {
    /// No halo.
    pub const NONE: Self = Self {
        kind: GhostType::None,
        extent: 0,
    };

    /// Create a halo.
    #[must_use]
    pub const fn new(kind: GhostType, extent: i32) -> Self {
        Self { kind, extent }
    }

    /// True when the halo reaches past the bound region.
    #[must_use]
    pub fn is_ghosted(&self) -> bool {
        match self.kind {
            GhostType::None => false,
            GhostType::DomainWide => true,
            GhostType::FaceAdjacent | GhostType::CornerAdjacent => self.extent > 0,
        }
    }
}

/// Ordered, duplicate-free set of materials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialSubset(BTreeSet<MaterialId>);

impl MaterialSubset {
    /// Build a subset from any list of ids.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = MaterialId>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Materials in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.0.iter().copied()
    }

    /// Number of materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no material is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Partition of materials into subsets; each subset gets its own item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialSet(Vec<MaterialSubset>);

impl MaterialSet {
    /// Build from subsets.
    #[must_use]
    pub fn new(subsets: Vec<MaterialSubset>) -> Self {
        Self(subsets)
    }

    /// One subset holding every given material.
    #[must_use]
    pub fn single(ids: impl IntoIterator<Item = MaterialId>) -> Self {
        Self(vec![MaterialSubset::new(ids)])
    }

    /// The subsets.
    #[must_use]
    pub fn subsets(&self) -> &[MaterialSubset] {
        &self.0
    }
}

/// Ordered, duplicate-free set of regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RegionSet(BTreeSet<RegionId>);

impl RegionSet {
    /// Build a set from any list of ids.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = RegionId>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Regions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.0.iter().copied()
    }

    /// True if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: RegionId) -> bool {
        self.0.contains(&id)
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no region is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RegionId> for RegionSet {
    fn from_iter<I: IntoIterator<Item = RegionId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One read/write relation between a work unit and a data label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDeclaration {
    /// Requires, modifies or computes. Set by the work unit builder.
    pub kind: AccessKind,
    /// The data touched.
    pub label: VarLabel,
    /// Generation store binding.
    pub store: GenerationStore,
    /// Explicit materials, overriding the item's subset.
    pub materials: Option<MaterialSubset>,
    /// Region filter, intersected with the item's regions.
    pub regions: Option<RegionSet>,
    /// Spatial domain of the access.
    pub domain: Domain,
    /// Halo read around each bound region.
    pub ghost: Ghost,
}

impl AccessDeclaration {
    /// An access to `label` on the new store with no halo.
    #[must_use]
    pub fn new(label: VarLabel) -> Self {
        Self {
            kind: AccessKind::Requires,
            label,
            store: GenerationStore::NewStore,
            materials: None,
            regions: None,
            domain: Domain::RegionBound,
            ghost: Ghost::NONE,
        }
    }

    /// Bind to another generation store.
    #[must_use]
    pub fn store(mut self, store: GenerationStore) -> Self {
        self.store = store;
        self
    }

    /// Read a halo.
    #[must_use]
    pub fn ghost(mut self, kind: GhostType, extent: i32) -> Self {
        self.ghost = Ghost::new(kind, extent);
        self
    }

    /// Change the spatial domain.
    #[must_use]
    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Restrict to explicit materials.
    #[must_use]
    pub fn materials(mut self, ids: impl IntoIterator<Item = MaterialId>) -> Self {
        self.materials = Some(MaterialSubset::new(ids));
        self
    }

    /// Restrict to a subset of the item's regions.
    #[must_use]
    pub fn regions(mut self, ids: impl IntoIterator<Item = RegionId>) -> Self {
        self.regions = Some(RegionSet::new(ids));
        self
    }

    /// True if the value is domain-wide rather than per region.
    #[must_use]
    pub fn is_domain_wide(&self) -> bool {
        self.label.is_reduction() || self.domain == Domain::WholeDomain
    }
}

impl fmt::Display for AccessDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} ({:?}", self.kind, self.label, self.store)?;
        if self.domain != Domain::RegionBound {
            write!(f, ", {:?}", self.domain)?;
        }
        if self.ghost.is_ghosted() {
            write!(f, ", {:?} x{}", self.ghost.kind, self.ghost.extent)?;
        }
        f.write_str(")")
    }
}
