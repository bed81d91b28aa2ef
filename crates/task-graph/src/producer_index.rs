//! Index of every detailed item that produces a value.
//!
//! Keys are (label, region, material). Domain-wide and reduction values are
//! keyed with no region and are visible from every region of the level.
//! Buckets are small, so lookups scan them linearly for the nearest
//! preceding producer.

use crate::declaration::{AccessDeclaration, AccessKind, MaterialId, VarLabel};
use crate::detailed::{DetailedGraph, DetailedWorkItem, ItemId};
use crate::{Error, Result};
use std::collections::HashMap;
use tessera_grid::RegionId;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProducerKey {
    label: VarLabel,
    region: Option<RegionId>,
    material: Option<MaterialId>,
}

/// One recorded production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerEntry {
    /// Producing item.
    pub item: ItemId,
    /// Sorted order of the producing unit.
    pub order: usize,
    /// Computes or modifies.
    pub kind: AccessKind,
}

/// Producers keyed by (label, region, material).
#[derive(Debug, Clone, Default)]
pub struct ProducerIndex {
    entries: HashMap<ProducerKey, Vec<ProducerEntry>>,
}

impl ProducerIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `item` produces the value described by `decl`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateProducer`] when a second unit computes a
    /// non-reduction label on the same key.
    pub fn record(&mut self, graph: &DetailedGraph, item: ItemId, decl: &AccessDeclaration) -> Result<()> {
        let Some(producer) = graph.item(item) else {
            return Ok(());
        };

        let regions: Vec<Option<RegionId>> = if decl.is_domain_wide() || producer.regions.is_empty() {
            vec![None]
        } else {
            producer
                .regions
                .iter()
                .copied()
                .filter(|r| decl.regions.as_ref().is_none_or(|set| set.contains(*r)))
                .map(Some)
                .collect()
        };
        let materials = material_keys(decl, producer);
        let entry = ProducerEntry {
            item,
            order: producer.sorted_order,
            kind: decl.kind,
        };

        for &region in &regions {
            for &material in &materials {
                let key = ProducerKey {
                    label: decl.label.clone(),
                    region,
                    material,
                };
                let bucket = self.entries.entry(key).or_default();

                if decl.kind == AccessKind::Computes && !decl.label.is_reduction() {
                    let clash = bucket.iter().find(|e| {
                        e.kind == AccessKind::Computes
                            && graph.item(e.item).and_then(DetailedWorkItem::unit) != producer.unit()
                    });
                    if let Some(first) = clash {
                        return Err(Error::DuplicateProducer {
                            label: decl.label.name.clone(),
                            region,
                            material,
                            first: graph
                                .item(first.item)
                                .map_or_else(String::new, |i| i.name.clone()),
                            second: producer.name.clone(),
                        });
                    }
                }

                trace!(label = %decl.label, ?region, ?material, order = entry.order, "Recorded producer");
                bucket.push(entry);
            }
        }
        Ok(())
    }

    fn bucket(&self, label: &VarLabel, region: Option<RegionId>, material: Option<MaterialId>) -> &[ProducerEntry] {
        let key = ProducerKey {
            label: label.clone(),
            region,
            material,
        };
        self.entries.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Candidates for a lookup: the region's own bucket plus the
    /// domain-wide bucket.
    fn candidates(
        &self,
        label: &VarLabel,
        region: Option<RegionId>,
        material: Option<MaterialId>,
    ) -> impl Iterator<Item = &ProducerEntry> {
        let regional = region.map_or(&[][..], |r| self.bucket(label, Some(r), material));
        regional.iter().chain(self.bucket(label, None, material))
    }

    /// Nearest producer strictly before `consumer_order`. Ties go to the
    /// entry recorded last.
    #[must_use]
    pub fn find_producer(
        &self,
        label: &VarLabel,
        region: Option<RegionId>,
        material: Option<MaterialId>,
        consumer_order: usize,
    ) -> Option<ProducerEntry> {
        self.candidates(label, region, material)
            .filter(|e| e.order < consumer_order)
            .fold(None, |best: Option<ProducerEntry>, e| match best {
                Some(b) if b.order > e.order => Some(b),
                _ => Some(*e),
            })
    }

    /// Every producer at the nearest order strictly before `consumer_order`.
    /// Used for reduction values, which several items may produce at the
    /// same logical step.
    #[must_use]
    pub fn find_all_producers(
        &self,
        label: &VarLabel,
        region: Option<RegionId>,
        material: Option<MaterialId>,
        consumer_order: usize,
    ) -> Vec<ProducerEntry> {
        let mut best = Vec::new();
        let mut best_order = None;
        for e in self.candidates(label, region, material) {
            if e.order >= consumer_order {
                continue;
            }
            match best_order {
                Some(order) if e.order < order => {}
                Some(order) if e.order == order => best.push(*e),
                _ => {
                    best_order = Some(e.order);
                    best.clear();
                    best.push(*e);
                }
            }
        }
        best
    }

    /// Nearest producer at or after `consumer_order`; used to describe a
    /// near miss when resolution fails.
    #[must_use]
    pub fn find_following(
        &self,
        label: &VarLabel,
        region: Option<RegionId>,
        material: Option<MaterialId>,
        consumer_order: usize,
    ) -> Option<ProducerEntry> {
        self.candidates(label, region, material)
            .filter(|e| e.order >= consumer_order)
            .min_by_key(|e| e.order)
            .copied()
    }

    /// True if anything produces `label` on the given key.
    #[must_use]
    pub fn produces(&self, label: &VarLabel, region: Option<RegionId>, material: Option<MaterialId>) -> bool {
        self.candidates(label, region, material).next().is_some()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Material keys an access touches on `item`: the declaration's explicit
/// materials, else the item's, else the global key. Reduction values only
/// follow explicit materials so that global and per-region items agree.
pub(crate) fn material_keys(decl: &AccessDeclaration, item: &DetailedWorkItem) -> Vec<Option<MaterialId>> {
    let subset = if decl.label.is_reduction() {
        decl.materials.as_ref()
    } else {
        decl.materials.as_ref().or(item.materials.as_ref())
    };
    match subset {
        Some(s) if !s.is_empty() => s.iter().map(Some).collect(),
        _ => vec![None],
    }
}
