//! Validation of declared work units.
//!
//! Compilation stops at the first problem it meets. Validation walks every
//! unit and reports everything it can find in one pass, which is what an
//! authoring tool wants to show.

use crate::sorter::TopologicalSorter;
use crate::work_unit::WorkUnit;
use crate::{Error, Result};
use tessera_grid::Grid;

/// Result of unit validation.
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the units are valid.
    pub is_valid: bool,
    /// List of validation errors, if any.
    pub errors: Vec<Error>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create an invalid result with errors.
    #[must_use]
    pub fn invalid(errors: Vec<Error>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }

    /// The first error, if any.
    ///
    /// # Errors
    ///
    /// Returns the first collected error when the result is invalid.
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Check placement, region references, level offsets and cycles of `units`.
#[must_use]
pub fn validate_units(units: &[WorkUnit], grid: &Grid) -> ValidationResult {
    let mut errors = Vec::new();

    for unit in units {
        match (unit.regions().is_some(), unit.materials().is_some()) {
            (true, false) => errors.push(Error::MissingPlacement {
                unit: unit.name().to_string(),
                present: "a region set",
                missing: "a material set",
            }),
            (false, true) => errors.push(Error::MissingPlacement {
                unit: unit.name().to_string(),
                present: "a material set",
                missing: "a region set",
            }),
            _ => {}
        }

        let declared = unit
            .consumed()
            .chain(unit.produced())
            .filter_map(|decl| decl.regions.as_ref())
            .flat_map(|set| set.iter());
        for region in unit.regions().into_iter().flat_map(|set| set.iter()).chain(declared) {
            if grid.region(region).is_none() {
                errors.push(Error::UnknownRegion {
                    unit: unit.name().to_string(),
                    region,
                });
            }
        }

        if let Some(level) = unit.level(grid)
            && level >= grid.num_levels()
        {
            errors.push(Error::LevelOutOfRange {
                unit: unit.name().to_string(),
                level,
                offset: 0,
            });
        }

        let levels: Vec<usize> = unit
            .regions()
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|r| grid.region(r).map(|region| region.level))
            .collect();
        for decl in unit.consumed() {
            let offset = decl.domain.level_offset();
            if offset == 0 {
                continue;
            }
            let off_grid = levels.iter().find(|&&level| {
                i64::try_from(level)
                    .ok()
                    .and_then(|l| l.checked_add(offset))
                    .and_then(|l| usize::try_from(l).ok())
                    .is_none_or(|l| l >= grid.num_levels())
            });
            if let Some(&level) = off_grid {
                errors.push(Error::LevelOutOfRange {
                    unit: unit.name().to_string(),
                    level,
                    offset,
                });
            }
        }
    }

    if let Err(err) = TopologicalSorter::new(units).order() {
        errors.push(err);
    }

    if errors.is_empty() {
        ValidationResult::valid()
    } else {
        ValidationResult::invalid(errors)
    }
}
