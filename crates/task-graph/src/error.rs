//! Error types for task graph compilation.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::declaration::{GenerationStore, MaterialId};
use miette::Diagnostic;
use std::fmt::Display;
use std::path::Path;
use tessera_grid::RegionId;
use thiserror::Error;

/// Result type for task graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a graph compilation.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Work units depend on each other in a loop.
    #[error("Cycle detected in work unit graph: {}", chain.join(" -> "))]
    #[diagnostic(
        code(tessera::task_graph::cycle),
        help("Each hop reads a new-store value computed by the next unit; break one of them")
    )]
    Cycle {
        /// Every hop of the loop, in order.
        chain: Vec<String>,
    },

    /// Two units compute the same value in the same place.
    #[error(
        "'{label}' on {} material {} is computed by both '{first}' and '{second}'",
        show(region), show(material)
    )]
    #[diagnostic(
        code(tessera::task_graph::duplicate_producer),
        help("Declare the second access as a modify, or compute a differently named value")
    )]
    DuplicateProducer {
        /// Label computed twice.
        label: String,
        /// Region of the clash, `None` for domain-wide values.
        region: Option<RegionId>,
        /// Material of the clash.
        material: Option<MaterialId>,
        /// Unit recorded first.
        first: String,
        /// Unit recorded second.
        second: String,
    },

    /// A unit names regions without materials, or the reverse.
    #[error("Work unit '{unit}' declares {} without {}", present, missing)]
    #[diagnostic(
        code(tessera::task_graph::missing_placement),
        help("Bind both a region set and a material set, or neither")
    )]
    MissingPlacement {
        /// The unit.
        unit: String,
        /// What was declared.
        present: &'static str,
        /// What is missing.
        missing: &'static str,
    },

    /// No producer could be found for a consumed value.
    #[error(
        "Could not find a producer of '{label}' ({store:?}) on {} material {} for '{consumer}'{}",
        show(region), show(material),
        partial_match.as_ref().map_or(String::new(), |m| format!("; nearest candidate: {m}"))
    )]
    #[diagnostic(
        code(tessera::task_graph::unresolved_dependency),
        help("Some unit sorted before the consumer must compute this value on that region")
    )]
    UnresolvedDependency {
        /// The consumed label.
        label: String,
        /// Store binding of the access.
        store: GenerationStore,
        /// Description of the consuming item.
        consumer: String,
        /// Region the value was needed from.
        region: Option<RegionId>,
        /// Material needed.
        material: Option<MaterialId>,
        /// Best candidate found, if any.
        partial_match: Option<String>,
    },

    /// A unit or declaration names a region that is not on the grid.
    #[error("Work unit '{unit}' refers to unknown region {region}")]
    #[diagnostic(code(tessera::task_graph::unknown_region))]
    UnknownRegion {
        /// The unit.
        unit: String,
        /// The missing region.
        region: RegionId,
    },

    /// A coarser or finer access steps off the grid.
    #[error("Work unit '{unit}' on level {level} reaches level offset {offset}, which does not exist")]
    #[diagnostic(code(tessera::task_graph::level_out_of_range))]
    LevelOutOfRange {
        /// The unit.
        unit: String,
        /// Level of the consuming region.
        level: usize,
        /// Requested offset.
        offset: i64,
    },

    /// Invalid compile configuration.
    #[error("Compile configuration error: {message}")]
    #[diagnostic(code(tessera::task_graph::config))]
    Config {
        /// What was wrong.
        message: String,
    },

    /// I/O error while reading configuration.
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(tessera::task_graph::io),
        help("Check that the configuration file exists and is readable")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error.
        path: Box<Path>,
        /// Operation that failed.
        operation: String,
    },

    /// Grid construction failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Grid(#[from] tessera_grid::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation: operation.into(),
        }
    }
}

fn show<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "all".to_string(), ToString::to_string)
}
