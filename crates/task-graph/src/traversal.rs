//! Traversal orders handed to the execution engine.

use crate::detailed::ItemId;

/// Items in an order where every producer comes before its consumers:
/// prior-generation sends first, then unit items in sorted order.
pub type ExecutionOrder = Vec<ItemId>;

/// Groups of items that can execute in parallel.
///
/// Each inner vector contains items that have no dependencies on each other.
/// The outer vector is ordered by dependency level: all items in group N
/// must complete before items in group N+1 can start.
pub type ParallelGroups = Vec<Vec<ItemId>>;
