//! Topological ordering of work units.
//!
//! Units are visited depth-first in declaration order; before a unit is
//! appended, every unit computing a new-store value it consumes is visited.
//! Synchronizing units are then reseated directly in front of their first
//! consumer and numbered with a phase so that every process agrees on the
//! relative order of collective operations.

use crate::declaration::VarLabel;
use crate::work_unit::WorkUnit;
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

/// Orders work units so that producers precede consumers.
pub struct TopologicalSorter<'a> {
    units: &'a [WorkUnit],
    /// For each unit, the (producer, label) pairs it waits on.
    deps: Vec<Vec<(usize, &'a VarLabel)>>,
}

impl<'a> TopologicalSorter<'a> {
    /// Index the producers of every unit.
    #[must_use]
    pub fn new(units: &'a [WorkUnit]) -> Self {
        let mut computers: HashMap<&VarLabel, Vec<usize>> = HashMap::new();
        for (idx, unit) in units.iter().enumerate() {
            for decl in unit.computed() {
                computers.entry(&decl.label).or_default().push(idx);
            }
        }

        let deps = units
            .iter()
            .map(|unit| {
                unit.consumed()
                    .filter(|decl| unit.is_new_like(decl.store))
                    .flat_map(|decl| {
                        computers
                            .get(&decl.label)
                            .into_iter()
                            .flatten()
                            .map(move |&producer| (producer, &decl.label))
                    })
                    .collect()
            })
            .collect();

        Self { units, deps }
    }

    /// Compute the final order as indices into the input slice, and the
    /// phase of each synchronizing unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`] with every hop of the loop when units depend
    /// on each other circularly.
    pub fn order(&self) -> Result<(Vec<usize>, HashMap<usize, u32>)> {
        let count = self.units.len();
        let mut state = vec![VisitState::None; count];
        let mut order = Vec::with_capacity(count);
        let mut stack = Vec::new();

        for idx in 0..count {
            if state[idx] == VisitState::None {
                self.visit(idx, &mut state, &mut stack, &mut order)?;
            }
        }

        self.reseat_synchronizing(&mut order);

        let mut phases = HashMap::new();
        let mut next_phase = 0;
        for &idx in &order {
            if self.units[idx].is_synchronizing() {
                phases.insert(idx, next_phase);
                next_phase += 1;
            }
        }
        Ok((order, phases))
    }

    fn visit(
        &self,
        idx: usize,
        state: &mut [VisitState],
        stack: &mut Vec<(usize, Option<&'a VarLabel>)>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        state[idx] = VisitState::Visiting;
        if stack.is_empty() {
            stack.push((idx, None));
        }

        for &(producer, label) in &self.deps[idx] {
            match state[producer] {
                VisitState::Visited => {}
                VisitState::Visiting => {
                    return Err(Error::Cycle {
                        chain: self.cycle_chain(stack, producer, label),
                    });
                }
                VisitState::None => {
                    stack.push((producer, Some(label)));
                    self.visit(producer, state, stack, order)?;
                    stack.pop();
                }
            }
        }

        state[idx] = VisitState::Visited;
        order.push(idx);
        if stack.len() == 1 {
            stack.pop();
        }
        Ok(())
    }

    /// Describe the loop closed by `closing` requiring `label` from `start`.
    fn cycle_chain(
        &self,
        stack: &[(usize, Option<&VarLabel>)],
        start: usize,
        label: &VarLabel,
    ) -> Vec<String> {
        let from = stack.iter().position(|&(u, _)| u == start).unwrap_or(0);
        let path = &stack[from..];

        let mut chain = Vec::with_capacity(path.len());
        for (i, &(unit, _)) in path.iter().enumerate() {
            let (next, via) = match path.get(i + 1) {
                Some(&(next, Some(via))) => (next, via),
                _ => (start, label),
            };
            chain.push(format!(
                "'{}' requires '{}' from '{}'",
                self.units[unit].name(),
                via,
                self.units[next].name()
            ));
        }
        chain
    }

    /// Move each synchronizing unit directly in front of the earliest unit
    /// consuming one of its computed labels.
    fn reseat_synchronizing(&self, order: &mut Vec<usize>) {
        let sync_units: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&idx| self.units[idx].is_synchronizing())
            .collect();

        for unit in sync_units {
            let Some(pos) = order.iter().position(|&u| u == unit) else {
                continue;
            };
            let earliest = order
                .iter()
                .enumerate()
                .skip(pos + 1)
                .find(|&(_, &consumer)| self.deps[consumer].iter().any(|&(p, _)| p == unit))
                .map(|(i, _)| i);

            if let Some(consumer_pos) = earliest
                && consumer_pos > pos + 1
            {
                order.remove(pos);
                order.insert(consumer_pos - 1, unit);
                debug!(
                    unit = self.units[unit].name(),
                    before = self.units[order[consumer_pos]].name(),
                    "Reseated synchronizing unit"
                );
            }
        }
    }
}

/// Sort `units` so that every producer of a new-store value precedes its
/// consumers, then assign `sorted_order` 0..n-1 and synchronization phases.
///
/// # Errors
///
/// Returns [`Error::Cycle`] if the units depend on each other circularly.
#[instrument(skip_all, fields(units = units.len()))]
pub fn sort_units(units: Vec<WorkUnit>) -> Result<Vec<WorkUnit>> {
    let (order, phases) = TopologicalSorter::new(&units).order()?;

    let mut slots: Vec<Option<WorkUnit>> = units.into_iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(slots.len());
    for (position, idx) in order.into_iter().enumerate() {
        if let Some(mut unit) = slots.get_mut(idx).and_then(Option::take) {
            unit.set_sorted_order(position);
            unit.set_phase(phases.get(&idx).copied());
            sorted.push(unit);
        }
    }

    debug!(
        order = ?sorted.iter().map(WorkUnit::name).collect::<Vec<_>>(),
        "Sorted work units"
    );
    Ok(sorted)
}
