// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ancestor activation.
//!
//! Selecting an object highlights every instance on a path from it up to a
//! top-level object. The walk is breadth-first over the parent maps: the
//! instances that place the selected object's parents are seeded first, and
//! each newly activated instance enqueues the instances that place its own
//! parent. A visited set, separate from the active flags, bounds the walk so
//! every instance is enqueued at most once and cyclic data terminates.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::{HashMap, HashSet};
use log::{trace, warn};
use understory_comb_index::{CombIndex, InstanceId, Name};

/// What to do when the parent graph above the selection contains a cycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CycleHandling {
    /// Walk anyway; the visited set guarantees termination.
    #[default]
    Allow,
    /// Refuse to activate and report the cycle.
    Error,
}

/// Errors from activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivationError {
    /// The selected id is stale or was never issued.
    UnknownInstance(InstanceId),
    /// The ancestry of the selection is cyclic through `name`.
    Cycle {
        /// A comb that is its own ancestor.
        name: Name,
    },
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownInstance(id) => write!(
                f,
                "unknown instance {}:{}",
                id.slot(),
                id.generation()
            ),
            Self::Cycle { name } => write!(f, "comb {name} references itself"),
        }
    }
}

impl core::error::Error for ActivationError {}

/// Result of one activation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Name the walk started from.
    pub selected: Option<Name>,
    /// Instances activated, in discovery order.
    pub activated: Vec<InstanceId>,
}

/// Activate the ancestors of the object placed by `selected`.
pub fn activate(
    index: &mut CombIndex,
    selected: InstanceId,
    cycles: CycleHandling,
) -> Result<ActivationReport, ActivationError> {
    let name = index
        .child_of(selected)
        .cloned()
        .ok_or(ActivationError::UnknownInstance(selected))?;
    activate_name(index, &name, cycles)
}

/// Activate the ancestors of every occurrence of `name`.
///
/// All previous flags are cleared first, so running the same selection twice
/// yields the same flags.
pub fn activate_name(
    index: &mut CombIndex,
    name: &Name,
    cycles: CycleHandling,
) -> Result<ActivationReport, ActivationError> {
    index.clear_active();
    if cycles == CycleHandling::Error
        && let Some(cycle) = find_cycle(index, name)
    {
        warn!("event=activate module=activation status=cycle selected={name} comb={cycle}");
        return Err(ActivationError::Cycle { name: cycle });
    }

    let mut queue: VecDeque<InstanceId> = VecDeque::new();
    let mut visited: HashSet<InstanceId> = HashSet::new();
    for parent in parent_names(index, name) {
        for id in index.parents_of(&parent) {
            if visited.insert(id) {
                queue.push_back(id);
            }
        }
    }

    let mut activated = Vec::new();
    while let Some(id) = queue.pop_front() {
        if index.is_active(id) {
            continue;
        }
        index.set_active(id, true);
        activated.push(id);
        trace!(
            "event=activate_step module=activation slot={} queued={}",
            id.slot(),
            queue.len()
        );
        let Some(parent) = index.get(id).and_then(|i| i.parent()).map(Name::from) else {
            continue;
        };
        for next in index.parents_of(&parent) {
            if !index.is_active(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    Ok(ActivationReport {
        selected: Some(name.clone()),
        activated,
    })
}

fn parent_names(index: &CombIndex, name: &str) -> Vec<Name> {
    index.parent_names_of(name).flatten().cloned().collect()
}

/// First comb found to be its own ancestor while walking up from `start`.
fn find_cycle(index: &CombIndex, start: &Name) -> Option<Name> {
    enum Mark {
        Open,
        Done,
    }

    let mut marks: HashMap<Name, Mark> = HashMap::new();
    let mut stack: Vec<(Name, Vec<Name>)> = Vec::new();
    marks.insert(start.clone(), Mark::Open);
    stack.push((start.clone(), parent_names(index, start)));

    while let Some((_, pending)) = stack.last_mut() {
        match pending.pop() {
            Some(next) => match marks.get(&next) {
                Some(Mark::Open) => return Some(next),
                Some(Mark::Done) => {}
                None => {
                    marks.insert(next.clone(), Mark::Open);
                    let above = parent_names(index, &next);
                    stack.push((next, above));
                }
            },
            None => {
                if let Some((done, _)) = stack.pop() {
                    marks.insert(done, Mark::Done);
                }
            }
        }
    }
    None
}
