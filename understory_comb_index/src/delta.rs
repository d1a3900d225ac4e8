// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change summary types returned from composed index edits.

use alloc::vec::Vec;

use crate::types::{Instance, InstanceId};

/// Instances added to and removed from a [`CombIndex`](crate::CombIndex) by one edit.
///
/// Removed instances are returned by value together with the (now stale)
/// ids they had, so callers can report what disappeared.
#[derive(Clone, Debug, Default)]
pub struct Delta {
    /// Newly indexed instances, in insertion order.
    pub inserted: Vec<InstanceId>,
    /// Released instances and their former ids.
    pub removed: Vec<(InstanceId, Instance)>,
}

impl Delta {
    /// Returns `true` if the edit changed nothing.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }

    /// Append another delta to this one.
    pub fn merge(&mut self, other: Self) {
        self.inserted.extend(other.inserted);
        self.removed.extend(other.removed);
    }
}
