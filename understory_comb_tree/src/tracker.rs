// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change tracking: the dirty set and the synchronization state machine.

use hashbrown::DefaultHashBuilder;
use indexmap::IndexSet;
use log::trace;
use understory_comb_index::Name;

use crate::db::{ChangeListener, DirChange};

/// Where the index stands relative to the database.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Index matches the database as of the last pass.
    #[default]
    Idle,
    /// Changes have been recorded but not applied.
    Dirty,
    /// A reconciliation pass is running.
    Reconciling,
    /// A pass was aborted; only a full rebuild can restore consistency.
    NeedsRebuild,
}

/// Records database notifications until the next reconciliation.
///
/// The tracker is the [`ChangeListener`] handed to the database. It never
/// looks at the index; it only remembers which directory names changed.
#[derive(Clone, Debug, Default)]
pub struct ChangeTracker {
    dirty: IndexSet<Name, DefaultHashBuilder>,
    need_update_nref: bool,
    state: SyncState,
}

impl ChangeTracker {
    /// Create an idle tracker with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current synchronization state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Names waiting for the next pass, in the order they were first flagged.
    pub fn dirty(&self) -> impl Iterator<Item = &Name> + '_ {
        self.dirty.iter()
    }

    /// Returns `true` if `name` is waiting for the next pass.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Returns `true` if a reference-count pass was reported since the last reconciliation.
    pub fn needs_update_nref(&self) -> bool {
        self.need_update_nref
    }

    /// Returns `true` if a reconciliation pass has anything to do.
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || self.need_update_nref
    }

    /// Flag `name` for the next pass.
    pub fn mark(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        if !self.dirty.contains(name) {
            trace!("event=mark_dirty module=tracker name={name}");
            self.dirty.insert(Name::from(name));
        }
        if self.state == SyncState::Idle {
            self.state = SyncState::Dirty;
        }
    }

    pub(crate) fn first_dirty(&self) -> Option<Name> {
        self.dirty.first().cloned()
    }

    pub(crate) fn unmark(&mut self, name: &str) {
        self.dirty.shift_remove(name);
    }

    pub(crate) fn set_state(&mut self, state: SyncState) {
        self.state = state;
    }

    /// Forget everything pending; used before a full rebuild.
    pub(crate) fn reset(&mut self) {
        self.dirty.clear();
        self.need_update_nref = false;
    }

    pub(crate) fn take_update_nref(&mut self) -> bool {
        core::mem::take(&mut self.need_update_nref)
    }
}

impl ChangeListener for ChangeTracker {
    fn on_directory_changed(&mut self, name: &str, change: DirChange) {
        trace!("event=directory_changed module=tracker name={name} change={change:?}");
        self.mark(name);
    }

    fn on_update_nref(&mut self, child: &str, parent: Option<&str>) {
        if let Some(parent) = parent {
            self.mark(parent);
        }
        self.mark(child);
        self.need_update_nref = true;
        if self.state == SyncState::Idle {
            self.state = SyncState::Dirty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn notifications_only_record_names() {
        let mut tracker = ChangeTracker::new();
        assert_eq!(tracker.state(), SyncState::Idle);
        tracker.on_directory_changed("b", DirChange::Modified);
        tracker.on_directory_changed("a", DirChange::Added);
        tracker.on_directory_changed("b", DirChange::Modified);
        assert_eq!(tracker.state(), SyncState::Dirty);
        let dirty: Vec<&str> = tracker.dirty().map(|n| &**n).collect();
        assert_eq!(dirty, ["b", "a"], "first-flagged order, no repeats");
        assert!(!tracker.needs_update_nref());
    }

    #[test]
    fn update_nref_marks_parent_and_child() {
        let mut tracker = ChangeTracker::new();
        tracker.on_update_nref("l", Some("a"));
        assert!(tracker.is_dirty("a"));
        assert!(tracker.is_dirty("l"));
        assert!(tracker.needs_update_nref());
        assert!(tracker.take_update_nref());
        assert!(!tracker.needs_update_nref());
    }

    #[test]
    fn needs_rebuild_is_sticky() {
        let mut tracker = ChangeTracker::new();
        tracker.set_state(SyncState::NeedsRebuild);
        tracker.on_directory_changed("a", DirChange::Removed);
        assert_eq!(tracker.state(), SyncState::NeedsRebuild);
        tracker.mark("");
        assert!(!tracker.is_dirty(""), "the root key is never dirty");
    }
}
