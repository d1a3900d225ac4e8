// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory database for tests, demos, and headless hosts.

use alloc::vec::Vec;
use core::cell::Cell;

use hashbrown::DefaultHashBuilder;
use indexmap::IndexMap;
use understory_comb_index::Name;

use crate::db::{ChangeListener, Database, DatabaseMut, DbError, DirChange, Member};

#[derive(Clone, Debug)]
enum Entry {
    Leaf,
    Comb(Vec<Member>),
}

/// A [`Database`] backed by an insertion-ordered map.
///
/// Mutations take the listener to notify, mirroring a real database that
/// fires its callbacks synchronously while it writes. After every comb
/// write the reference pass runs and reports each member through
/// [`ChangeListener::on_update_nref`].
///
/// For failure testing the handle can be closed outright, or armed to close
/// itself after a number of successful lookups.
#[derive(Clone, Debug)]
pub struct MemoryDb {
    entries: IndexMap<Name, Entry, DefaultHashBuilder>,
    open: Cell<bool>,
    fail_after: Cell<Option<usize>>,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    /// Create an empty, open database.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::default(),
            open: Cell::new(true),
            fail_after: Cell::new(None),
        }
    }

    /// Number of directory entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `name` exists and is a comb.
    pub fn is_comb(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Entry::Comb(_)))
    }

    /// Write a leaf (solid) entry, replacing whatever was stored under `name`.
    pub fn put_leaf(&mut self, name: &str, listener: &mut dyn ChangeListener) {
        let previous = self.entries.insert(Name::from(name), Entry::Leaf);
        listener.on_directory_changed(name, change_kind(previous.is_some()));
    }

    /// Write a comb entry with `members`, replacing whatever was stored under `name`.
    pub fn put_comb(
        &mut self,
        name: &str,
        members: Vec<Member>,
        listener: &mut dyn ChangeListener,
    ) {
        let previous = self
            .entries
            .insert(Name::from(name), Entry::Comb(members));
        listener.on_directory_changed(name, change_kind(previous.is_some()));
        self.update_nref(name, listener);
    }

    /// Append `member` to the comb `name`. Returns `false` if `name` is not a comb.
    pub fn add_member(
        &mut self,
        name: &str,
        member: Member,
        listener: &mut dyn ChangeListener,
    ) -> bool {
        let Some(Entry::Comb(members)) = self.entries.get_mut(name) else {
            return false;
        };
        members.push(member);
        listener.on_directory_changed(name, DirChange::Modified);
        self.update_nref(name, listener);
        true
    }

    /// Remove the member at `index` of the comb `name`.
    pub fn remove_member(
        &mut self,
        name: &str,
        index: usize,
        listener: &mut dyn ChangeListener,
    ) -> Option<Member> {
        let Some(Entry::Comb(members)) = self.entries.get_mut(name) else {
            return None;
        };
        if index >= members.len() {
            return None;
        }
        let removed = members.remove(index);
        listener.on_directory_changed(name, DirChange::Modified);
        self.update_nref(name, listener);
        Some(removed)
    }

    /// Delete the entry `name`.
    ///
    /// References to it from other combs are left in place, so they dangle
    /// until those combs are rewritten.
    pub fn remove(&mut self, name: &str, listener: &mut dyn ChangeListener) -> bool {
        if self.entries.shift_remove(name).is_none() {
            return false;
        }
        listener.on_directory_changed(name, DirChange::Removed);
        true
    }

    /// Delete the entry `name` and strip every reference to it from other combs.
    pub fn remove_all(&mut self, name: &str, listener: &mut dyn ChangeListener) -> bool {
        let removed = self.remove(name, listener);
        let mut touched = Vec::new();
        for (comb, entry) in &mut self.entries {
            if let Entry::Comb(members) = entry {
                let before = members.len();
                members.retain(|m| &*m.name != name);
                if members.len() != before {
                    touched.push(comb.clone());
                }
            }
        }
        for comb in &touched {
            listener.on_directory_changed(comb, DirChange::Modified);
            self.update_nref(comb, listener);
        }
        removed || !touched.is_empty()
    }

    /// Invalidate the handle; every later query fails with [`DbError::Closed`].
    pub fn close(&self) {
        self.open.set(false);
    }

    /// Close the handle after `lookups` more successful queries.
    pub fn fail_after(&self, lookups: usize) {
        self.fail_after.set(Some(lookups));
    }

    /// Reopen a closed handle and disarm any pending failure.
    pub fn reopen(&self) {
        self.open.set(true);
        self.fail_after.set(None);
    }

    fn update_nref(&self, name: &str, listener: &mut dyn ChangeListener) {
        if let Some(Entry::Comb(members)) = self.entries.get(name) {
            for member in members {
                listener.on_update_nref(&member.name, Some(name));
            }
        }
    }

    fn check(&self) -> Result<(), DbError> {
        if let Some(left) = self.fail_after.get() {
            if left == 0 {
                self.fail_after.set(None);
                self.open.set(false);
            } else {
                self.fail_after.set(Some(left - 1));
            }
        }
        if self.open.get() {
            Ok(())
        } else {
            Err(DbError::Closed)
        }
    }
}

fn change_kind(existed: bool) -> DirChange {
    if existed {
        DirChange::Modified
    } else {
        DirChange::Added
    }
}

impl Database for MemoryDb {
    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn names(&self) -> Result<Vec<Name>, DbError> {
        self.check()?;
        Ok(self.entries.keys().cloned().collect())
    }

    fn contains(&self, name: &str) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.entries.contains_key(name))
    }

    fn members(&self, name: &str) -> Result<Option<Vec<Member>>, DbError> {
        self.check()?;
        Ok(self.entries.get(name).map(|entry| match entry {
            Entry::Leaf => Vec::new(),
            Entry::Comb(members) => members.clone(),
        }))
    }
}

impl DatabaseMut for MemoryDb {
    fn set_members(
        &mut self,
        name: &str,
        members: Vec<Member>,
        listener: &mut dyn ChangeListener,
    ) -> Result<(), DbError> {
        self.check()?;
        if !self.is_comb(name) {
            return Err(DbError::Unavailable("not a comb"));
        }
        self.put_comb(name, members, listener);
        Ok(())
    }
}
