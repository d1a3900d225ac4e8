// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Database provider contract: directory queries and change notifications.

use alloc::vec::Vec;
use core::fmt;

use understory_comb_index::{BoolOp, Mat4, Name};

/// One member of a comb as stored in the database.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    /// Referenced directory entry.
    pub name: Name,
    /// Boolean operation applied to the member.
    pub op: BoolOp,
    /// Member transform.
    pub matrix: Mat4,
}

impl Member {
    /// A member with the identity transform.
    pub fn new(name: impl Into<Name>, op: BoolOp) -> Self {
        Self {
            name: name.into(),
            op,
            matrix: Mat4::IDENTITY,
        }
    }

    /// Set the member transform.
    #[must_use]
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.matrix = matrix;
        self
    }
}

/// Errors reported by a [`Database`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbError {
    /// The database handle is no longer valid.
    Closed,
    /// The backend could not answer the query.
    Unavailable(&'static str),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "database handle is closed"),
            Self::Unavailable(reason) => write!(f, "database unavailable: {reason}"),
        }
    }
}

impl core::error::Error for DbError {}

/// Read access to the CAD database directory.
///
/// Implementations are queried during reconciliation only; every query may
/// fail once the handle has been invalidated.
pub trait Database {
    /// Whether the handle is still valid.
    fn is_open(&self) -> bool;

    /// Every directory entry, in database order.
    fn names(&self) -> Result<Vec<Name>, DbError>;

    /// Whether an entry named `name` exists.
    fn contains(&self, name: &str) -> Result<bool, DbError>;

    /// Members of `name` in stored order.
    ///
    /// `None` if no such entry exists; an empty list for leaves and empty combs.
    fn members(&self, name: &str) -> Result<Option<Vec<Member>>, DbError>;
}

/// Write access used by editing front ends.
///
/// Writes must report themselves through `listener` exactly as any other
/// mutation of the database would.
pub trait DatabaseMut: Database {
    /// Replace the member list of the comb `name`.
    ///
    /// Fails if `name` does not exist or is not a comb.
    fn set_members(
        &mut self,
        name: &str,
        members: Vec<Member>,
        listener: &mut dyn ChangeListener,
    ) -> Result<(), DbError>;
}

/// Kind of directory change reported by [`ChangeListener::on_directory_changed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirChange {
    /// A new entry was written.
    Added,
    /// An entry was deleted.
    Removed,
    /// An existing entry was rewritten.
    Modified,
}

/// Notification hooks invoked synchronously by the database while it mutates.
///
/// Implementations must only record the change; any real work is deferred
/// to the next reconciliation.
pub trait ChangeListener {
    /// A directory entry was added, removed, or modified.
    fn on_directory_changed(&mut self, name: &str, change: DirChange);

    /// The reference pass found `child` referenced from `parent` (`None` for a top).
    fn on_update_nref(&mut self, child: &str, parent: Option<&str>);
}

/// A [`ChangeListener`] that discards every notification.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoListener;

impl ChangeListener for NoListener {
    fn on_directory_changed(&mut self, _: &str, _: DirChange) {}

    fn on_update_nref(&mut self, _: &str, _: Option<&str>) {}
}
