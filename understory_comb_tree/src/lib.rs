// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Comb Tree: keep a comb index in step with a live CAD database.
//!
//! The database is consulted through the [`Database`] trait and reports its
//! own mutations through [`ChangeListener`] hooks. Hooks only flag names as
//! dirty; the index is brought up to date in explicit passes.
//!
//! - [`Context`]: owns the database, the [`CombIndex`](understory_comb_index::CombIndex)
//!   and the [`ChangeTracker`].
//! - [`Context::reconcile`]: per-entry diff of every dirty name; converges to
//!   the same index a [`Context::rebuild`] would produce.
//! - [`Context::activate`]: breadth-first ancestor highlighting from a selection.
//! - [`MemoryDb`]: an in-memory database that fires the hooks while it mutates.
//!
//! ## Synchronization states
//!
//! `Idle → Dirty → Reconciling → Idle`. If the database fails mid-pass, the
//! tracker moves to [`SyncState::NeedsRebuild`] and further reconciliation is
//! refused with [`SyncError::RebuildRequired`] until a rebuild succeeds.
//!
//! ## Example
//!
//! ```rust
//! use understory_comb_index::BoolOp;
//! use understory_comb_tree::{Context, Member, MemoryDb};
//!
//! let mut ctx = Context::new(MemoryDb::new());
//! ctx.edit(|db, tracker| {
//!     db.put_leaf("l", tracker);
//!     db.put_comb("a", vec![Member::new("l", BoolOp::Union)], tracker);
//!     db.put_comb("b", vec![Member::new("l", BoolOp::Subtract)], tracker);
//!     db.put_comb(
//!         "r",
//!         vec![Member::new("a", BoolOp::Union), Member::new("b", BoolOp::Union)],
//!         tracker,
//!     );
//! });
//! ctx.reconcile().unwrap();
//!
//! let report = ctx.activate_name("l").unwrap();
//! assert_eq!(report.activated.len(), 3);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod activation;
mod context;
mod db;
mod memory;
mod sync;
mod tracker;

pub use activation::{ActivationError, ActivationReport, CycleHandling, activate, activate_name};
pub use context::{Context, ContextConfig};
pub use db::{ChangeListener, Database, DatabaseMut, DbError, DirChange, Member, NoListener};
pub use memory::MemoryDb;
pub use sync::{SyncError, SyncReport};
pub use tracker::{ChangeTracker, SyncState};
