// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Model context: one database, its index, and its change tracker.

use understory_comb_index::{CombIndex, InstanceId, Name};

use crate::activation::{self, ActivationError, ActivationReport, CycleHandling};
use crate::db::Database;
use crate::sync::{self, SyncError, SyncReport};
use crate::tracker::{ChangeTracker, SyncState};

/// Options for a [`Context`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextConfig {
    /// Behavior of activation on cyclic data.
    pub cycle_handling: CycleHandling,
    /// Instances to reserve before the first rebuild.
    pub reserve: usize,
}

impl ContextConfig {
    /// Set the cycle handling.
    #[must_use]
    pub fn with_cycle_handling(mut self, cycle_handling: CycleHandling) -> Self {
        self.cycle_handling = cycle_handling;
        self
    }

    /// Set the number of instances to reserve up front.
    #[must_use]
    pub fn with_reserve(mut self, reserve: usize) -> Self {
        self.reserve = reserve;
        self
    }
}

/// Everything that belongs to one open database.
///
/// The database reports changes through the [`ChangeTracker`] it is handed
/// in [`Context::edit`]; nothing is applied until [`Context::reconcile`]
/// (or [`Context::sync`]) runs.
///
/// ## Example
///
/// ```rust
/// use understory_comb_index::BoolOp;
/// use understory_comb_tree::{Context, Member, MemoryDb};
///
/// let mut ctx = Context::new(MemoryDb::new());
/// ctx.edit(|db, tracker| {
///     db.put_leaf("l", tracker);
///     db.put_comb("a", vec![Member::new("l", BoolOp::Union)], tracker);
/// });
/// ctx.reconcile().unwrap();
///
/// assert_eq!(ctx.index().children_of(Some("a")).len(), 1);
/// assert!(ctx.index().is_top("a"));
/// ```
#[derive(Debug)]
pub struct Context<D: Database> {
    db: D,
    index: CombIndex,
    tracker: ChangeTracker,
    config: ContextConfig,
}

impl<D: Database> Context<D> {
    /// Wrap `db` with default options. The index starts empty; call
    /// [`Context::rebuild`] to load existing entries.
    pub fn new(db: D) -> Self {
        Self::with_config(db, ContextConfig::default())
    }

    /// Wrap `db` with explicit options.
    pub fn with_config(db: D, config: ContextConfig) -> Self {
        let mut index = CombIndex::new();
        index.reserve(config.reserve);
        Self {
            db,
            index,
            tracker: ChangeTracker::new(),
            config,
        }
    }

    /// Wrap `db` and index every entry it already holds.
    pub fn open(db: D, config: ContextConfig) -> Result<Self, SyncError> {
        let mut ctx = Self::with_config(db, config);
        ctx.rebuild()?;
        Ok(ctx)
    }

    /// The database.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Mutate the database while its notifications go to this context's tracker.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut D, &mut ChangeTracker) -> R) -> R {
        f(&mut self.db, &mut self.tracker)
    }

    /// The listener to hand to a database that holds its own reference.
    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Pending changes and sync state.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// The index as of the last pass.
    pub fn index(&self) -> &CombIndex {
        &self.index
    }

    /// Mutable access for composed edits (row insertion, operator changes).
    pub fn index_mut(&mut self) -> &mut CombIndex {
        &mut self.index
    }

    /// Options this context was created with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Current synchronization state.
    pub fn state(&self) -> SyncState {
        self.tracker.state()
    }

    /// Apply every pending change.
    pub fn reconcile(&mut self) -> Result<SyncReport, SyncError> {
        sync::reconcile(&mut self.index, &mut self.tracker, &self.db)
    }

    /// Discard the index and rebuild it from the whole database.
    pub fn rebuild(&mut self) -> Result<SyncReport, SyncError> {
        sync::rebuild(&mut self.index, &mut self.tracker, &self.db)
    }

    /// Bring the index up to date: reconcile, or rebuild after an aborted pass.
    pub fn sync(&mut self) -> Result<SyncReport, SyncError> {
        match self.tracker.state() {
            SyncState::NeedsRebuild => self.rebuild(),
            _ => self.reconcile(),
        }
    }

    /// Activate the ancestors of the object placed by `selected`.
    pub fn activate(&mut self, selected: InstanceId) -> Result<ActivationReport, ActivationError> {
        activation::activate(&mut self.index, selected, self.config.cycle_handling)
    }

    /// Activate the ancestors of every occurrence of `name`.
    pub fn activate_name(&mut self, name: &str) -> Result<ActivationReport, ActivationError> {
        activation::activate_name(&mut self.index, &Name::from(name), self.config.cycle_handling)
    }

    /// Clear every active flag.
    pub fn deactivate_all(&mut self) {
        self.index.clear_active();
    }

    /// Release every instance and hand the database back.
    pub fn close(mut self) -> D {
        self.index.clear();
        self.db
    }
}
