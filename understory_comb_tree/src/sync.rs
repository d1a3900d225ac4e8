// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciliation of the index against the database.
//!
//! A pass drains the dirty set one entry at a time. Each entry's member list
//! is fetched and applied to the index with [`CombIndex::sync_children`],
//! which is atomic per entry. Once the set is empty, top-level instances are
//! recomputed for every name the pass touched. A reference-count notification
//! since the last pass widens that to every directory entry and every current
//! top-level name.
//!
//! If the database fails mid-pass the entries already applied stay applied,
//! the rest stay dirty, and the tracker moves to
//! [`SyncState::NeedsRebuild`].

use alloc::vec::Vec;
use core::fmt;

use hashbrown::DefaultHashBuilder;
use indexmap::IndexSet;
use log::{debug, info, warn};
use understory_comb_index::{CombIndex, Delta, IndexError, Name, Relation};

use crate::db::{Database, DbError, Member};
use crate::tracker::{ChangeTracker, SyncState};

/// Errors surfaced by reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// The database failed mid-pass. Unprocessed names stay dirty.
    ReconciliationAborted {
        /// Entry being processed when the failure happened, if any.
        entry: Option<Name>,
        /// Underlying database error.
        source: DbError,
    },
    /// An earlier pass was aborted; call `rebuild` first.
    RebuildRequired,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReconciliationAborted {
                entry: Some(entry),
                source,
            } => write!(f, "reconciliation aborted at {entry}: {source}"),
            Self::ReconciliationAborted { entry: None, source } => {
                write!(f, "reconciliation aborted: {source}")
            }
            Self::RebuildRequired => write!(f, "index needs a full rebuild"),
        }
    }
}

impl core::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::ReconciliationAborted { source, .. } => Some(source),
            Self::RebuildRequired => None,
        }
    }
}

/// Outcome of a reconciliation or rebuild pass.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Instances inserted and released by the pass.
    pub delta: Delta,
    /// Directory entries whose member lists were applied, in processing order.
    pub entries: Vec<Name>,
    /// Names whose top-level status was recomputed.
    pub touched: Vec<Name>,
    /// Entries whose member lists the index refused (for example empty member names).
    pub rejected: Vec<(Name, IndexError)>,
    /// `true` if the pass cleared the index and rebuilt it from scratch.
    pub rebuilt: bool,
    /// `true` if a reference-count notification widened the top-level sweep.
    pub nref_updated: bool,
}

impl SyncReport {
    /// Returns `true` if the index did not change.
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }
}

type NameSet = IndexSet<Name, DefaultHashBuilder>;

/// Desired relations for the members of one comb, with occurrence ordinals.
///
/// The n-th repetition of an identical (child, op, matrix) reference gets
/// occurrence `n`, so a comb listing the same member twice keeps two instances.
pub(crate) fn desired_relations(parent: &Name, members: &[Member]) -> Vec<Relation> {
    let mut out: Vec<Relation> = Vec::with_capacity(members.len());
    for member in members {
        let occurrence = out
            .iter()
            .filter(|r| r.child == member.name && r.op == member.op && r.matrix == member.matrix)
            .count();
        out.push(
            Relation::new(Some(parent.clone()), member.name.clone(), member.op, member.matrix)
                .with_occurrence(u32::try_from(occurrence).unwrap_or(u32::MAX)),
        );
    }
    out
}

fn abort(
    tracker: &mut ChangeTracker,
    entry: Option<Name>,
    source: DbError,
) -> SyncError {
    warn!(
        "event=reconcile module=sync status=aborted entry={} error={source}",
        entry.as_deref().unwrap_or("-")
    );
    tracker.set_state(SyncState::NeedsRebuild);
    SyncError::ReconciliationAborted { entry, source }
}

fn note_delta(index: &CombIndex, delta: &Delta, touched: &mut NameSet) {
    for id in &delta.inserted {
        if let Some(child) = index.child_of(*id) {
            touched.insert(child.clone());
        }
    }
    for (_, instance) in &delta.removed {
        touched.insert(instance.child_name().clone());
    }
}

/// Apply every dirty entry to `index`.
pub(crate) fn reconcile<D: Database + ?Sized>(
    index: &mut CombIndex,
    tracker: &mut ChangeTracker,
    db: &D,
) -> Result<SyncReport, SyncError> {
    match tracker.state() {
        SyncState::NeedsRebuild => return Err(SyncError::RebuildRequired),
        _ if !tracker.has_pending() => {
            tracker.set_state(SyncState::Idle);
            return Ok(SyncReport::default());
        }
        _ => {}
    }
    if !db.is_open() {
        return Err(abort(tracker, None, DbError::Closed));
    }

    tracker.set_state(SyncState::Reconciling);
    let mut report = SyncReport {
        nref_updated: tracker.take_update_nref(),
        ..SyncReport::default()
    };
    let mut touched = NameSet::default();

    while let Some(name) = tracker.first_dirty() {
        let members = match db.members(&name) {
            Ok(members) => members,
            Err(source) => return Err(abort(tracker, Some(name), source)),
        };
        touched.insert(name.clone());
        match members {
            Some(members) => {
                let desired = desired_relations(&name, &members);
                match index.sync_children(&name, &desired) {
                    Ok(delta) => {
                        note_delta(index, &delta, &mut touched);
                        report.delta.merge(delta);
                    }
                    Err(err) => {
                        warn!(
                            "event=reconcile module=sync status=rejected entry={name} error={err}"
                        );
                        report.rejected.push((name.clone(), err));
                    }
                }
            }
            None => {
                // Gone from the directory: drop it as parent and as child, and
                // revisit the combs that still reference it.
                let referrers: Vec<Name> = index.parent_names_of(&name).flatten().cloned().collect();
                let delta = index.remove_object(&name);
                note_delta(index, &delta, &mut touched);
                report.delta.merge(delta);
                for referrer in referrers {
                    tracker.mark(&referrer);
                }
            }
        }
        debug!("event=reconcile_entry module=sync name={name}");
        tracker.unmark(&name);
        report.entries.push(name);
    }

    if report.nref_updated {
        let names = db.names().map_err(|source| abort(tracker, None, source))?;
        touched.extend(names);
        let tops: Vec<Name> = index
            .children_of(None)
            .iter()
            .filter_map(|id| index.child_of(*id).cloned())
            .collect();
        touched.extend(tops);
    }

    for name in &touched {
        let exists = match db.contains(name) {
            Ok(exists) => exists,
            Err(source) => return Err(abort(tracker, Some(name.clone()), source)),
        };
        let top = exists && !index.has_parents(name);
        match index.set_top(name, top) {
            Ok(delta) => report.delta.merge(delta),
            Err(err) => report.rejected.push((name.clone(), err)),
        }
    }
    report.touched = touched.into_iter().collect();

    tracker.set_state(SyncState::Idle);
    debug!(
        "event=reconcile module=sync status=ok entries={} inserted={} removed={}",
        report.entries.len(),
        report.delta.inserted.len(),
        report.delta.removed.len()
    );
    Ok(report)
}

/// Clear `index` and rebuild it from every entry in database order.
pub(crate) fn rebuild<D: Database + ?Sized>(
    index: &mut CombIndex,
    tracker: &mut ChangeTracker,
    db: &D,
) -> Result<SyncReport, SyncError> {
    tracker.reset();
    tracker.set_state(SyncState::Reconciling);
    index.clear();
    let mut report = SyncReport {
        rebuilt: true,
        ..SyncReport::default()
    };

    let names = db.names().map_err(|source| abort(tracker, None, source))?;
    for name in &names {
        let members = match db.members(name) {
            Ok(members) => members.unwrap_or_default(),
            Err(source) => return Err(abort(tracker, Some(name.clone()), source)),
        };
        if !members.is_empty() {
            match index.sync_children(name, &desired_relations(name, &members)) {
                Ok(delta) => report.delta.merge(delta),
                Err(err) => report.rejected.push((name.clone(), err)),
            }
        }
        report.entries.push(name.clone());
    }
    for name in &names {
        if !index.has_parents(name) {
            match index.set_top(name, true) {
                Ok(delta) => report.delta.merge(delta),
                Err(err) => report.rejected.push((name.clone(), err)),
            }
        }
    }
    report.touched = names;

    tracker.set_state(SyncState::Idle);
    info!(
        "event=rebuild module=sync status=ok entries={} instances={} pooled={}",
        report.entries.len(),
        index.len(),
        index.registry().pooled()
    );
    Ok(report)
}
