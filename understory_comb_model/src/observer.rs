// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications delivered to views.

use crate::types::{ModelIndex, Orientation, Role};

/// Receives structural and data notifications from an [`ItemModel`](crate::ItemModel).
///
/// Structural edits are always bracketed: a `begin_*` call arrives before
/// the index changes and the matching `end_*` call after. Rows of a comb
/// shown in several places change under all of them at once: every affected
/// parent gets its `begin_*` call, then the index changes, then one `end_*`
/// call arrives per `begin_*`. All methods default to doing nothing.
pub trait ModelObserver {
    /// Rows `first..=last` are about to be inserted under `parent`.
    fn begin_insert_rows(&mut self, _parent: ModelIndex, _first: usize, _last: usize) {}
    /// Row insertion finished.
    fn end_insert_rows(&mut self) {}
    /// Rows `first..=last` under `parent` are about to be removed.
    fn begin_remove_rows(&mut self, _parent: ModelIndex, _first: usize, _last: usize) {}
    /// Row removal finished.
    fn end_remove_rows(&mut self) {}
    /// Columns `first..=last` are about to be inserted.
    fn begin_insert_columns(&mut self, _parent: ModelIndex, _first: usize, _last: usize) {}
    /// Column insertion finished.
    fn end_insert_columns(&mut self) {}
    /// Columns `first..=last` are about to be removed.
    fn begin_remove_columns(&mut self, _parent: ModelIndex, _first: usize, _last: usize) {}
    /// Column removal finished.
    fn end_remove_columns(&mut self) {}
    /// Every index is about to become invalid.
    fn begin_reset_model(&mut self) {}
    /// The model was reset.
    fn end_reset_model(&mut self) {}
    /// Items between `top_left` and `bottom_right` changed the listed roles.
    fn data_changed(&mut self, _top_left: ModelIndex, _bottom_right: ModelIndex, _roles: &[Role]) {}
    /// Header sections `first..=last` changed.
    fn header_data_changed(&mut self, _orientation: Orientation, _first: usize, _last: usize) {}
}

/// Observer that ignores every notification.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoObserver;

impl ModelObserver for NoObserver {}
