// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handles, flags, roles, and values exchanged with item views.

use alloc::vec;
use alloc::vec::Vec;

use understory_comb_index::{BoolOp, InstanceId, Mat4, Name};

/// Position of an item in the model.
///
/// The default (invalid) index stands for the database root. An index is a
/// snapshot: once its instance is released it no longer resolves and every
/// query treats it as unknown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    instance: Option<InstanceId>,
}

impl ModelIndex {
    /// The root index.
    pub const INVALID: Self = Self {
        row: 0,
        column: 0,
        instance: None,
    };

    pub(crate) const fn new(row: usize, column: usize, instance: InstanceId) -> Self {
        Self {
            row,
            column,
            instance: Some(instance),
        }
    }

    /// Returns `true` unless this is the root index.
    pub const fn is_valid(&self) -> bool {
        self.instance.is_some()
    }

    /// Row within the parent (`0` for the root).
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Column (`0` for the root).
    pub const fn column(&self) -> usize {
        self.column
    }

    /// Instance shown by this item.
    pub const fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    /// The same item in another column.
    #[must_use]
    pub const fn sibling_at_column(&self, column: usize) -> Self {
        Self { column, ..*self }
    }
}

bitflags::bitflags! {
    /// Capabilities of an item as reported to views.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// The item can be selected.
        const SELECTABLE   = 0b0000_0001;
        /// The item accepts `set_data` for at least one role.
        const EDITABLE     = 0b0000_0010;
        /// The item is interactive.
        const ENABLED      = 0b0000_0100;
        /// The item has child rows.
        const HAS_CHILDREN = 0b0000_1000;
    }
}

/// Kinds of data an item can provide.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Text to show; depends on the column.
    Display,
    /// Value presented to an editor: the object name.
    Edit,
    /// Highlight flag from the last activation pass.
    Active,
    /// Boolean operation of the edge.
    Operation,
    /// Transform of the edge.
    Matrix,
    /// Ordinal among identical references.
    Occurrence,
}

/// Value of one role of one item.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemData {
    /// Text.
    Text(Name),
    /// Flag.
    Bool(bool),
    /// Boolean operation.
    Op(BoolOp),
    /// Transform.
    Matrix(Mat4),
    /// Counter.
    Count(u32),
}

/// Header orientation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// Column headers.
    Horizontal,
    /// Row headers.
    Vertical,
}

/// One model column: a header and the role shown as its display text.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Header text.
    pub header: Name,
    /// Role whose value the column displays.
    pub role: Role,
}

impl Column {
    /// Create a column.
    pub fn new(header: impl Into<Name>, role: Role) -> Self {
        Self {
            header: header.into(),
            role,
        }
    }
}

/// Options for an [`ItemModel`](crate::ItemModel).
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Columns in display order. Never empty.
    pub columns: Vec<Column>,
    /// Roles accepted by `set_data`.
    pub editable_roles: Vec<Role>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            columns: vec![Column::new("Object", Role::Display)],
            editable_roles: vec![Role::Operation, Role::Matrix],
        }
    }
}

impl ModelConfig {
    /// Append a column.
    #[must_use]
    pub fn with_column(mut self, header: impl Into<Name>, role: Role) -> Self {
        self.columns.push(Column::new(header, role));
        self
    }

    /// Replace the set of editable roles.
    #[must_use]
    pub fn with_editable_roles(mut self, roles: &[Role]) -> Self {
        self.editable_roles = roles.to_vec();
        self
    }
}
