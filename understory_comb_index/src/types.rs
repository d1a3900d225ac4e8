// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the comb index: names, operators, matrices, and instance handles.

use alloc::sync::Arc;
use core::fmt;

/// Shared, immutable directory-entry name.
///
/// Names are cloned into every bucket that refers to them, so they are
/// reference counted rather than owned strings.
pub type Name = Arc<str>;

/// Boolean operation carried by a comb-tree edge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// No operation (top-level instances and unset edges).
    #[default]
    None,
    /// Union with the preceding members.
    Union,
    /// Subtract from the preceding members.
    Subtract,
    /// Intersect with the preceding members.
    Intersect,
}

impl BoolOp {
    /// Conventional comb-listing character for this operation.
    pub const fn symbol(self) -> char {
        match self {
            Self::None => ' ',
            Self::Union => 'u',
            Self::Subtract => '-',
            Self::Intersect => '+',
        }
    }

    /// Parse a comb-listing character back into an operation.
    pub const fn from_symbol(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Self::None),
            'u' => Some(Self::Union),
            '-' => Some(Self::Subtract),
            '+' => Some(Self::Intersect),
            _ => None,
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Row-major 4x4 transform applied to a child within its parent comb.
///
/// Equality is exact and component-wise; two matrices that differ only by
/// rounding are different edges.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mat4(pub [f64; 16]);

impl Mat4 {
    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// A pure translation.
    pub const fn translation(x: f64, y: f64, z: f64) -> Self {
        Self([
            1.0, 0.0, 0.0, x, //
            0.0, 1.0, 0.0, y, //
            0.0, 0.0, 1.0, z, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Returns `true` if this is exactly the identity transform.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Element at `row`, `col` (both `0..4`).
    pub const fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * 4 + col]
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Identifier for an instance in the registry (generational).
///
/// An id becomes stale as soon as its instance is released; a later
/// acquisition may reuse the slot but always with a newer generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u32, pub(crate) u32);

impl InstanceId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Slot index, stable while the instance is live.
    pub const fn slot(self) -> u32 {
        self.0
    }

    /// Generation of the slot when this id was issued.
    pub const fn generation(self) -> u32 {
        self.1
    }
}

/// One occurrence of a child under a parent in a comb tree.
///
/// The relationship fields are fixed for the lifetime of the instance; only
/// the derived `active` flag changes in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub(crate) parent: Option<Name>,
    pub(crate) child: Name,
    pub(crate) op: BoolOp,
    pub(crate) matrix: Mat4,
    pub(crate) occurrence: u32,
    pub(crate) active: bool,
}

impl Instance {
    /// Parent comb name, or `None` for a top-level instance.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Child name cached at acquisition time.
    pub fn child(&self) -> &str {
        &self.child
    }

    /// Shared handle to the child name.
    pub fn child_name(&self) -> &Name {
        &self.child
    }

    /// Boolean operation of this edge.
    pub fn op(&self) -> BoolOp {
        self.op
    }

    /// Transform of this edge.
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// Ordinal among identical (parent, child, op, matrix) references in the same comb.
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }

    /// Whether the last activation pass marked this instance.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` if `other` describes the exact same relationship tuple.
    pub fn same_relationship(&self, other: &Relation) -> bool {
        self.parent.as_deref() == other.parent.as_deref()
            && self.child == other.child
            && self.op == other.op
            && self.matrix == other.matrix
            && self.occurrence == other.occurrence
    }

    pub(crate) fn relation(&self) -> Relation {
        Relation {
            parent: self.parent.clone(),
            child: self.child.clone(),
            op: self.op,
            matrix: self.matrix,
            occurrence: self.occurrence,
        }
    }
}

/// Owned description of a relationship tuple, independent of any registry slot.
///
/// Used to describe desired state during synchronization and to compare
/// index contents.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    /// Parent comb name, `None` for top-level.
    pub parent: Option<Name>,
    /// Child name.
    pub child: Name,
    /// Boolean operation.
    pub op: BoolOp,
    /// Edge transform.
    pub matrix: Mat4,
    /// Ordinal among identical references.
    pub occurrence: u32,
}

impl Relation {
    /// Create a relation with occurrence `0`.
    pub fn new(parent: Option<Name>, child: Name, op: BoolOp, matrix: Mat4) -> Self {
        Self {
            parent,
            child,
            op,
            matrix,
            occurrence: 0,
        }
    }

    /// Create the top-level relation for `child`.
    pub fn top(child: Name) -> Self {
        Self::new(None, child, BoolOp::None, Mat4::IDENTITY)
    }

    /// Set the occurrence ordinal.
    #[must_use]
    pub fn with_occurrence(mut self, occurrence: u32) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub(crate) fn same_edge(&self, other: &Self) -> bool {
        self.child == other.child && self.op == other.op && self.matrix == other.matrix
    }
}
