// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Comb Index: instance identity and a bidirectional index for comb trees.
//!
//! A CAD database is a DAG of named objects. Combination objects ("combs") list
//! their members, each with a boolean operation and a 4x4 transform. The same
//! child can appear under many parents, and more than once under a single
//! parent with different transforms or operations, so a parent/child name pair
//! cannot address a row in a tree view. This crate gives every occurrence its
//! own identity and keeps both navigation directions in sync.
//!
//! - [`Instance`]: one (parent, child, op, matrix) occurrence.
//! - [`InstanceId`]: generational handle; stale once the instance is released.
//! - [`Registry`]: slot arena with a free pool of retired instances.
//! - [`CombIndex`]: the registry plus `parent → [instances]` and
//!   `child → parent → {instances}` maps, mutated only through composed
//!   operations so the two directions never disagree.
//!
//! Key operations:
//! - [`CombIndex::insert`] / [`CombIndex::insert_at`] → [`InstanceId`], rejecting exact duplicates.
//! - [`CombIndex::remove`] and [`CombIndex::remove_object`].
//! - [`CombIndex::children_of`] and [`CombIndex::parents_of`].
//! - [`CombIndex::sync_children`]: atomic per-parent diff against a desired member list,
//!   returning a [`Delta`].
//! - [`CombIndex::replace`]: release-then-acquire edit of an edge's op/matrix.
//!
//! ## Identity
//!
//! Two instances are distinct if any of {parent, child, op, matrix} differ.
//! A comb may still list the very same member twice; such references carry an
//! [`Instance::occurrence`] ordinal so each database entry keeps its own
//! instance.
//!
//! ## Example
//!
//! ```rust
//! use understory_comb_index::{BoolOp, CombIndex, Mat4};
//!
//! let mut index = CombIndex::new();
//! let r = "r".into();
//! index.set_top(&r, true).unwrap();
//! index
//!     .insert(Some(r.clone()), "a".into(), BoolOp::Union, Mat4::IDENTITY)
//!     .unwrap();
//! index
//!     .insert(Some(r), "b".into(), BoolOp::Subtract, Mat4::translation(0.0, 0.0, 10.0))
//!     .unwrap();
//!
//! assert_eq!(index.children_of(None).len(), 1);
//! assert_eq!(index.children_of(Some("r")).len(), 2);
//! assert!(index.is_consistent());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod delta;
mod error;
mod registry;
mod topology;
mod types;

pub use delta::Delta;
pub use error::IndexError;
pub use registry::Registry;
pub use topology::CombIndex;
pub use types::{BoolOp, Instance, InstanceId, Mat4, Name, Relation};
