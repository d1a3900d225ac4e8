// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Comb Model: a hierarchical item-model adapter for comb trees.
//!
//! Tree views address items by (row, column, parent). [`ItemModel`] answers
//! those queries from a [`Context`](understory_comb_tree::Context), reports
//! edits to a [`ModelObserver`], and writes row and edge edits back to the
//! database before applying them to the index.
//!
//! - [`ModelIndex`]: (row, column, instance) handle; the invalid index is the root.
//! - [`ItemFlags`], [`Role`], [`ItemData`]: per-item capabilities and values.
//! - [`ModelConfig`]: columns and editable roles.
//!
//! ## Example
//!
//! ```rust
//! use understory_comb_index::BoolOp;
//! use understory_comb_model::{ItemData, ItemModel, ModelIndex, Role};
//! use understory_comb_tree::{Context, Member, MemoryDb};
//!
//! let mut ctx = Context::new(MemoryDb::new());
//! ctx.edit(|db, tracker| {
//!     db.put_leaf("l", tracker);
//!     db.put_comb("a", vec![Member::new("l", BoolOp::Union)], tracker);
//! });
//! let mut model = ItemModel::new(ctx);
//! model.sync().unwrap();
//!
//! let a = model.index(0, 0, ModelIndex::INVALID);
//! assert_eq!(model.data(a, Role::Display), Some(ItemData::Text("a".into())));
//! assert_eq!(model.row_count(a), 1);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod model;
mod observer;
mod types;

pub use model::ItemModel;
pub use observer::{ModelObserver, NoObserver};
pub use types::{Column, ItemData, ItemFlags, ModelConfig, ModelIndex, Orientation, Role};
