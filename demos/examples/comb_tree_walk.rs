// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Comb tree walk: database edits, reconciliation, selection, and row edits.
//!
//! This example shows how to combine:
//! - `understory_comb_tree` for tracking a live database and reconciling the index,
//! - `understory_comb_model` for row/column navigation and observer notifications.
//!
//! Run:
//! - `cargo run -p understory_comb_demos --example comb_tree_walk`
//! - `RUST_LOG=debug cargo run -p understory_comb_demos --example comb_tree_walk`

use understory_comb_index::{BoolOp, Mat4};
use understory_comb_model::{
    ItemData, ItemModel, ModelConfig, ModelIndex, ModelObserver, Orientation, Role,
};
use understory_comb_tree::{Context, ContextConfig, Member, MemoryDb};

/// Prints every notification a view would receive.
#[derive(Debug, Default)]
struct PrintObserver;

impl ModelObserver for PrintObserver {
    fn begin_insert_rows(&mut self, parent: ModelIndex, first: usize, last: usize) {
        println!("  [view] insert rows {first}..={last} under row {}", parent.row());
    }
    fn begin_remove_rows(&mut self, parent: ModelIndex, first: usize, last: usize) {
        println!("  [view] remove rows {first}..={last} under row {}", parent.row());
    }
    fn begin_reset_model(&mut self) {
        println!("  [view] reset");
    }
    fn data_changed(&mut self, top_left: ModelIndex, _: ModelIndex, roles: &[Role]) {
        println!("  [view] row {} changed {roles:?}", top_left.row());
    }
}

fn text(model: &ItemModel<MemoryDb, PrintObserver>, index: ModelIndex, column: usize) -> String {
    match model.data(index.sibling_at_column(column), Role::Display) {
        Some(ItemData::Text(name)) => name.to_string(),
        Some(ItemData::Op(op)) => op.symbol().to_string(),
        Some(other) => format!("{other:?}"),
        None => String::from("?"),
    }
}

fn print_tree(model: &ItemModel<MemoryDb, PrintObserver>, parent: ModelIndex, depth: usize) {
    for row in 0..model.row_count(parent) {
        let index = model.index(row, 0, parent);
        let active = matches!(model.data(index, Role::Active), Some(ItemData::Bool(true)));
        println!(
            "{:indent$}{} {}{}",
            "",
            text(model, index, 1),
            text(model, index, 0),
            if active { "  *" } else { "" },
            indent = depth * 2
        );
        print_tree(model, index, depth + 1);
    }
}

fn dump(title: &str, model: &ItemModel<MemoryDb, PrintObserver>) {
    let header = model
        .header_data(0, Orientation::Horizontal, Role::Display)
        .map(|data| format!("{data:?}"))
        .unwrap_or_default();
    println!("== {title} ({header})");
    print_tree(model, ModelIndex::INVALID, 1);
}

fn main() {
    env_logger::init();

    let mut ctx = Context::with_config(MemoryDb::new(), ContextConfig::default().with_reserve(16));
    ctx.edit(|db, tracker| {
        db.put_leaf("l", tracker);
        db.put_comb("a", vec![Member::new("l", BoolOp::Union)], tracker);
        db.put_comb(
            "b",
            vec![Member::new("l", BoolOp::Subtract).with_matrix(Mat4::translation(0.0, 0.0, 5.0))],
            tracker,
        );
        db.put_comb(
            "r",
            vec![Member::new("a", BoolOp::Union), Member::new("b", BoolOp::Union)],
            tracker,
        );
    });

    let config = ModelConfig::default().with_column("Op", Role::Operation);
    let mut model = ItemModel::with_observer(ctx, config, PrintObserver);
    let report = model.sync().expect("in-memory database is open");
    log::info!("initial pass inserted {} instances", report.delta.inserted.len());
    dump("initial", &model);

    // Select "l" under "a": both combs holding it light up, and so does "r" once.
    let r = model.index(0, 0, ModelIndex::INVALID);
    let a = model.index(0, 0, r);
    let l = model.index(0, 0, a);
    let activated = model.select(l).expect("acyclic data");
    println!("activated {} instances", activated.activated.len());
    dump("after selecting l", &model);

    // Change the operation of b inside r; the instance is replaced in place.
    let b = model.index(1, 0, r);
    model.set_data(b, ItemData::Op(BoolOp::Intersect), Role::Operation);

    // Add a second member to a through the model, then drop b from the database directly.
    model.insert_rows(1, a, &[Member::new("b", BoolOp::Subtract)]);
    model
        .context_mut()
        .edit(|db, tracker| db.remove_member("r", 1, tracker));
    model.sync().expect("in-memory database is open");
    dump("after edits", &model);

    let ctx = model.into_context();
    let pooled = ctx.index().registry().pooled();
    let db = ctx.close();
    println!("closed: {} entries, {pooled} pooled instances before close", db.len());
}
