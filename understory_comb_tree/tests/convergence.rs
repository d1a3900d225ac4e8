// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciling after arbitrary database edits must match a fresh rebuild.

use proptest::prelude::*;
use understory_comb_index::{BoolOp, Mat4};
use understory_comb_tree::{Context, Member, MemoryDb};

const NAMES: [&str; 6] = ["r", "a", "b", "c", "l", "m"];
const OPS: [BoolOp; 3] = [BoolOp::Union, BoolOp::Subtract, BoolOp::Intersect];

#[derive(Clone, Debug)]
enum DbEdit {
    Leaf(usize),
    Comb(usize, Vec<(usize, usize, u8)>),
    AddMember(usize, usize, usize),
    RemoveMember(usize, usize),
    Remove(usize),
    RemoveAll(usize),
}

fn db_edit() -> impl Strategy<Value = DbEdit> {
    let member = (0..NAMES.len(), 0..OPS.len(), 0_u8..2);
    prop_oneof![
        2 => (0..NAMES.len()).prop_map(DbEdit::Leaf),
        3 => (0..NAMES.len(), proptest::collection::vec(member, 0..4))
            .prop_map(|(name, members)| DbEdit::Comb(name, members)),
        3 => (0..NAMES.len(), 0..NAMES.len(), 0..OPS.len())
            .prop_map(|(comb, child, op)| DbEdit::AddMember(comb, child, op)),
        1 => (0..NAMES.len(), 0_usize..4).prop_map(|(comb, at)| DbEdit::RemoveMember(comb, at)),
        1 => (0..NAMES.len()).prop_map(DbEdit::Remove),
        1 => (0..NAMES.len()).prop_map(DbEdit::RemoveAll),
    ]
}

fn member(child: usize, op: usize, shift: u8) -> Member {
    Member::new(NAMES[child], OPS[op]).with_matrix(Mat4::translation(f64::from(shift), 0.0, 0.0))
}

fn apply(ctx: &mut Context<MemoryDb>, edit: DbEdit) {
    ctx.edit(|db, tracker| match edit {
        DbEdit::Leaf(name) => db.put_leaf(NAMES[name], tracker),
        DbEdit::Comb(name, members) => {
            let members = members
                .into_iter()
                .map(|(child, op, shift)| member(child, op, shift))
                .collect();
            db.put_comb(NAMES[name], members, tracker);
        }
        DbEdit::AddMember(comb, child, op) => {
            db.add_member(NAMES[comb], member(child, op, 0), tracker);
        }
        DbEdit::RemoveMember(comb, at) => {
            db.remove_member(NAMES[comb], at, tracker);
        }
        DbEdit::Remove(name) => {
            db.remove(NAMES[name], tracker);
        }
        DbEdit::RemoveAll(name) => {
            db.remove_all(NAMES[name], tracker);
        }
    });
}

proptest! {
    #[test]
    fn reconcile_matches_rebuild(
        batches in proptest::collection::vec(proptest::collection::vec(db_edit(), 1..6), 1..8)
    ) {
        let mut ctx = Context::new(MemoryDb::new());
        for batch in batches {
            for edit in batch {
                apply(&mut ctx, edit);
            }
            ctx.reconcile().unwrap();
            prop_assert!(ctx.index().is_consistent());

            let mut fresh = Context::new(ctx.database().clone());
            fresh.rebuild().unwrap();
            prop_assert_eq!(ctx.index().snapshot(), fresh.index().snapshot());
        }
    }
}
