// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized edit sequences must keep both maps of the index in agreement.

use proptest::prelude::*;
use understory_comb_index::{BoolOp, CombIndex, InstanceId, Mat4, Name};

const NAMES: [&str; 5] = ["r", "a", "b", "c", "l"];
const OPS: [BoolOp; 3] = [BoolOp::Union, BoolOp::Subtract, BoolOp::Intersect];

#[derive(Clone, Debug)]
enum Edit {
    Insert {
        parent: Option<usize>,
        child: usize,
        op: usize,
        shift: u8,
    },
    Remove(usize),
    RemoveObject(usize),
    Replace {
        pick: usize,
        op: usize,
    },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (proptest::option::of(0..NAMES.len()), 0..NAMES.len(), 0..OPS.len(), 0_u8..3)
            .prop_map(|(parent, child, op, shift)| Edit::Insert { parent, child, op, shift }),
        2 => (0_usize..64).prop_map(Edit::Remove),
        1 => (0..NAMES.len()).prop_map(Edit::RemoveObject),
        1 => (0_usize..64, 0..OPS.len()).prop_map(|(pick, op)| Edit::Replace { pick, op }),
    ]
}

fn live_ids(index: &CombIndex) -> Vec<InstanceId> {
    index.registry().iter().map(|(id, _)| id).collect()
}

proptest! {
    #[test]
    fn maps_stay_consistent(edits in proptest::collection::vec(edit(), 0..80)) {
        let mut index = CombIndex::new();
        for edit in edits {
            match edit {
                Edit::Insert { parent, child, op, shift } => {
                    let before = index.snapshot();
                    let result = index.insert(
                        parent.map(|p| Name::from(NAMES[p])),
                        Name::from(NAMES[child]),
                        OPS[op],
                        Mat4::translation(f64::from(shift), 0.0, 0.0),
                    );
                    if result.is_err() {
                        prop_assert_eq!(index.snapshot(), before, "failed insert must not mutate");
                    }
                }
                Edit::Remove(pick) => {
                    let ids = live_ids(&index);
                    if !ids.is_empty() {
                        let id = ids[pick % ids.len()];
                        prop_assert!(index.remove(id).is_ok());
                        prop_assert!(!index.is_alive(id));
                    }
                }
                Edit::RemoveObject(name) => {
                    let name = NAMES[name];
                    index.remove_object(name);
                    prop_assert!(index.children_of(Some(name)).is_empty());
                    prop_assert_eq!(index.parents_of(name).count(), 0);
                }
                Edit::Replace { pick, op } => {
                    let ids = live_ids(&index);
                    if !ids.is_empty() {
                        let id = ids[pick % ids.len()];
                        let matrix = *index.get(id).unwrap().matrix();
                        let _ = index.replace(id, OPS[op], matrix);
                    }
                }
            }
            prop_assert!(index.is_consistent());
        }
    }

    #[test]
    fn every_parent_bucket_entry_is_found_from_the_child(
        edges in proptest::collection::vec((0..NAMES.len(), 0..NAMES.len(), 0..OPS.len()), 0..40)
    ) {
        let mut index = CombIndex::new();
        for (parent, child, op) in edges {
            let _ = index.insert(
                Some(Name::from(NAMES[parent])),
                Name::from(NAMES[child]),
                OPS[op],
                Mat4::IDENTITY,
            );
        }
        for parent in NAMES {
            for id in index.children_of(Some(parent)) {
                let child = index.child_of(*id).unwrap().clone();
                prop_assert!(index.parents_of(&child).any(|other| other == *id));
            }
        }
    }
}
