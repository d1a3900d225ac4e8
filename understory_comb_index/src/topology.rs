// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bidirectional parent/child index over registry instances.

use alloc::vec::Vec;

use hashbrown::{DefaultHashBuilder, HashMap};
use indexmap::IndexMap;
use log::debug;
use smallvec::SmallVec;

use crate::delta::Delta;
use crate::error::IndexError;
use crate::registry::Registry;
use crate::types::{BoolOp, Instance, InstanceId, Mat4, Name, Relation};

/// Parent key used for top-level instances. Real names are never empty.
const ROOT_KEY: &str = "";

type Bucket = SmallVec<[InstanceId; 2]>;
type ParentBuckets = IndexMap<Name, Bucket, DefaultHashBuilder>;

/// Instance registry plus the two maps that address it.
///
/// - `parent_children`: parent → ordered instances ("what this node expands to").
/// - `child_parents`: child → parent → instances ("who references this node"),
///   both levels in first-insertion order.
///
/// Every live instance sits in exactly one bucket of each map. Only composed
/// operations are public, so the maps cannot drift apart, and a bucket that
/// becomes empty is erased together with its key.
///
/// Top-level instances (no parent) live in the root bucket, which is kept
/// sorted by child name.
///
/// ## Example
///
/// ```rust
/// use understory_comb_index::{BoolOp, CombIndex, Mat4};
///
/// let mut index = CombIndex::new();
/// let a = index
///     .insert(Some("r".into()), "a".into(), BoolOp::Union, Mat4::IDENTITY)
///     .unwrap();
/// let b = index
///     .insert(Some("r".into()), "a".into(), BoolOp::Subtract, Mat4::IDENTITY)
///     .unwrap();
///
/// assert_eq!(index.children_of(Some("r")), &[a, b]);
/// assert_eq!(index.parents_of("a").count(), 2);
///
/// index.remove(a).unwrap();
/// assert_eq!(index.children_of(Some("r")), &[b]);
/// ```
pub struct CombIndex {
    registry: Registry,
    parent_children: HashMap<Name, Vec<InstanceId>>,
    child_parents: HashMap<Name, ParentBuckets>,
    root: Name,
}

impl core::fmt::Debug for CombIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CombIndex")
            .field("registry", &self.registry)
            .field("parents", &self.parent_children.len())
            .field("children", &self.child_parents.len())
            .finish_non_exhaustive()
    }
}

impl Default for CombIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CombIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            parent_children: HashMap::new(),
            child_parents: HashMap::new(),
            root: Name::from(ROOT_KEY),
        }
    }

    /// Reserve registry space for at least `n` more instances.
    pub fn reserve(&mut self, n: usize) {
        self.registry.reserve(n);
    }

    /// Read access to the instance registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Look up a live instance.
    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.registry.get(id)
    }

    /// Returns `true` if `id` refers to a live, indexed instance.
    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.registry.is_alive(id)
    }

    /// Number of indexed instances.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Index a new relationship at the end of its parent's bucket.
    ///
    /// Fails with [`IndexError::DuplicateRelationship`] if the exact tuple
    /// (parent, child, op, matrix) is already present; the index is unchanged.
    pub fn insert(
        &mut self,
        parent: Option<Name>,
        child: Name,
        op: BoolOp,
        matrix: Mat4,
    ) -> Result<InstanceId, IndexError> {
        self.insert_relation(Relation::new(parent, child, op, matrix), None)
    }

    /// Index a relationship at `position` within its parent's bucket.
    ///
    /// The position is validated against the bucket length. Top-level
    /// instances are always placed at their sorted position.
    pub fn insert_at(
        &mut self,
        position: usize,
        parent: Option<Name>,
        child: Name,
        op: BoolOp,
        matrix: Mat4,
    ) -> Result<InstanceId, IndexError> {
        self.insert_relation(Relation::new(parent, child, op, matrix), Some(position))
    }

    /// Index a fully specified relation, including its occurrence ordinal.
    pub fn insert_relation(
        &mut self,
        relation: Relation,
        position: Option<usize>,
    ) -> Result<InstanceId, IndexError> {
        validate(&relation)?;
        if self.find(&relation).is_some() {
            debug!(
                "event=insert_rejected module=topology reason=duplicate parent={} child={}",
                relation.parent.as_deref().unwrap_or(ROOT_KEY),
                relation.child
            );
            return Err(IndexError::DuplicateRelationship {
                parent: relation.parent,
                child: relation.child,
            });
        }
        let len = self.children_of(relation.parent.as_deref()).len();
        if let Some(position) = position
            && position > len
        {
            return Err(IndexError::PositionOutOfRange { position, len });
        }

        let id = self.registry.acquire_occurrence(
            relation.parent,
            relation.child,
            relation.op,
            relation.matrix,
            relation.occurrence,
        );
        self.link(id, position);
        Ok(id)
    }

    /// Remove an instance from both maps and release it to the pool.
    pub fn remove(&mut self, id: InstanceId) -> Result<Instance, IndexError> {
        if !self.registry.is_alive(id) {
            return Err(IndexError::UnknownInstance(id));
        }
        self.unlink(id);
        self.registry.release(id)
    }

    /// Swap the operation and matrix of an instance, keeping its row.
    ///
    /// The old instance is released and a new one acquired in the same
    /// position of its parent's bucket, so the returned id differs from `id`
    /// unless nothing changed.
    pub fn replace(
        &mut self,
        id: InstanceId,
        op: BoolOp,
        matrix: Mat4,
    ) -> Result<InstanceId, IndexError> {
        let current = self
            .registry
            .get(id)
            .ok_or(IndexError::UnknownInstance(id))?;
        let mut relation = current.relation();
        if relation.op == op && relation.matrix == matrix {
            return Ok(id);
        }
        relation.op = op;
        relation.matrix = matrix;
        if self.find(&relation).is_some() {
            return Err(IndexError::DuplicateRelationship {
                parent: relation.parent,
                child: relation.child,
            });
        }
        let position = self.position_of(id);
        self.unlink(id);
        self.registry.release(id)?;
        let new_id = self.registry.acquire_occurrence(
            relation.parent,
            relation.child,
            relation.op,
            relation.matrix,
            relation.occurrence,
        );
        self.link(new_id, position);
        Ok(new_id)
    }

    /// Instances under `parent` in row order (`None` is the root bucket).
    ///
    /// Returns an empty slice for leaves and unknown names.
    pub fn children_of(&self, parent: Option<&str>) -> &[InstanceId] {
        self.parent_children
            .get(parent.unwrap_or(ROOT_KEY))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every instance whose child is `child`, grouped by parent in first-insertion order.
    pub fn parents_of<'a>(&'a self, child: &str) -> impl Iterator<Item = InstanceId> + use<'a> {
        self.child_parents
            .get(child)
            .into_iter()
            .flat_map(|parents| parents.values().flat_map(|bucket| bucket.iter().copied()))
    }

    /// Distinct parents referencing `child` (`None` for a top-level instance).
    pub fn parent_names_of<'a>(
        &'a self,
        child: &str,
    ) -> impl Iterator<Item = Option<&'a Name>> + use<'a> {
        self.child_parents
            .get(child)
            .into_iter()
            .flat_map(|parents| parents.keys())
            .map(|key| (!key.is_empty()).then_some(key))
    }

    /// Returns `true` if some comb references `child`.
    pub fn has_parents(&self, child: &str) -> bool {
        self.child_parents
            .get(child)
            .is_some_and(|parents| parents.keys().any(|key| !key.is_empty()))
    }

    /// Returns `true` if `name` has a top-level instance.
    pub fn is_top(&self, name: &str) -> bool {
        self.child_parents
            .get(name)
            .is_some_and(|parents| parents.contains_key(ROOT_KEY))
    }

    /// Child name of an instance.
    pub fn child_of(&self, id: InstanceId) -> Option<&Name> {
        self.registry.get(id).map(Instance::child_name)
    }

    /// Row of `id` within its parent's bucket.
    pub fn position_of(&self, id: InstanceId) -> Option<usize> {
        let instance = self.registry.get(id)?;
        self.children_of(instance.parent())
            .iter()
            .position(|other| *other == id)
    }

    /// Names that currently appear as a parent, in unspecified order.
    pub fn parents(&self) -> impl Iterator<Item = &Name> + '_ {
        self.parent_children.keys().filter(|key| !key.is_empty())
    }

    /// Make the bucket of `parent` equal to `desired`, in that order.
    ///
    /// Instances whose tuple appears in `desired` are kept (same id); the rest
    /// are released and missing tuples are acquired. The parent fields of
    /// `desired` are ignored. Validation happens before any change, so on
    /// error the index is untouched.
    pub fn sync_children(
        &mut self,
        parent: &Name,
        desired: &[Relation],
    ) -> Result<Delta, IndexError> {
        if parent.is_empty() {
            return Err(IndexError::InvalidName);
        }
        for (i, relation) in desired.iter().enumerate() {
            if relation.child.is_empty() {
                return Err(IndexError::InvalidName);
            }
            if desired[..i]
                .iter()
                .any(|earlier| earlier.same_edge(relation) && earlier.occurrence == relation.occurrence)
            {
                return Err(IndexError::DuplicateRelationship {
                    parent: Some(parent.clone()),
                    child: relation.child.clone(),
                });
            }
        }

        let existing: Vec<InstanceId> = self.children_of(Some(parent)).to_vec();
        let mut matched = alloc::vec![false; existing.len()];
        let mut plan: Vec<Option<InstanceId>> = Vec::with_capacity(desired.len());
        for relation in desired {
            let hit = existing.iter().enumerate().position(|(i, id)| {
                !matched[i]
                    && self.registry.get(*id).is_some_and(|instance| {
                        instance.child == relation.child
                            && instance.op == relation.op
                            && instance.matrix == relation.matrix
                            && instance.occurrence == relation.occurrence
                    })
            });
            match hit {
                Some(i) => {
                    matched[i] = true;
                    plan.push(Some(existing[i]));
                }
                None => plan.push(None),
            }
        }

        let mut delta = Delta::default();
        for (id, _) in existing.iter().zip(&matched).filter(|(_, m)| !**m) {
            self.unlink_child_parents(*id);
            let instance = self.registry.release(*id)?;
            delta.removed.push((*id, instance));
        }
        for (slot, relation) in plan.iter_mut().zip(desired) {
            if slot.is_none() {
                let id = self.registry.acquire_occurrence(
                    Some(parent.clone()),
                    relation.child.clone(),
                    relation.op,
                    relation.matrix,
                    relation.occurrence,
                );
                self.link_child_parents(id);
                delta.inserted.push(id);
                *slot = Some(id);
            }
        }

        let order: Vec<InstanceId> = plan.into_iter().flatten().collect();
        if order.is_empty() {
            self.parent_children.remove(&**parent);
        } else {
            self.parent_children.insert(parent.clone(), order);
        }
        if !delta.is_empty() {
            debug!(
                "event=sync_children module=topology parent={} inserted={} removed={}",
                parent,
                delta.inserted.len(),
                delta.removed.len()
            );
        }
        Ok(delta)
    }

    /// Add or remove the top-level instance of `name`.
    pub fn set_top(&mut self, name: &Name, top: bool) -> Result<Delta, IndexError> {
        let mut delta = Delta::default();
        match (top, self.is_top(name)) {
            (true, false) => {
                let id = self.insert_relation(Relation::top(name.clone()), None)?;
                delta.inserted.push(id);
            }
            (false, true) => {
                let ids: Vec<InstanceId> = self
                    .child_parents
                    .get(&**name)
                    .and_then(|parents| parents.get(ROOT_KEY))
                    .map(|bucket| bucket.to_vec())
                    .unwrap_or_default();
                for id in ids {
                    let instance = self.remove(id)?;
                    delta.removed.push((id, instance));
                }
            }
            _ => {}
        }
        Ok(delta)
    }

    /// Remove every instance where `name` is the parent or the child.
    pub fn remove_object(&mut self, name: &str) -> Delta {
        let mut ids: Vec<InstanceId> = self.children_of(Some(name)).to_vec();
        ids.extend(self.parents_of(name));
        let mut delta = Delta::default();
        for id in ids {
            if let Ok(instance) = self.remove(id) {
                delta.removed.push((id, instance));
            }
        }
        debug!(
            "event=remove_object module=topology name={} removed={}",
            name,
            delta.removed.len()
        );
        delta
    }

    /// Release every instance and empty both maps.
    pub fn clear(&mut self) {
        self.parent_children.clear();
        self.child_parents.clear();
        self.registry.clear();
    }

    /// Set the active flag of one instance. Returns `false` for stale ids.
    pub fn set_active(&mut self, id: InstanceId, active: bool) -> bool {
        match self.registry.get_mut(id) {
            Some(instance) => {
                instance.active = active;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `id` is live and active.
    pub fn is_active(&self, id: InstanceId) -> bool {
        self.registry.get(id).is_some_and(Instance::is_active)
    }

    /// Clear every active flag.
    pub fn clear_active(&mut self) {
        self.registry.clear_active();
    }

    /// Active instances in slot order.
    pub fn active(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.registry
            .iter()
            .filter(|(_, instance)| instance.active)
            .map(|(id, _)| id)
    }

    /// Canonical listing of every indexed relation.
    ///
    /// The root bucket comes first, then every parent in name order, each
    /// bucket in row order. Two indices with equal snapshots answer every
    /// query identically (up to instance ids).
    pub fn snapshot(&self) -> Vec<Relation> {
        let mut keys: Vec<&Name> = self.parent_children.keys().collect();
        keys.sort();
        keys.into_iter()
            .flat_map(|key| self.parent_children[&**key].iter())
            .filter_map(|id| self.registry.get(*id).map(Instance::relation))
            .collect()
    }

    /// Audit the dual-map invariant.
    ///
    /// Checks that every instance reachable from one map is reachable from
    /// the other under the matching keys, that the counts agree with the
    /// registry, and that no bucket is empty.
    pub fn is_consistent(&self) -> bool {
        let mut forward = 0_usize;
        for (key, bucket) in &self.parent_children {
            if bucket.is_empty() {
                return false;
            }
            for id in bucket {
                let Some(instance) = self.registry.get(*id) else {
                    return false;
                };
                if instance.parent().unwrap_or(ROOT_KEY) != &**key {
                    return false;
                }
                let listed = self
                    .child_parents
                    .get(instance.child())
                    .and_then(|parents| parents.get(&**key))
                    .is_some_and(|b| b.contains(id));
                if !listed {
                    return false;
                }
                forward += 1;
            }
        }

        let mut backward = 0_usize;
        for (child, parents) in &self.child_parents {
            if parents.is_empty() {
                return false;
            }
            for (key, bucket) in parents {
                if bucket.is_empty() {
                    return false;
                }
                for id in bucket {
                    let Some(instance) = self.registry.get(*id) else {
                        return false;
                    };
                    if instance.child != *child {
                        return false;
                    }
                    let listed = self
                        .parent_children
                        .get(&**key)
                        .is_some_and(|b| b.contains(id));
                    if !listed {
                        return false;
                    }
                    backward += 1;
                }
            }
        }

        forward == backward && forward == self.registry.len()
    }

    // --- internals ---

    fn find(&self, relation: &Relation) -> Option<InstanceId> {
        let key = relation.parent.as_deref().unwrap_or(ROOT_KEY);
        self.child_parents
            .get(&*relation.child)?
            .get(key)?
            .iter()
            .copied()
            .find(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|instance| instance.same_relationship(relation))
            })
    }

    fn parent_key(&self, instance: &Instance) -> Name {
        instance
            .parent
            .clone()
            .unwrap_or_else(|| self.root.clone())
    }

    fn link(&mut self, id: InstanceId, position: Option<usize>) {
        let Some(instance) = self.registry.get(id) else {
            return;
        };
        let key = self.parent_key(instance);
        let is_top = instance.parent.is_none();
        let child = instance.child.clone();

        let registry = &self.registry;
        let bucket = self.parent_children.entry(key).or_default();
        if is_top {
            let at = bucket.partition_point(|other| {
                registry
                    .get(*other)
                    .is_some_and(|o| o.child <= child)
            });
            bucket.insert(at, id);
        } else {
            match position {
                Some(at) if at <= bucket.len() => bucket.insert(at, id),
                _ => bucket.push(id),
            }
        }
        self.link_child_parents(id);
    }

    fn link_child_parents(&mut self, id: InstanceId) {
        let Some(instance) = self.registry.get(id) else {
            return;
        };
        let key = self.parent_key(instance);
        self.child_parents
            .entry(instance.child.clone())
            .or_default()
            .entry(key)
            .or_default()
            .push(id);
    }

    fn unlink(&mut self, id: InstanceId) {
        let Some(instance) = self.registry.get(id) else {
            return;
        };
        let key = self.parent_key(instance);
        if let Some(bucket) = self.parent_children.get_mut(&*key) {
            if let Some(pos) = bucket.iter().position(|other| *other == id) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.parent_children.remove(&*key);
            }
        }
        self.unlink_child_parents(id);
    }

    fn unlink_child_parents(&mut self, id: InstanceId) {
        let Some(instance) = self.registry.get(id) else {
            return;
        };
        let key = self.parent_key(instance);
        let child = instance.child.clone();
        let Some(parents) = self.child_parents.get_mut(&*child) else {
            return;
        };
        if let Some(bucket) = parents.get_mut(&*key) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                parents.shift_remove(&*key);
            }
        }
        if parents.is_empty() {
            self.child_parents.remove(&*child);
        }
    }
}

fn validate(relation: &Relation) -> Result<(), IndexError> {
    if relation.child.is_empty() || relation.parent.as_deref().is_some_and(str::is_empty) {
        return Err(IndexError::InvalidName);
    }
    Ok(())
}
