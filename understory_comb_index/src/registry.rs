// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instance registry: slot arena, generations, and the free pool.

use alloc::vec::Vec;

use log::trace;

use crate::error::IndexError;
use crate::types::{BoolOp, Instance, InstanceId, Mat4, Name};

/// Owner of every [`Instance`].
///
/// Instances live in slots addressed by [`InstanceId`]. Released slots go to
/// a free pool and are handed out again by [`Registry::acquire`] with a bumped
/// generation, so ids issued before the release stay stale forever.
///
/// The pool is unbounded; it only ever holds as many slots as were live at
/// the high-water mark. A slot whose generation reaches `u32::MAX` is retired
/// on release instead of pooled, so its old ids can never resolve again.
pub struct Registry {
    /// slots
    slots: Vec<Option<Instance>>,
    /// last generation per slot (persists across releases)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    retired: usize,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("slots_total", &self.slots.len())
            .field("live", &self.len())
            .field("pooled", &self.free_list.len())
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            retired: 0,
        }
    }

    /// Reserve space for at least `n` more instances.
    pub fn reserve(&mut self, n: usize) {
        self.slots.reserve(n);
        self.generations.reserve(n);
    }

    /// Take an instance from the pool (or allocate one) and populate it.
    pub fn acquire(
        &mut self,
        parent: Option<Name>,
        child: Name,
        op: BoolOp,
        matrix: Mat4,
    ) -> InstanceId {
        self.acquire_occurrence(parent, child, op, matrix, 0)
    }

    pub(crate) fn acquire_occurrence(
        &mut self,
        parent: Option<Name>,
        child: Name,
        op: BoolOp,
        matrix: Mat4,
        occurrence: u32,
    ) -> InstanceId {
        let instance = Instance {
            parent,
            child,
            op,
            matrix,
            occurrence,
            active: false,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(instance);
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(instance));
            self.generations.push(generation);
            (self.slots.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "InstanceId uses 32-bit indices by design."
        )]
        let id = InstanceId::new(idx as u32, generation);
        trace!(
            "event=instance_acquire module=registry slot={} generation={}",
            id.0, id.1
        );
        id
    }

    /// Clear an instance and return its slot to the pool.
    ///
    /// `id` and every copy of it become stale. The released contents are
    /// returned to the caller.
    pub fn release(&mut self, id: InstanceId) -> Result<Instance, IndexError> {
        if !self.is_alive(id) {
            return Err(IndexError::UnknownInstance(id));
        }
        let instance = self.slots[id.idx()]
            .take()
            .ok_or(IndexError::UnknownInstance(id))?;
        self.recycle(id.idx());
        trace!(
            "event=instance_release module=registry slot={} generation={}",
            id.0, id.1
        );
        Ok(instance)
    }

    /// Returns true if `id` refers to a live instance.
    ///
    /// An id is live if its slot is occupied and the slot's generation
    /// matches the id's generation.
    pub fn is_alive(&self, id: InstanceId) -> bool {
        self.slots
            .get(id.idx())
            .and_then(|s| s.as_ref())
            .map(|_| self.generations[id.idx()] == id.1)
            .unwrap_or(false)
    }

    /// Look up a live instance.
    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots.get(id.idx()).and_then(|s| s.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.idx()).and_then(|s| s.as_mut())
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len() - self.retired
    }

    /// Returns `true` if no instance is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of retired slots waiting in the pool.
    pub fn pooled(&self) -> usize {
        self.free_list.len()
    }

    /// Iterate live instances in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            let instance = s.as_ref()?;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "InstanceId uses 32-bit indices by design."
            )]
            Some((InstanceId::new(i as u32, self.generations[i]), instance))
        })
    }

    /// Release every live instance into the pool.
    pub fn clear(&mut self) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.take().is_some() {
                if self.generations[idx] == u32::MAX {
                    self.retired += 1;
                } else {
                    self.free_list.push(idx);
                }
            }
        }
    }

    fn recycle(&mut self, idx: usize) {
        if self.generations[idx] == u32::MAX {
            trace!("event=slot_retired module=registry slot={idx}");
            self.retired += 1;
        } else {
            self.free_list.push(idx);
        }
    }

    pub(crate) fn clear_active(&mut self) {
        for instance in self.slots.iter_mut().flatten() {
            instance.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from(s)
    }

    #[test]
    fn acquire_release_reuse() {
        let mut reg = Registry::new();
        let a = reg.acquire(Some(name("r")), name("a"), BoolOp::Union, Mat4::IDENTITY);
        assert!(reg.is_alive(a));
        assert_eq!(reg.len(), 1);

        let released = reg.release(a).unwrap();
        assert_eq!(released.child(), "a");
        assert!(!reg.is_alive(a));
        assert_eq!(reg.pooled(), 1);

        let b = reg.acquire(Some(name("r")), name("b"), BoolOp::Union, Mat4::IDENTITY);
        assert_eq!(reg.pooled(), 0);
        assert_eq!(a.slot(), b.slot(), "pooled slot should be reused");
        assert!(b.generation() > a.generation(), "generation must increase on reuse");
        assert!(reg.get(a).is_none(), "stale ids must not resolve");
        assert_eq!(reg.get(b).map(Instance::child), Some("b"));
    }

    #[test]
    fn double_release_is_rejected() {
        let mut reg = Registry::new();
        let a = reg.acquire(None, name("top"), BoolOp::None, Mat4::IDENTITY);
        reg.release(a).unwrap();
        assert_eq!(reg.release(a), Err(IndexError::UnknownInstance(a)));
        assert_eq!(reg.pooled(), 1, "failed release must not grow the pool");
    }

    #[test]
    fn clear_moves_everything_to_pool() {
        let mut reg = Registry::new();
        let ids: Vec<_> = (0..4)
            .map(|i| {
                reg.acquire(
                    Some(name("r")),
                    name("c"),
                    BoolOp::Union,
                    Mat4::translation(f64::from(i), 0.0, 0.0),
                )
            })
            .collect();
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.pooled(), 4);
        assert!(ids.iter().all(|id| !reg.is_alive(*id)));
        assert_eq!(reg.iter().count(), 0);
    }

    #[test]
    fn exhausted_slots_are_retired() {
        let mut reg = Registry::new();
        let a = reg.acquire(None, name("a"), BoolOp::None, Mat4::IDENTITY);
        reg.release(a).unwrap();
        reg.generations[a.idx()] = u32::MAX - 1;

        let last = reg.acquire(None, name("b"), BoolOp::None, Mat4::IDENTITY);
        assert_eq!(last.slot(), a.slot());
        assert_eq!(last.generation(), u32::MAX);
        reg.release(last).unwrap();
        assert_eq!(reg.pooled(), 0, "a slot at the last generation is not pooled");
        assert!(reg.is_empty());

        let fresh = reg.acquire(None, name("c"), BoolOp::None, Mat4::IDENTITY);
        assert_ne!(fresh.slot(), last.slot());
        assert!(!reg.is_alive(last));
        assert_eq!(reg.len(), 1);
    }
}
