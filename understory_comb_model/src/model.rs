// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The item model: row/column navigation over a comb index.

use alloc::vec::Vec;

use hashbrown::HashSet;
use log::{debug, warn};
use understory_comb_index::{BoolOp, CombIndex, InstanceId, Mat4, Name, Relation};
use understory_comb_tree::{
    ActivationError, ActivationReport, Context, Database, DatabaseMut, Member, SyncError,
    SyncReport, SyncState,
};

use crate::observer::{ModelObserver, NoObserver};
use crate::types::{Column, ItemData, ItemFlags, ModelConfig, ModelIndex, Orientation, Role};

/// Hierarchical view of a [`Context`].
///
/// Rows under the root are the top-level objects; rows under any other item
/// are the members of the object that item shows. Every query accepts stale
/// or foreign indices and answers as for an unknown item: invalid index,
/// `None`, zero, or `false`.
///
/// Reads never reconcile on their own. Call [`ItemModel::sync`] after the
/// database changed; it wraps the pass in a model reset.
#[derive(Debug)]
pub struct ItemModel<D: Database, O: ModelObserver = NoObserver> {
    ctx: Context<D>,
    config: ModelConfig,
    observer: O,
}

impl<D: Database> ItemModel<D> {
    /// Model with default columns and no observer.
    pub fn new(ctx: Context<D>) -> Self {
        Self::with_observer(ctx, ModelConfig::default(), NoObserver)
    }
}

impl<D: Database, O: ModelObserver> ItemModel<D, O> {
    /// Model with explicit options and observer.
    pub fn with_observer(ctx: Context<D>, config: ModelConfig, observer: O) -> Self {
        Self {
            ctx,
            config,
            observer,
        }
    }

    /// The underlying context.
    pub fn context(&self) -> &Context<D> {
        &self.ctx
    }

    /// Mutable access to the underlying context, for database edits.
    pub fn context_mut(&mut self) -> &mut Context<D> {
        &mut self.ctx
    }

    /// The observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Options in effect.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Give back the context.
    pub fn into_context(self) -> Context<D> {
        self.ctx
    }

    fn index_ref(&self) -> &CombIndex {
        self.ctx.index()
    }

    /// Object shown by `index` (the comb whose members are its rows).
    fn object_of(&self, index: ModelIndex) -> Option<Name> {
        self.index_ref().child_of(index.instance()?).cloned()
    }

    /// Rows under `parent`, or `None` if `parent` is stale.
    fn rows_of(&self, parent: ModelIndex) -> Option<&[InstanceId]> {
        match parent.instance() {
            None => Some(self.index_ref().children_of(None)),
            Some(id) => {
                let object = self.index_ref().child_of(id)?;
                Some(self.index_ref().children_of(Some(&**object)))
            }
        }
    }

    fn index_of(&self, id: InstanceId, column: usize) -> ModelIndex {
        match self.index_ref().position_of(id) {
            Some(row) => ModelIndex::new(row, column, id),
            None => ModelIndex::INVALID,
        }
    }

    fn last_column(&self) -> usize {
        self.config.columns.len().saturating_sub(1)
    }

    // --- navigation ---

    /// Item at `row`, `column` under `parent`.
    pub fn index(&self, row: usize, column: usize, parent: ModelIndex) -> ModelIndex {
        if column >= self.column_count(parent) || (parent.is_valid() && parent.column() != 0) {
            return ModelIndex::INVALID;
        }
        match self.rows_of(parent).and_then(|rows| rows.get(row)) {
            Some(id) => ModelIndex::new(row, column, *id),
            None => ModelIndex::INVALID,
        }
    }

    /// Parent item of `index`.
    ///
    /// An object placed under several combs has several parents; the first
    /// instance recorded for the parent object is returned.
    pub fn parent(&self, index: ModelIndex) -> ModelIndex {
        let Some(id) = index.instance() else {
            return ModelIndex::INVALID;
        };
        let Some(parent) = self.index_ref().get(id).and_then(|i| i.parent()) else {
            return ModelIndex::INVALID;
        };
        match self.index_ref().parents_of(parent).next() {
            Some(first) => self.index_of(first, 0),
            None => ModelIndex::INVALID,
        }
    }

    /// Number of rows under `parent`.
    pub fn row_count(&self, parent: ModelIndex) -> usize {
        if parent.is_valid() && parent.column() != 0 {
            return 0;
        }
        self.rows_of(parent).map_or(0, <[InstanceId]>::len)
    }

    /// Number of columns under `parent`.
    pub fn column_count(&self, parent: ModelIndex) -> usize {
        match parent.instance() {
            Some(id) if !self.index_ref().is_alive(id) => 0,
            _ => self.config.columns.len(),
        }
    }

    /// Returns `true` if `parent` has rows.
    pub fn has_children(&self, parent: ModelIndex) -> bool {
        self.row_count(parent) > 0
    }

    // --- item data ---

    /// Capabilities of `index`; empty for the root and stale indices.
    pub fn flags(&self, index: ModelIndex) -> ItemFlags {
        let Some(instance) = index.instance().and_then(|id| self.index_ref().get(id)) else {
            return ItemFlags::empty();
        };
        let mut flags = ItemFlags::SELECTABLE | ItemFlags::ENABLED;
        if instance.parent().is_some() && !self.config.editable_roles.is_empty() {
            flags |= ItemFlags::EDITABLE;
        }
        if !self.index_ref().children_of(Some(instance.child())).is_empty() {
            flags |= ItemFlags::HAS_CHILDREN;
        }
        flags
    }

    /// Value of `role` for `index`.
    pub fn data(&self, index: ModelIndex, role: Role) -> Option<ItemData> {
        let instance = self.index_ref().get(index.instance()?)?;
        let role = match role {
            Role::Display => self.config.columns.get(index.column())?.role,
            other => other,
        };
        Some(match role {
            Role::Display | Role::Edit => ItemData::Text(instance.child_name().clone()),
            Role::Active => ItemData::Bool(instance.is_active()),
            Role::Operation => ItemData::Op(instance.op()),
            Role::Matrix => ItemData::Matrix(*instance.matrix()),
            Role::Occurrence => ItemData::Count(instance.occurrence()),
        })
    }

    /// Header text of column `section`.
    pub fn header_data(&self, section: usize, orientation: Orientation, role: Role) -> Option<ItemData> {
        match (orientation, role) {
            (Orientation::Horizontal, Role::Display | Role::Edit) => self
                .config
                .columns
                .get(section)
                .map(|column| ItemData::Text(column.header.clone())),
            _ => None,
        }
    }

    /// Rename column `section`.
    pub fn set_header_data(
        &mut self,
        section: usize,
        orientation: Orientation,
        value: ItemData,
        role: Role,
    ) -> bool {
        let (Orientation::Horizontal, Role::Display | Role::Edit, ItemData::Text(text)) =
            (orientation, role, value)
        else {
            return false;
        };
        let Some(column) = self.config.columns.get_mut(section) else {
            return false;
        };
        column.header = text;
        self.observer
            .header_data_changed(Orientation::Horizontal, section, section);
        true
    }

    // --- columns ---

    /// Insert `count` empty columns before `column`. Only the root carries columns.
    pub fn insert_columns(&mut self, column: usize, count: usize, parent: ModelIndex) -> bool {
        if parent.is_valid() || count == 0 || column > self.config.columns.len() {
            return false;
        }
        self.observer
            .begin_insert_columns(parent, column, column + count - 1);
        for at in column..column + count {
            self.config
                .columns
                .insert(at, Column::new("", Role::Display));
        }
        self.observer.end_insert_columns();
        true
    }

    /// Remove `count` columns starting at `column`. At least one column remains.
    pub fn remove_columns(&mut self, column: usize, count: usize, parent: ModelIndex) -> bool {
        let len = self.config.columns.len();
        let Some(end) = column.checked_add(count) else {
            return false;
        };
        if parent.is_valid() || count == 0 || end > len || count >= len {
            return false;
        }
        self.observer.begin_remove_columns(parent, column, end - 1);
        self.config.columns.drain(column..end);
        self.observer.end_remove_columns();
        true
    }

    // --- synchronization and selection ---

    /// Apply pending database changes, wrapped in a model reset.
    ///
    /// After an aborted pass this rebuilds from scratch.
    pub fn sync(&mut self) -> Result<SyncReport, SyncError> {
        if !self.ctx.tracker().has_pending()
            && self.ctx.state() != SyncState::NeedsRebuild
        {
            return Ok(SyncReport::default());
        }
        self.observer.begin_reset_model();
        let result = self.ctx.sync();
        self.observer.end_reset_model();
        result
    }

    /// Highlight the ancestors of the object shown by `index`.
    ///
    /// Selecting the root clears every highlight. Rows whose `Active` value
    /// changed are reported through `data_changed`.
    pub fn select(&mut self, index: ModelIndex) -> Result<ActivationReport, ActivationError> {
        let before: Vec<InstanceId> = self.index_ref().active().collect();
        let result = match index.instance() {
            None => {
                self.ctx.deactivate_all();
                Ok(ActivationReport::default())
            }
            Some(id) => self.ctx.activate(id),
        };
        let after: &[InstanceId] = match &result {
            Ok(report) => &report.activated,
            Err(_) => &[],
        };

        let mut seen: HashSet<InstanceId> = HashSet::new();
        let changed: Vec<InstanceId> = before
            .iter()
            .filter(|id| !after.contains(id))
            .chain(after.iter().filter(|id| !before.contains(id)))
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        let last = self.last_column();
        for id in changed {
            let left = self.index_of(id, 0);
            if left.is_valid() {
                self.observer
                    .data_changed(left, left.sibling_at_column(last), &[Role::Active]);
            }
        }
        result
    }
}

/// Member list of `comb` as currently indexed.
fn members_of(index: &CombIndex, comb: &str) -> Vec<Member> {
    index
        .children_of(Some(comb))
        .iter()
        .filter_map(|id| index.get(*id))
        .map(|instance| Member {
            name: instance.child_name().clone(),
            op: instance.op(),
            matrix: *instance.matrix(),
        })
        .collect()
}

/// Occurrence ordinal that keeps a new `member` of `comb` distinct.
fn next_occurrence(index: &CombIndex, comb: &str, member: &Member) -> u32 {
    index
        .children_of(Some(comb))
        .iter()
        .filter_map(|id| index.get(*id))
        .filter(|i| i.child_name() == &member.name && i.op() == member.op && i.matrix() == &member.matrix)
        .map(|i| i.occurrence().saturating_add(1))
        .max()
        .unwrap_or(0)
}

impl<D: DatabaseMut, O: ModelObserver> ItemModel<D, O> {
    fn write_members(&mut self, comb: &str, members: Vec<Member>) -> bool {
        match self.ctx.edit(|db, tracker| db.set_members(comb, members, tracker)) {
            Ok(()) => true,
            Err(err) => {
                warn!("event=write_members module=model status=failed comb={comb} error={err}");
                false
            }
        }
    }

    /// Change the operation or transform of the edge shown by `index`.
    ///
    /// The edit is written to the database first; the instance is then
    /// replaced in place, so `index` goes stale and the item keeps its row.
    /// Items under every appearance of the comb share that index, so one
    /// `data_changed` covers them all.
    pub fn set_data(&mut self, index: ModelIndex, value: ItemData, role: Role) -> bool {
        if !self.config.editable_roles.contains(&role) {
            return false;
        }
        let Some(id) = index.instance() else {
            return false;
        };
        let Some(instance) = self.index_ref().get(id) else {
            return false;
        };
        let Some(comb) = instance.parent().map(Name::from) else {
            return false;
        };
        let (op, matrix): (BoolOp, Mat4) = match (role, value) {
            (Role::Operation, ItemData::Op(op)) => (op, *instance.matrix()),
            (Role::Matrix, ItemData::Matrix(matrix)) => (instance.op(), matrix),
            _ => return false,
        };
        let Some(row) = self.index_ref().position_of(id) else {
            return false;
        };

        let mut members = members_of(self.index_ref(), &comb);
        if let Some(member) = members.get_mut(row) {
            member.op = op;
            member.matrix = matrix;
        }
        if !self.write_members(&comb, members) {
            return false;
        }

        match self.ctx.index_mut().replace(id, op, matrix) {
            Ok(new_id) => {
                let left = ModelIndex::new(row, 0, new_id);
                let right = left.sibling_at_column(self.last_column());
                self.observer.data_changed(left, right, &[role]);
            }
            // The database already holds the edit; the next sync picks it up.
            Err(err) => debug!("event=set_data module=model status=deferred comb={comb} error={err}"),
        }
        true
    }

    /// Every item that shows `object`, in first-insertion order of its parents.
    fn appearances(&self, object: &str) -> Vec<ModelIndex> {
        self.index_ref()
            .parents_of(object)
            .map(|id| self.index_of(id, 0))
            .filter(ModelIndex::is_valid)
            .collect()
    }

    /// Add or drop the root row of each of `names` so top-level status
    /// matches the database again.
    fn settle_top(&mut self, names: &[Name]) {
        for name in names {
            let exists = match self.ctx.database().contains(name) {
                Ok(exists) => exists,
                Err(err) => {
                    debug!("event=settle_top module=model status=deferred name={name} error={err}");
                    continue;
                }
            };
            let top = exists && !self.index_ref().has_parents(name);
            let roots = self.index_ref().children_of(None);
            match (top, self.index_ref().is_top(name)) {
                (true, false) => {
                    let row = roots.partition_point(|id| {
                        self.index_ref().child_of(*id).is_some_and(|child| child <= name)
                    });
                    self.observer.begin_insert_rows(ModelIndex::INVALID, row, row);
                    if let Err(err) = self.ctx.index_mut().set_top(name, true) {
                        debug!("event=settle_top module=model status=deferred name={name} error={err}");
                    }
                    self.observer.end_insert_rows();
                }
                (false, true) => {
                    let Some(row) = roots
                        .iter()
                        .position(|id| self.index_ref().child_of(*id) == Some(name))
                    else {
                        continue;
                    };
                    self.observer.begin_remove_rows(ModelIndex::INVALID, row, row);
                    if let Err(err) = self.ctx.index_mut().set_top(name, false) {
                        debug!("event=settle_top module=model status=deferred name={name} error={err}");
                    }
                    self.observer.end_remove_rows();
                }
                _ => {}
            }
        }
    }

    /// Insert `members` as rows `row..` under `parent`.
    ///
    /// `parent` must show a comb; top-level rows come from the database and
    /// cannot be inserted here. Every item showing the comb gets the rows, so
    /// each one is announced. Members that were top-level lose their root row.
    pub fn insert_rows(&mut self, row: usize, parent: ModelIndex, members: &[Member]) -> bool {
        if members.is_empty() || members.iter().any(|m| m.name.is_empty()) {
            return false;
        }
        let Some(comb) = self.object_of(parent) else {
            return false;
        };
        let mut list = members_of(self.index_ref(), &comb);
        if row > list.len() {
            return false;
        }
        for (offset, member) in members.iter().enumerate() {
            list.insert(row + offset, member.clone());
        }
        if !self.write_members(&comb, list) {
            return false;
        }

        let appearances = self.appearances(&comb);
        let last = row + members.len() - 1;
        for at in &appearances {
            self.observer.begin_insert_rows(*at, row, last);
        }
        for (offset, member) in members.iter().enumerate() {
            let occurrence = next_occurrence(self.index_ref(), &comb, member);
            let relation = Relation::new(
                Some(comb.clone()),
                member.name.clone(),
                member.op,
                member.matrix,
            )
            .with_occurrence(occurrence);
            if let Err(err) = self.ctx.index_mut().insert_relation(relation, Some(row + offset)) {
                debug!("event=insert_rows module=model status=deferred comb={comb} error={err}");
            }
        }
        for _ in &appearances {
            self.observer.end_insert_rows();
        }

        let names: Vec<Name> = members.iter().map(|m| m.name.clone()).collect();
        self.settle_top(&names);
        true
    }

    /// Remove rows `row..row + count` under `parent`.
    ///
    /// The rows disappear under every item showing the comb. Objects left
    /// without any parent get a root row.
    pub fn remove_rows(&mut self, row: usize, count: usize, parent: ModelIndex) -> bool {
        if count == 0 {
            return false;
        }
        let Some(comb) = self.object_of(parent) else {
            return false;
        };
        let ids: Vec<InstanceId> = self.index_ref().children_of(Some(&*comb)).to_vec();
        let Some(end) = row.checked_add(count).filter(|end| *end <= ids.len()) else {
            return false;
        };
        let mut list = members_of(self.index_ref(), &comb);
        let names: Vec<Name> = list.drain(row..end).map(|m| m.name).collect();
        if !self.write_members(&comb, list) {
            return false;
        }

        let appearances = self.appearances(&comb);
        for at in &appearances {
            self.observer.begin_remove_rows(*at, row, end - 1);
        }
        for id in &ids[row..end] {
            if let Err(err) = self.ctx.index_mut().remove(*id) {
                debug!("event=remove_rows module=model status=deferred comb={comb} error={err}");
            }
        }
        for _ in &appearances {
            self.observer.end_remove_rows();
        }

        self.settle_top(&names);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use understory_comb_tree::{ContextConfig, MemoryDb};

    #[derive(Debug, PartialEq)]
    enum Event {
        BeginInsertRows(ModelIndex, usize, usize),
        EndInsertRows,
        BeginRemoveRows(ModelIndex, usize, usize),
        EndRemoveRows,
        BeginInsertColumns(usize, usize),
        EndInsertColumns,
        BeginRemoveColumns(usize, usize),
        EndRemoveColumns,
        BeginReset,
        EndReset,
        DataChanged(usize, Vec<Role>),
        HeaderChanged(usize),
    }

    #[derive(Debug, Default)]
    struct Recorder(Vec<Event>);

    impl ModelObserver for Recorder {
        fn begin_insert_rows(&mut self, parent: ModelIndex, first: usize, last: usize) {
            self.0.push(Event::BeginInsertRows(parent, first, last));
        }
        fn end_insert_rows(&mut self) {
            self.0.push(Event::EndInsertRows);
        }
        fn begin_remove_rows(&mut self, parent: ModelIndex, first: usize, last: usize) {
            self.0.push(Event::BeginRemoveRows(parent, first, last));
        }
        fn end_remove_rows(&mut self) {
            self.0.push(Event::EndRemoveRows);
        }
        fn begin_insert_columns(&mut self, _: ModelIndex, first: usize, last: usize) {
            self.0.push(Event::BeginInsertColumns(first, last));
        }
        fn end_insert_columns(&mut self) {
            self.0.push(Event::EndInsertColumns);
        }
        fn begin_remove_columns(&mut self, _: ModelIndex, first: usize, last: usize) {
            self.0.push(Event::BeginRemoveColumns(first, last));
        }
        fn end_remove_columns(&mut self) {
            self.0.push(Event::EndRemoveColumns);
        }
        fn begin_reset_model(&mut self) {
            self.0.push(Event::BeginReset);
        }
        fn end_reset_model(&mut self) {
            self.0.push(Event::EndReset);
        }
        fn data_changed(&mut self, top_left: ModelIndex, _: ModelIndex, roles: &[Role]) {
            self.0.push(Event::DataChanged(top_left.row(), roles.to_vec()));
        }
        fn header_data_changed(&mut self, _: Orientation, first: usize, _: usize) {
            self.0.push(Event::HeaderChanged(first));
        }
    }

    fn model() -> ItemModel<MemoryDb, Recorder> {
        let mut ctx = Context::new(MemoryDb::new());
        ctx.edit(|db, tracker| {
            db.put_leaf("l", tracker);
            db.put_comb("a", vec![Member::new("l", BoolOp::Union)], tracker);
            db.put_comb("b", vec![Member::new("l", BoolOp::Subtract)], tracker);
            db.put_comb(
                "r",
                vec![Member::new("a", BoolOp::Union), Member::new("b", BoolOp::Union)],
                tracker,
            );
        });
        let mut model = ItemModel::with_observer(
            ctx,
            ModelConfig::default().with_column("Op", Role::Operation),
            Recorder::default(),
        );
        model.sync().unwrap();
        model.observer_mut().0.clear();
        model
    }

    fn rebuilt_snapshot(model: &ItemModel<MemoryDb, Recorder>) -> Vec<Relation> {
        let db = model.context().database().clone();
        Context::open(db, ContextConfig::default())
            .unwrap()
            .index()
            .snapshot()
    }

    fn text(model: &ItemModel<MemoryDb, Recorder>, index: ModelIndex) -> Option<Name> {
        match model.data(index, Role::Display) {
            Some(ItemData::Text(name)) => Some(name),
            _ => None,
        }
    }

    #[test]
    fn navigation_matches_the_comb_tree() {
        let model = model();
        let root = ModelIndex::INVALID;
        assert_eq!(model.row_count(root), 1);
        assert_eq!(model.column_count(root), 2);
        let r = model.index(0, 0, root);
        assert_eq!(text(&model, r).as_deref(), Some("r"));
        assert_eq!(model.row_count(r), 2);
        let a = model.index(0, 0, r);
        let b = model.index(1, 0, r);
        assert_eq!(text(&model, a).as_deref(), Some("a"));
        assert_eq!(text(&model, b).as_deref(), Some("b"));
        assert_eq!(model.parent(a), r);
        assert_eq!(model.parent(r), root);
        assert!(!model.index(2, 0, r).is_valid());
        assert!(!model.index(0, 2, r).is_valid());
        assert_eq!(model.row_count(a.sibling_at_column(1)), 0);

        let l_under_b = model.index(0, 0, b);
        assert_eq!(model.parent(l_under_b), b);
        assert!(model.flags(r).contains(ItemFlags::HAS_CHILDREN));
        assert!(!model.flags(r).contains(ItemFlags::EDITABLE), "top rows have no edge");
        assert!(model.flags(a).contains(ItemFlags::EDITABLE | ItemFlags::SELECTABLE));
        assert!(!model.has_children(l_under_b));
    }

    #[test]
    fn parent_of_a_shared_comb_is_the_first_recorded_instance() {
        let mut model = model();
        model.context_mut().edit(|db, tracker| {
            db.put_comb("s", vec![Member::new("a", BoolOp::Union)], tracker);
        });
        model.sync().unwrap();

        let root = ModelIndex::INVALID;
        let r = model.index(0, 0, root);
        let s = model.index(1, 0, root);
        assert_eq!(text(&model, s).as_deref(), Some("s"));
        let a_under_s = model.index(0, 0, s);
        let l_via_s = model.index(0, 0, a_under_s);
        assert_eq!(text(&model, l_via_s).as_deref(), Some("l"));
        // "a" sits under both r and s; the instance under r was recorded first.
        assert_eq!(model.parent(l_via_s), model.index(0, 0, r));
        assert_ne!(model.parent(l_via_s), a_under_s);
        assert_eq!(model.parent(a_under_s), s);
    }

    #[test]
    fn columns_select_the_displayed_role() {
        let model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let b_op = model.index(1, 1, r);
        assert_eq!(model.data(b_op, Role::Display), Some(ItemData::Op(BoolOp::Union)));
        assert_eq!(
            model.header_data(1, Orientation::Horizontal, Role::Display),
            Some(ItemData::Text(Name::from("Op")))
        );
        assert_eq!(model.header_data(0, Orientation::Vertical, Role::Display), None);
        assert_eq!(model.data(b_op, Role::Occurrence), Some(ItemData::Count(0)));
    }

    #[test]
    fn stale_indices_answer_as_unknown() {
        let mut model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let a = model.index(0, 0, r);
        assert!(model.set_data(a, ItemData::Op(BoolOp::Intersect), Role::Operation));
        assert_eq!(model.data(a, Role::Display), None);
        assert_eq!(model.flags(a), ItemFlags::empty());
        assert_eq!(model.row_count(a), 0);
        assert_eq!(model.column_count(a), 0);
        assert!(!model.index(0, 0, a).is_valid());
        assert!(!model.parent(a).is_valid());
        assert!(!model.remove_rows(0, 1, a));
    }

    #[test]
    fn set_data_replaces_the_edge_and_writes_through() {
        let mut model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let b = model.index(1, 0, r);
        let matrix = Mat4::translation(0.0, 2.0, 0.0);
        assert!(model.set_data(b, ItemData::Matrix(matrix), Role::Matrix));
        assert_eq!(
            model.observer().0,
            [Event::DataChanged(1, vec![Role::Matrix])]
        );
        let b2 = model.index(1, 0, r);
        assert_ne!(b2, b);
        assert_eq!(model.data(b2, Role::Matrix), Some(ItemData::Matrix(matrix)));
        let stored = model.context().database().members("r").unwrap().unwrap();
        assert_eq!(stored[1].matrix, matrix);

        // The write-through hook is reconciled without further changes.
        let report = model.sync().unwrap();
        assert!(report.is_empty());
        assert_eq!(model.index(1, 0, r), b2);

        assert!(!model.set_data(r, ItemData::Op(BoolOp::Subtract), Role::Operation));
        assert!(!model.set_data(b2, ItemData::Bool(true), Role::Active));
        assert!(!model.set_data(b2, ItemData::Bool(true), Role::Operation));
    }

    #[test]
    fn row_edits_are_bracketed_and_persisted() {
        let mut model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let a = model.index(0, 0, r);
        let added = [
            Member::new("b", BoolOp::Subtract),
            Member::new("l", BoolOp::Union),
        ];
        assert!(model.insert_rows(0, a, &added));
        assert_eq!(model.row_count(a), 3);
        let names: Vec<Option<Name>> = (0..3).map(|row| text(&model, model.index(row, 0, a))).collect();
        assert_eq!(
            names,
            [Some(Name::from("b")), Some(Name::from("l")), Some(Name::from("l"))]
        );
        let occurrence = model.data(model.index(1, 0, a), Role::Occurrence);
        assert_eq!(occurrence, Some(ItemData::Count(1)), "identical reference stays distinct");

        assert!(model.remove_rows(1, 2, a));
        assert_eq!(model.row_count(a), 1);
        assert_eq!(
            model.observer().0,
            [
                Event::BeginInsertRows(a, 0, 1),
                Event::EndInsertRows,
                Event::BeginRemoveRows(a, 1, 2),
                Event::EndRemoveRows,
            ]
        );
        let stored = model.context().database().members("a").unwrap().unwrap();
        assert_eq!(stored, [Member::new("b", BoolOp::Subtract)]);

        model.sync().unwrap();
        assert!(model.context().index().is_consistent());
        assert_eq!(model.row_count(model.index(0, 0, ModelIndex::INVALID)), 2);

        assert!(!model.insert_rows(0, ModelIndex::INVALID, &added), "top rows come from the database");
        assert!(!model.insert_rows(9, a, &added));
        assert!(!model.remove_rows(0, 5, a));
    }

    #[test]
    fn row_edits_reach_every_appearance_of_a_shared_comb() {
        let mut model = model();
        model.context_mut().edit(|db, tracker| {
            db.put_comb("s", vec![Member::new("a", BoolOp::Union)], tracker);
        });
        model.sync().unwrap();
        model.observer_mut().0.clear();

        let root = ModelIndex::INVALID;
        let a_under_r = model.index(0, 0, model.index(0, 0, root));
        let a_under_s = model.index(0, 0, model.index(1, 0, root));
        assert_ne!(a_under_r, a_under_s);

        assert!(model.insert_rows(0, a_under_s, &[Member::new("l", BoolOp::Subtract)]));
        assert_eq!(model.row_count(a_under_r), 2);
        assert_eq!(model.row_count(a_under_s), 2);
        assert_eq!(
            model.observer().0,
            [
                Event::BeginInsertRows(a_under_r, 0, 0),
                Event::BeginInsertRows(a_under_s, 0, 0),
                Event::EndInsertRows,
                Event::EndInsertRows,
            ]
        );

        model.observer_mut().0.clear();
        assert!(model.remove_rows(0, 1, a_under_r));
        assert_eq!(model.row_count(a_under_s), 1);
        assert_eq!(
            model.observer().0,
            [
                Event::BeginRemoveRows(a_under_r, 0, 0),
                Event::BeginRemoveRows(a_under_s, 0, 0),
                Event::EndRemoveRows,
                Event::EndRemoveRows,
            ]
        );

        // Both appearances show the same child item.
        assert_eq!(model.index(0, 0, a_under_r), model.index(0, 0, a_under_s));
        assert_eq!(model.context().index().snapshot(), rebuilt_snapshot(&model));
    }

    #[test]
    fn row_edits_keep_top_level_rows_in_step_with_the_database() {
        let mut model = model();
        let root = ModelIndex::INVALID;
        let r = model.index(0, 0, root);

        // Dropping the only reference to "a" makes it top-level.
        assert!(model.remove_rows(0, 1, r));
        assert_eq!(model.row_count(root), 2);
        assert_eq!(text(&model, model.index(0, 0, root)).as_deref(), Some("a"));
        assert_eq!(model.context().index().snapshot(), rebuilt_snapshot(&model));
        assert_eq!(
            model.observer().0,
            [
                Event::BeginRemoveRows(r, 0, 0),
                Event::EndRemoveRows,
                Event::BeginInsertRows(root, 0, 0),
                Event::EndInsertRows,
            ]
        );

        // Referencing it again takes the root row away.
        model.observer_mut().0.clear();
        let r = model.index(1, 0, root);
        assert!(model.insert_rows(0, r, &[Member::new("a", BoolOp::Union)]));
        assert_eq!(model.row_count(root), 1);
        assert_eq!(model.context().index().snapshot(), rebuilt_snapshot(&model));
        assert_eq!(
            model.observer().0,
            [
                Event::BeginInsertRows(r, 0, 0),
                Event::EndInsertRows,
                Event::BeginRemoveRows(root, 0, 0),
                Event::EndRemoveRows,
            ]
        );

        assert!(model.sync().unwrap().is_empty());
        assert!(model.context().index().is_consistent());
    }

    #[test]
    fn writes_to_leaves_are_refused() {
        let mut model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let l = model.index(0, 0, model.index(0, 0, r));
        assert!(!model.insert_rows(0, l, &[Member::new("b", BoolOp::Union)]));
        assert!(model.observer().0.is_empty());
        assert_eq!(model.row_count(l), 0);
    }

    #[test]
    fn sync_is_wrapped_in_a_reset() {
        let mut model = model();
        assert!(model.sync().unwrap().is_empty());
        assert!(model.observer().0.is_empty(), "nothing pending, no reset");

        model
            .context_mut()
            .edit(|db, tracker| db.put_leaf("z", tracker));
        model.sync().unwrap();
        assert_eq!(model.observer().0, [Event::BeginReset, Event::EndReset]);
        assert_eq!(model.row_count(ModelIndex::INVALID), 2);
    }

    #[test]
    fn select_reports_changed_rows() {
        let mut model = model();
        let r = model.index(0, 0, ModelIndex::INVALID);
        let l = model.index(0, 0, model.index(0, 0, r));
        let report = model.select(l).unwrap();
        assert_eq!(report.activated.len(), 3);
        assert_eq!(
            model.observer().0,
            [
                Event::DataChanged(0, vec![Role::Active]),
                Event::DataChanged(1, vec![Role::Active]),
                Event::DataChanged(0, vec![Role::Active]),
            ]
        );
        assert_eq!(model.data(r, Role::Active), Some(ItemData::Bool(true)));

        model.observer_mut().0.clear();
        model.select(l).unwrap();
        assert!(model.observer().0.is_empty(), "same selection, nothing changed");

        model.select(ModelIndex::INVALID).unwrap();
        assert_eq!(model.observer().0.len(), 3);
        assert_eq!(model.data(r, Role::Active), Some(ItemData::Bool(false)));
    }

    #[test]
    fn header_and_column_edits() {
        let mut model = model();
        assert!(model.set_header_data(
            0,
            Orientation::Horizontal,
            ItemData::Text(Name::from("Name")),
            Role::Edit
        ));
        assert!(!model.set_header_data(0, Orientation::Vertical, ItemData::Text(Name::from("x")), Role::Edit));
        assert!(model.insert_columns(1, 2, ModelIndex::INVALID));
        assert_eq!(model.column_count(ModelIndex::INVALID), 4);
        assert!(model.remove_columns(1, 2, ModelIndex::INVALID));
        assert!(!model.remove_columns(0, 2, ModelIndex::INVALID), "one column must remain");
        let r = model.index(0, 0, ModelIndex::INVALID);
        assert!(!model.insert_columns(0, 1, r));
        assert_eq!(
            model.observer().0,
            [
                Event::HeaderChanged(0),
                Event::BeginInsertColumns(1, 2),
                Event::EndInsertColumns,
                Event::BeginRemoveColumns(1, 2),
                Event::EndRemoveColumns,
            ]
        );
        assert_eq!(
            model.header_data(0, Orientation::Horizontal, Role::Display),
            Some(ItemData::Text(Name::from("Name")))
        );
    }
}
