//! Commit resolved merge operations to the store.
//!
//! Planning and execution are separate. Three pure passes over the operation
//! list produce field-level [`Edit`]s (deletions, additions, modifications);
//! execution then folds each phase's edits onto a working copy of the local
//! set and writes every touched record once per phase.
//!
//! Only values resolved to [`MergeFrom::Incoming`] produce edits. Choosing
//! [`MergeFrom::Local`] rejects the incoming change and never writes.
//! Unresolved sub-operations are skipped, except the sub-operations of a
//! class missing from the incoming set, which are accepted implicitly.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::{ClassMergeOperation, MergeFrom, MergeOperation};
use crate::errors::{ApplyError, StoreError};
use crate::models::{ClassDocumentation, MemberDocumentation};
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A single field-level store command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    DeleteRecord { id: u64 },
    ClearBody { id: u64 },
    RemoveMember { class_id: u64, member_id: u64 },
    CreateRecord(ClassDocumentation),
    SetBody { id: u64, body: String },
    AddMember { class_id: u64, member: MemberDocumentation },
    UpdateMember { class_id: u64, member: MemberDocumentation },
}

impl Edit {
    pub fn class_id(&self) -> u64 {
        match self {
            Self::DeleteRecord { id } | Self::ClearBody { id } | Self::SetBody { id, .. } => *id,
            Self::RemoveMember { class_id, .. }
            | Self::AddMember { class_id, .. }
            | Self::UpdateMember { class_id, .. } => *class_id,
            Self::CreateRecord(record) => record.id,
        }
    }

    /// Apply a field edit to `record`. Whole-record edits are handled by the
    /// executor and leave `record` untouched.
    fn fold_into(&self, record: &mut ClassDocumentation) {
        match self {
            Self::ClearBody { .. } => record.body = None,
            Self::SetBody { body, .. } => record.body = Some(body.clone()),
            Self::RemoveMember { member_id, .. } => {
                record.remove_member(*member_id);
            }
            Self::AddMember { member, .. } | Self::UpdateMember { member, .. } => {
                record.upsert_member(member.id, member.body.clone());
            }
            Self::DeleteRecord { .. } | Self::CreateRecord(_) => {}
        }
    }
}

/// The edits of one apply run, grouped by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub deletions: Vec<Edit>,
    pub additions: Vec<Edit>,
    pub modifications: Vec<Edit>,
}

impl ApplyPlan {
    pub fn build(operations: &[ClassMergeOperation]) -> Self {
        Self {
            deletions: plan_deletions(operations),
            additions: plan_additions(operations),
            modifications: plan_modifications(operations),
        }
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.additions.len() + self.modifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn accepts(from: Option<MergeFrom>) -> bool {
    from == Some(MergeFrom::Incoming)
}

/// Whole-record deletions plus accepted body/member deletions.
pub fn plan_deletions(operations: &[ClassMergeOperation]) -> Vec<Edit> {
    operations
        .iter()
        .flat_map(|op| match op.operation {
            MergeOperation::Delete => deleted_class_edits(op),
            MergeOperation::None => {
                let body = op
                    .body
                    .iter()
                    .filter(|b| b.operation == MergeOperation::Delete && accepts(b.from))
                    .map(|_| Edit::ClearBody { id: op.id });
                let members = op
                    .member_ops()
                    .iter()
                    .filter(|m| m.operation == MergeOperation::Delete && accepts(m.from))
                    .map(|m| Edit::RemoveMember {
                        class_id: op.id,
                        member_id: m.id,
                    });
                body.chain(members).collect()
            }
            MergeOperation::Add | MergeOperation::Update => Vec::new(),
        })
        .collect()
}

// A class missing from the incoming set is deleted outright unless the
// caller kept some of its fields with `Local`; then only the other fields go.
fn deleted_class_edits(op: &ClassMergeOperation) -> Vec<Edit> {
    let keeps_body = op.body.as_ref().is_some_and(|b| b.from == Some(MergeFrom::Local));
    let kept_members = op
        .member_ops()
        .iter()
        .filter(|m| m.from == Some(MergeFrom::Local))
        .count();
    if !keeps_body && kept_members == 0 {
        return vec![Edit::DeleteRecord { id: op.id }];
    }

    let body = op
        .body
        .iter()
        .filter(|_| !keeps_body)
        .map(|_| Edit::ClearBody { id: op.id });
    let members = op
        .member_ops()
        .iter()
        .filter(|m| m.from != Some(MergeFrom::Local))
        .map(|m| Edit::RemoveMember {
            class_id: op.id,
            member_id: m.id,
        });
    body.chain(members).collect()
}

/// New records for added classes plus accepted body/member additions.
pub fn plan_additions(operations: &[ClassMergeOperation]) -> Vec<Edit> {
    operations
        .iter()
        .flat_map(|op| match op.operation {
            MergeOperation::Add => {
                let mut record = ClassDocumentation::new(op.id);
                record.body = op
                    .body
                    .as_ref()
                    .filter(|b| accepts(b.from))
                    .and_then(|b| b.incoming.clone());
                for m in op.member_ops().iter().filter(|m| accepts(m.from)) {
                    if let Some(body) = &m.incoming {
                        record.upsert_member(m.id, body.clone());
                    }
                }
                let record = record.normalized();
                if record.is_empty() {
                    Vec::new()
                } else {
                    vec![Edit::CreateRecord(record)]
                }
            }
            MergeOperation::None => field_edits(op, MergeOperation::Add),
            MergeOperation::Delete | MergeOperation::Update => Vec::new(),
        })
        .collect()
}

/// Accepted body/member updates.
pub fn plan_modifications(operations: &[ClassMergeOperation]) -> Vec<Edit> {
    operations
        .iter()
        .filter(|op| op.operation == MergeOperation::None)
        .flat_map(|op| field_edits(op, MergeOperation::Update))
        .collect()
}

// Set/add/update edits for accepted sub-operations of `kind` on an existing class.
fn field_edits(op: &ClassMergeOperation, kind: MergeOperation) -> Vec<Edit> {
    let body = op
        .body
        .iter()
        .filter(|b| b.operation == kind && accepts(b.from))
        .filter_map(|b| b.incoming.clone())
        .map(|body| Edit::SetBody { id: op.id, body });
    let members = op
        .member_ops()
        .iter()
        .filter(|m| m.operation == kind && accepts(m.from))
        .filter_map(|m| {
            let member = MemberDocumentation::new(m.id, m.incoming.clone()?);
            Some(match kind {
                MergeOperation::Add => Edit::AddMember {
                    class_id: op.id,
                    member,
                },
                _ => Edit::UpdateMember {
                    class_id: op.id,
                    member,
                },
            })
        });
    body.chain(members).collect()
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Counts of store calls issued by one apply run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    /// `update` calls; a record touched in two phases counts twice.
    pub updated: usize,
    pub deleted: usize,
    /// Targets that had disappeared from the store.
    pub skipped: usize,
}

impl ApplySummary {
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Commit `operations` to `store`, starting from the `local` snapshot the
/// operations were diffed against.
///
/// Phases run in order (deletions, additions, modifications). A failing
/// record is reported and not touched again; every other record is still
/// processed.
pub fn apply<S: EntityStore + ?Sized>(
    store: &S,
    operations: &[ClassMergeOperation],
    local: &[ClassDocumentation],
) -> Result<ApplySummary, ApplyError> {
    let plan = ApplyPlan::build(operations);
    info!(
        operations = operations.len(),
        deletions = plan.deletions.len(),
        additions = plan.additions.len(),
        modifications = plan.modifications.len(),
        "applying merge"
    );

    let mut executor = Executor {
        store,
        working: local.iter().map(|doc| (doc.id, doc.clone())).collect(),
        emptied: HashSet::new(),
        failed: HashSet::new(),
        failures: Vec::new(),
        summary: ApplySummary::default(),
    };

    for (phase, edits) in [
        ("deletions", &plan.deletions),
        ("additions", &plan.additions),
        ("modifications", &plan.modifications),
    ] {
        debug!(phase, edits = edits.len(), "running apply phase");
        executor.run_phase(edits);
    }

    let Executor {
        failures, summary, ..
    } = executor;
    if failures.is_empty() {
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            "merge applied"
        );
        Ok(summary)
    } else {
        warn!(failed = failures.len(), "merge applied with failures");
        Err(ApplyError::PartialFailure(failures))
    }
}

struct Executor<'a, S: ?Sized> {
    store: &'a S,
    working: HashMap<u64, ClassDocumentation>,
    emptied: HashSet<u64>,
    failed: HashSet<u64>,
    failures: Vec<(u64, StoreError)>,
    summary: ApplySummary,
}

impl<S: EntityStore + ?Sized> Executor<'_, S> {
    fn run_phase(&mut self, edits: &[Edit]) {
        for (id, group) in group_by_class(edits) {
            if self.failed.contains(&id) {
                debug!(id, "skipping record that failed earlier in this run");
                continue;
            }
            self.run_group(id, &group);
        }
    }

    fn run_group(&mut self, id: u64, group: &[&Edit]) {
        if group.iter().any(|e| matches!(e, Edit::DeleteRecord { .. })) {
            let result = self.store.delete(id);
            self.settle(id, result, |summary| summary.deleted += 1, None);
            return;
        }

        if let Some(record) = group.iter().find_map(|e| match e {
            Edit::CreateRecord(record) => Some(record),
            _ => None,
        }) {
            let result = self.store.create(record).map(|_| ());
            self.settle(id, result, |summary| summary.created += 1, Some(record.clone()));
            return;
        }

        // A record emptied by an earlier phase is recreated when a later
        // phase gives it content again.
        let (current, exists) = match self.working.get(&id) {
            Some(doc) => (doc.clone(), true),
            None if self.emptied.contains(&id) => (ClassDocumentation::new(id), false),
            None => {
                warn!(id, "edit target is not in the local set, skipping");
                self.summary.skipped += 1;
                return;
            }
        };
        let mut next = current.clone();
        for edit in group {
            edit.fold_into(&mut next);
        }
        next.normalize();

        if next == current {
            debug!(id, "record unchanged, no write");
        } else if next.is_empty() {
            debug!(id, "record emptied, deleting");
            let result = self.store.delete(id);
            if self.settle(id, result, |summary| summary.deleted += 1, None) {
                self.emptied.insert(id);
            }
        } else if exists {
            let result = self.store.update(&next);
            self.settle(id, result, |summary| summary.updated += 1, Some(next));
        } else {
            let result = self.store.create(&next).map(|_| ());
            self.settle(id, result, |summary| summary.created += 1, Some(next));
        }
    }

    /// Record the outcome of one store call. `after` is the record's new
    /// state, or `None` when it was removed. Returns whether the call
    /// succeeded.
    fn settle(
        &mut self,
        id: u64,
        result: Result<(), StoreError>,
        count: impl FnOnce(&mut ApplySummary),
        after: Option<ClassDocumentation>,
    ) -> bool {
        match result {
            Ok(()) => {
                count(&mut self.summary);
                match after {
                    Some(record) => {
                        self.working.insert(id, record);
                    }
                    None => {
                        self.working.remove(&id);
                    }
                }
                true
            }
            Err(StoreError::NotFound { .. }) => {
                warn!(id, "record disappeared from the store, skipping");
                self.working.remove(&id);
                self.summary.skipped += 1;
                false
            }
            Err(e) => {
                warn!(id, error = %e, "failed to write record");
                self.failed.insert(id);
                self.failures.push((id, e));
                false
            }
        }
    }
}

/// Group edits by class id, keeping first-seen order.
fn group_by_class(edits: &[Edit]) -> Vec<(u64, Vec<&Edit>)> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut groups: Vec<(u64, Vec<&Edit>)> = Vec::new();
    for edit in edits {
        let id = edit.class_id();
        match index.get(&id) {
            Some(&i) => groups[i].1.push(edit),
            None => {
                index.insert(id, groups.len());
                groups.push((id, vec![edit]));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::merge::{diff, resolve_all};
    use std::cell::Cell;

    fn setup_db(records: &[ClassDocumentation]) -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        for record in records {
            db.create(record).unwrap();
        }
        db
    }

    /// Counts mutating calls passed through to the inner store.
    struct CountingStore<'a> {
        inner: &'a Database,
        writes: Cell<usize>,
    }

    impl EntityStore for CountingStore<'_> {
        fn find_all(&self) -> Result<Vec<ClassDocumentation>, StoreError> {
            self.inner.find_all()
        }
        fn find_by_id(&self, id: u64) -> Result<Option<ClassDocumentation>, StoreError> {
            self.inner.find_by_id(id)
        }
        fn create(&self, record: &ClassDocumentation) -> Result<u64, StoreError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.create(record)
        }
        fn update(&self, record: &ClassDocumentation) -> Result<(), StoreError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.update(record)
        }
        fn delete(&self, id: u64) -> Result<(), StoreError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.delete(id)
        }
        fn delete_all(&self) -> Result<(), StoreError> {
            self.writes.set(self.writes.get() + 1);
            self.inner.delete_all()
        }
    }

    #[test]
    fn test_unresolved_operations_write_nothing() {
        let local = vec![ClassDocumentation::new(3).with_body("old")];
        let incoming = vec![
            ClassDocumentation::new(3).with_body("new"),
            ClassDocumentation::new(4).with_body("added"),
        ];
        let db = setup_db(&local);
        let store = CountingStore {
            inner: &db,
            writes: Cell::new(0),
        };

        let ops = diff(&local, &incoming);
        let summary = apply(&store, &ops, &local).unwrap();
        assert_eq!(summary, ApplySummary::default());
        assert_eq!(store.writes.get(), 0);
        assert_eq!(db.find_all().unwrap(), local);
    }

    #[test]
    fn test_local_preference_writes_nothing() {
        let local = vec![
            ClassDocumentation::new(1)
                .with_body("a")
                .with_member(MemberDocumentation::new(10, "x")),
            ClassDocumentation::new(2).with_body("only local"),
        ];
        let incoming = vec![
            ClassDocumentation::new(1).with_member(MemberDocumentation::new(11, "y")),
            ClassDocumentation::new(5).with_body("only incoming"),
        ];
        let db = setup_db(&local);
        let store = CountingStore {
            inner: &db,
            writes: Cell::new(0),
        };

        let mut ops = diff(&local, &incoming);
        resolve_all(&mut ops, MergeFrom::Local);
        assert!(ApplyPlan::build(&ops).is_empty());

        apply(&store, &ops, &local).unwrap();
        assert_eq!(store.writes.get(), 0);
        assert_eq!(db.find_all().unwrap(), local);
    }

    #[test]
    fn test_partially_kept_deleted_class() {
        let local = vec![ClassDocumentation::new(1)
            .with_body("keep me")
            .with_member(MemberDocumentation::new(10, "drop me"))];
        let db = setup_db(&local);

        let mut ops = diff(&local, &[]);
        ops[0].body.as_mut().unwrap().from = Some(MergeFrom::Local);

        let summary = apply(&db, &ops, &local).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(
            db.find_by_id(1).unwrap(),
            Some(ClassDocumentation::new(1).with_body("keep me"))
        );
    }

    #[test]
    fn test_field_edits_across_phases_compose() {
        let local = vec![ClassDocumentation::new(7)
            .with_body("old")
            .with_member(MemberDocumentation::new(70, "gone"))
            .with_member(MemberDocumentation::new(71, "v1"))];
        let incoming = vec![ClassDocumentation::new(7)
            .with_body("new")
            .with_member(MemberDocumentation::new(71, "v2"))
            .with_member(MemberDocumentation::new(72, "added"))];
        let db = setup_db(&local);

        let mut ops = diff(&local, &incoming);
        resolve_all(&mut ops, MergeFrom::Incoming);
        let summary = apply(&db, &ops, &local).unwrap();

        assert_eq!(summary.updated, 3);
        let stored = db.find_by_id(7).unwrap().unwrap();
        assert_eq!(stored.body.as_deref(), Some("new"));
        assert_eq!(stored.member(70), None);
        assert_eq!(stored.member(71).map(|m| m.body.as_str()), Some("v2"));
        assert_eq!(stored.member(72).map(|m| m.body.as_str()), Some("added"));
    }

    #[test]
    fn test_record_emptied_then_refilled_is_recreated() {
        let local = vec![ClassDocumentation::new(6).with_body("a")];
        let incoming =
            vec![ClassDocumentation::new(6).with_member(MemberDocumentation::new(60, "m"))];
        let db = setup_db(&local);
        let mut ops = diff(&local, &incoming);
        resolve_all(&mut ops, MergeFrom::Incoming);

        let summary = apply(&db, &ops, &local).unwrap();
        assert_eq!((summary.deleted, summary.created), (1, 1));
        assert_eq!(db.find_all().unwrap(), incoming);
    }

    #[test]
    fn test_duplicate_key_is_collected_and_others_continue() {
        let incoming = vec![
            ClassDocumentation::new(1).with_body("clashes"),
            ClassDocumentation::new(2).with_body("fine"),
        ];
        let db = setup_db(&[]);
        let mut ops = diff(&[], &incoming);
        resolve_all(&mut ops, MergeFrom::Incoming);

        // Another writer created record 1 after the diff.
        db.create(&ClassDocumentation::new(1).with_body("raced"))
            .unwrap();

        let err = apply(&db, &ops, &[]).unwrap_err();
        let ApplyError::PartialFailure(failures) = err;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert!(matches!(failures[0].1, StoreError::DuplicateKey { id: 1 }));
        assert_eq!(
            db.find_by_id(2).unwrap(),
            Some(ClassDocumentation::new(2).with_body("fine"))
        );
    }

    #[test]
    fn test_vanished_record_is_skipped() {
        let local = vec![ClassDocumentation::new(3).with_body("old")];
        let incoming = vec![ClassDocumentation::new(3).with_body("new")];
        let db = setup_db(&local);
        let mut ops = diff(&local, &incoming);
        resolve_all(&mut ops, MergeFrom::Incoming);

        db.delete(3).unwrap();

        let summary = apply(&db, &ops, &local).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.writes(), 0);
        assert!(db.find_by_id(3).unwrap().is_none());
    }

    #[test]
    fn test_plan_shapes() {
        let local = vec![ClassDocumentation::new(1).with_body("A")];
        let incoming = vec![ClassDocumentation::new(2)
            .with_body("B")
            .with_member(MemberDocumentation::new(20, "f"))];
        let mut ops = diff(&local, &incoming);
        resolve_all(&mut ops, MergeFrom::Incoming);

        let plan = ApplyPlan::build(&ops);
        assert_eq!(plan.deletions, vec![Edit::DeleteRecord { id: 1 }]);
        assert_eq!(
            plan.additions,
            vec![Edit::CreateRecord(
                ClassDocumentation::new(2)
                    .with_body("B")
                    .with_member(MemberDocumentation::new(20, "f"))
            )]
        );
        assert!(plan.modifications.is_empty());
    }
}
