//! End-to-end merge scenarios through the SQLite store and the sync engine.
//!
//! Each test builds a local set in a real (in-memory) database, diffs it
//! against an incoming set, resolves, applies, and checks what landed in the
//! store.

use docsync_core::codec::Compression;
use docsync_core::db::Database;
use docsync_core::merge::{self, MergeFrom, MergeOperation};
use docsync_core::models::{ClassDocumentation, MemberDocumentation};
use docsync_core::store::EntityStore;
use docsync_core::sync_engine::SyncEngine;

use proptest::prelude::*;

// ===========================================================================
// Helpers
// ===========================================================================

fn engine_with(records: &[ClassDocumentation]) -> SyncEngine<Database> {
    let db = Database::in_memory().unwrap();
    db.initialize().unwrap();
    for record in records {
        db.create(record).unwrap();
    }
    SyncEngine::new(db, Compression::Lz4)
}

fn stored(engine: &SyncEngine<Database>) -> Vec<ClassDocumentation> {
    engine.store().find_all().unwrap()
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn scenario_a_class_absent_from_incoming_is_deleted() {
    let engine = engine_with(&[ClassDocumentation::new(1).with_body("A")]);

    let ops = engine.plan_merge(&[]).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation, MergeOperation::Delete);
    let body = ops[0].body.as_ref().unwrap();
    assert_eq!(body.operation, MergeOperation::Delete);
    assert_eq!(body.local.as_deref(), Some("A"));

    assert!(merge::all_conflict_free(&ops));
    let summary = engine.apply(&ops).unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(stored(&engine).is_empty());
}

#[test]
fn scenario_b_new_class_is_created_once_accepted() {
    let engine = engine_with(&[]);
    let incoming = vec![ClassDocumentation::new(2)
        .with_body("B")
        .with_member(MemberDocumentation::new(20, "f"))];

    let mut ops = engine.plan_merge(&incoming).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation, MergeOperation::Add);
    assert_eq!(ops[0].body.as_ref().unwrap().operation, MergeOperation::Add);
    assert_eq!(ops[0].body.as_ref().unwrap().incoming.as_deref(), Some("B"));
    assert_eq!(ops[0].member_ops().len(), 1);
    assert_eq!(ops[0].member_ops()[0].id, 20);
    assert_eq!(ops[0].member_ops()[0].operation, MergeOperation::Add);

    assert!(ops[0].toggle_body(MergeFrom::Incoming));
    assert!(ops[0].toggle_member(20, MergeFrom::Incoming));
    assert!(ops[0].is_conflict_free());

    let summary = engine.apply(&ops).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(stored(&engine), incoming);
}

#[test]
fn scenario_c_body_update_needs_explicit_choice() {
    let engine = engine_with(&[ClassDocumentation::new(3).with_body("old")]);
    let incoming = vec![ClassDocumentation::new(3).with_body("new")];

    let mut ops = engine.plan_merge(&incoming).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation, MergeOperation::None);
    let body = ops[0].body.as_ref().unwrap();
    assert_eq!(body.operation, MergeOperation::Update);
    assert_eq!(body.local.as_deref(), Some("old"));
    assert_eq!(body.incoming.as_deref(), Some("new"));
    assert_eq!(body.from, None);

    let summary = engine.apply(&ops).unwrap();
    assert_eq!(summary.writes(), 0);
    assert_eq!(stored(&engine), vec![ClassDocumentation::new(3).with_body("old")]);

    ops[0].toggle_body(MergeFrom::Incoming);
    let summary = engine.apply(&ops).unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(stored(&engine), vec![ClassDocumentation::new(3).with_body("new")]);
}

#[test]
fn scenario_d_removing_last_member_deletes_record() {
    let engine = engine_with(&[
        ClassDocumentation::new(4).with_member(MemberDocumentation::new(40, "m")),
    ]);
    let incoming = vec![ClassDocumentation {
        id: 4,
        body: None,
        functions: None,
    }];

    let mut ops = engine.plan_merge(&incoming).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation, MergeOperation::None);
    assert!(ops[0].body.is_none());
    let member = &ops[0].member_ops()[0];
    assert_eq!(member.id, 40);
    assert_eq!(member.operation, MergeOperation::Delete);
    assert_eq!(member.local.as_deref(), Some("m"));
    assert!(!merge::all_conflict_free(&ops));

    merge::resolve_all(&mut ops, MergeFrom::Incoming);
    let summary = engine.apply(&ops).unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(engine.store().find_by_id(4).unwrap().is_none());
}

#[test]
fn export_then_import_into_diverged_store() {
    let source = engine_with(&[
        ClassDocumentation::new(1).with_body("shared, edited remotely"),
        ClassDocumentation::new(2).with_body("remote only"),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.docs");
    assert_eq!(source.export_to_file(&path).unwrap(), 2);

    let target = engine_with(&[
        ClassDocumentation::new(1).with_body("shared"),
        ClassDocumentation::new(3).with_body("local only"),
    ]);
    let incoming = target.read_incoming_file(&path).unwrap();
    let mut ops = target.plan_merge(&incoming).unwrap();
    let ids: Vec<(u64, MergeOperation)> = ops.iter().map(|op| (op.id, op.operation)).collect();
    assert_eq!(
        ids,
        vec![
            (1, MergeOperation::None),
            (3, MergeOperation::Delete),
            (2, MergeOperation::Add),
        ]
    );

    // Keep the local copy of class 3 and take everything else.
    merge::resolve_all(&mut ops, MergeFrom::Incoming);
    ops[1].resolve_all(MergeFrom::Local);
    target.apply(&ops).unwrap();

    assert_eq!(
        stored(&target),
        vec![
            ClassDocumentation::new(1).with_body("shared, edited remotely"),
            ClassDocumentation::new(2).with_body("remote only"),
            ClassDocumentation::new(3).with_body("local only"),
        ]
    );
}

// ===========================================================================
// Properties
// ===========================================================================

fn arb_members() -> impl Strategy<Value = Option<Vec<MemberDocumentation>>> {
    proptest::option::of(
        prop::collection::btree_map(0u64..6, "[a-c]{1,2}", 0..4).prop_map(|members| {
            members
                .into_iter()
                .map(|(id, body)| MemberDocumentation { id, body })
                .collect()
        }),
    )
}

fn arb_set() -> impl Strategy<Value = Vec<ClassDocumentation>> {
    prop::collection::btree_map(
        0u64..8,
        (proptest::option::of("[a-c]{1,2}"), arb_members()),
        0..6,
    )
    .prop_map(|classes| {
        classes
            .into_iter()
            .map(|(id, (body, functions))| ClassDocumentation { id, body, functions }.normalized())
            .filter(|doc| !doc.is_empty())
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_accepting_incoming_converges(local in arb_set(), incoming in arb_set()) {
        let engine = engine_with(&local);
        let mut ops = engine.plan_merge(&incoming).unwrap();
        merge::resolve_all(&mut ops, MergeFrom::Incoming);
        engine.apply(&ops).unwrap();

        prop_assert!(engine.plan_merge(&incoming).unwrap().is_empty());
        prop_assert!(stored(&engine).iter().all(|doc| !doc.is_empty()));
    }

    #[test]
    fn prop_preferring_local_changes_nothing(local in arb_set(), incoming in arb_set()) {
        let engine = engine_with(&local);
        let mut ops = engine.plan_merge(&incoming).unwrap();
        merge::resolve_all(&mut ops, MergeFrom::Local);
        let summary = engine.apply(&ops).unwrap();

        prop_assert_eq!(summary.writes(), 0);
        prop_assert_eq!(stored(&engine), local);
    }
}
