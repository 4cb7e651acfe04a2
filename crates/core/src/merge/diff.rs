//! Diff of a local documentation set against an incoming one.
//!
//! Output order is deterministic: one pass over the local records (deletions
//! and field changes), then one pass over incoming records missing locally
//! (additions). Records identical on both sides produce nothing. When an id
//! repeats within one side, only its first occurrence is considered.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::{BodyMergeOperation, ClassMergeOperation, MemberMergeOperation, MergeOperation};
use crate::models::{ClassDocumentation, MemberDocumentation};

/// Compare `local` against `incoming` and return one operation per class
/// that differs.
pub fn diff(
    local: &[ClassDocumentation],
    incoming: &[ClassDocumentation],
) -> Vec<ClassMergeOperation> {
    info!(
        local_count = local.len(),
        incoming_count = incoming.len(),
        "diffing documentation sets"
    );

    let incoming_by_id = first_by_id(incoming, |doc| doc.id);
    let mut seen: HashSet<u64> = HashSet::new();
    let mut operations = Vec::new();

    for l in local.iter().filter(|l| seen.insert(l.id)) {
        match incoming_by_id.get(&l.id) {
            None => {
                debug!(id = l.id, "class missing from incoming set");
                operations.push(deleted_class(l));
            }
            Some(i) => {
                let body = merge_body(l, i);
                let members = merge_members(l.members(), i.members());
                if body.is_none() && members.is_none() {
                    continue;
                }
                debug!(id = l.id, "class fields differ");
                operations.push(ClassMergeOperation {
                    id: l.id,
                    operation: MergeOperation::None,
                    body,
                    members,
                });
            }
        }
    }

    // An empty incoming record has nothing to add.
    for i in incoming
        .iter()
        .filter(|i| seen.insert(i.id) && !i.is_empty())
    {
        debug!(id = i.id, "class missing from local set");
        operations.push(added_class(i));
    }

    info!(count = operations.len(), "diff complete");
    operations
}

fn deleted_class(local: &ClassDocumentation) -> ClassMergeOperation {
    let body = local.body.as_ref().map(|b| BodyMergeOperation {
        id: local.id,
        operation: MergeOperation::Delete,
        local: Some(b.clone()),
        incoming: None,
        from: None,
    });
    ClassMergeOperation {
        id: local.id,
        operation: MergeOperation::Delete,
        body,
        members: non_empty(local.members().iter().map(deleted_member).collect()),
    }
}

fn added_class(incoming: &ClassDocumentation) -> ClassMergeOperation {
    let body = incoming.body.as_ref().map(|b| BodyMergeOperation {
        id: incoming.id,
        operation: MergeOperation::Add,
        local: None,
        incoming: Some(b.clone()),
        from: None,
    });
    ClassMergeOperation {
        id: incoming.id,
        operation: MergeOperation::Add,
        body,
        members: non_empty(incoming.members().iter().map(added_member).collect()),
    }
}

/// Classify the class description. `None` when both sides agree.
pub fn merge_body(
    local: &ClassDocumentation,
    incoming: &ClassDocumentation,
) -> Option<BodyMergeOperation> {
    let operation = classify(local.body.as_deref(), incoming.body.as_deref())?;
    Some(BodyMergeOperation {
        id: local.id,
        operation,
        local: local.body.clone(),
        incoming: incoming.body.clone(),
        from: None,
    })
}

/// Classify member notes: local-only first, in local order, then
/// incoming-only in incoming order. `None` when nothing differs.
pub fn merge_members(
    local: &[MemberDocumentation],
    incoming: &[MemberDocumentation],
) -> Option<Vec<MemberMergeOperation>> {
    let incoming_by_id = first_by_id(incoming, |m| m.id);
    let mut seen: HashSet<u64> = HashSet::new();
    let mut operations = Vec::new();

    for l in local.iter().filter(|l| seen.insert(l.id)) {
        match incoming_by_id.get(&l.id) {
            None => operations.push(deleted_member(l)),
            Some(i) if i.body != l.body => operations.push(MemberMergeOperation {
                id: l.id,
                operation: MergeOperation::Update,
                local: Some(l.body.clone()),
                incoming: Some(i.body.clone()),
                from: None,
            }),
            Some(_) => {}
        }
    }

    operations.extend(
        incoming
            .iter()
            .filter(|i| seen.insert(i.id))
            .map(added_member),
    );

    non_empty(operations)
}

fn deleted_member(local: &MemberDocumentation) -> MemberMergeOperation {
    MemberMergeOperation {
        id: local.id,
        operation: MergeOperation::Delete,
        local: Some(local.body.clone()),
        incoming: None,
        from: None,
    }
}

fn added_member(incoming: &MemberDocumentation) -> MemberMergeOperation {
    MemberMergeOperation {
        id: incoming.id,
        operation: MergeOperation::Add,
        local: None,
        incoming: Some(incoming.body.clone()),
        from: None,
    }
}

fn classify(local: Option<&str>, incoming: Option<&str>) -> Option<MergeOperation> {
    match (local, incoming) {
        (l, i) if l == i => None,
        (Some(_), Some(_)) => Some(MergeOperation::Update),
        (Some(_), None) => Some(MergeOperation::Delete),
        (None, Some(_)) => Some(MergeOperation::Add),
        (None, None) => None,
    }
}

fn first_by_id<T>(items: &[T], id: impl Fn(&T) -> u64) -> HashMap<u64, &T> {
    let mut by_id = HashMap::with_capacity(items.len());
    for item in items {
        by_id.entry(id(item)).or_insert(item);
    }
    by_id
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
