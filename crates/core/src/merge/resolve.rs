//! Conflict resolution state over a merge-operation tree.
//!
//! Resolution only records a choice; nothing touches the store until the
//! tree is handed to [`apply`](super::apply::apply).

use tracing::debug;

use super::{
    BodyMergeOperation, ClassMergeOperation, MemberMergeOperation, MergeFrom, MergeOperation,
};

/// A field-level merge operation that a caller can resolve.
pub trait Resolvable {
    fn operation(&self) -> MergeOperation;

    fn resolution(&self) -> Option<MergeFrom>;

    fn resolution_mut(&mut self) -> &mut Option<MergeFrom>;

    /// Pick a side.
    fn resolve(&mut self, from: MergeFrom) {
        *self.resolution_mut() = Some(from);
    }

    /// Back to unresolved.
    fn unresolve(&mut self) {
        *self.resolution_mut() = None;
    }

    /// Pick a side, or clear the choice when `from` is already selected.
    fn toggle(&mut self, from: MergeFrom) {
        let slot = self.resolution_mut();
        *slot = if *slot == Some(from) { None } else { Some(from) };
    }

    fn is_resolved(&self) -> bool {
        self.resolution().is_some()
    }
}

impl Resolvable for BodyMergeOperation {
    fn operation(&self) -> MergeOperation {
        self.operation
    }

    fn resolution(&self) -> Option<MergeFrom> {
        self.from
    }

    fn resolution_mut(&mut self) -> &mut Option<MergeFrom> {
        &mut self.from
    }
}

impl Resolvable for MemberMergeOperation {
    fn operation(&self) -> MergeOperation {
        self.operation
    }

    fn resolution(&self) -> Option<MergeFrom> {
        self.from
    }

    fn resolution_mut(&mut self) -> &mut Option<MergeFrom> {
        &mut self.from
    }
}

impl ClassMergeOperation {
    /// Sub-operations of a class missing from the incoming set are accepted
    /// without an explicit choice; there is no competing value.
    pub fn is_auto_accepted(&self) -> bool {
        self.operation == MergeOperation::Delete
    }

    /// Resolve every body and member sub-operation to `from`.
    pub fn resolve_all(&mut self, from: MergeFrom) {
        if let Some(body) = self.body.as_mut() {
            body.resolve(from);
        }
        for member in self.members.iter_mut().flatten() {
            member.resolve(from);
        }
    }

    /// Toggle the body choice. Returns false when the class has no body
    /// sub-operation.
    pub fn toggle_body(&mut self, from: MergeFrom) -> bool {
        match self.body.as_mut() {
            Some(body) => {
                body.toggle(from);
                true
            }
            None => false,
        }
    }

    /// Toggle the choice for one member. Returns false when no sub-operation
    /// exists for `member_id`.
    pub fn toggle_member(&mut self, member_id: u64, from: MergeFrom) -> bool {
        match self
            .members
            .iter_mut()
            .flatten()
            .find(|m| m.id == member_id)
        {
            Some(member) => {
                member.toggle(from);
                true
            }
            None => false,
        }
    }

    /// Number of sub-operations still waiting for a choice.
    pub fn unresolved_count(&self) -> usize {
        if self.is_auto_accepted() {
            return 0;
        }
        let body = self.body.iter().filter(|b| !b.is_resolved()).count();
        let members = self.member_ops().iter().filter(|m| !m.is_resolved()).count();
        body + members
    }

    /// True when every sub-operation is resolved or auto-accepted.
    pub fn is_conflict_free(&self) -> bool {
        self.unresolved_count() == 0
    }
}

/// Resolve every sub-operation of every class to `from`.
pub fn resolve_all(operations: &mut [ClassMergeOperation], from: MergeFrom) {
    debug!(count = operations.len(), %from, "resolving all merge operations");
    for op in operations.iter_mut() {
        op.resolve_all(from);
    }
}

/// True when "apply all" may proceed.
pub fn all_conflict_free(operations: &[ClassMergeOperation]) -> bool {
    operations.iter().all(ClassMergeOperation::is_conflict_free)
}

pub fn unresolved_total(operations: &[ClassMergeOperation]) -> usize {
    operations.iter().map(ClassMergeOperation::unresolved_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::diff;
    use crate::models::{ClassDocumentation, MemberDocumentation};

    fn updated_class() -> ClassMergeOperation {
        let local = [ClassDocumentation::new(3)
            .with_body("old")
            .with_member(MemberDocumentation::new(30, "a"))];
        let incoming = [ClassDocumentation::new(3)
            .with_body("new")
            .with_member(MemberDocumentation::new(30, "b"))];
        diff(&local, &incoming).remove(0)
    }

    #[test]
    fn test_toggle_twice_clears() {
        let mut op = updated_class();
        let body = op.body.as_mut().unwrap();
        body.toggle(MergeFrom::Incoming);
        assert_eq!(body.from, Some(MergeFrom::Incoming));
        body.toggle(MergeFrom::Local);
        assert_eq!(body.from, Some(MergeFrom::Local));
        body.toggle(MergeFrom::Local);
        assert_eq!(body.from, None);
    }

    #[test]
    fn test_conflict_free_requires_every_field() {
        let mut op = updated_class();
        assert_eq!(op.unresolved_count(), 2);
        assert!(!op.is_conflict_free());

        assert!(op.toggle_body(MergeFrom::Incoming));
        assert!(!op.is_conflict_free());

        assert!(op.toggle_member(30, MergeFrom::Local));
        assert!(!op.toggle_member(31, MergeFrom::Local));
        assert!(op.is_conflict_free());

        op.body.as_mut().unwrap().unresolve();
        assert_eq!(op.unresolved_count(), 1);
    }

    #[test]
    fn test_deleted_class_is_auto_accepted() {
        let local = [ClassDocumentation::new(1).with_body("A")];
        let ops = diff(&local, &[]);
        assert!(ops[0].is_auto_accepted());
        assert!(all_conflict_free(&ops));
        assert_eq!(ops[0].body.as_ref().unwrap().from, None);
    }

    #[test]
    fn test_added_class_needs_resolution() {
        let incoming = [ClassDocumentation::new(2).with_body("B")];
        let mut ops = diff(&[], &incoming);
        assert_eq!(unresolved_total(&ops), 1);

        resolve_all(&mut ops, MergeFrom::Incoming);
        assert!(all_conflict_free(&ops));
        assert_eq!(ops[0].body.as_ref().unwrap().from, Some(MergeFrom::Incoming));
    }
}
