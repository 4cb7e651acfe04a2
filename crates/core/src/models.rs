//! Documentation records attached to catalog symbols.
//!
//! Ids are produced by the external symbol catalog (a hash of the canonical
//! class name or normalized member signature); they are only ever compared
//! for equality here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Member documentation
// ---------------------------------------------------------------------------

/// A note attached to one member (function) of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDocumentation {
    /// Hash of the member's normalized signature, unique within its class.
    pub id: u64,
    pub body: String,
}

impl MemberDocumentation {
    pub fn new(id: u64, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Class documentation
// ---------------------------------------------------------------------------

/// Documentation for one catalog class.
///
/// `functions` is `None` when no member notes exist; `Some(vec![])` is never
/// a valid persisted state and is collapsed by [`ClassDocumentation::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDocumentation {
    pub id: u64,
    pub body: Option<String>,
    pub functions: Option<Vec<MemberDocumentation>>,
}

impl ClassDocumentation {
    /// An empty record for `id`. Must gain a body or a member before it is stored.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            body: None,
            functions: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_member(mut self, member: MemberDocumentation) -> Self {
        self.functions.get_or_insert_with(Vec::new).push(member);
        self
    }

    /// Collapse an empty member list to `None`.
    pub fn normalize(&mut self) {
        if self.functions.as_ref().is_some_and(|f| f.is_empty()) {
            self.functions = None;
        }
    }

    /// Owned variant of [`normalize`](Self::normalize).
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// True when the record carries no information and must not be persisted.
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.functions.as_ref().map_or(true, |f| f.is_empty())
    }

    /// Member notes as a slice (empty when absent).
    pub fn members(&self) -> &[MemberDocumentation] {
        self.functions.as_deref().unwrap_or(&[])
    }

    pub fn member(&self, member_id: u64) -> Option<&MemberDocumentation> {
        self.members().iter().find(|m| m.id == member_id)
    }

    /// Insert or overwrite a member note, keeping existing order.
    pub fn upsert_member(&mut self, member_id: u64, body: String) {
        let members = self.functions.get_or_insert_with(Vec::new);
        match members.iter_mut().find(|m| m.id == member_id) {
            Some(existing) => existing.body = body,
            None => members.push(MemberDocumentation::new(member_id, body)),
        }
    }

    /// Remove a member note. Returns whether anything was removed; the member
    /// list collapses to `None` when it becomes empty.
    pub fn remove_member(&mut self, member_id: u64) -> bool {
        let Some(members) = self.functions.as_mut() else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m.id != member_id);
        let removed = members.len() != before;
        self.normalize();
        removed
    }
}
