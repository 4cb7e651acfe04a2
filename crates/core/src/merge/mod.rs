//! Conflict-aware merging of a local and an incoming documentation set.
//!
//! The merge subsystem is responsible for:
//! 1. **Diffing** -- classifying every class body and member note as added,
//!    updated or deleted between the two sets.
//! 2. **Resolution** -- recording which side wins for each conflicting field.
//! 3. **Applying** -- committing accepted incoming values to the store.

use serde::{Deserialize, Serialize};

pub mod apply;
pub mod diff;
pub mod resolve;

pub use apply::{apply, ApplyPlan, ApplySummary, Edit};
pub use diff::diff;
pub use resolve::{all_conflict_free, resolve_all, unresolved_total, Resolvable};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a single field differs between the local and incoming sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOperation {
    /// No uniform change; used on class operations whose fields differ
    /// individually.
    #[default]
    None,
    /// Present only in the incoming set.
    Add,
    /// Present on both sides with different values.
    Update,
    /// Present only in the local set.
    Delete,
}

impl std::fmt::Display for MergeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Which side's value a resolved field takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeFrom {
    Local,
    Incoming,
}

impl std::fmt::Display for MergeFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

/// Divergence of a class description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyMergeOperation {
    /// Id of the owning class.
    pub id: u64,
    pub operation: MergeOperation,
    pub local: Option<String>,
    pub incoming: Option<String>,
    /// `None` while unresolved.
    pub from: Option<MergeFrom>,
}

/// Divergence of one member note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMergeOperation {
    /// Member id, unique within the owning class.
    pub id: u64,
    pub operation: MergeOperation,
    pub local: Option<String>,
    pub incoming: Option<String>,
    /// `None` while unresolved.
    pub from: Option<MergeFrom>,
}

/// Everything that differs for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMergeOperation {
    pub id: u64,
    /// `Add`/`Delete` when the whole class exists on one side only,
    /// `None` when only some of its fields changed.
    pub operation: MergeOperation,
    pub body: Option<BodyMergeOperation>,
    pub members: Option<Vec<MemberMergeOperation>>,
}

impl ClassMergeOperation {
    /// Member sub-operations as a slice (empty when absent).
    pub fn member_ops(&self) -> &[MemberMergeOperation] {
        self.members.as_deref().unwrap_or(&[])
    }
}
