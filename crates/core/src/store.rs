//! The keyed persistence contract used by the merge engine.
//!
//! Any durable keyed collection can back the engine; the SQLite
//! [`Database`](crate::db::Database) is the shipped implementation.

use crate::errors::StoreError;
use crate::models::ClassDocumentation;

/// CRUD access to class-level documentation records.
///
/// Each call is atomic on its own. Callers issuing several calls in a row
/// (such as the apply engine) must tolerate partial completion.
pub trait EntityStore {
    /// Every stored record.
    fn find_all(&self) -> Result<Vec<ClassDocumentation>, StoreError>;

    fn find_by_id(&self, id: u64) -> Result<Option<ClassDocumentation>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::DuplicateKey`] when the
    /// id is taken and [`StoreError::EmptyRecord`] when it carries nothing.
    fn create(&self, record: &ClassDocumentation) -> Result<u64, StoreError>;

    /// Replace an existing record. Fails with [`StoreError::NotFound`] when
    /// the id is absent and [`StoreError::EmptyRecord`] when it carries nothing.
    fn update(&self, record: &ClassDocumentation) -> Result<(), StoreError>;

    /// Remove a record. Succeeds when the record is already absent.
    fn delete(&self, id: u64) -> Result<(), StoreError>;

    /// Remove every record. Used when an import overwrites the whole set.
    fn delete_all(&self) -> Result<(), StoreError>;
}

impl<S: EntityStore + ?Sized> EntityStore for &S {
    fn find_all(&self) -> Result<Vec<ClassDocumentation>, StoreError> {
        (**self).find_all()
    }

    fn find_by_id(&self, id: u64) -> Result<Option<ClassDocumentation>, StoreError> {
        (**self).find_by_id(id)
    }

    fn create(&self, record: &ClassDocumentation) -> Result<u64, StoreError> {
        (**self).create(record)
    }

    fn update(&self, record: &ClassDocumentation) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn delete(&self, id: u64) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        (**self).delete_all()
    }
}
