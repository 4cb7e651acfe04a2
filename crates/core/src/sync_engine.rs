//! Import/export orchestration.
//!
//! Export runs store → codec. Import runs codec → diff against the store →
//! (caller resolves) → apply back into the store. A failed decode aborts the
//! import before anything is written.

use std::path::Path;

use tracing::info;

use crate::codec::{self, Compression};
use crate::errors::SyncError;
use crate::merge::{self, ApplySummary, ClassMergeOperation};
use crate::models::ClassDocumentation;
use crate::store::EntityStore;

/// Drives import and export against one store.
pub struct SyncEngine<S: EntityStore> {
    store: S,
    compression: Compression,
}

impl<S: EntityStore> SyncEngine<S> {
    pub fn new(store: S, compression: Compression) -> Self {
        Self { store, compression }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    // -- export -------------------------------------------------------------

    /// Encode the whole local set.
    pub fn export_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let records = self.store.find_all()?;
        info!(records = records.len(), compression = %self.compression, "exporting documentation");
        Ok(codec::encode(&records, self.compression)?)
    }

    /// Encode the whole local set into `path`. Returns the record count.
    pub fn export_to_file(&self, path: &Path) -> Result<usize, SyncError> {
        let records = self.store.find_all()?;
        codec::write_file(path, &records, self.compression)?;
        info!(path = %path.display(), records = records.len(), "exported documentation");
        Ok(records.len())
    }

    // -- import -------------------------------------------------------------

    pub fn read_incoming(&self, bytes: &[u8]) -> Result<Vec<ClassDocumentation>, SyncError> {
        Ok(codec::decode(bytes)?)
    }

    pub fn read_incoming_file(&self, path: &Path) -> Result<Vec<ClassDocumentation>, SyncError> {
        Ok(codec::read_file(path)?)
    }

    /// Diff the current store contents against `incoming`.
    pub fn plan_merge(
        &self,
        incoming: &[ClassDocumentation],
    ) -> Result<Vec<ClassMergeOperation>, SyncError> {
        let local = self.store.find_all()?;
        Ok(merge::diff(&local, incoming))
    }

    /// Apply resolved operations against a fresh snapshot of the store.
    pub fn apply(&self, operations: &[ClassMergeOperation]) -> Result<ApplySummary, SyncError> {
        let local = self.store.find_all()?;
        Ok(merge::apply(&self.store, operations, &local)?)
    }

    /// Overwrite the whole local set with `incoming`. Returns the number of
    /// records written. The local set is left untouched when `incoming`
    /// repeats an id.
    pub fn replace_all(&self, incoming: &[ClassDocumentation]) -> Result<usize, SyncError> {
        let records: Vec<ClassDocumentation> = incoming
            .iter()
            .cloned()
            .map(ClassDocumentation::normalized)
            .filter(|r| !r.is_empty())
            .collect();
        codec::check_unique_ids(&records)?;

        info!(records = records.len(), "replacing all documentation");
        self.store.delete_all()?;
        for record in &records {
            self.store.create(record)?;
        }
        Ok(records.len())
    }
}
