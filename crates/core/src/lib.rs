//! docsync core library.
//!
//! This crate provides the foundational components for keeping free-form
//! documentation attached to catalog symbols: the documentation model,
//! SQLite persistence, the compact export codec, the diff/resolve/apply
//! merge engine, configuration, and the sync engine tying them together.

pub mod codec;
pub mod config;
pub mod db;
pub mod editor;
pub mod errors;
pub mod merge;
pub mod models;
pub mod store;
pub mod sync_engine;

// Re-exports for convenience.
pub use codec::Compression;
pub use config::AppConfig;
pub use db::Database;
pub use merge::{ClassMergeOperation, MergeFrom, MergeOperation};
pub use models::{ClassDocumentation, MemberDocumentation};
pub use store::EntityStore;
pub use sync_engine::SyncEngine;
