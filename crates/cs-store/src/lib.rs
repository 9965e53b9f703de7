//! # cs-store
//!
//! Persistent store boundary for Community Streaks.
//!
//! The reconciliation job reads and writes two document collections,
//! `communities` and `goals`. This crate owns everything about how those
//! documents are held and how they are turned into typed records:
//!
//! - [`Document`] / [`WriteBatch`]: loosely-typed documents and the
//!   multi-document update unit that is applied all-or-nothing
//! - [`Community`] / [`Goal`]: typed records, validated at the store boundary
//! - [`DocumentStore`]: the async trait the reconciliation engine consumes
//! - [`JsonFileStore`]: a single-file JSON snapshot store (atomic rename on commit)
//! - [`MemoryStore`]: in-process store with fault injection for tests and dry runs
//! - [`RunLease`]: expiring lease record guarding against overlapping runs

pub mod document;
pub mod error;
pub mod file_store;
pub mod lease;
pub mod memory;
pub mod records;
pub mod snapshot;
pub mod store;

pub use document::{Collection, DocRef, Document, FieldUpdate, Fields, WriteBatch};
pub use error::{RecordError, StoreError};
pub use file_store::JsonFileStore;
pub use lease::RunLease;
pub use memory::MemoryStore;
pub use records::{fields, Community, Goal};
pub use snapshot::Snapshot;
pub use store::DocumentStore;
