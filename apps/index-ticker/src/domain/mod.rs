//! Domain Layer - Core snapshot types and merge logic.
//!
//! This layer contains the instrument snapshot model and the store that
//! merges partial feed records into it. Nothing here performs I/O.

/// Instrument snapshot and partial record types.
pub mod snapshot;

/// Symbol-keyed snapshot store with merge semantics.
pub mod store;
