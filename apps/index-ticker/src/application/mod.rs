//! Application Layer - Port definitions and the sync service.
//!
//! This layer defines how decoded feed records reach the domain store.

/// Port interfaces between the feed adapter and the domain.
pub mod ports;

/// Services applying feed records to the snapshot store.
pub mod services;
