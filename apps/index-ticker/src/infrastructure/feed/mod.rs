//! Price Feed Adapter
//!
//! WebSocket subscription to the live index price feed:
//!
//! - `codec`: JSON frame decoding into partial records
//! - `subscription`: connection lifecycle and record delivery
//! - `state`: lifecycle state and counters shared with the status server
//! - `reconnect`: opt-in backoff for transport errors

pub mod codec;
pub mod reconnect;
pub mod state;
pub mod subscription;

pub use codec::{CodecError, JsonCodec};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use state::{ConnectionState, FeedState, FeedStats};
pub use subscription::{FeedConfig, FeedError, FeedSubscription};
