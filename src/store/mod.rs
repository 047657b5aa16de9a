//! # Storage
//!
//! In-memory concurrent storage used to hold device state under contention.

pub mod sharded;

pub use sharded::ShardedStore;
