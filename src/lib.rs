//! Strati
//!
//! A layered client-side cache for mobile social applications. Reads go
//! through a bounded in-memory LRU, then a TTL-stamped persistent store,
//! then the remote backend; collections sync incrementally against a
//! frontier timestamp, and write paths publish invalidation events that a
//! consumer turns into precise cross-tier deletes.
//!
//! The intended entry point is [`application::CacheStack`], which wires
//! the tiers, the per-key locks, the invalidation pipeline, and every
//! domain cache from a [`config::Settings`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod remote;
pub mod util;
