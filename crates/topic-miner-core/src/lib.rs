//! # Topic Miner Core
//!
//! Deterministic batch logic for turning a window of collected news items
//! into ranked, scored topics: data models, stable hashing, deduplication,
//! the clustering boundary, topic aggregation, narrative scoring, top-K
//! selection and the run store abstraction.
//!
//! This crate contains no tokio runtime, network or filesystem I/O. The
//! caller supplies the items, the clock and the storage backend.

pub mod aggregate;
pub mod cluster;
pub mod dedup;
pub mod error;
pub mod hashing;
pub mod models;
pub mod scoring;
pub mod select;
pub mod store;

pub use error::{Error, Result};
