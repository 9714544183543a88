//! # Topic Miner
//!
//! Batch news topic mining. A run reads a window of collected feed entries,
//! collapses duplicate coverage, clusters the stories, aggregates each
//! cluster into a topic with a stable signature, scores it, and writes the
//! top topics for the downstream Gate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────────────────┐   ┌──────────────┐
//! │ feed export │──▶│   topic-miner-core     │──▶│ out/<run_id> │
//! │   (JSONL)   │   │ dedup → cluster →      │   │  run store   │
//! └─────────────┘   │ aggregate → score      │   └──────────────┘
//!                   └────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tmine init-config                          # write config/tmine.toml
//! tmine run --input feeds/2026-02-13.jsonl   # mine one batch
//! tmine runs                                 # list stored runs
//! tmine show run_20260213_120000_1a2b3c4d    # inspect a run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`ingest`] | Feed export parsing and item construction |
//! | [`url_normalize`] | URL canonicalization and publisher domains |
//! | [`pipeline`] | Run orchestration |
//! | [`output`] | `topics.json` / `items.jsonl` writers |
//! | [`file_store`] | Filesystem run store |

pub mod config;
pub mod file_store;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod url_normalize;
