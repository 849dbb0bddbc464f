//! # rncs
//!
//! Taxpayer ID (RNC) lookup against the DGII bulk dataset, as a one-shot
//! CLI and as a long-running HTTP service with hot reload.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌─────────┐   ┌──────────────┐
//! │  Acquirer   │──▶│  Parser  │──▶│ Builder │──▶│  IndexStore  │
//! │ HTTP + ZIP  │   │ UTF-8 /  │   │ last    │   │  published   │
//! │             │   │ CP-1252  │   │ wins    │   │  Snapshot    │
//! └─────────────┘   └──────────┘   └─────────┘   └──────┬───────┘
//!                                                        │
//!                                  ┌─────────────────────┤
//!                                  ▼                     ▼
//!                             ┌──────────┐         ┌──────────┐
//!                             │   CLI    │         │   HTTP   │
//!                             │ (lookup) │         │  (serve) │
//!                             └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rncs lookup 132138279         # one-shot lookup, downloads the dataset if absent
//! rncs serve --port 9922        # HTTP API
//! rncs refresh                  # force a fresh download
//! rncs stats                    # dataset and index summary
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Record types and the JSON error envelope |
//! | [`parse`] | Delimited-text reader with encoding fallback |
//! | [`index`] | Snapshot construction |
//! | [`store`] | Published snapshot, first-access build and reload |
//! | [`lookup`] | RNC resolution |
//! | [`acquire`] | Dataset download and extraction |
//! | [`context`] | Process-wide service context |
//! | [`server`] | HTTP server |
//! | [`stats`] | Dataset summary |

pub mod acquire;
pub mod config;
pub mod context;
pub mod index;
pub mod lookup;
pub mod models;
pub mod parse;
pub mod server;
pub mod stats;
pub mod store;
