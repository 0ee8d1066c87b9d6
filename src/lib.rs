//! Zone-File Search Engine Library
//!
//! This library crate defines the core modules that make up the search engine.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of the following subsystems:
//!
//! - **`common`**: The shared record type (`DomainProperties`) that travels between
//!   pipeline stages, together with its flat JSON codec.
//! - **`config`**: TOML configuration loading, including the dynamically typed
//!   option tables that parameterize task handlers.
//! - **`paths`**: The immutable on-disk layout (cache, zone files, per-stage outputs).
//! - **`checkpoint`**: The schema-versioned, embedded store that persists per-stage,
//!   per-zone resume points.
//! - **`filebuf`**: A batched, line-appending output buffer with append/flush callbacks.
//! - **`crawler`**: DNS probing, robots.txt gating, and size-bounded page fetching.
//! - **`handlers`**: The four pluggable handler capabilities (pre-crawl filters,
//!   post-crawl filters, indexers, rankers) and their built-in implementations.
//! - **`pipeline`**: The lifecycle state machine, the three resumable stage runners,
//!   the query/ranking path, and the coordinator that sequences everything.
//! - **`server`**: The HTTP surface exposing the ranking query endpoint.

pub mod checkpoint;
pub mod common;
pub mod config;
pub mod crawler;
pub mod filebuf;
pub mod handlers;
pub mod paths;
pub mod pipeline;
pub mod server;
pub mod util;
