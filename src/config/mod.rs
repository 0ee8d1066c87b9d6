//! Configuration Module
//!
//! Loads the TOML configuration file that drives the whole pipeline.
//!
//! ## Overview
//! The file consists of a `[General]` table with the global knobs, plus one
//! table (or array of tables) per handler slot: `[[PreCrawlFilters]]`,
//! `[[PostCrawlFilters]]`, `[Indexer]` and `[[Rankers]]`. Handler tables are
//! dynamically typed: apart from the mandatory `type` tag, every key is sorted
//! into a string/int/float/bool option bucket based on its TOML type, so new
//! handlers can grow options without touching the config schema.
//!
//! A `version` field in `[General]` gates parsing; anything other than the
//! current version is a fatal startup error.

pub mod loader;
pub mod types;

pub use loader::load;
pub use types::{AppConfig, GeneralOptions, TaskHandlerOptions};

#[cfg(test)]
mod tests;
