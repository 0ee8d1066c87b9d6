//! Task Handler Module
//!
//! The pluggable capability set shared by all four pipeline stages.
//!
//! ## Overview
//! A handler is a configured unit of work in a stage's chain. There are four
//! narrow capabilities, distinguished by the shape of their inputs:
//!
//! - **`PreCrawlFilter`**: sees only the parsed zone-file record.
//! - **`PostCrawlFilter`**: additionally sees the HTTP response headers and the
//!   parsed HTML document of the crawled front page.
//! - **`Indexer`**: consumes surviving records into a full-text index and
//!   answers scored queries. Exactly one is configured.
//! - **`Ranker`**: maps a record plus the user query to a score, fused by the
//!   query path with the configured weights.
//!
//! Filters and rankers run as ordered chains; a filter returning `None`
//! ("dropped") terminates the chain for that record.
//!
//! ## Registry
//! Built-ins register a factory under their `builtin.*` type tag at startup.
//! Each configured handler slot is resolved against the registry and
//! initialized with its option table; an unresolved tag is a startup failure.
//!
//! ## Submodules
//! - **`registry`**: tag-to-factory maps and chain resolution.
//! - **`pre_crawl`**: unique-domain, entropy and length filters.
//! - **`post_crawl`**: meta-description filter.
//! - **`indexers`**: the full-text indexer and a random indexer for testing.
//! - **`rankers`**: the indexer-score ranker and a random ranker for testing.

pub mod indexers;
pub mod post_crawl;
pub mod pre_crawl;
pub mod rankers;
pub mod registry;

pub use registry::{normalized_ranker_weights, HandlerRegistry};

use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use reqwest::header::HeaderMap;
use scraper::Html;
use std::collections::HashMap;
use std::path::Path;

pub trait PreCrawlFilter: Send {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()>;

    /// Passes a record through the filter; `None` means dropped.
    fn input(&mut self, properties: DomainProperties) -> Option<DomainProperties>;

    fn type_tag(&self) -> &'static str;
}

pub trait PostCrawlFilter: Send + Sync {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()>;

    /// Passes a crawled record through the filter; `None` means dropped.
    fn input(
        &self,
        properties: DomainProperties,
        headers: &HeaderMap,
        document: &Html,
    ) -> Option<DomainProperties>;

    fn type_tag(&self) -> &'static str;
}

pub trait Indexer: Send {
    fn initialize(
        &mut self,
        options: &TaskHandlerOptions,
        base_dir: &Path,
        output_limit: usize,
    ) -> anyhow::Result<()>;

    fn index(&mut self, id: &str, properties: &DomainProperties) -> anyhow::Result<()>;

    /// Returns a mapping from record id to raw relevance score.
    fn query(&mut self, user_query: &str) -> anyhow::Result<HashMap<String, f64>>;

    fn type_tag(&self) -> &'static str;
}

pub trait Ranker: Send + Sync {
    fn initialize(&mut self, options: &TaskHandlerOptions) -> anyhow::Result<()>;

    fn input(&self, properties: &DomainProperties, user_query: &str) -> f64;

    fn type_tag(&self) -> &'static str;
}
