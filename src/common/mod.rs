//! Shared Record Types
//!
//! The `DomainProperties` record is the row that travels through every pipeline
//! stage: created from a zone-file line by pre-crawl filtering, enriched (or
//! dropped) by each subsequent filter, and materialized to disk between stages
//! as one flat JSON object per line.

pub mod properties;

pub use properties::DomainProperties;
