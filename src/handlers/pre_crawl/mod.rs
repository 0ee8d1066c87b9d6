//! Built-in Pre-Crawl Filters
//!
//! These run against raw zone-file records before any network traffic, so
//! their job is to shrink tens of millions of records down to the candidates
//! worth probing.

pub mod entropy;
pub mod length;
pub mod unique_domain;

pub use entropy::EntropyFilter;
pub use length::LengthFilter;
pub use unique_domain::UniqueDomainFilter;

/// The label a filter inspects: everything before the last dot of the domain
/// name (for `example.com` that is `example`).
fn label_before_last_dot(domain_name: &str) -> &str {
    domain_name
        .rsplit_once('.')
        .map(|(label, _)| label)
        .unwrap_or("")
}
