//! Built-in Post-Crawl Filters
//!
//! These see the crawled page (response headers plus parsed HTML) alongside
//! the record and decide whether the domain carries content worth indexing.

pub mod description;

pub use description::DescriptionFilter;

#[cfg(test)]
mod tests;
