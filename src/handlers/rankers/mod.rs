//! Built-in Rankers
//!
//! Rankers score already-retrieved records at query time; the query path fuses
//! their outputs with the normalized weight table.

pub mod indexer_ranker;
pub mod random_ranker;

pub use indexer_ranker::IndexerRanker;
pub use random_ranker::RandomRanker;
