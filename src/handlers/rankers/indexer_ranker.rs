use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::Ranker;

/// Passes the indexer's normalized score through as the ranking signal.
#[derive(Default)]
pub struct IndexerRanker;

impl Ranker for IndexerRanker {
    fn initialize(&mut self, _options: &TaskHandlerOptions) -> anyhow::Result<()> {
        Ok(())
    }

    fn input(&self, properties: &DomainProperties, _user_query: &str) -> f64 {
        properties
            .float_properties
            .get("normalized_indexer_score")
            .copied()
            .unwrap_or(0.0)
    }

    fn type_tag(&self) -> &'static str {
        "builtin.indexer_ranker"
    }
}
