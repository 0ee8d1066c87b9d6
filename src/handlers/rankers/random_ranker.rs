use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::Ranker;

/// Scores every record uniformly at random. Used for testing ranker fusion.
#[derive(Default)]
pub struct RandomRanker;

impl Ranker for RandomRanker {
    fn initialize(&mut self, _options: &TaskHandlerOptions) -> anyhow::Result<()> {
        Ok(())
    }

    fn input(&self, _properties: &DomainProperties, _user_query: &str) -> f64 {
        rand::random::<f64>()
    }

    fn type_tag(&self) -> &'static str {
        "builtin.random_ranker"
    }
}
