use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::Indexer;
use std::collections::HashMap;
use std::path::Path;

/// Assigns every indexed id a uniform random score, capped at the output
/// limit. Used to exercise the pipeline without a real text index.
#[derive(Default)]
pub struct RandomIndexer {
    scores: HashMap<String, f64>,
    output_limit: usize,
}

impl Indexer for RandomIndexer {
    fn initialize(
        &mut self,
        _options: &TaskHandlerOptions,
        _base_dir: &Path,
        output_limit: usize,
    ) -> anyhow::Result<()> {
        self.output_limit = output_limit;
        Ok(())
    }

    fn index(&mut self, id: &str, _properties: &DomainProperties) -> anyhow::Result<()> {
        if self.scores.len() >= self.output_limit {
            return Ok(());
        }

        self.scores.insert(id.to_string(), rand::random::<f64>());
        Ok(())
    }

    fn query(&mut self, _user_query: &str) -> anyhow::Result<HashMap<String, f64>> {
        Ok(self.scores.clone())
    }

    fn type_tag(&self) -> &'static str {
        "builtin.random_indexer"
    }
}
