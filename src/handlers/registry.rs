use super::indexers::{BasicIndexer, RandomIndexer};
use super::post_crawl::DescriptionFilter;
use super::pre_crawl::{EntropyFilter, LengthFilter, UniqueDomainFilter};
use super::rankers::{IndexerRanker, RandomRanker};
use super::{Indexer, PostCrawlFilter, PreCrawlFilter, Ranker};
use crate::config::TaskHandlerOptions;

use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;

pub type PreCrawlFactory = Box<dyn Fn() -> Box<dyn PreCrawlFilter> + Send + Sync>;
pub type PostCrawlFactory = Box<dyn Fn() -> Box<dyn PostCrawlFilter> + Send + Sync>;
pub type IndexerFactory = Box<dyn Fn() -> Box<dyn Indexer> + Send + Sync>;
pub type RankerFactory = Box<dyn Fn() -> Box<dyn Ranker> + Send + Sync>;

/// Four independent mappings from type tag to handler factory. Assembled from
/// the built-ins at startup; configured handler slots are resolved against it
/// exactly once.
#[derive(Default)]
pub struct HandlerRegistry {
    pre_crawl_filters: HashMap<String, PreCrawlFactory>,
    post_crawl_filters: HashMap<String, PostCrawlFactory>,
    indexers: HashMap<String, IndexerFactory>,
    rankers: HashMap<String, RankerFactory>,
}

impl HandlerRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();

        tracing::info!("Registering built-in Pre-Crawl Filters");
        registry.register_pre_crawl_filter("builtin.unique_domain", || {
            Box::new(UniqueDomainFilter::default())
        });
        registry.register_pre_crawl_filter("builtin.discard_high_entropy", || {
            Box::new(EntropyFilter::default())
        });
        registry.register_pre_crawl_filter("builtin.length_filter", || {
            Box::new(LengthFilter::default())
        });

        tracing::info!("Registering built-in Post-Crawl Filters");
        registry.register_post_crawl_filter("builtin.description_filter", || {
            Box::new(DescriptionFilter::default())
        });

        tracing::info!("Registering built-in Indexers");
        registry.register_indexer("builtin.basic_indexer", || {
            Box::new(BasicIndexer::default())
        });
        registry.register_indexer("builtin.random_indexer", || {
            Box::new(RandomIndexer::default())
        });

        tracing::info!("Registering built-in Rankers");
        registry.register_ranker("builtin.indexer_ranker", || {
            Box::new(IndexerRanker::default())
        });
        registry.register_ranker("builtin.random_ranker", || {
            Box::new(RandomRanker::default())
        });

        registry
    }

    pub fn register_pre_crawl_filter<F>(&mut self, type_tag: &str, factory: F)
    where
        F: Fn() -> Box<dyn PreCrawlFilter> + Send + Sync + 'static,
    {
        self.pre_crawl_filters
            .insert(type_tag.to_string(), Box::new(factory));
    }

    pub fn register_post_crawl_filter<F>(&mut self, type_tag: &str, factory: F)
    where
        F: Fn() -> Box<dyn PostCrawlFilter> + Send + Sync + 'static,
    {
        self.post_crawl_filters
            .insert(type_tag.to_string(), Box::new(factory));
    }

    pub fn register_indexer<F>(&mut self, type_tag: &str, factory: F)
    where
        F: Fn() -> Box<dyn Indexer> + Send + Sync + 'static,
    {
        self.indexers.insert(type_tag.to_string(), Box::new(factory));
    }

    pub fn register_ranker<F>(&mut self, type_tag: &str, factory: F)
    where
        F: Fn() -> Box<dyn Ranker> + Send + Sync + 'static,
    {
        self.rankers.insert(type_tag.to_string(), Box::new(factory));
    }

    pub fn resolve_pre_crawl_chain(
        &self,
        configs: &[TaskHandlerOptions],
    ) -> anyhow::Result<Vec<Box<dyn PreCrawlFilter>>> {
        configs
            .iter()
            .map(|options| {
                let factory = self
                    .pre_crawl_filters
                    .get(&options.type_tag)
                    .with_context(|| {
                        format!("pre-crawl filter {:?} not found in registry", options.type_tag)
                    })?;
                let mut handler = factory();
                handler.initialize(options).with_context(|| {
                    format!("unable to initialize pre-crawl filter {:?}", options.type_tag)
                })?;
                Ok(handler)
            })
            .collect()
    }

    pub fn resolve_post_crawl_chain(
        &self,
        configs: &[TaskHandlerOptions],
    ) -> anyhow::Result<Vec<Box<dyn PostCrawlFilter>>> {
        configs
            .iter()
            .map(|options| {
                let factory = self
                    .post_crawl_filters
                    .get(&options.type_tag)
                    .with_context(|| {
                        format!(
                            "post-crawl filter {:?} not found in registry",
                            options.type_tag
                        )
                    })?;
                let mut handler = factory();
                handler.initialize(options).with_context(|| {
                    format!(
                        "unable to initialize post-crawl filter {:?}",
                        options.type_tag
                    )
                })?;
                Ok(handler)
            })
            .collect()
    }

    pub fn resolve_indexer(
        &self,
        options: &TaskHandlerOptions,
        base_dir: &Path,
        output_limit: usize,
    ) -> anyhow::Result<Box<dyn Indexer>> {
        let factory = self
            .indexers
            .get(&options.type_tag)
            .with_context(|| format!("indexer {:?} not found in registry", options.type_tag))?;
        let mut indexer = factory();
        indexer
            .initialize(options, base_dir, output_limit)
            .with_context(|| format!("unable to initialize indexer {:?}", options.type_tag))?;
        Ok(indexer)
    }

    pub fn resolve_rankers(
        &self,
        configs: &[TaskHandlerOptions],
    ) -> anyhow::Result<Vec<Box<dyn Ranker>>> {
        configs
            .iter()
            .map(|options| {
                let factory = self.rankers.get(&options.type_tag).with_context(|| {
                    format!("ranker {:?} not found in registry", options.type_tag)
                })?;
                let mut ranker = factory();
                ranker.initialize(options).with_context(|| {
                    format!("unable to initialize ranker {:?}", options.type_tag)
                })?;
                Ok(ranker)
            })
            .collect()
    }

    pub fn has_pre_crawl_filter(&self, type_tag: &str) -> bool {
        self.pre_crawl_filters.contains_key(type_tag)
    }

    pub fn has_ranker(&self, type_tag: &str) -> bool {
        self.rankers.contains_key(type_tag)
    }
}

/// Normalizes the configured ranker weights so they sum to 1.0. The `weight`
/// option is validated to exist at config load time.
pub fn normalized_ranker_weights(configs: &[TaskHandlerOptions]) -> HashMap<String, f64> {
    let total: f64 = configs
        .iter()
        .filter_map(|options| options.float_options.get("weight"))
        .sum();

    if total == 0.0 {
        return HashMap::new();
    }

    configs
        .iter()
        .filter_map(|options| {
            let weight = options.float_options.get("weight")?;
            Some((options.type_tag.clone(), weight / total))
        })
        .collect()
}
