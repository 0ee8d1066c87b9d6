use crate::common::DomainProperties;
use crate::config::TaskHandlerOptions;
use crate::handlers::Indexer;

use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument};

/// Pending document adds are committed in batches; the indexer stage persists
/// its checkpoint on the same cadence, so a crash replays at most one batch.
const COMMIT_EVERY: usize = 1024;

/// Full-text indexer over the record's `description` and `body` attributes,
/// backed by an on-disk tantivy index.
#[derive(Default)]
pub struct BasicIndexer {
    state: Option<IndexState>,
    output_limit: usize,
}

struct IndexState {
    index: Index,
    writer: IndexWriter,
    id_field: Field,
    content_field: Field,
    pending: usize,
}

impl Indexer for BasicIndexer {
    fn initialize(
        &mut self,
        _options: &TaskHandlerOptions,
        base_dir: &Path,
        output_limit: usize,
    ) -> anyhow::Result<()> {
        std::fs::create_dir_all(base_dir)
            .with_context(|| format!("unable to create index folder {}", base_dir.display()))?;

        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let directory = MmapDirectory::open(base_dir)
            .with_context(|| format!("unable to open index folder {}", base_dir.display()))?;
        let index = Index::open_or_create(directory, schema).context("unable to open index")?;
        let writer = index
            .writer(50_000_000)
            .context("unable to create index writer")?;

        self.state = Some(IndexState {
            index,
            writer,
            id_field,
            content_field,
            pending: 0,
        });
        self.output_limit = output_limit;
        Ok(())
    }

    fn index(&mut self, id: &str, properties: &DomainProperties) -> anyhow::Result<()> {
        let state = self
            .state
            .as_mut()
            .context("indexer has not been initialized")?;

        let mut record = String::new();
        if let Some(description) = properties.string_properties.get("description") {
            record.push_str(description);
            record.push_str(" - ");
        }
        if let Some(body) = properties.string_properties.get("body") {
            record.push_str(body);
        }

        if !record.is_empty() {
            state
                .writer
                .add_document(doc!(
                    state.id_field => id,
                    state.content_field => record,
                ))
                .context("unable to add document to index")?;
        }

        state.pending += 1;
        if state.pending >= COMMIT_EVERY {
            state.writer.commit().context("unable to commit index")?;
            state.pending = 0;
        }

        Ok(())
    }

    fn query(&mut self, user_query: &str) -> anyhow::Result<HashMap<String, f64>> {
        let state = self
            .state
            .as_mut()
            .context("indexer has not been initialized")?;

        if state.pending > 0 {
            state.writer.commit().context("unable to commit index")?;
            state.pending = 0;
        }

        // The default tokenizer lower-cases indexed terms, so the query has to
        // be lower-cased to match.
        let user_query = user_query.to_lowercase();

        let reader = state.index.reader().context("unable to open index reader")?;
        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&state.index, vec![state.content_field]);
        let query = query_parser
            .parse_query(&user_query)
            .with_context(|| format!("unable to parse query {user_query:?}"))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(self.output_limit.max(1)))
            .context("index search failed")?;

        let mut id_to_score = HashMap::new();
        for (score, doc_address) in top_docs {
            let document: TantivyDocument = searcher
                .doc(doc_address)
                .context("unable to load indexed document")?;
            if let Some(id) = document
                .get_first(state.id_field)
                .and_then(|value| value.as_str())
            {
                id_to_score.insert(id.to_string(), score as f64);
            }
        }

        Ok(id_to_score)
    }

    fn type_tag(&self) -> &'static str {
        "builtin.basic_indexer"
    }
}
