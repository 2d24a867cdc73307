//! Batch execution of independent queries.

use rayon::prelude::*;

use crate::document::Document;
use crate::error::Result;
use crate::search::SearchEngine;

/// Runs every query through [`SearchEngine::find_top_documents`] in parallel.
/// The output has the same length and order as `queries`; the first failing
/// query aborts the batch.
pub fn process_queries(
    search_engine: &SearchEngine,
    queries: &[String],
) -> Result<Vec<Vec<Document>>> {
    queries
        .par_iter()
        .map(|query| search_engine.find_top_documents(query))
        .collect()
}

/// Like [`process_queries`], flattened into one list that preserves the
/// overall query-then-rank order.
pub fn process_queries_joined(
    search_engine: &SearchEngine,
    queries: &[String],
) -> Result<Vec<Document>> {
    Ok(process_queries(search_engine, queries)?
        .into_iter()
        .flatten()
        .collect())
}
