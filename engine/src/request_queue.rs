//! Rolling bookkeeping of queries that produced no results.

use std::collections::VecDeque;

use crate::document::{Document, DocumentId, DocumentStatus};
use crate::error::Result;
use crate::search::SearchEngine;

/// Window size in ticks. A tick is one `add_find_request` call, not a
/// wall-clock minute.
const MINUTES_IN_DAY: u64 = 1440;

const EMPTY_REQUEST_LABEL: &str = "empty request";

struct QueryResult {
    query: String,
    count: u64,
}

/// Wraps an engine and counts, over the last [`MINUTES_IN_DAY`] calls, how
/// many requests came back empty.
pub struct RequestQueue<'a> {
    search_engine: &'a SearchEngine,
    requests: VecDeque<QueryResult>,
    step_time: u64,
}

impl<'a> RequestQueue<'a> {
    pub fn new(search_engine: &'a SearchEngine) -> Self {
        Self {
            search_engine,
            requests: VecDeque::new(),
            step_time: 0,
        }
    }

    /// Runs the query with the default `Actual` status filter.
    pub fn add_find_request(&mut self, raw_query: &str) -> Result<Vec<Document>> {
        self.add_find_request_with_status(raw_query, DocumentStatus::Actual)
    }

    pub fn add_find_request_with_status(
        &mut self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        self.add_find_request_with_predicate(raw_query, move |_, document_status, _| {
            document_status == status
        })
    }

    /// Advances the tick, ages out one unit of the oldest interval once the
    /// window is full, runs the query and records its outcome. A parse error
    /// propagates without recording anything; the tick is still consumed.
    pub fn add_find_request_with_predicate<P>(
        &mut self,
        raw_query: &str,
        predicate: P,
    ) -> Result<Vec<Document>>
    where
        P: Fn(DocumentId, DocumentStatus, i32) -> bool + Sync,
    {
        self.step_time += 1;
        if self.step_time > MINUTES_IN_DAY {
            if let Some(oldest) = self.requests.front_mut() {
                if oldest.count > 1 {
                    oldest.count -= 1;
                } else {
                    self.requests.pop_front();
                }
            }
        }

        let documents = self
            .search_engine
            .find_top_documents_with_predicate(raw_query, predicate)?;

        let label = if documents.is_empty() {
            EMPTY_REQUEST_LABEL
        } else {
            raw_query
        };
        match self.requests.back_mut() {
            Some(tail) if tail.query == label => tail.count += 1,
            _ => self.requests.push_back(QueryResult {
                query: label.to_string(),
                count: 1,
            }),
        }
        Ok(documents)
    }

    /// Number of requests in the window that produced no results.
    pub fn no_result_requests(&self) -> usize {
        self.requests
            .iter()
            .filter(|request| request.query == EMPTY_REQUEST_LABEL)
            .map(|request| request.count as usize)
            .sum()
    }
}
