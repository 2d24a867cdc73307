//! The search engine: index mutation, TF-IDF ranking and matching.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use rayon::prelude::*;
use tracing::debug;

use crate::concurrent_map::ConcurrentMap;
use crate::document::{Document, DocumentId, DocumentStatus};
use crate::error::{Result, SearchError};
use crate::query::Query;
use crate::tokenizer::{is_valid_word, split_into_words};

/// Upper bound on the number of documents a single query returns.
pub const MAX_RESULT_DOCUMENT_COUNT: usize = 5;

/// Selects how ranking, matching and removal distribute their work.
/// Both variants produce identical result sets; `Parallel` fans the work out
/// over rayon's thread pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy)]
struct DocumentData {
    rating: i32,
    status: DocumentStatus,
}

lazy_static! {
    static ref EMPTY_WORD_FREQS: BTreeMap<Arc<str>, f64> = BTreeMap::new();
}

/// In-memory inverted index over short text documents.
///
/// Terms are interned as `Arc<str>`: the forward and inverted maps share one
/// allocation per distinct term, so a term's storage lives exactly as long
/// as some index entry still references it. Mutation takes `&mut self` and
/// queries take `&self`; the borrow checker enforces the writer-exclusive /
/// reader-shared discipline across threads.
pub struct SearchEngine {
    stop_words: HashSet<String>,
    /// term -> (document id -> term frequency)
    word_to_document_freqs: HashMap<Arc<str>, BTreeMap<DocumentId, f64>>,
    /// document id -> (term -> term frequency); exact transpose of the above
    document_to_word_freqs: BTreeMap<DocumentId, BTreeMap<Arc<str>, f64>>,
    documents: HashMap<DocumentId, DocumentData>,
    document_ids: BTreeSet<DocumentId>,
}

impl SearchEngine {
    /// Builds an engine from a space-separated stop-word string.
    pub fn new(stop_words_text: &str) -> Result<Self> {
        Self::with_stop_words(split_into_words(stop_words_text))
    }

    /// Builds an engine from any sequence of stop words. Empty strings are
    /// dropped; a word with a control byte fails construction.
    pub fn with_stop_words<I, S>(stop_words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique_stop_words = HashSet::new();
        for word in stop_words {
            let word = word.as_ref();
            if word.is_empty() {
                continue;
            }
            if !is_valid_word(word) {
                return Err(SearchError::InvalidSymbol(format!(
                    "stop word [{word}] is invalid"
                )));
            }
            unique_stop_words.insert(word.to_string());
        }
        Ok(Self {
            stop_words: unique_stop_words,
            word_to_document_freqs: HashMap::new(),
            document_to_word_freqs: BTreeMap::new(),
            documents: HashMap::new(),
            document_ids: BTreeSet::new(),
        })
    }

    /// Indexes a document. Every token is validated before any index
    /// structure is touched, so a failed add leaves the engine unchanged.
    /// A document whose words are all stop words is still admitted; it
    /// carries no index entries but counts toward the document total.
    pub fn add_document(
        &mut self,
        document_id: DocumentId,
        document: &str,
        status: DocumentStatus,
        ratings: &[i32],
    ) -> Result<()> {
        if document_id < 0 {
            return Err(SearchError::InvalidSymbol(format!(
                "document id {document_id} is negative"
            )));
        }
        if self.documents.contains_key(&document_id) {
            return Err(SearchError::Duplicate(document_id));
        }
        for word in split_into_words(document) {
            if !is_valid_word(word) {
                return Err(SearchError::InvalidSymbol(format!(
                    "word [{word}] is invalid"
                )));
            }
        }

        let words: Vec<&str> = split_into_words(document)
            .filter(|word| !self.stop_words.contains(*word))
            .collect();

        let mut word_freqs: BTreeMap<Arc<str>, f64> = BTreeMap::new();
        if !words.is_empty() {
            let inv_word_count = 1.0 / words.len() as f64;
            for word in words {
                let term = self.intern(word);
                *self
                    .word_to_document_freqs
                    .entry(Arc::clone(&term))
                    .or_default()
                    .entry(document_id)
                    .or_insert(0.0) += inv_word_count;
                *word_freqs.entry(term).or_insert(0.0) += inv_word_count;
            }
        }
        self.document_to_word_freqs.insert(document_id, word_freqs);
        self.documents.insert(
            document_id,
            DocumentData {
                rating: Self::compute_average_rating(ratings),
                status,
            },
        );
        self.document_ids.insert(document_id);
        debug!(document_id, "document added");
        Ok(())
    }

    /// Removes a document and every index entry derived from it.
    pub fn remove_document(&mut self, document_id: DocumentId) -> Result<()> {
        self.remove_document_with_policy(ExecutionPolicy::Sequential, document_id)
    }

    /// Removes a document; the parallel policy distributes the per-term
    /// posting erasure over rayon.
    pub fn remove_document_with_policy(
        &mut self,
        policy: ExecutionPolicy,
        document_id: DocumentId,
    ) -> Result<()> {
        let Some(word_freqs) = self.document_to_word_freqs.remove(&document_id) else {
            return Err(SearchError::NotFound(document_id));
        };
        match policy {
            ExecutionPolicy::Sequential => {
                for word in word_freqs.keys() {
                    if let Some(postings) = self.word_to_document_freqs.get_mut(word) {
                        postings.remove(&document_id);
                        if postings.is_empty() {
                            self.word_to_document_freqs.remove(word);
                        }
                    }
                }
            }
            ExecutionPolicy::Parallel => {
                self.word_to_document_freqs
                    .par_iter_mut()
                    .for_each(|(word, postings)| {
                        if word_freqs.contains_key(word) {
                            postings.remove(&document_id);
                        }
                    });
                for word in word_freqs.keys() {
                    if self
                        .word_to_document_freqs
                        .get(word)
                        .is_some_and(BTreeMap::is_empty)
                    {
                        self.word_to_document_freqs.remove(word);
                    }
                }
            }
        }
        self.documents.remove(&document_id);
        self.document_ids.remove(&document_id);
        debug!(document_id, "document removed");
        Ok(())
    }

    /// Top documents with status `Actual`, ranked sequentially.
    pub fn find_top_documents(&self, raw_query: &str) -> Result<Vec<Document>> {
        self.find_top_documents_with_status(raw_query, DocumentStatus::Actual)
    }

    /// Top documents whose status equals `status`.
    pub fn find_top_documents_with_status(
        &self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        self.find_top_documents_with_predicate(raw_query, move |_, document_status, _| {
            document_status == status
        })
    }

    /// Top documents accepted by an arbitrary `(id, status, rating)` predicate.
    pub fn find_top_documents_with_predicate<P>(
        &self,
        raw_query: &str,
        predicate: P,
    ) -> Result<Vec<Document>>
    where
        P: Fn(DocumentId, DocumentStatus, i32) -> bool + Sync,
    {
        self.find_top_documents_with_policy(ExecutionPolicy::Sequential, raw_query, predicate)
    }

    /// Full ranking pipeline: parse, accumulate TF-IDF per document, drop
    /// minus-word matches, sort by relevance (rating breaks near-ties) and
    /// truncate to [`MAX_RESULT_DOCUMENT_COUNT`].
    pub fn find_top_documents_with_policy<P>(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        predicate: P,
    ) -> Result<Vec<Document>>
    where
        P: Fn(DocumentId, DocumentStatus, i32) -> bool + Sync,
    {
        let query = Query::parse(raw_query, &self.stop_words, true)?;
        let mut matched_documents = match policy {
            ExecutionPolicy::Sequential => self.find_all_documents(&query, &predicate),
            ExecutionPolicy::Parallel => self.find_all_documents_parallel(&query, &predicate),
        };
        match policy {
            ExecutionPolicy::Sequential => matched_documents.sort_by(compare_documents),
            ExecutionPolicy::Parallel => matched_documents.par_sort_by(compare_documents),
        }
        matched_documents.truncate(MAX_RESULT_DOCUMENT_COUNT);
        Ok(matched_documents)
    }

    /// Returns the plus words of the query present in the document, or an
    /// empty list as soon as any minus word matches, together with the
    /// document's status.
    pub fn match_document(
        &self,
        raw_query: &str,
        document_id: DocumentId,
    ) -> Result<(Vec<String>, DocumentStatus)> {
        self.match_document_with_policy(ExecutionPolicy::Sequential, raw_query, document_id)
    }

    /// Like [`Self::match_document`]; the parallel policy checks minus and
    /// plus words over rayon and returns the matched words sorted ascending.
    pub fn match_document_with_policy(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        document_id: DocumentId,
    ) -> Result<(Vec<String>, DocumentStatus)> {
        let Some(data) = self.documents.get(&document_id) else {
            return Err(SearchError::NotFound(document_id));
        };
        let word_freqs = self.word_frequencies(document_id);
        match policy {
            ExecutionPolicy::Sequential => {
                let query = Query::parse(raw_query, &self.stop_words, true)?;
                for word in &query.minus_words {
                    if word_freqs.contains_key(word.as_str()) {
                        return Ok((Vec::new(), data.status));
                    }
                }
                let matched_words = query
                    .plus_words
                    .into_iter()
                    .filter(|word| word_freqs.contains_key(word.as_str()))
                    .collect();
                Ok((matched_words, data.status))
            }
            ExecutionPolicy::Parallel => {
                let query = Query::parse(raw_query, &self.stop_words, false)?;
                if query
                    .minus_words
                    .par_iter()
                    .any(|word| word_freqs.contains_key(word.as_str()))
                {
                    return Ok((Vec::new(), data.status));
                }
                let mut matched_words: Vec<String> = query
                    .plus_words
                    .into_par_iter()
                    .filter(|word| word_freqs.contains_key(word.as_str()))
                    .collect();
                matched_words.sort_unstable();
                matched_words.dedup();
                Ok((matched_words, data.status))
            }
        }
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Indexed document ids in ascending order.
    pub fn document_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.document_ids.iter().copied()
    }

    /// Term frequencies of one document; empty for an unknown id.
    pub fn word_frequencies(&self, document_id: DocumentId) -> &BTreeMap<Arc<str>, f64> {
        self.document_to_word_freqs
            .get(&document_id)
            .unwrap_or(&EMPTY_WORD_FREQS)
    }

    /// Reuses the existing allocation for a term already in the index.
    fn intern(&self, word: &str) -> Arc<str> {
        match self.word_to_document_freqs.get_key_value(word) {
            Some((term, _)) => Arc::clone(term),
            None => Arc::from(word),
        }
    }

    fn compute_average_rating(ratings: &[i32]) -> i32 {
        if ratings.is_empty() {
            return 0;
        }
        let rating_sum: i32 = ratings.iter().sum();
        rating_sum / ratings.len() as i32
    }

    fn compute_inverse_document_freq(&self, postings: &BTreeMap<DocumentId, f64>) -> f64 {
        (self.document_count() as f64 / postings.len() as f64).ln()
    }

    fn find_all_documents<P>(&self, query: &Query, predicate: &P) -> Vec<Document>
    where
        P: Fn(DocumentId, DocumentStatus, i32) -> bool,
    {
        let mut document_to_relevance: BTreeMap<DocumentId, f64> = BTreeMap::new();
        for word in &query.plus_words {
            let Some(postings) = self.word_to_document_freqs.get(word.as_str()) else {
                continue;
            };
            let inverse_document_freq = self.compute_inverse_document_freq(postings);
            for (&document_id, &term_freq) in postings {
                let Some(data) = self.documents.get(&document_id) else {
                    continue;
                };
                if predicate(document_id, data.status, data.rating) {
                    *document_to_relevance.entry(document_id).or_insert(0.0) +=
                        term_freq * inverse_document_freq;
                }
            }
        }
        for word in &query.minus_words {
            if let Some(postings) = self.word_to_document_freqs.get(word.as_str()) {
                for document_id in postings.keys() {
                    document_to_relevance.remove(document_id);
                }
            }
        }
        self.collect_matched_documents(document_to_relevance)
    }

    fn find_all_documents_parallel<P>(&self, query: &Query, predicate: &P) -> Vec<Document>
    where
        P: Fn(DocumentId, DocumentStatus, i32) -> bool + Sync,
    {
        // Minus words are few; gathering their documents up front is cheaper
        // than erasing from the shared accumulator afterwards.
        let mut minus_documents: HashSet<DocumentId> = HashSet::new();
        for word in &query.minus_words {
            if let Some(postings) = self.word_to_document_freqs.get(word.as_str()) {
                minus_documents.extend(postings.keys().copied());
            }
        }

        let document_to_relevance: ConcurrentMap<DocumentId, f64> =
            ConcurrentMap::new(query.plus_words.len().max(1));
        query.plus_words.par_iter().for_each(|word| {
            let Some(postings) = self.word_to_document_freqs.get(word.as_str()) else {
                return;
            };
            let inverse_document_freq = self.compute_inverse_document_freq(postings);
            for (&document_id, &term_freq) in postings {
                if minus_documents.contains(&document_id) {
                    continue;
                }
                let Some(data) = self.documents.get(&document_id) else {
                    continue;
                };
                if predicate(document_id, data.status, data.rating) {
                    document_to_relevance.with(document_id, |relevance| {
                        *relevance += term_freq * inverse_document_freq;
                    });
                }
            }
        });
        self.collect_matched_documents(document_to_relevance.build_ordinary())
    }

    fn collect_matched_documents(
        &self,
        document_to_relevance: BTreeMap<DocumentId, f64>,
    ) -> Vec<Document> {
        document_to_relevance
            .into_iter()
            .filter_map(|(document_id, relevance)| {
                self.documents
                    .get(&document_id)
                    .map(|data| Document::new(document_id, relevance, data.rating))
            })
            .collect()
    }
}

/// Descending relevance; ratings decide when relevances are within machine
/// epsilon of each other.
fn compare_documents(lhs: &Document, rhs: &Document) -> Ordering {
    if (lhs.relevance - rhs.relevance).abs() < f64::EPSILON {
        rhs.rating.cmp(&lhs.rating)
    } else {
        rhs.relevance
            .partial_cmp(&lhs.relevance)
            .unwrap_or(Ordering::Equal)
    }
}
