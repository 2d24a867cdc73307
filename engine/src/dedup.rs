//! Duplicate elimination over the whole index.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::document::DocumentId;
use crate::search::SearchEngine;

/// Removes every document whose distinct term set repeats that of an earlier
/// document. Term frequencies are ignored: two documents with the same words
/// at different counts are still duplicates. The lowest id of each group
/// survives. Returns the removed ids in ascending order and logs one
/// `Found duplicate document id <id>` line per removal.
pub fn remove_duplicates(search_engine: &mut SearchEngine) -> Vec<DocumentId> {
    let mut seen_word_sets: HashSet<Vec<Arc<str>>> = HashSet::new();
    let mut ids_to_remove: Vec<DocumentId> = Vec::new();

    let document_ids: Vec<DocumentId> = search_engine.document_ids().collect();
    for document_id in document_ids {
        let word_freqs = search_engine.word_frequencies(document_id);
        if word_freqs.is_empty() {
            continue;
        }
        // Keys of the forward map come out sorted, so equal term sets
        // produce equal vectors.
        let words: Vec<Arc<str>> = word_freqs.keys().cloned().collect();
        if !seen_word_sets.insert(words) {
            ids_to_remove.push(document_id);
        }
    }

    let mut removed = Vec::with_capacity(ids_to_remove.len());
    for document_id in ids_to_remove {
        if search_engine.remove_document(document_id).is_err() {
            continue;
        }
        info!("Found duplicate document id {document_id}");
        removed.push(document_id);
    }
    removed
}
