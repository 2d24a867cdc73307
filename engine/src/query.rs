use std::collections::HashSet;

use crate::error::{Result, SearchError};
use crate::tokenizer::{is_valid_word, split_into_words};

/// A parsed free-text query: terms that must appear and terms that must not.
/// A stop word is dropped from both collections during parsing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Query {
    pub plus_words: Vec<String>,
    pub minus_words: Vec<String>,
}

struct QueryWord<'a> {
    data: &'a str,
    is_minus: bool,
    is_stop: bool,
}

fn parse_query_word<'a>(text: &'a str, stop_words: &HashSet<String>) -> Result<QueryWord<'a>> {
    if text.is_empty() {
        return Err(SearchError::InvalidSymbol("query word is empty".to_string()));
    }
    let (word, is_minus) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    // Rejects bare "-", double-minus terms and control bytes.
    if word.is_empty() || word.starts_with('-') || !is_valid_word(word) {
        return Err(SearchError::InvalidSymbol(format!(
            "query word [{text}] is invalid"
        )));
    }
    Ok(QueryWord {
        data: word,
        is_minus,
        is_stop: stop_words.contains(word),
    })
}

impl Query {
    /// Splits `text` into plus and minus words. With `remove_duplicates` the
    /// collections are sorted and deduplicated; without it they keep
    /// insertion order.
    pub(crate) fn parse(
        text: &str,
        stop_words: &HashSet<String>,
        remove_duplicates: bool,
    ) -> Result<Query> {
        let mut query = Query::default();
        for word in split_into_words(text) {
            let query_word = parse_query_word(word, stop_words)?;
            if query_word.is_stop {
                continue;
            }
            if query_word.is_minus {
                query.minus_words.push(query_word.data.to_string());
            } else {
                query.plus_words.push(query_word.data.to_string());
            }
        }
        if remove_duplicates {
            query.plus_words.sort_unstable();
            query.plus_words.dedup();
            query.minus_words.sort_unstable();
            query.minus_words.dedup();
        }
        Ok(query)
    }
}
