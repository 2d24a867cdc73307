//! Word splitting over raw document and query text.
//!
//! The input format is ASCII words separated by one or more spaces; 0x20 is
//! the sole delimiter. Anything else (tabs, punctuation handling, Unicode
//! segmentation) would be a protocol change.

/// Splits `text` into maximal runs of non-space bytes, skipping empty runs.
pub fn split_into_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(' ').filter(|word| !word.is_empty())
}

/// A word is valid iff it contains no control byte (anything below 0x20).
pub fn is_valid_word(word: &str) -> bool {
    !word.bytes().any(|byte| byte < 0x20)
}
