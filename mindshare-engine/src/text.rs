//! Text normalization, tokenization and sentence splitting.
//!
//! Linker, scorer and burst explainer all work on the same normalized
//! form so that byte offsets computed by one are valid for the others.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}](?:[\p{L}\p{N}'\-]*[\p{L}\p{N}])?").expect("word regex is valid")
});

/// Lower-case text and unify typographic apostrophes.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// A word token with its byte span in the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub span: (usize, usize),
}

/// Word tokens of already normalized text.
pub fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    WORD_RE.find_iter(text).map(|m| Token {
        text: m.as_str(),
        span: (m.start(), m.end()),
    })
}

/// Byte ranges of the sentences in `text`.
///
/// Sentences end at `.`, `!`, `?` or a line break. Blank sentences are
/// dropped.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            let end = idx + ch.len_utf8();
            if !text[start..end].trim_matches(|c: char| !c.is_alphanumeric()).is_empty() {
                spans.push(start..end);
            }
            start = end;
        }
    }

    if start < text.len() && !text[start..].trim_matches(|c: char| !c.is_alphanumeric()).is_empty()
    {
        spans.push(start..text.len());
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Don\u{2019}t STOP"), "don't stop");
    }

    #[test]
    fn test_tokens() {
        let text = normalize("The border-wall isn't 100% done, ok?");
        let words: Vec<&str> = tokens(&text).map(|t| t.text).collect();
        assert_eq!(words, vec!["the", "border-wall", "isn't", "100", "done", "ok"]);
    }

    #[test]
    fn test_token_spans_index_text() {
        let text = "über café";
        for token in tokens(text) {
            assert_eq!(&text[token.span.0..token.span.1], token.text);
        }
    }

    #[test]
    fn test_sentence_spans() {
        let text = "First one. Second one!\nThird?  ...  trailing words";
        let sentences: Vec<&str> = sentence_spans(text)
            .into_iter()
            .map(|r| text[r].trim())
            .collect();
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "trailing words"]
        );
    }

    #[test]
    fn test_sentence_spans_empty() {
        assert!(sentence_spans("").is_empty());
        assert!(sentence_spans(" ... !!").is_empty());
    }
}
