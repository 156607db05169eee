//! Banned-term content filter.
//!
//! A `ContentFilter` holds an immutable set of banned terms and reports
//! whether a text contains any of them as a case-sensitive substring.

use heartline_types::config::FilterConfig;

/// Immutable banned-term matcher, shared across all requests.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    terms: Vec<String>,
}

impl ContentFilter {
    /// Build a filter from a list of terms.
    ///
    /// Empty terms are ignored (an empty term would match every text) and
    /// duplicates are collapsed, keeping first-seen order.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for term in terms {
            let term = term.into();
            if term.is_empty() || collected.contains(&term) {
                continue;
            }
            collected.push(term);
        }
        Self { terms: collected }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.banned_words.iter().cloned())
    }

    /// True iff `text` contains at least one banned term.
    pub fn violates(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The first banned term (in configured order) found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        self.terms
            .iter()
            .find(|term| text.contains(term.as_str()))
            .map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
