//! Image reference extraction
//!
//! A lexical pass over document text that recognises two forms:
//! - Markdown inline images: `![alt](reference)`
//! - HTML image tags: `<img src="reference">` or `<img src='reference'>`

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("markdown image regex"));

static HTML_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img.*?src=["'](.*?)["'].*?>"#).expect("html image regex"));

/// Extracts image references from document text
///
/// References containing any skip marker are dropped, which lets a re-run
/// leave already rehosted images alone.
#[derive(Debug, Clone, Default)]
pub struct ReferenceExtractor {
    skip_markers: Vec<String>,
}

impl ReferenceExtractor {
    /// Creates an extractor that skips references containing any of `skip_markers`
    pub fn new(skip_markers: Vec<String>) -> Self {
        let skip_markers = skip_markers
            .into_iter()
            .filter(|marker| !marker.is_empty())
            .collect();
        Self { skip_markers }
    }

    /// Returns the distinct references in `text`
    ///
    /// Markdown matches come first, then HTML tag matches, each in order of
    /// appearance. Matches are trimmed; empty matches and exact repeats are
    /// dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use md_rehost::ReferenceExtractor;
    ///
    /// let text = "![a](https://ex.com/1.jpg)\n<img src=\"https://ex.com/2.png\">";
    /// let refs = ReferenceExtractor::default().extract(text);
    /// assert_eq!(refs, vec!["https://ex.com/1.jpg", "https://ex.com/2.png"]);
    /// ```
    pub fn extract(&self, text: &str) -> Vec<String> {
        let markdown = MARKDOWN_IMAGE.captures_iter(text);
        let html = HTML_IMAGE.captures_iter(text);

        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for captures in markdown.chain(html) {
            let Some(matched) = captures.get(1) else {
                continue;
            };
            let reference = matched.as_str().trim();

            if reference.is_empty() || self.is_skipped(reference) {
                continue;
            }

            if seen.insert(reference) {
                references.push(reference.to_string());
            }
        }

        references
    }

    /// Checks whether a reference already points at a skipped host
    pub fn is_skipped(&self, reference: &str) -> bool {
        self.skip_markers
            .iter()
            .any(|marker| reference.contains(marker.as_str()))
    }
}

/// Convenience function for extracting references without skip markers
pub fn extract_references(text: &str) -> Vec<String> {
    ReferenceExtractor::default().extract(text)
}
