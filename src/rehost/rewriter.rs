//! Reference rewriting
//!
//! Substitutes old references with new ones inside the three literal forms
//! the extractor recognises: `](old)`, `src="old"` and `src='old'`.

use std::collections::HashMap;

/// Opening and closing delimiters around a reference
const FORMS: [(&str, &str); 3] = [("](", ")"), ("src=\"", "\""), ("src='", "'")];

/// Rewrites every mapped reference in `text`
///
/// The text is scanned once from left to right. Each replacement is emitted
/// to the output and never scanned again, so a new URL that happens to
/// contain another mapped key does not trigger a second substitution. When
/// several keys match at the same position the longest one wins.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use md_rehost::rewrite;
///
/// let mapping = HashMap::from([("https://a/x.png".to_string(), "https://cdn/x.png".to_string())]);
/// let out = rewrite("![x](https://a/x.png)", &mapping);
/// assert_eq!(out, "![x](https://cdn/x.png)");
/// ```
pub fn rewrite(text: &str, mapping: &HashMap<String, String>) -> String {
    if mapping.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((start, open, close)) = next_opening(rest) {
        let body_start = start + open.len();
        out.push_str(&rest[..body_start]);
        let body = &rest[body_start..];

        match longest_key_at(body, close, mapping) {
            Some((old, new)) => {
                out.push_str(new);
                out.push_str(close);
                rest = &body[old.len() + close.len()..];
            }
            None => rest = body,
        }
    }

    out.push_str(rest);
    out
}

/// Finds the earliest opening delimiter in `text`
fn next_opening(text: &str) -> Option<(usize, &'static str, &'static str)> {
    FORMS
        .iter()
        .filter_map(|&(open, close)| text.find(open).map(|idx| (idx, open, close)))
        .min_by_key(|&(idx, _, _)| idx)
}

/// Returns the longest mapped key that starts `body` and is followed by `close`
fn longest_key_at<'m>(
    body: &str,
    close: &str,
    mapping: &'m HashMap<String, String>,
) -> Option<(&'m str, &'m str)> {
    mapping
        .iter()
        .filter(|(old, _)| !old.is_empty())
        .filter(|(old, _)| body.starts_with(old.as_str()) && body[old.len()..].starts_with(close))
        .max_by_key(|(old, _)| old.len())
        .map(|(old, new)| (old.as_str(), new.as_str()))
}
