//! Text normalization and token matching helpers.
//!
//! These functions back the record normalizer (field cleanup) and the link
//! validator (title token matching). They operate on plain `&str` and never
//! allocate more than the returned value.

/// Trims a string and collapses internal whitespace runs to single spaces.
///
/// All Unicode whitespace (tabs, newlines, non-breaking spaces) collapses the
/// same way, so scraped HTML fragments with ragged indentation normalize to a
/// single readable line.
///
/// # Examples
///
/// ```
/// use scholarpipe::utils::text::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  National \t Merit\n Scholarship  "), "National Merit Scholarship");
/// assert_eq!(collapse_whitespace(""), "");
/// ```
pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true; // leading whitespace is dropped
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Splits a title into lowercase alphanumeric tokens longer than `min_len`.
///
/// Punctuation and symbols act as separators. Used by the validator to decide
/// whether a scraped title is actually present on the target page.
pub fn title_tokens(title: &str, min_len: usize) -> Vec<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > min_len)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of `tokens` that appear as substrings of `haystack_lower`.
///
/// `haystack_lower` must already be lowercased; callers lowercase the page
/// text once and reuse it across checks.
pub fn token_match_ratio(tokens: &[String], haystack_lower: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let matched = tokens
        .iter()
        .filter(|t| haystack_lower.contains(t.as_str()))
        .count();
    matched as f64 / tokens.len() as f64
}

/// Counts how many of `needles` occur in `haystack_lower`.
///
/// Each needle counts at most once regardless of how often it repeats.
pub fn count_present(needles: &[&str], haystack_lower: &str) -> usize {
    needles
        .iter()
        .filter(|n| haystack_lower.contains(*n))
        .count()
}
