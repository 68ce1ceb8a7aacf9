//! Cleanup applied to every piece of text before it is scored.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid markdown link pattern"));

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\S+").expect("valid url pattern"));

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid symbol pattern"));

/// Reduces markdown links to their label, drops URLs and punctuation, and
/// collapses whitespace. Applying it twice gives the same result as once.
pub fn normalize_text(text: &str) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    let text = URL.replace_all(&text, "");
    let text = NON_WORD.replace_all(&text, "");
    // stripping symbols can glue a new `http…` token together ("h.ttp" -> "http")
    let text = URL.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Missing text normalizes to the empty string.
pub fn normalize_optional(text: Option<&str>) -> String {
    text.map(normalize_text).unwrap_or_default()
}
