use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("must be valid"));
static AFTER_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^_a-zA-Z0-9]) ").expect("must be valid"));
static BEFORE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ([^_a-zA-Z0-9])").expect("must be valid"));

/// Collapses the printed document on one line, keeping a space only between two names.
/// String literals are always empty at this point, so no meaningful whitespace is lost.
pub(super) fn reduce(printed: &str) -> String {
    let collapsed = WHITESPACE.replace_all(printed.trim(), " ");
    let collapsed = AFTER_PUNCTUATION.replace_all(&collapsed, "$1");
    BEFORE_PUNCTUATION.replace_all(&collapsed, "$1").into_owned()
}
