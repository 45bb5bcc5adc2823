//! Plain-text rendering of rich-text fields.

use std::sync::OnceLock;

use regex::Regex;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is a valid regex"))
}

/// Remove HTML tags from rich text and trim the result.
///
/// Entities are left as they are; the rich-text editor stores them verbatim.
pub fn strip_html(raw: &str) -> String {
    tag_pattern().replace_all(raw, "").trim().to_string()
}
