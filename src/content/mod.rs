/*!
 * Content
 * Models plus the validation and derived-field rules shared by every
 * content route
 */
pub mod models;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::error::ApiError;

/// Prefix of inline-encoded payloads (data URIs). Image fields must hold
/// hosted URLs instead.
pub const INLINE_DATA_PREFIX: &str = "data:";

const WORDS_PER_MINUTE: usize = 200;

lazy_static::lazy_static! {
    /// Any markup tag, including comments and self-closing tags
    static ref TAG_REGEX: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
}

/// Current time, truncated to what the stored representation keeps.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    let millis = now.timestamp_millis();
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(now)
}

/// Stored timestamp text: RFC 3339, millisecond precision, `Z` suffix, so
/// lexical order equals chronological order.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A timestamp as a document field value.
pub fn timestamp_value(dt: &DateTime<Utc>) -> serde_json::Value {
    serde_json::Value::String(format_timestamp(dt))
}

/// Serde adapter for timestamps stored as text.
///
/// Reads RFC 3339 strings or epoch milliseconds; anything else decodes to
/// the Unix epoch so one odd legacy field does not hide a whole document.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let parsed = match &value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        };
        Ok(parsed.unwrap_or_default())
    }
}

/// Trimmed value of a required text field, or a 400 naming the field.
pub fn require_text(value: Option<&str>, field: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::Validation(format!("{} is required", field))),
    }
}

/// Trimmed optional text; blank becomes `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn is_inline_data(value: &str) -> bool {
    value
        .trim_start()
        .get(..INLINE_DATA_PREFIX.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(INLINE_DATA_PREFIX))
        .unwrap_or(false)
}

/// Reject inline-encoded image data on an image field.
pub fn reject_inline_image(value: Option<&str>, field: &str) -> Result<(), ApiError> {
    match value {
        Some(v) if is_inline_data(v) => Err(ApiError::Validation(format!(
            "{} must be a hosted image URL; inline image data is not allowed. Upload the file first.",
            field
        ))),
        _ => Ok(()),
    }
}

/// Remove markup and collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    let text = TAG_REGEX.replace_all(html, " ");
    let text = text.replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Estimated reading time, e.g. `"3 min read"`. Never less than one minute.
pub fn estimate_read_time(content: &str) -> String {
    let words = strip_markup(content).split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{} min read", minutes)
}

/// Plain-text summary of rich text, cut at a word boundary.
pub fn derive_excerpt(content: &str, max_chars: usize) -> String {
    let text = strip_markup(content);
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut excerpt = String::new();
    for word in text.split(' ') {
        if excerpt.chars().count() + word.chars().count() + 1 > max_chars {
            break;
        }
        if !excerpt.is_empty() {
            excerpt.push(' ');
        }
        excerpt.push_str(word);
    }
    excerpt.push('…');
    excerpt
}

/// Sanitize rich text before it is stored.
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_read_time_minimum_is_one_minute() {
        assert_eq!(estimate_read_time(""), "1 min read");
        assert_eq!(estimate_read_time("   \n\t "), "1 min read");
        assert_eq!(estimate_read_time("<p><br/></p><img src=\"x\">"), "1 min read");
    }

    #[test]
    fn test_read_time_rounds_up_per_200_words() {
        assert_eq!(estimate_read_time(&words(200)), "1 min read");
        assert_eq!(estimate_read_time(&words(201)), "2 min read");
        assert_eq!(estimate_read_time(&words(400)), "2 min read");
        assert_eq!(estimate_read_time(&words(401)), "3 min read");
    }

    #[test]
    fn test_read_time_is_monotonic_in_word_count() {
        let mut previous = 0;
        for n in (0..1200).step_by(37) {
            let minutes: usize = estimate_read_time(&words(n))
                .split(' ')
                .next()
                .and_then(|m| m.parse().ok())
                .unwrap();
            assert!(minutes >= previous);
            previous = minutes;
        }
    }

    #[test]
    fn test_read_time_ignores_markup() {
        let html = format!("<h1>Title</h1><p>{}</p>", words(200));
        // "Title" pushes the count to 201 words.
        assert_eq!(estimate_read_time(&html), "2 min read");
    }

    #[test]
    fn test_strip_markup_collapses_whitespace() {
        assert_eq!(strip_markup("<p>a</p>\n\n<p>b&nbsp;c</p>"), "a b c");
    }

    #[test]
    fn test_inline_data_detection() {
        assert!(is_inline_data("data:image/png;base64,AAAA"));
        assert!(is_inline_data("  DATA:image/jpeg;base64,AAAA"));
        assert!(!is_inline_data("https://cdn.example.com/a.png"));
        assert!(!is_inline_data("dat"));
        assert!(reject_inline_image(Some("data:x"), "image").is_err());
        assert!(reject_inline_image(None, "image").is_ok());
    }

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text(Some("  Hi "), "Title").unwrap(), "Hi");
        let err = require_text(Some("   "), "Title").unwrap_err();
        assert_eq!(err.to_string(), "Title is required");
        assert!(require_text(None, "Title").is_err());
    }

    #[test]
    fn test_normalize_tags_dedupes() {
        let tags = normalize_tags(["news", " News ", "", "tips"]);
        assert_eq!(tags, vec!["news", "tips"]);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let dt = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(format_timestamp(&dt), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_derive_excerpt_cuts_on_words() {
        assert_eq!(derive_excerpt("<p>short text</p>", 50), "short text");
        assert_eq!(derive_excerpt("alpha beta gamma delta", 12), "alpha beta…");
    }

    #[test]
    fn test_sanitize_html_strips_scripts() {
        let clean = sanitize_html("<p>ok</p><script>alert(1)</script>");
        assert!(clean.contains("<p>ok</p>"));
        assert!(!clean.contains("script"));
    }
}
