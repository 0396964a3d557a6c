//! Randomness classification for attribute values.
//!
//! A value is semantic only when it is a whole-string match for one of five
//! naming conventions. Anything the patterns do not cover is treated as
//! generated: a verbose selector is merely ugly, one that silently stops
//! matching breaks a run weeks later.

use crate::config::schema::SelectorPolicy;
use regex::Regex;
use std::sync::LazyLock;

static DEFAULT_POLICY: LazyLock<SelectorPolicy> = LazyLock::new(SelectorPolicy::default);

static SEMANTIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[a-z]+$",                     // header
        r"^[a-z]+(-[a-z]+)+$",           // login-form
        r"^[a-z]+([A-Z][a-z]*)+$",       // loginForm
        r"^[a-z]+(_[a-z]+)+$",           // login_form
        r"^[A-Z][a-z]+([A-Z][a-z]*)*$",  // LoginForm
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").unwrap());

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,2}:\d{2}\b").unwrap());

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4}\b").unwrap());

/// [`is_semantic_with`] under the default policy.
pub fn is_semantic(value: &str) -> bool {
    is_semantic_with(value, &DEFAULT_POLICY)
}

pub fn is_semantic_with(value: &str, policy: &SelectorPolicy) -> bool {
    let len = value.chars().count();
    if len < policy.min_length || len > policy.max_length {
        return false;
    }

    if len >= policy.min_hex_run && value.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    if policy
        .framework_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && value.starts_with(prefix.as_str()))
    {
        return false;
    }

    SEMANTIC_PATTERNS.iter().any(|re| re.is_match(value))
}

/// Whether visible text is stable enough to locate an element by.
pub fn is_stable_text(text: &str, policy: &SelectorPolicy) -> bool {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() || normalized.chars().count() > policy.max_text_length {
        return false;
    }

    if !normalized.chars().any(char::is_alphabetic) {
        return false;
    }

    !(DIGIT_RUN_RE.is_match(&normalized)
        || TIME_RE.is_match(&normalized)
        || DATE_RE.is_match(&normalized))
}

/// Collapse runs of whitespace the way XPath `normalize-space()` does.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
