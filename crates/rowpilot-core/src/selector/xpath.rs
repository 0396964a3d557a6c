//! XPath text builders shared by the ranker and the healing analyzer.

/// Quote `value` as an XPath string literal.
///
/// XPath 1.0 has no escape sequences, so a value holding both quote kinds is
/// spelled as a `concat()` of pieces.
pub fn literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }

    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// Tag name usable as an XPath name test. Anything unusual falls back to `*`.
pub fn name_test(tag: &str) -> &str {
    let valid = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if valid { tag } else { "*" }
}

pub fn attribute_step(tag: &str, name: &str, value: &str) -> String {
    format!("//{}[@{}={}]", name_test(tag), name, literal(value))
}

pub fn class_step(tag: &str, class: &str) -> String {
    // Padded so that "btn" does not match "btn-primary".
    format!(
        "//{}[contains(concat(' ', normalize-space(@class), ' '), {})]",
        name_test(tag),
        literal(&format!(" {} ", class))
    )
}

pub fn text_step(tag: &str, text: &str) -> String {
    format!("//{}[normalize-space(.)={}]", name_test(tag), literal(text))
}
