use super::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Column(ColumnRef),
}

/// Split `input` into literal text and column references.
///
/// Placeholders do not nest and `}}` always closes the innermost `{{`, so
/// a quoted column name cannot contain `}}`.
pub fn parse_template(input: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let body = &rest[start + 2..];
        let Some(end) = body.find("}}") else {
            return Err(TemplateError::malformed(input, "unterminated '{{'"));
        };
        let inner = &body[..end];
        if inner.contains("{{") {
            return Err(TemplateError::malformed(input, "nested '{{' is not supported"));
        }
        segments.push(Segment::Column(parse_reference(input, inner)?));
        rest = &body[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn parse_reference(input: &str, inner: &str) -> Result<ColumnRef, TemplateError> {
    let argument = inner
        .trim()
        .strip_prefix("col")
        .map(str::trim_start)
        .and_then(|s| s.strip_prefix('('))
        .map(str::trim_end)
        .and_then(|s| s.strip_suffix(')'))
        .map(str::trim)
        .ok_or_else(|| {
            TemplateError::malformed(input, format!("expected col(...), found '{}'", inner.trim()))
        })?;

    if let Some(quote) = argument.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let name = argument[1..].strip_suffix(quote).ok_or_else(|| {
            TemplateError::malformed(input, format!("unterminated quote in '{}'", argument))
        })?;
        if name.contains(quote) {
            return Err(TemplateError::malformed(
                input,
                format!("stray quote in '{}'", argument),
            ));
        }
        if name.is_empty() {
            return Err(TemplateError::malformed(input, "empty column name"));
        }
        return Ok(ColumnRef::Name(name.to_string()));
    }

    if argument.is_empty() || !argument.chars().all(|c| c.is_ascii_digit()) {
        return Err(TemplateError::malformed(
            input,
            format!(
                "column argument must be a quoted name or a non-negative integer, found '{}'",
                argument
            ),
        ));
    }

    argument
        .parse::<usize>()
        .map(ColumnRef::Index)
        .map_err(|_| TemplateError::malformed(input, format!("index '{}' is too large", argument)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_segments() {
        let segments = parse_template("Hello {{col('name')}}, #{{ col( 2 ) }}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("Hello "),
                Segment::Column(ColumnRef::Name("name".into())),
                Segment::Literal(", #"),
                Segment::Column(ColumnRef::Index(2)),
            ]
        );
    }

    #[test]
    fn quoted_names_are_exact() {
        let segments = parse_template("{{col(\" First Name\")}}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Column(ColumnRef::Name(" First Name".into()))]
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        for input in [
            "{{col(-1)}}",
            "{{col(1.5)}}",
            "{{col(name)}}",
            "{{col('a)}}",
            "{{col('')}}",
            "{{row(0)}}",
            "{{col(0)",
            "{{col({{col(0)}})}}",
        ] {
            assert!(
                matches!(
                    parse_template(input),
                    Err(TemplateError::MalformedTemplate { .. })
                ),
                "{} should be malformed",
                input
            );
        }
    }
}
