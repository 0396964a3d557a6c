use rowpilot_common::row::{CellValue, RowData};
use std::borrow::Cow;

use super::error::TemplateError;
use super::parser::{ColumnRef, Segment, parse_template};

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

pub fn is_template(value: &str) -> bool {
    value.contains("{{")
}

/// Substitute every column reference in `expression` from `row`.
///
/// Values without `{{` are returned borrowed and untouched.
pub fn resolve_expression<'a>(
    expression: &'a str,
    row: &RowData,
) -> Result<Cow<'a, str>, TemplateError> {
    if !is_template(expression) {
        return Ok(Cow::Borrowed(expression));
    }

    let mut resolved = String::with_capacity(expression.len());
    for segment in parse_template(expression)? {
        match segment {
            Segment::Literal(text) => resolved.push_str(text),
            Segment::Column(column) => resolved.push_str(&lookup(&column, row)?.to_string()),
        }
    }
    Ok(Cow::Owned(resolved))
}

/// Like [`resolve_expression`], but outside the row loop (`row == None`)
/// the expression is passed through verbatim.
pub fn resolve_optional<'a>(
    expression: &'a str,
    row: Option<&RowData>,
) -> Result<Cow<'a, str>, TemplateError> {
    match row {
        Some(row) => resolve_expression(expression, row),
        None => Ok(Cow::Borrowed(expression)),
    }
}

fn lookup<'r>(column: &ColumnRef, row: &'r RowData) -> Result<&'r CellValue, TemplateError> {
    match column {
        ColumnRef::Name(name) => row.get(name).ok_or_else(|| TemplateError::MissingColumn {
            name: name.clone(),
            suggestion: closest_column(name, row.column_names()),
        }),
        ColumnRef::Index(index) => {
            row.get_index(*index)
                .map(|(_, value)| value)
                .ok_or(TemplateError::IndexOutOfRange {
                    index: *index,
                    len: row.len(),
                })
        }
    }
}

pub(crate) fn closest_column<'c>(
    name: &str,
    candidates: impl Iterator<Item = &'c str>,
) -> Option<String> {
    let wanted = name.trim().to_lowercase();
    candidates
        .map(|c| (c, strsim::jaro_winkler(&wanted, &c.trim().to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.to_string())
}
