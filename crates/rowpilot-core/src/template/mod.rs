//! `{{col(...)}}` templates in action fields.
//!
//! Two reference forms are supported: `col('name')` (or double quotes) for a
//! case and whitespace exact column name, and `col(N)` for the 0-based N-th
//! column of the row.

mod error;
mod parser;
mod resolver;
mod validation;

pub use error::{ActionTemplateError, TemplateError};
pub use parser::{ColumnRef, Segment, parse_template};
pub use resolver::{is_template, resolve_expression, resolve_optional};
pub use validation::{
    MissingColumn, TemplateReport, check_syntax, check_workflow_syntax, column_refs,
    required_columns, required_columns_in, validate_templates,
};
