//! Static checks over a workflow's templates, run before any browser work.

use rowpilot_common::protocol::{ActionStep, Section, Workflow};
use serde::Serialize;
use std::collections::BTreeSet;

use super::error::{ActionTemplateError, TemplateError};
use super::parser::{ColumnRef, Segment, parse_template};
use super::resolver::{closest_column, is_template};

/// Parse `field` without resolving it.
pub fn check_syntax(field: &str) -> Result<(), TemplateError> {
    column_refs(field).map(|_| ())
}

pub fn column_refs(field: &str) -> Result<Vec<ColumnRef>, TemplateError> {
    if !is_template(field) {
        return Ok(Vec::new());
    }
    Ok(parse_template(field)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Column(column) => Some(column),
            Segment::Literal(_) => None,
        })
        .collect())
}

fn step_refs(
    section: Section,
    index: usize,
    step: &ActionStep,
) -> Result<Vec<ColumnRef>, ActionTemplateError> {
    let mut refs = Vec::new();
    for (field, value) in step.kind.template_fields() {
        let parsed = column_refs(value).map_err(|source| ActionTemplateError {
            section,
            index,
            field,
            source,
        })?;
        refs.extend(parsed);
    }
    Ok(refs)
}

/// Check every templated field of every section for syntax errors.
pub fn check_workflow_syntax(workflow: &Workflow) -> Result<(), ActionTemplateError> {
    for (section, index, step) in workflow.all_actions() {
        step_refs(section, index, step)?;
    }
    Ok(())
}

/// Named columns referenced by one section.
pub fn required_columns_in(
    workflow: &Workflow,
    section: Section,
) -> Result<BTreeSet<String>, ActionTemplateError> {
    let mut names = BTreeSet::new();
    for (index, step) in workflow.section(section).iter().enumerate() {
        for column in step_refs(section, index, step)? {
            if let ColumnRef::Name(name) = column {
                names.insert(name);
            }
        }
    }
    Ok(names)
}

/// Named columns referenced anywhere in the workflow.
pub fn required_columns(workflow: &Workflow) -> Result<BTreeSet<String>, ActionTemplateError> {
    let mut names = BTreeSet::new();
    for section in [
        Section::Initialization,
        Section::PreLoop,
        Section::Loop,
        Section::PostLoop,
    ] {
        names.extend(required_columns_in(workflow, section)?);
    }
    Ok(names)
}

/// Outcome of checking loop templates against a dataset's columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateReport {
    pub required_columns: BTreeSet<String>,
    pub missing_columns: Vec<MissingColumn>,
    pub available_columns: Vec<String>,
    /// Largest `col(N)` index used by the loop, if any.
    pub max_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColumn {
    pub name: String,
    pub suggestion: Option<String>,
}

impl TemplateReport {
    pub fn index_in_range(&self) -> bool {
        self.max_index
            .is_none_or(|index| index < self.available_columns.len())
    }

    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty() && self.index_in_range()
    }
}

/// Compare the loop's column references with `available` column names.
///
/// Only loop actions are checked: the other sections run without a row and
/// keep their templates verbatim.
pub fn validate_templates(
    workflow: &Workflow,
    available: &[String],
) -> Result<TemplateReport, ActionTemplateError> {
    let mut report = TemplateReport {
        available_columns: available.to_vec(),
        ..TemplateReport::default()
    };

    for (index, step) in workflow.loop_actions.iter().enumerate() {
        for column in step_refs(Section::Loop, index, step)? {
            match column {
                ColumnRef::Name(name) => {
                    report.required_columns.insert(name);
                }
                ColumnRef::Index(i) => {
                    report.max_index = Some(report.max_index.map_or(i, |m| m.max(i)));
                }
            }
        }
    }

    report.missing_columns = report
        .required_columns
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| MissingColumn {
            name: name.clone(),
            suggestion: closest_column(name, available.iter().map(String::as_str)),
        })
        .collect();

    Ok(report)
}
