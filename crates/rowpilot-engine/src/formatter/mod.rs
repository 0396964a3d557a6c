use rowpilot_core::selector::ResolvedSelector;
use rowpilot_core::template::TemplateReport;

use crate::executor::{Phase, RunReport, StepFailure};

fn describe_failure(failure: &StepFailure) -> String {
    let location = match failure.row {
        Some(row) => format!("row {}, {}[{}]", row + 1, failure.section, failure.action_index),
        None => format!("{}[{}]", failure.section, failure.action_index),
    };
    let mut out = format!("{} ({}): {}", location, failure.action, failure.message);
    if let Some(hint) = failure.hint {
        out.push_str(&format!("\n  Hint: {}", hint));
    }
    out
}

/// Summary printed at the end of a run.
pub fn format_report(report: &RunReport) -> String {
    let mut output = format!(
        "{} of {} rows completed",
        report.completed_rows, report.total_rows
    );
    if report.failed_rows > 0 {
        output.push_str(&format!(", {} failed", report.failed_rows));
    }

    match report.phase {
        Phase::Done if report.failed_rows == 0 => output.push_str("\nStatus: success"),
        Phase::Done => output.push_str("\nStatus: finished with errors"),
        _ if report.cancelled => output.push_str("\nStatus: cancelled"),
        _ => output.push_str("\nStatus: failed"),
    }

    if let Some(failure) = &report.first_error {
        output.push_str(&format!("\nFirst error: {}", describe_failure(failure)));
    }

    if !report.healed.is_empty() {
        output.push_str("\n\nHealed selectors:");
        for healed in &report.healed {
            output.push_str(&format!(
                "\n- {}[{}]: {} -> {} ({} reliability)",
                healed.section, healed.index, healed.previous, healed.selector, healed.reliability
            ));
        }
    }
    output
}

pub fn format_selector(resolved: &ResolvedSelector) -> String {
    let mut output = format!(
        "Selector: {}\nReliability: {}",
        resolved.selector,
        resolved.reliability()
    );
    if resolved.widened {
        output.push_str("\nScoped to a stable ancestor to make it unique.");
    }
    if resolved.brittle {
        output.push_str(
            "\nWarning: position-based selector. It will break if the page layout changes.",
        );
    }
    output
}

pub fn format_template_report(report: &TemplateReport) -> String {
    let mut output = String::new();
    if report.required_columns.is_empty() && report.max_index.is_none() {
        output.push_str("Loop actions do not reference any columns.");
    } else {
        let required: Vec<&str> = report.required_columns.iter().map(String::as_str).collect();
        output.push_str(&format!("Required columns: {}", required.join(", ")));
        if let Some(index) = report.max_index {
            output.push_str(&format!("\nHighest column index: {}", index));
        }
    }

    if !report.available_columns.is_empty() {
        output.push_str(&format!(
            "\nAvailable columns: {}",
            report.available_columns.join(", ")
        ));
    }

    for missing in &report.missing_columns {
        output.push_str(&format!("\nMissing column: {}", missing.name));
        if let Some(suggestion) = &missing.suggestion {
            output.push_str(&format!(" (did you mean '{}'?)", suggestion));
        }
    }
    if !report.index_in_range() {
        output.push_str(&format!(
            "\nColumn index {} is out of range for {} columns",
            report.max_index.unwrap_or_default(),
            report.available_columns.len()
        ));
    }
    output
}
