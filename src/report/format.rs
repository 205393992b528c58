//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline stays free of presentation concerns
//! and output changes are localized.

use crate::app::pipeline::{PipelineOutput, ProfileOutput};
use crate::domain::{
    DateSource, Diagnostics, DropReason, FrequencyLabel, MappingSpec, ValueSource,
};

/// Samples printed per drop reason.
const SAMPLES_SHOWN: usize = 3;

/// Column classes, date candidates, layout and cadence of a table.
pub fn format_profile(profile: &ProfileOutput) -> String {
    let mut out = String::new();

    out.push_str("=== canon - table profile ===\n");
    out.push_str(&format!(
        "Rows: {} | Columns: {}\n",
        profile.rows,
        profile.columns.len()
    ));

    out.push_str("\nColumns:\n");
    for c in &profile.columns {
        let header = if c.header_date.is_some() { " (date header)" } else { "" };
        out.push_str(&format!(
            "  {:<24} {:<8} conf={:.2} date={:.2} num={:.2}{header}\n",
            c.name,
            format!("{:?}", c.class).to_lowercase(),
            c.confidence,
            c.date_fraction,
            c.numeric_fraction,
        ));
    }

    if profile.date_candidates.is_empty() {
        out.push_str("\nDate candidates: none\n");
    } else {
        out.push_str(&format!(
            "\nDate candidates: {}\n",
            profile.date_candidates.join(", ")
        ));
    }

    let shape = &profile.shape;
    out.push_str(&format!(
        "\nLayout: {:?} (confidence {:.2})\n",
        shape.shape, shape.confidence
    ));
    out.push_str(&format!(
        "- date headers: {}/{} ({:.2})\n",
        shape.evidence.date_headers.len(),
        shape.evidence.headers_considered,
        shape.evidence.header_date_fraction
    ));
    match &shape.evidence.best_date_column {
        Some(name) => out.push_str(&format!(
            "- best date column: {name} ({:.2})\n",
            shape.evidence.value_date_fraction
        )),
        None => out.push_str("- best date column: none\n"),
    }

    match &profile.frequency {
        Some(label) => out.push_str(&format!("Frequency: {}\n", fmt_frequency(label))),
        None => out.push_str("Frequency: n/a\n"),
    }

    out
}

/// Summary of one conversion.
pub fn format_run_summary(output: &PipelineOutput) -> String {
    let mut out = String::new();

    out.push_str("=== canon - conversion ===\n");
    out.push_str(&format!(
        "Layout: {:?} (confidence {:.2})\n",
        output.mapping.shape(),
        output.shape.confidence
    ));
    out.push_str(&format!("Mapping: {}\n", fmt_mapping(&output.mapping)));
    out.push_str(&format!("Frequency: {}\n", fmt_frequency(&output.frequency)));
    out.push_str(&format!(
        "Output: {} rows, {} keys\n",
        output.series.len(),
        output.series.keys().len()
    ));

    if !output.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &output.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out.push_str(&format_diagnostics(&output.diagnostics));
    out
}

/// Counts per drop reason with a few samples each.
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    if diagnostics.is_empty() {
        out.push_str("\nDiagnostics: nothing excluded\n");
        return out;
    }

    out.push_str(&format!("\nDiagnostics ({} total):\n", diagnostics.total()));
    for reason in DropReason::ALL {
        let count = diagnostics.count(reason);
        if count == 0 {
            continue;
        }
        out.push_str(&format!("- {:<18} {count}\n", reason.display_name()));
        for issue in diagnostics.samples(reason).iter().take(SAMPLES_SHOWN) {
            let row = issue.row.map(|r| format!("row {r}: ")).unwrap_or_default();
            let column = issue
                .column
                .as_deref()
                .map(|c| format!("[{c}] "))
                .unwrap_or_default();
            out.push_str(&format!("    {row}{column}{}\n", issue.detail));
        }
    }
    out
}

fn fmt_frequency(label: &FrequencyLabel) -> String {
    let mut s = format!(
        "{} (confidence {:.2}, {} dates)",
        label.frequency.display_name(),
        label.confidence,
        label.n_points
    );
    if let Some(median) = label.median_delta_days {
        s.push_str(&format!(", median step {median:.1}d"));
    }
    if let Some(notes) = &label.notes {
        s.push_str(&format!("; {notes}"));
    }
    s
}

fn fmt_mapping(mapping: &MappingSpec) -> String {
    let keys = mapping.key_columns.join(" + ");
    match &mapping.date_source {
        DateSource::Column(date) => {
            let value = match &mapping.value_source {
                ValueSource::Column(v) => v.as_str(),
                ValueSource::Headers(_) => "?",
            };
            format!("key={keys} date={date} value={value}")
        }
        DateSource::Headers(headers) => {
            format!("key={keys} headers={} ({} columns)", fmt_headers(headers), headers.len())
        }
    }
}

fn fmt_headers(headers: &[String]) -> String {
    match headers {
        [] => String::new(),
        [only] => only.clone(),
        [first, .., last] => format!("{first}..{last}"),
    }
}
