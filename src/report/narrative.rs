//! Human-readable rendering of reports and deltas

use std::fmt::Write as _;

use console::Style;

use super::{EntryClass, Report, ReportEntry};
use crate::diff::{Delta, DeltaEntry};

fn class_style(class: EntryClass) -> Style {
    match class {
        EntryClass::Clean => Style::new().green(),
        EntryClass::Shifted => Style::new().cyan(),
        EntryClass::Conflicting => Style::new().red().bold(),
        EntryClass::OrphanedSafe => Style::new().yellow(),
        EntryClass::UpstreamOnly => Style::new().dim(),
    }
}

fn class_label(class: EntryClass) -> &'static str {
    match class {
        EntryClass::Clean => "clean",
        EntryClass::Shifted => "shifted",
        EntryClass::Conflicting => "conflicting",
        EntryClass::OrphanedSafe => "orphaned",
        EntryClass::UpstreamOnly => "upstream",
    }
}

/// Narrative form of a report
pub fn report(report: &Report) -> String {
    let bold = Style::new().bold();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} -> {}",
        bold.apply_to("Reconciled"),
        report.from_tag,
        report.to_tag
    );

    let extensions: Vec<&ReportEntry> = report
        .entries
        .iter()
        .filter(|e| e.classification != EntryClass::UpstreamOnly)
        .collect();
    if extensions.is_empty() {
        let _ = writeln!(out, "  {}", Style::new().dim().apply_to("No live extensions"));
    }
    for entry in extensions {
        write_extension(&mut out, entry);
    }

    let upstream: Vec<&ReportEntry> = report
        .entries
        .iter()
        .filter(|e| e.classification == EntryClass::UpstreamOnly)
        .collect();
    if !upstream.is_empty() {
        let _ = writeln!(out, "\n{}", bold.apply_to("Upstream changes:"));
        for entry in upstream {
            if let Some(delta) = &entry.delta_entry {
                let _ = writeln!(out, "  {}", delta_line(&delta.entry));
            }
        }
    }

    let s = &report.summary;
    let _ = writeln!(
        out,
        "\n{} clean, {} shifted, {} orphaned, {} conflicting",
        s.clean, s.shifted, s.orphaned_safe, s.conflicting
    );
    if !report.is_total() {
        let _ = writeln!(
            out,
            "{}",
            Style::new()
                .yellow()
                .apply_to("Conflicting extensions stay pending until resolved")
        );
    }
    out
}

fn write_extension(out: &mut String, entry: &ReportEntry) {
    let name = entry.extension.as_deref().unwrap_or_default();
    let label = format!("{:<11}", class_label(entry.classification));
    let _ = write!(
        out,
        "  {} {}",
        class_style(entry.classification).apply_to(label),
        Style::new().bold().apply_to(name)
    );

    match (&entry.previous_mount, &entry.mount) {
        (Some(previous), Some(mount)) if previous != mount => {
            let _ = write!(out, " {previous} -> {mount}");
        }
        (_, Some(mount)) => {
            let _ = write!(out, " {mount}");
        }
        _ => {}
    }
    out.push('\n');

    if let Some(conflict) = entry.conflict {
        let _ = writeln!(out, "      {} {conflict}", Style::new().dim().apply_to("conflict:"));
    }
    if let Some(reason) = &entry.reason {
        let _ = writeln!(out, "      {} {reason}", Style::new().dim().apply_to("reason:"));
    }
    if let Some(resolution) = &entry.resolution {
        let _ = writeln!(
            out,
            "      {} {resolution}",
            Style::new().dim().apply_to("resolution:")
        );
    }
}

fn delta_line(entry: &DeltaEntry) -> String {
    let marker = match entry {
        DeltaEntry::Added { .. } => Style::new().green().apply_to("+"),
        DeltaEntry::Removed { .. } => Style::new().red().apply_to("-"),
        DeltaEntry::Changed { .. } => Style::new().yellow().apply_to("~"),
        DeltaEntry::Moved { .. } => Style::new().cyan().apply_to(">"),
    };
    format!("{marker} {entry}")
}

/// Narrative form of a delta
pub fn delta(delta: &Delta) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} -> {}",
        Style::new().bold().apply_to("Changes"),
        delta.from_tag,
        delta.to_tag
    );
    if delta.is_empty() {
        let _ = writeln!(out, "  {}", Style::new().dim().apply_to("No changes"));
    }
    for entry in &delta.entries {
        let _ = writeln!(out, "  {}", delta_line(entry));
    }
    out
}
