//! Console lines printed by the `unconflict` commands.

use std::fmt::Display;
use std::path::Path;

use console::Style;

use unconflict_core::ScanReport;

fn marked(style: Style, symbol: &str, msg: &str) -> String {
    format!("{} {}", style.apply_to(symbol), msg)
}

/// Progress line for a file whose markers are being removed.
pub fn cleaning(path: &Path, dry_run: bool) -> String {
    if dry_run {
        format!("Would clean {}", path.display())
    } else {
        format!("Cleaning {}...", path.display())
    }
}

/// Warning for a file that hit the pass bound before its blocks ran out.
pub fn partial(path: &Path) -> String {
    marked(
        Style::new().yellow(),
        "⚠",
        &format!(
            "{}: pass limit reached, leftover markers were deleted",
            path.display()
        ),
    )
}

/// Per-file failure line.
pub fn failed(path: &Path, error: &dyn Display) -> String {
    marked(
        Style::new().red(),
        "✗",
        &format!("Error in {}: {}", path.display(), error),
    )
}

/// Completion line for `resolve`. Yellow when any file failed.
pub fn done(report: &ScanReport) -> String {
    let msg = format!(
        "Done. {} file(s) {}, {} block(s) resolved, {} error(s).",
        report.resolved_count(),
        if report.dry_run { "would be cleaned" } else { "cleaned" },
        report.blocks_resolved(),
        report.failure_count()
    );
    if report.failure_count() > 0 {
        marked(Style::new().yellow(), "⚠", &msg)
    } else {
        marked(Style::new().green(), "✓", &msg)
    }
}

pub fn dry_run_note() -> String {
    Style::new()
        .dim()
        .apply_to("Dry run: no files were written.")
        .to_string()
}

/// `check` found nothing and every file could be read.
pub fn no_markers(files_checked: usize) -> String {
    marked(
        Style::new().green(),
        "✓",
        &format!("No conflict markers found ({files_checked} files checked)"),
    )
}

pub fn markers_header(files: usize) -> String {
    Style::new()
        .bold()
        .apply_to(format!("Files with conflict markers ({files})"))
        .to_string()
}

/// `check` could not read some files, so the tree is not known to be clean.
pub fn unchecked(failures: usize) -> String {
    marked(
        Style::new().yellow(),
        "⚠",
        &format!("{failures} file(s) could not be checked"),
    )
}
