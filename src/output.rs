//! Output formatting and styling module.
//!
//! All console output goes through [`OutputFormatter`]: per-file move lines,
//! warnings and errors, the progress bar, and the end-of-run summary.

use crate::category::Category;
use crate::dispatcher::RunReport;
use crate::relocator::Operation;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::{self, Write};

// Console writes never panic. A closed pipe (`picsort ... | head`) only loses
// output, the run itself carries on.
macro_rules! out {
    ($($arg:tt)*) => {
        write_line(&mut io::stdout().lock(), format_args!($($arg)*))
    };
}

macro_rules! err {
    ($($arg:tt)*) => {
        write_line(&mut io::stderr().lock(), format_args!($($arg)*))
    };
}

fn write_line(writer: &mut impl Write, args: fmt::Arguments<'_>) {
    let _ = writer.write_fmt(args).and_then(|()| writer.write_all(b"\n"));
}

/// Manages all CLI output with consistent styling and formatting.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗, on stderr)
/// - Warning messages (yellow with ⚠, on stderr)
/// - Info messages (cyan)
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use picsort::output::OutputFormatter;
    /// OutputFormatter::success("Sorting complete");
    /// ```
    pub fn success(message: &str) {
        out!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        err!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        err!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        out!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        out!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        out!("\n{}", header.bold());
    }

    /// Prints the line for one relocated file.
    pub fn moved(operation: &Operation, simulated: bool) {
        let verb = if simulated { "Would move" } else { "Moved" };
        out!(
            "{} [{}]: {} -> {}",
            verb,
            Self::colored_label(operation.category),
            operation.original_path.display(),
            operation.new_path.display()
        );
    }

    fn colored_label(category: Category) -> ColoredString {
        match category {
            Category::Valid => category.label().green(),
            Category::Duplicate => category.label().blue(),
            _ => category.label().yellow(),
        }
    }

    /// Creates a progress bar for `total` files, or a hidden one when
    /// `visible` is false.
    pub fn create_progress_bar(total: u64, visible: bool) -> ProgressBar {
        if !visible {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints the end-of-run table: one row per category that occurred,
    /// then failures and the interruption notice.
    pub fn summary_table(report: &RunReport) {
        Self::header("SUMMARY");

        let width = Category::ALL
            .iter()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(0)
            .max(8);

        out!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        out!("{}", "-".repeat(width + 10));

        for (category, count) in &report.classified {
            out!(
                "{:<width$} | {} {}",
                category.to_string(),
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        out!("{}", "-".repeat(width + 10));
        out!(
            "{:<width$} | {} {}",
            "Total".bold(),
            report.total.to_string().green().bold(),
            plural(report.total),
            width = width
        );

        if !report.failures.is_empty() {
            Self::header(&format!("FAILED ({})", report.failures.len()));
            for (file, failure) in &report.failures {
                err!("  - {}: {}", file.path.display(), failure);
            }
        }

        if report.interrupted {
            Self::warning(&format!(
                "Run interrupted: {} {} not processed",
                report.skipped,
                plural(report.skipped)
            ));
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        out!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
