//! Output formatting and display utilities

use colored::Colorize;

use portcullis::{Diagnostic, TranslationSummary};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", msg.bold().underline());
}

/// Print the translation summary in human-readable form
pub fn print_summary(profile: &str, summary: &TranslationSummary) {
    header(&format!("Translation: {}", profile));

    if summary.controls_untranslatable == 0 && summary.diagnostics.is_empty() {
        success(&format!(
            "All {} control(s) translated",
            summary.controls_total
        ));
    } else {
        println!(
            "  {} control(s) total, {} translated, {} untranslatable",
            summary.controls_total, summary.controls_translated, summary.controls_untranslatable
        );
    }

    if !summary.diagnostics.is_empty() {
        println!("\n{}", "Diagnostics:".bold());
        for diagnostic in &summary.diagnostics {
            match diagnostic {
                Diagnostic::UntranslatableResource { .. } => error(&diagnostic.to_string()),
                _ => warning(&diagnostic.to_string()),
            }
        }
    }
}
