// Coloured console output: `+++` info, `---` warning, `!!!` error

use capsync_recon::report::{Message, Reporter, Severity};
use capsync_recon::SessionSummary;
use colored::{ColoredString, Colorize};

const RULE: &str =
    "********************************************************************************************";

fn prefix(severity: Severity) -> ColoredString {
    match severity {
        Severity::Info => "+++".green(),
        Severity::Warning => "---".yellow(),
        Severity::Error => "!!!".red(),
    }
}

fn paint(severity: Severity, line: &str) -> ColoredString {
    match severity {
        Severity::Info => line.green(),
        Severity::Warning => line.yellow(),
        Severity::Error => line.red(),
    }
}

/// Writes engine messages to the terminal.
///
/// With `quiet_stdout` everything goes to stderr so stdout stays machine-readable.
pub struct ConsoleReporter {
    quiet_stdout: bool,
}

impl ConsoleReporter {
    pub fn new(quiet_stdout: bool) -> Self {
        Self { quiet_stdout }
    }

    pub fn say(&mut self, severity: Severity, text: impl Into<String>) {
        self.report(Message { severity, pass: None, text: text.into() });
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, message: Message) {
        log::debug!(
            "{} [{}] {}",
            message.severity,
            message.pass.as_deref().unwrap_or("session"),
            message.text
        );
        let to_stderr = self.quiet_stdout || message.severity == Severity::Error;
        for line in message.text.lines() {
            let out = format!("{} {}", prefix(message.severity), paint(message.severity, line));
            if to_stderr {
                eprintln!("{out}");
            } else {
                println!("{out}");
            }
        }
    }
}

pub fn print_summary(summary: &SessionSummary) {
    let stats = &summary.stats;
    print_block(
        &[
            ("Cell Updates", stats.cells_updated.to_string()),
            ("Cell Additions", stats.rows_appended.to_string()),
            ("Errors", stats.errors.to_string()),
            ("Warnings", stats.warnings.to_string()),
            ("Execution Time", format!("{} ms", summary.elapsed_ms)),
        ],
        (!summary.saved).then_some("Check mode: destination not saved"),
    );
}

/// Completion block for `generate`.
pub fn print_generate_summary(rows: usize, files_written: usize, elapsed_ms: u128) {
    print_block(
        &[
            ("Rows per sheet", rows.to_string()),
            ("Files written", files_written.to_string()),
            ("Execution Time", format!("{elapsed_ms} ms")),
        ],
        None,
    );
}

fn print_block(rows: &[(&str, String)], warning: Option<&str>) {
    println!();
    println!("{} {}", prefix(Severity::Info), "**[OPERATION COMPLETE]**".green().bold());
    for (label, value) in rows {
        println!("{} {}", prefix(Severity::Info), format!("{label:>15}: {value}").green());
    }
    if let Some(warning) = warning {
        println!("{} {}", prefix(Severity::Warning), warning.yellow());
    }
    println!("{} {}", prefix(Severity::Info), RULE.green());
}
