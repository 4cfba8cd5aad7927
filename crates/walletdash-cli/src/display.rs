//! Terminal output helpers

use colored::*;
use walletdash_queue::StepStatus;

const RULE_WIDTH: usize = 64;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "─".repeat(RULE_WIDTH).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "─".repeat(RULE_WIDTH).bright_black());
}

pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

pub fn failure(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

pub fn note(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow());
}

/// Print an aligned label and value
pub fn field(label: &str, value: &str) {
    println!("  {:<20} {}", format!("{label}:").bright_white(), value.bright_cyan());
}

/// One line per queue progress report, on stderr so --json output stays parseable
pub fn step_report(step: &str, status: StepStatus, message: &str) {
    let marker = match status {
        StepStatus::Pending => "○".bright_black(),
        StepStatus::Loading => "◌".bright_blue(),
        StepStatus::Completed => "●".bright_green(),
        StepStatus::Error => "●".bright_red(),
    };
    eprintln!("  {} {:<22} {}", marker, step.bright_white(), message.bright_black());
}

/// `[#####.....]  50%`
pub fn progress_bar(percent: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = (percent / 10.0).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled).bright_green(),
        ".".repeat(10 - filled).bright_black(),
        percent
    )
}

/// Green with a leading `+` for gains, red for losses
pub fn signed(value: f64, text: &str) -> ColoredString {
    if value >= 0.0 {
        format!("+{text}").bright_green()
    } else {
        text.bright_red()
    }
}
