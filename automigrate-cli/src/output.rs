//! Styled terminal output utilities.

use automigrate_core::OutcomeStatus;
use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Print a SQL block
pub fn code(code: &str) {
    println!();
    for line in code.lines() {
        println!("  {}", line.bright_white());
    }
    println!();
}

/// Style an outcome status
pub fn style_status(status: OutcomeStatus) -> String {
    let text = status.to_string();
    match status {
        OutcomeStatus::Applied => text.green().to_string(),
        OutcomeStatus::NoChanges => text.dimmed().to_string(),
        OutcomeStatus::ScriptOnly => text.yellow().to_string(),
        OutcomeStatus::Failed => text.red().to_string(),
    }
}
