use colored::Colorize;
use extexec::{Diagnostics, Severity};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print diagnostics, errors to stderr
///
/// Warnings with an empty detail are only worth printing with `details`.
pub fn diagnostics(diags: &Diagnostics, details: bool) {
    for diag in diags {
        match diag.severity {
            Severity::Error => {
                eprintln!("  {} {}", "✗".red(), diag.summary);
                for line in diag.detail.lines() {
                    eprintln!("    {}", line.dimmed());
                }
            }
            Severity::Warning => {
                println!("  {} {}", "⚠".yellow(), diag.summary);
                if details {
                    for line in diag.detail.lines() {
                        println!("    {}", line.dimmed());
                    }
                }
            }
        }
    }
}

/// Mask a sensitive value for display
pub fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "(sensitive)".to_string()
    }
}

/// Shorten a value for single-line display
pub fn truncate(value: &str, max_chars: usize) -> String {
    let first_line = value.lines().next().unwrap_or("");
    let count = first_line.chars().count();
    if count <= max_chars && first_line.len() == value.len() {
        return value.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = first_line.chars().take(max_chars - 3).collect();
    format!("{kept}...")
}

// ============================================================================
// Tests
// ============================================================================
