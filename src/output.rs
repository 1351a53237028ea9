//! Colored terminal output
//!
//! ERROR HANDLING STRATEGY FOR DECORATIVE I/O:
//! All termcolor operations use `let _ =` to deliberately ignore errors.
//! Colored output is decorative and non-essential. If stderr/stdout is unavailable
//! (broken pipe, no TTY, etc.), the program continues gracefully without colors.

use crate::config::ProvisionConfig;
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Print a warning in yellow on stderr
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        use termcolor::WriteColor as _;
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Yellow)));
        let _ = write!(&mut buffer, "⚠️  ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print an error in red on stderr
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        use termcolor::WriteColor as _;
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Red)));
        let _ = write!(&mut buffer, "❌ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a success message with a green check mark on stdout
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        use termcolor::WriteColor as _;
        let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Green)));
        let _ = write!(&mut buffer, "✓ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a highlighted (yellow) progress line on stdout
#[macro_export]
macro_rules! notice {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        use termcolor::WriteColor as _;
        let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Yellow)));
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = buffer.reset();
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a plain progress line on stdout
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print the effective options before a run.
///
/// Credentials are never part of `ProvisionConfig`, so nothing here is secret.
pub fn print_summary(config: &ProvisionConfig) {
    let rows = summary_rows(config);
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let title = format!("Summary for kodegen_provision {}", env!("CARGO_PKG_VERSION"));
    let rule = "-".repeat(title.len().max(width + 24));

    let _ = writeln!(&mut buffer, "{rule}");
    let _ = buffer.set_color(ColorSpec::new().set_bold(true));
    let _ = writeln!(&mut buffer, "{title}");
    let _ = buffer.reset();
    let _ = writeln!(&mut buffer, "{rule}");
    for (key, value) in rows {
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
        let _ = write!(&mut buffer, "{key:<width$}");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " | {value}");
    }
    let _ = writeln!(&mut buffer, "{rule}");
    let _ = bufwtr.print(&buffer);
}

fn summary_rows(config: &ProvisionConfig) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("username", config.username.clone()),
        ("app_identifier", config.app_identifier.clone()),
        ("adhoc", config.adhoc.to_string()),
        ("development", config.development.to_string()),
        ("force", config.force.to_string()),
        ("skip_fetch_profiles", config.skip_fetch_profiles.to_string()),
        (
            "skip_certificate_verification",
            config.skip_certificate_verification.to_string(),
        ),
        (
            "ignore_profiles_with_different_name",
            config.ignore_profiles_with_different_name.to_string(),
        ),
    ];

    let optional = [
        ("provisioning_name", &config.provisioning_name),
        ("cert_id", &config.cert_id),
        ("cert_owner_name", &config.cert_owner_name),
        ("filename", &config.filename),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            rows.push((key, value.clone()));
        }
    }

    rows
}
