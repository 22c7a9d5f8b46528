//! Output formatting utilities for the CLI
//!
//! Tables for the connection record and system info, plus coloured status
//! lines.

use tabled::{settings::Style, Table, Tabled};

use rctl_core::{ConnectionConfig, HealthStatus, RemoteSystemInfo};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "FIELD")]
    field: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn mask(set: bool) -> String {
    if set {
        "********".to_string()
    } else {
        "(not set)".to_string()
    }
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}

/// Format the stored connection record; the password is never shown
pub fn format_connection(config: &ConnectionConfig) -> String {
    let identity = config
        .identity_file
        .as_ref()
        .map(|p| p.display().to_string());

    let rows = vec![
        FieldRow {
            field: "Host",
            value: or_dash(Some(config.host.as_str())),
        },
        FieldRow {
            field: "Port",
            value: config.port.to_string(),
        },
        FieldRow {
            field: "Username",
            value: or_dash(Some(config.username.as_str())),
        },
        FieldRow {
            field: "Password",
            value: mask(config.has_password()),
        },
        FieldRow {
            field: "Identity file",
            value: or_dash(identity.as_deref()),
        },
        FieldRow {
            field: "Host key",
            value: or_dash(config.host_key_fingerprint.as_deref()),
        },
    ];

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a system info snapshot as a two-column table
pub fn format_system_info(info: &RemoteSystemInfo) -> String {
    let rows = vec![
        FieldRow {
            field: "Hostname",
            value: or_dash(info.hostname.as_deref()),
        },
        FieldRow {
            field: "OS",
            value: or_dash(info.os.as_deref()),
        },
        FieldRow {
            field: "Architecture",
            value: or_dash(info.arch.as_deref()),
        },
        FieldRow {
            field: "Uptime",
            value: or_dash(info.uptime.as_deref()),
        },
    ];

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a health transition in the matching colour
pub fn print_health(target: &str, status: HealthStatus) {
    match status {
        HealthStatus::Connected => print_success(&format!("{}: connected", target)),
        HealthStatus::Disconnected => print_warning(&format!("{}: disconnected", target)),
        HealthStatus::Checking | HealthStatus::Unknown => {
            tracing::debug!("{}: {}", target, status)
        }
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_table_hides_password() {
        let config = ConnectionConfig::new("10.0.0.5", 22, "pi", "raspberry");
        let table = format_connection(&config);
        assert!(table.contains("10.0.0.5"));
        assert!(table.contains("********"));
        assert!(!table.contains("raspberry"));
    }

    #[test]
    fn test_system_info_table_marks_missing_fields() {
        let info = RemoteSystemInfo {
            hostname: Some("nas".into()),
            ..RemoteSystemInfo::default()
        };
        let table = format_system_info(&info);
        assert!(table.contains("nas"));
        assert!(table.contains("Uptime"));
        assert!(table.contains('-'));
    }
}
