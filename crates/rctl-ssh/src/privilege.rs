//! sudo handling for commands issued on the user's behalf
//!
//! When a password is configured, `sudo <cmd>` is rewritten to
//! `sudo -S <cmd>` and the password is fed on stdin, so commands needing
//! privileges work without a tty. The executor itself never does this.

use secrecy::{ExposeSecret, SecretString};

use crate::executor::Invocation;

const SUDO_PREFIX: &str = "sudo ";
const SUDO_STDIN_PREFIX: &str = "sudo -S ";

/// Messages sudo prints when the password was wrong
const REJECTION_MARKERS: [&str; 2] = ["incorrect password", "Sorry, try again"];

/// Build the invocation for `command`
///
/// Returns the invocation and whether it was elevated with the password.
pub fn prepare(command: &str, password: &SecretString) -> (Invocation, bool) {
    let password = password.expose_secret();
    match command.strip_prefix(SUDO_PREFIX) {
        Some(rest) if !password.is_empty() => {
            let rest = rest.strip_prefix("-S ").unwrap_or(rest);
            let invocation = Invocation::new(format!("{}{}", SUDO_STDIN_PREFIX, rest))
                .with_stdin(format!("{}\n", password));
            (invocation, true)
        }
        _ => (Invocation::new(command), false),
    }
}

/// Whether sudo refused the password
pub fn password_rejected(output: &str) -> bool {
    REJECTION_MARKERS.iter().any(|m| output.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_sudo_with_password_reads_stdin() {
        let (invocation, elevated) = prepare("sudo systemctl poweroff", &secret("pw"));
        assert!(elevated);
        assert_eq!(invocation.command, "sudo -S systemctl poweroff");
        assert_eq!(invocation.stdin.as_deref(), Some(&b"pw\n"[..]));
    }

    #[test]
    fn test_existing_stdin_flag_is_not_doubled() {
        let (invocation, _) = prepare("sudo -S reboot", &secret("pw"));
        assert_eq!(invocation.command, "sudo -S reboot");
    }

    #[test]
    fn test_plain_command_untouched() {
        let (invocation, elevated) = prepare("systemctl suspend", &secret("pw"));
        assert!(!elevated);
        assert_eq!(invocation, Invocation::new("systemctl suspend"));
    }

    #[test]
    fn test_sudo_without_password_untouched() {
        let (invocation, elevated) = prepare("sudo reboot", &secret(""));
        assert!(!elevated);
        assert_eq!(invocation.command, "sudo reboot");
        assert!(invocation.stdin.is_none());
    }

    #[test]
    fn test_password_rejected() {
        assert!(password_rejected("[sudo] password for pi: Sorry, try again.\n"));
        assert!(password_rejected("sudo: 1 incorrect password attempt"));
        assert!(!password_rejected("Connection successful"));
    }
}
