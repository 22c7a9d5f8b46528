//! Shared serde helpers for configuration

/// Durations stored as whole seconds
///
/// Serializes `std::time::Duration` as a plain integer of seconds. When
/// reading, either an integer (`30`) or a string with a unit suffix
/// (`"30s"`, `"5m"`, `"1h"`) is accepted, so hand-edited files stay readable.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Settings {
///     #[serde(with = "rctl_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds or a suffixed string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(D::Error::custom),
        }
    }

    /// Parse `"90"`, `"90s"`, `"5m"` or `"2h"`
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
            Some(idx) => text.split_at(idx),
            None => (text, "s"),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration: {:?}", text))?;
        let factor = match unit.trim() {
            "s" | "" => 1,
            "m" => 60,
            "h" => 3600,
            other => return Err(format!("unknown duration unit {:?}", other)),
        };
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: {:?}", text))
    }
}
