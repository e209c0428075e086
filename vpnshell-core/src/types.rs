//! Type definitions shared between the supervisor and its front-ends
//!
//! Credentials are wrapped with the secrecy crate so the password never
//! shows up in logs or debug output.

use chrono::{DateTime, Local};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password pair handed to the VPN binary through the
/// credential artifact
#[derive(Clone, Debug)]
pub struct Credentials {
    username: String,
    password: Secret<String>,
}

impl Credentials {
    /// Create credentials from a username and a plain password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    /// Username used for authentication
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expose the password value (use with caution!)
    ///
    /// This should only be called when writing the credential artifact.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// Identifier of one supervised process lifetime
///
/// Every connect attempt gets a fresh id. Completions from tasks tied to an
/// older session are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(u64);

impl SessionId {
    /// Return the id following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cumulative traffic counters of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficCounters {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub sampled_at: DateTime<Local>,
}

impl TrafficCounters {
    /// Counters reset to zero, stamped now
    pub fn zero() -> Self {
        Self {
            bytes_received: 0,
            bytes_sent: 0,
            sampled_at: Local::now(),
        }
    }

    /// True when both directions are zero
    pub fn is_zero(&self) -> bool {
        self.bytes_received == 0 && self.bytes_sent == 0
    }

    /// Snapshot of the counters in the shape pushed to the UI
    pub fn to_stats(&self) -> TrafficStats {
        TrafficStats {
            bytes_received: self.bytes_received,
            bytes_sent: self.bytes_sent,
            timestamp: self.sampled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl Default for TrafficCounters {
    fn default() -> Self {
        Self::zero()
    }
}

/// Traffic statistics payload emitted whenever the counters are updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// Local time formatted as `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
}

/// Format a byte count for display (`0 B`, `1.5 KB`, `2 MB`, ...)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(11694), "11.42 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_bytes(1024u64.pow(5) * 3), "3072 TB");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{:?}", creds);

        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.expose_password(), "hunter2");
    }

    #[test]
    fn test_session_id_ordering() {
        let first = SessionId::default();
        let second = first.next();

        assert!(second > first);
        assert_ne!(first, second);
        assert_eq!(second.to_string(), "#1");
    }

    #[test]
    fn test_traffic_stats_serializes_camel_case() {
        let counters = TrafficCounters {
            bytes_received: 10,
            bytes_sent: 20,
            sampled_at: Local::now(),
        };
        let json = serde_json::to_value(counters.to_stats()).unwrap();

        assert_eq!(json["bytesReceived"], 10);
        assert_eq!(json["bytesSent"], 20);
        assert_eq!(json["timestamp"].as_str().unwrap().len(), 19);
    }
}
