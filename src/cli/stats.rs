//! Stats command
//!
//! One-shot read of an OpenVPN status file through the same parser the
//! status poller uses.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use vpnshell_core::error::{PollError, VpnShellError};
use vpnshell_core::types::format_bytes;
use vpnshell_core::vpn::{LogEvent, LogParser};

/// Counters found in a status file; a side the file does not carry is `null`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusFileCounters {
    bytes_received: Option<u64>,
    bytes_sent: Option<u64>,
    timestamp: String,
}

/// Run the stats command
pub fn run_stats(path: &Path, json: bool) -> Result<(), VpnShellError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PollError::NotFound {
            path: path.to_string_lossy().to_string(),
        },
        _ => PollError::ReadFailed {
            path: path.to_string_lossy().to_string(),
            source: e,
        },
    })?;

    let parser = LogParser::new();
    let Some(LogEvent::ByteCount { received, sent }) = parser.parse_status(&text) else {
        println!("No traffic counters found in {}", path.display());
        return Ok(());
    };

    let sampled_at: DateTime<Local> = std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Local::now());

    let stats = StatusFileCounters {
        bytes_received: received,
        bytes_sent: sent,
        timestamp: sampled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    if json {
        let line = serde_json::to_string(&stats).map_err(|e| {
            VpnShellError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        println!("{}", line);
        return Ok(());
    }

    println!("Sampled:  {}", stats.timestamp);
    println!("Download: {}", describe(received));
    println!("Upload:   {}", describe(sent));
    Ok(())
}

fn describe(value: Option<u64>) -> String {
    match value {
        Some(bytes) => format!("{} ({} bytes)", format_bytes(bytes), bytes),
        None => "not reported".to_string(),
    }
}
