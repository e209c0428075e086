//! Terminal rendering of bridge events

use colored::Colorize;
use tracing::warn;
use vpnshell_core::types::format_bytes;
use vpnshell_core::vpn::{BridgeEvent, ConnectionState, Notice};

/// Periodic statistics dumps are noise in the terminal log
const STATISTICS_MARKER: &str = "STATUS: OpenVPN STATISTICS";

/// Print one event, either human readable or as a JSON line
pub fn render_event(event: &BridgeEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    match event {
        BridgeEvent::Log(text) => {
            if !text.contains(STATISTICS_MARKER) {
                print!("{}", text.dimmed());
            }
        }
        BridgeEvent::StateChanged(state) => {
            let label = match state {
                ConnectionState::Connected => "● Connected".green().bold(),
                ConnectionState::Connecting => "● Connecting".yellow().bold(),
                ConnectionState::Disconnected => "● Disconnected".red().bold(),
            };
            println!("{}", label);
        }
        BridgeEvent::TrafficStats(stats) => {
            println!(
                "{} Download: {}  Upload: {}",
                format!("[{}]", stats.timestamp).dimmed(),
                format_bytes(stats.bytes_received).cyan(),
                format_bytes(stats.bytes_sent).cyan()
            );
        }
        BridgeEvent::Notice(notice) => render_notice(notice),
    }
}

fn render_notice(notice: &Notice) {
    let message = notice.message();
    if notice.is_error() {
        eprintln!("{} {}", "❌".red(), message.red());
    } else {
        println!("{} {}", "✓".green(), message);
    }
}
