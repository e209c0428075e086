//! Pattern-based parser for OpenVPN output and status files
//!
//! Extracts LogEvents from stdout/stderr chunks and status artifact reads.
//! Parsing is substring based and stateless, so it tolerates arbitrary chunk
//! boundaries and the same text always yields the same events.

use crate::vpn::LogEvent;
use regex::Regex;

const AUTH_FAILED_MARKER: &str = "AUTH_FAILED";
const INIT_COMPLETED_MARKER: &str = "Initialization Sequence Completed";
const SIGTERM_MARKER: &str = "SIGTERM";
const PROCESS_EXITED_MARKER: &str = "process exited";
const ERROR_MARKER: &str = "ERROR";
const STATUS_MARKER: &str = "STATUS:";

/// Parser for OpenVPN log and status text
#[derive(Debug, Clone)]
pub struct LogParser {
    /// Pattern for "BYTECOUNT:<sent>,<received>"
    bytecount_pattern: Regex,
    /// Pattern for "TUN/TAP read bytes,<N>" (received)
    tun_read_pattern: Regex,
    /// Pattern for "TUN/TAP write bytes,<N>" (sent)
    tun_write_pattern: Regex,
}

impl LogParser {
    /// Create a new LogParser with compiled regex patterns
    pub fn new() -> Self {
        Self {
            bytecount_pattern: Regex::new(r"BYTECOUNT:(\d+),(\d+)")
                .expect("Failed to compile bytecount pattern"),
            tun_read_pattern: Regex::new(r"TUN/TAP read bytes,(\d+)")
                .expect("Failed to compile tun_read pattern"),
            tun_write_pattern: Regex::new(r"TUN/TAP write bytes,(\d+)")
                .expect("Failed to compile tun_write pattern"),
        }
    }

    /// Parse one chunk of output into zero or more events
    ///
    /// Lifecycle markers are checked in precedence order and at most one of
    /// `AuthFailed`, `InitCompleted` and `Terminated` is emitted. `ERROR` and
    /// byte counts are checked independently of them.
    pub fn parse(&self, chunk: &str) -> Vec<LogEvent> {
        let mut events = Vec::new();

        if chunk.trim().is_empty() {
            return events;
        }

        if chunk.contains(AUTH_FAILED_MARKER) {
            events.push(LogEvent::AuthFailed);
        } else if chunk.contains(INIT_COMPLETED_MARKER) {
            events.push(LogEvent::InitCompleted);
        } else if chunk.contains(SIGTERM_MARKER) || chunk.contains(PROCESS_EXITED_MARKER) {
            events.push(LogEvent::Terminated);
        }

        if chunk.contains(ERROR_MARKER) {
            events.push(LogEvent::ErrorDetected(chunk.to_string()));
        }

        if let Some(byte_count) = self.parse_byte_count(chunk) {
            events.push(byte_count);
        }

        events
    }

    /// Extract traffic counters from a chunk of process output
    ///
    /// `BYTECOUNT:` is only trusted inside a `STATUS:` block since it is sent
    /// first and received second. TUN/TAP lines are read from any text and
    /// override the combined form for the side they carry.
    pub fn parse_byte_count(&self, chunk: &str) -> Option<LogEvent> {
        self.byte_counts(chunk, chunk.contains(STATUS_MARKER))
    }

    /// Extract traffic counters from the content of the status file
    ///
    /// The whole file is status output, so a bare `BYTECOUNT:<sent>,<received>`
    /// line counts without a `STATUS:` marker. TUN/TAP lines still override it.
    pub fn parse_status(&self, contents: &str) -> Option<LogEvent> {
        self.byte_counts(contents, true)
    }

    fn byte_counts(&self, text: &str, accept_bytecount: bool) -> Option<LogEvent> {
        let mut received = None;
        let mut sent = None;

        if accept_bytecount {
            if let Some(captures) = self.bytecount_pattern.captures(text) {
                let sent_value = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
                let received_value = captures.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
                if let (Some(s), Some(r)) = (sent_value, received_value) {
                    sent = Some(s);
                    received = Some(r);
                }
            }
        }

        if let Some(value) = Self::capture_u64(&self.tun_read_pattern, text) {
            received = Some(value);
        }

        if let Some(value) = Self::capture_u64(&self.tun_write_pattern, text) {
            sent = Some(value);
        }

        if received.is_none() && sent.is_none() {
            return None;
        }

        Some(LogEvent::ByteCount { received, sent })
    }

    fn capture_u64(pattern: &Regex, text: &str) -> Option<u64> {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}
