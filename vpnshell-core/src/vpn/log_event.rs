//! Events extracted from VPN process output
//!
//! Defines the structured result of parsing one chunk of output. Events are
//! transient: produced by the parser and consumed immediately by the state
//! machine.

/// Events recognised in OpenVPN output or status text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Server rejected the credentials
    AuthFailed,

    /// Tunnel is up
    InitCompleted,

    /// Process reported it is going away
    Terminated,

    /// Error line; carries the whole chunk it was found in
    ErrorDetected(String),

    /// Cumulative traffic counters; a side is `None` when the chunk did not
    /// carry it
    ByteCount {
        received: Option<u64>,
        sent: Option<u64>,
    },
}

impl LogEvent {
    /// Byte count with both directions known
    pub fn byte_count(received: u64, sent: u64) -> Self {
        Self::ByteCount {
            received: Some(received),
            sent: Some(sent),
        }
    }

    /// True for events that end a session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::Terminated | Self::ErrorDetected(_)
        )
    }
}
