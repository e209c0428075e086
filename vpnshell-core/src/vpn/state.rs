//! VPN connection state management
//!
//! Defines the state machine for the connection lifecycle. The machine is
//! synchronous: every input returns a [`Transition`] listing the side
//! effects the session controller has to carry out, so the rules can be
//! exercised without a process or a timer.

use crate::error::StartError;
use crate::types::{SessionId, TrafficCounters, TrafficStats};
use crate::vpn::LogEvent;
use chrono::Local;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// VPN connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,

    /// Process spawned, waiting for the tunnel to come up
    Connecting,

    /// Tunnel is up
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// User-facing notifications raised by transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    AlreadyRunning,
    ConfigMissing { path: String },
    StartFailed { reason: String },
    AuthFailed,
    Connected,
    Disconnected,
    Error { message: String },
    ProcessExited { code: i32 },
}

impl Notice {
    /// Text shown to the user
    pub fn message(&self) -> String {
        match self {
            Notice::AlreadyRunning => "VPN is already running. Please disconnect first.".to_string(),
            Notice::ConfigMissing { .. } => {
                "VPN configuration file not found. Please import a profile first.".to_string()
            }
            Notice::StartFailed { reason } => format!("Failed to start VPN: {}", reason),
            Notice::AuthFailed => "Login failed: Invalid username or password".to_string(),
            Notice::Connected => "VPN connected successfully!".to_string(),
            Notice::Disconnected => "VPN disconnected".to_string(),
            Notice::Error { message } => format!("An error occurred: {}", message),
            Notice::ProcessExited { code } => format!("VPN process exited with code {}", code),
        }
    }

    /// True for notices reporting a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::AlreadyRunning
                | Notice::ConfigMissing { .. }
                | Notice::StartFailed { .. }
                | Notice::AuthFailed
                | Notice::Error { .. }
        )
    }
}

impl From<&StartError> for Notice {
    fn from(error: &StartError) -> Self {
        match error {
            StartError::AlreadyRunning => Notice::AlreadyRunning,
            StartError::ConfigMissing { path } => Notice::ConfigMissing { path: path.clone() },
            other => Notice::StartFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Side effects requested by a transition, executed in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SpawnProcess(SessionId),
    StopProcess,
    StartPoller(SessionId),
    StopPoller,
    PublishTraffic(TrafficStats),
    Notify(Notice),
}

/// Outcome of feeding one input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ConnectionState) -> Self {
        Self {
            from: state,
            to: state,
            effects: Vec::new(),
        }
    }

    /// True when the connection state changed
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Point-in-time view of the connection published to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub traffic: TrafficStats,
    /// Reason of the last failed attempt, cleared by the next connect
    pub last_error: Option<String>,
}

/// Authoritative connection state
///
/// Owns the traffic counters; they are only written through
/// [`ConnectionStateMachine::handle_event`] while connected and are zeroed on
/// every session boundary.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    counters: TrafficCounters,
    /// Session whose events are still accepted
    active_session: Option<SessionId>,
    last_session: SessionId,
    last_error: Option<String>,
}

impl ConnectionStateMachine {
    /// Create a state machine in the Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the current traffic counters
    pub fn counters(&self) -> &TrafficCounters {
        &self.counters
    }

    /// Reason of the last failed attempt, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Session whose output is currently applied
    pub fn active_session(&self) -> Option<SessionId> {
        self.active_session
    }

    /// True when input tagged with `session` may still change state
    pub fn is_live(&self, session: SessionId) -> bool {
        self.active_session == Some(session)
    }

    /// Snapshot for presentation layers
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            traffic: self.counters.to_stats(),
            last_error: self.last_error.clone(),
        }
    }

    /// Fail with `AlreadyRunning` unless a new session may start
    pub fn check_connect(&self, process_alive: bool) -> Result<(), StartError> {
        if self.state != ConnectionState::Disconnected || process_alive {
            debug!(state = %self.state, process_alive, "Rejecting connect request");
            return Err(StartError::AlreadyRunning);
        }
        Ok(())
    }

    /// Handle a connect request
    ///
    /// Rejected with `AlreadyRunning` unless the machine is Disconnected and
    /// no supervised process is still alive.
    pub fn request_connect(&mut self, process_alive: bool) -> Result<Transition, StartError> {
        self.check_connect(process_alive)?;

        let session = self.last_session.next();
        self.last_session = session;
        self.active_session = Some(session);
        self.last_error = None;
        self.counters = TrafficCounters::zero();

        info!(%session, "Connect requested");
        Ok(self.transition_to(
            ConnectionState::Connecting,
            vec![Effect::SpawnProcess(session)],
        ))
    }

    /// Record a connect request refused before any session started
    ///
    /// The state is left alone. The reason is kept as the last error unless
    /// the refusal is about a session that is still running.
    pub fn reject_connect(&mut self, error: &StartError) -> Transition {
        if *error != StartError::AlreadyRunning {
            self.last_error = Some(error.to_string());
        }
        let mut transition = Transition::stay(self.state);
        transition.effects.push(Effect::Notify(Notice::from(error)));
        transition
    }

    /// Record that the process for `session` could not be started
    pub fn start_failed(&mut self, session: SessionId, error: &StartError) -> Transition {
        if !self.is_live(session) {
            return Transition::stay(self.state);
        }

        self.active_session = None;
        self.last_error = Some(error.to_string());
        self.counters = TrafficCounters::zero();
        self.transition_to(
            ConnectionState::Disconnected,
            vec![Effect::Notify(Notice::from(error))],
        )
    }

    /// Handle a disconnect request
    ///
    /// Always asks for the process to be stopped, so a process left running
    /// after an error can still be taken down. Idempotent.
    pub fn request_disconnect(&mut self) -> Transition {
        let was = self.state;
        self.active_session = None;
        self.counters = TrafficCounters::zero();

        let mut effects = vec![Effect::StopProcess, Effect::StopPoller];
        if was != ConnectionState::Disconnected {
            info!(from = %was, "Disconnect requested");
            effects.push(Effect::Notify(Notice::Disconnected));
        }

        self.transition_to(ConnectionState::Disconnected, effects)
    }

    /// Apply one parsed event produced by `session`
    pub fn handle_event(&mut self, session: SessionId, event: LogEvent) -> Transition {
        if !self.is_live(session) {
            debug!(%session, ?event, "Discarding event from stale session");
            return Transition::stay(self.state);
        }

        match (self.state, event) {
            (ConnectionState::Connecting, LogEvent::InitCompleted) => {
                self.counters = TrafficCounters::zero();
                info!(%session, "Initialization sequence completed");
                self.transition_to(
                    ConnectionState::Connected,
                    vec![
                        Effect::StartPoller(session),
                        Effect::Notify(Notice::Connected),
                    ],
                )
            }
            (ConnectionState::Connected, LogEvent::ByteCount { received, sent }) => {
                self.update_counters(received, sent)
            }
            (_, LogEvent::AuthFailed) => {
                self.last_error = Some(Notice::AuthFailed.message());
                self.end_session(Notice::AuthFailed)
            }
            (_, LogEvent::Terminated) => self.end_session(Notice::Disconnected),
            (_, LogEvent::ErrorDetected(message)) => {
                self.last_error = Some(message.clone());
                self.end_session(Notice::Error { message })
            }
            _ => Transition::stay(self.state),
        }
    }

    /// Handle the exit of the process started for `session`
    ///
    /// Exit of the active session counts as `Terminated`. The exit code is
    /// always reported, even when the session was already over.
    pub fn process_exited(&mut self, session: SessionId, code: i32) -> Transition {
        let exit_notice = Effect::Notify(Notice::ProcessExited { code });

        if !self.is_live(session) {
            let mut transition = Transition::stay(self.state);
            transition.effects.push(exit_notice);
            return transition;
        }

        let mut transition = self.end_session(Notice::Disconnected);
        transition.effects.insert(0, exit_notice);
        transition
    }

    fn update_counters(&mut self, received: Option<u64>, sent: Option<u64>) -> Transition {
        if let Some(received) = received {
            self.counters.bytes_received = received;
        }
        if let Some(sent) = sent {
            self.counters.bytes_sent = sent;
        }
        self.counters.sampled_at = Local::now();

        let mut transition = Transition::stay(self.state);
        transition
            .effects
            .push(Effect::PublishTraffic(self.counters.to_stats()));
        transition
    }

    fn end_session(&mut self, notice: Notice) -> Transition {
        self.active_session = None;
        self.counters = TrafficCounters::zero();
        self.transition_to(
            ConnectionState::Disconnected,
            vec![Effect::StopPoller, Effect::StopProcess, Effect::Notify(notice)],
        )
    }

    fn transition_to(&mut self, next: ConnectionState, effects: Vec<Effect>) -> Transition {
        let from = self.state;
        self.state = next;
        if from != next {
            debug!(%from, to = %next, "Connection state changed");
        }
        Transition {
            from,
            to: next,
            effects,
        }
    }
}
