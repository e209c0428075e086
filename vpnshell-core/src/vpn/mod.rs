//! VPN supervision module
//!
//! Handles OpenVPN process supervision, output parsing, status polling and
//! connection state management.

pub mod bridge;
pub mod controller;
pub mod credentials;
pub mod log_event;
pub mod log_parser;
pub mod state;
pub mod status_poller;
pub mod supervisor;

// Public re-exports
pub use bridge::{BridgeEvent, EventBridge};
pub use controller::{SessionController, VpnHandle};
pub use log_event::LogEvent;
pub use log_parser::LogParser;
pub use state::{ConnectionState, ConnectionStateMachine, Effect, Notice, StatusSnapshot, Transition};
pub use status_poller::{PollSample, StatusPoller};
pub use supervisor::{OutputStream, ProcessSupervisor, SupervisedProcess, SupervisorEvent};
