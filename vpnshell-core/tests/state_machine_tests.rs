//! Tests for the connection state machine
//!
//! Drives ConnectionStateMachine through whole sessions and checks the
//! effects requested from the controller.

use vpnshell_core::error::StartError;
use vpnshell_core::types::SessionId;
use vpnshell_core::vpn::{ConnectionState, ConnectionStateMachine, Effect, LogEvent, Notice};

fn connected_machine() -> (ConnectionStateMachine, SessionId) {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();
    machine.handle_event(session, LogEvent::InitCompleted);
    assert_eq!(machine.state(), ConnectionState::Connected);
    (machine, session)
}

fn notices(effects: &[Effect]) -> Vec<Notice> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify(notice) => Some(notice.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_initial_state() {
    let machine = ConnectionStateMachine::new();

    assert_eq!(machine.state(), ConnectionState::Disconnected);
    assert!(machine.counters().is_zero());
    assert_eq!(machine.active_session(), None);
    assert_eq!(machine.last_error(), None);
}

#[test]
fn test_disconnect_twice_is_idempotent() {
    let (mut machine, _) = connected_machine();

    let first = machine.request_disconnect();
    assert_eq!(first.to, ConnectionState::Disconnected);
    assert_eq!(notices(&first.effects), vec![Notice::Disconnected]);

    let second = machine.request_disconnect();
    assert_eq!(second.to, ConnectionState::Disconnected);
    assert!(!second.changed());
    assert!(notices(&second.effects).is_empty());
    assert_eq!(machine.state(), ConnectionState::Disconnected);
}

#[test]
fn test_disconnect_when_never_connected() {
    let mut machine = ConnectionStateMachine::new();
    let transition = machine.request_disconnect();

    assert_eq!(transition.from, ConnectionState::Disconnected);
    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(transition.effects, vec![Effect::StopProcess, Effect::StopPoller]);
}

#[test]
fn test_connect_rejected_while_connecting() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session();

    assert_eq!(machine.request_connect(false), Err(StartError::AlreadyRunning));
    assert_eq!(machine.state(), ConnectionState::Connecting);
    assert_eq!(machine.active_session(), session);
}

#[test]
fn test_connect_rejected_while_connected() {
    let (mut machine, session) = connected_machine();

    assert_eq!(machine.request_connect(false), Err(StartError::AlreadyRunning));
    assert_eq!(machine.state(), ConnectionState::Connected);
    assert_eq!(machine.active_session(), Some(session));
}

#[test]
fn test_connect_rejected_while_process_alive() {
    let mut machine = ConnectionStateMachine::new();

    assert_eq!(machine.request_connect(true), Err(StartError::AlreadyRunning));
    assert_eq!(machine.state(), ConnectionState::Disconnected);
    assert_eq!(machine.active_session(), None);
}

#[test]
fn test_full_session_resets_counters() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();

    machine.handle_event(session, LogEvent::InitCompleted);
    let update = machine.handle_event(session, LogEvent::byte_count(100, 200));
    assert!(matches!(
        update.effects.as_slice(),
        [Effect::PublishTraffic(stats)] if stats.bytes_received == 100 && stats.bytes_sent == 200
    ));
    assert_eq!(machine.counters().bytes_received, 100);
    assert_eq!(machine.counters().bytes_sent, 200);

    let transition = machine.handle_event(session, LogEvent::Terminated);

    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(machine.state(), ConnectionState::Disconnected);
    assert_eq!(machine.counters().bytes_received, 0);
    assert_eq!(machine.counters().bytes_sent, 0);
    assert_eq!(machine.snapshot().traffic.bytes_received, 0);
}

#[test]
fn test_byte_count_ignored_while_connecting() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();

    let transition = machine.handle_event(session, LogEvent::byte_count(10, 20));

    assert!(transition.effects.is_empty());
    assert!(machine.counters().is_zero());
}

#[test]
fn test_partial_byte_count_keeps_other_side() {
    let (mut machine, session) = connected_machine();
    machine.handle_event(session, LogEvent::byte_count(100, 200));

    machine.handle_event(
        session,
        LogEvent::ByteCount {
            received: Some(150),
            sent: None,
        },
    );

    assert_eq!(machine.counters().bytes_received, 150);
    assert_eq!(machine.counters().bytes_sent, 200);
}

#[test]
fn test_init_completed_starts_poller() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();

    let transition = machine.handle_event(session, LogEvent::InitCompleted);

    assert_eq!(
        transition.effects,
        vec![
            Effect::StartPoller(session),
            Effect::Notify(Notice::Connected)
        ]
    );
}

#[test]
fn test_auth_failed_while_connecting() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();

    let transition = machine.handle_event(session, LogEvent::AuthFailed);

    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert!(transition.effects.contains(&Effect::StopProcess));
    assert_eq!(notices(&transition.effects), vec![Notice::AuthFailed]);
    assert_eq!(
        machine.last_error(),
        Some("Login failed: Invalid username or password")
    );
}

#[test]
fn test_error_detected_disconnects_and_records_reason() {
    let (mut machine, session) = connected_machine();
    machine.handle_event(session, LogEvent::byte_count(5, 5));

    let message = "ERROR: Linux route add command failed".to_string();
    let transition = machine.handle_event(session, LogEvent::ErrorDetected(message.clone()));

    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert!(transition.effects.contains(&Effect::StopPoller));
    assert_eq!(
        notices(&transition.effects),
        vec![Notice::Error {
            message: message.clone()
        }]
    );
    assert!(machine.counters().is_zero());
    assert_eq!(machine.snapshot().last_error, Some(message));
}

#[test]
fn test_terminal_events_end_any_live_session() {
    for event in [
        LogEvent::AuthFailed,
        LogEvent::Terminated,
        LogEvent::ErrorDetected("ERROR".to_string()),
    ] {
        assert!(event.is_terminal());

        let (mut machine, session) = connected_machine();
        machine.handle_event(session, event);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.active_session(), None);
    }

    assert!(!LogEvent::InitCompleted.is_terminal());
    assert!(!LogEvent::byte_count(1, 1).is_terminal());
}

#[test]
fn test_stale_session_events_are_discarded() {
    let (mut machine, old_session) = connected_machine();
    machine.request_disconnect();

    machine.request_connect(false).unwrap();
    let new_session = machine.active_session().unwrap();
    assert_ne!(old_session, new_session);

    let stale_bytes = machine.handle_event(old_session, LogEvent::byte_count(999, 999));
    let stale_init = machine.handle_event(old_session, LogEvent::InitCompleted);
    let stale_term = machine.handle_event(old_session, LogEvent::Terminated);

    for transition in [stale_bytes, stale_init, stale_term] {
        assert!(!transition.changed());
        assert!(transition.effects.is_empty());
    }
    assert_eq!(machine.state(), ConnectionState::Connecting);
    assert!(machine.counters().is_zero());
}

#[test]
fn test_byte_count_after_disconnect_is_discarded() {
    let (mut machine, session) = connected_machine();
    machine.request_disconnect();

    let transition = machine.handle_event(session, LogEvent::byte_count(100, 200));

    assert!(transition.effects.is_empty());
    assert!(machine.counters().is_zero());
}

#[test]
fn test_process_exit_of_live_session() {
    let (mut machine, session) = connected_machine();

    let transition = machine.process_exited(session, 1);

    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(
        notices(&transition.effects),
        vec![Notice::ProcessExited { code: 1 }, Notice::Disconnected]
    );
}

#[test]
fn test_process_exit_after_session_ended_is_still_reported() {
    let (mut machine, session) = connected_machine();
    machine.request_disconnect();

    let transition = machine.process_exited(session, 0);

    assert!(!transition.changed());
    assert_eq!(
        transition.effects,
        vec![Effect::Notify(Notice::ProcessExited { code: 0 })]
    );
}

#[test]
fn test_start_failure_returns_to_disconnected() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();
    let error = StartError::ConfigMissing {
        path: "/etc/openvpn/client.ovpn".to_string(),
    };

    let transition = machine.start_failed(session, &error);

    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(
        notices(&transition.effects),
        vec![Notice::ConfigMissing {
            path: "/etc/openvpn/client.ovpn".to_string()
        }]
    );
    assert_eq!(machine.active_session(), None);
    assert!(machine.last_error().is_some());
}

#[test]
fn test_connect_clears_last_error() {
    let mut machine = ConnectionStateMachine::new();
    machine.request_connect(false).unwrap();
    let session = machine.active_session().unwrap();
    machine.handle_event(session, LogEvent::AuthFailed);
    assert!(machine.last_error().is_some());

    machine.request_connect(false).unwrap();

    assert_eq!(machine.last_error(), None);
    assert_eq!(machine.state(), ConnectionState::Connecting);
}

#[test]
fn test_session_ids_increase() {
    let mut machine = ConnectionStateMachine::new();
    let mut previous = SessionId::default();

    for _ in 0..3 {
        machine.request_connect(false).unwrap();
        let session = machine.active_session().unwrap();
        assert!(session > previous);
        previous = session;
        machine.request_disconnect();
    }
}

#[test]
fn test_rejected_connect_never_leaves_disconnected() {
    let mut machine = ConnectionStateMachine::new();
    assert_eq!(machine.check_connect(false), Ok(()));

    let error = StartError::ConfigMissing {
        path: "/etc/openvpn/client.ovpn".to_string(),
    };
    let transition = machine.reject_connect(&error);

    assert!(!transition.changed());
    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(
        transition.effects,
        vec![Effect::Notify(Notice::ConfigMissing {
            path: "/etc/openvpn/client.ovpn".to_string()
        })]
    );
    assert_eq!(machine.active_session(), None);
    assert_eq!(machine.last_error(), Some(error.to_string().as_str()));
}

#[test]
fn test_already_running_rejection_keeps_live_session() {
    let (mut machine, session) = connected_machine();
    assert_eq!(machine.check_connect(false), Err(StartError::AlreadyRunning));

    let transition = machine.reject_connect(&StartError::AlreadyRunning);

    assert!(!transition.changed());
    assert_eq!(notices(&transition.effects), vec![Notice::AlreadyRunning]);
    assert_eq!(machine.state(), ConnectionState::Connected);
    assert_eq!(machine.active_session(), Some(session));
    assert_eq!(machine.last_error(), None);
}
