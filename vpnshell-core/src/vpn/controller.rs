//! Session controller
//!
//! The single owner of the connection state, the supervised process and the
//! status poller. Commands from the UI, process output, exit notifications
//! and poll samples all arrive on channels drained by one task, so every
//! state change happens in one place and in arrival order.

use crate::config::VpnConfig;
use crate::types::{Credentials, SessionId};
use crate::vpn::bridge::{BridgeEvent, EventBridge, DEFAULT_EVENT_CAPACITY};
use crate::vpn::state::{ConnectionStateMachine, Effect, Notice, StatusSnapshot, Transition};
use crate::vpn::status_poller::{PollSample, StatusPoller};
use crate::vpn::supervisor::{ProcessSupervisor, SupervisorEvent};
use crate::vpn::LogParser;
use chrono::Local;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long shutdown waits for the process to report its exit
const SHUTDOWN_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands accepted by the controller
#[derive(Debug)]
pub enum Command {
    Connect(Credentials),
    Disconnect,
    Shutdown,
}

/// Cloneable front door to a running controller
///
/// Commands are fire-and-forget; outcomes arrive on the event stream.
#[derive(Debug, Clone)]
pub struct VpnHandle {
    commands: mpsc::UnboundedSender<Command>,
    bridge: EventBridge,
}

impl VpnHandle {
    /// Request a connection with the given credentials
    pub fn connect(&self, username: impl Into<String>, password: impl Into<String>) {
        self.send(Command::Connect(Credentials::new(username, password)));
    }

    /// Request a disconnect; idempotent
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Stop any live process and end the controller
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Subscribe to log, traffic, state and notice events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.bridge.subscribe()
    }

    /// Watch the latest status snapshot
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.bridge.status()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Session controller is gone, command dropped");
        }
    }
}

/// Owns and drives one VPN connection at a time
pub struct SessionController {
    machine: ConnectionStateMachine,
    supervisor: ProcessSupervisor,
    parser: LogParser,
    bridge: EventBridge,
    poller: Option<StatusPoller>,
    commands: mpsc::UnboundedReceiver<Command>,
    supervisor_events: mpsc::UnboundedReceiver<SupervisorEvent>,
    samples_tx: mpsc::UnboundedSender<PollSample>,
    samples: mpsc::UnboundedReceiver<PollSample>,
    liveness: watch::Sender<Option<SessionId>>,
}

impl SessionController {
    /// Create a controller and the handle used to drive it
    pub fn new(config: VpnConfig) -> (Self, VpnHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (supervisor_tx, supervisor_events) = mpsc::unbounded_channel();
        let (samples_tx, samples) = mpsc::unbounded_channel();
        let (liveness, _) = watch::channel(None);

        let machine = ConnectionStateMachine::new();
        let bridge = EventBridge::new(DEFAULT_EVENT_CAPACITY, machine.snapshot());

        let handle = VpnHandle {
            commands: commands_tx,
            bridge: bridge.clone(),
        };

        let controller = Self {
            machine,
            supervisor: ProcessSupervisor::new(config, supervisor_tx),
            parser: LogParser::new(),
            bridge,
            poller: None,
            commands,
            supervisor_events,
            samples_tx,
            samples,
            liveness,
        };

        (controller, handle)
    }

    /// Create a controller and run it on the current tokio runtime
    pub fn spawn(config: VpnConfig) -> (VpnHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(config);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    /// Run the controller event loop until shutdown
    ///
    /// Ends on [`Command::Shutdown`] or once every handle is dropped.
    pub async fn run(mut self) {
        info!("Session controller started");

        loop {
            // Commands first, then process observations, then status samples.
            // Order within each channel is arrival order.
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                Some(event) = self.supervisor_events.recv() => {
                    self.handle_supervisor_event(event);
                }

                Some(sample) = self.samples.recv() => {
                    self.handle_sample(sample);
                }
            }
        }

        self.shutdown().await;
        info!("Session controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(credentials) => {
                let process_alive = self.supervisor.is_running();
                // Rejections happen before the state machine leaves Disconnected
                let attempt = self
                    .machine
                    .check_connect(process_alive)
                    .and_then(|()| self.supervisor.check_profile())
                    .and_then(|()| self.machine.request_connect(process_alive));

                match attempt {
                    Ok(transition) => self.apply(transition, Some(&credentials)),
                    Err(e) => {
                        self.bridge.log(format!("{}\n", Notice::from(&e).message()));
                        let transition = self.machine.reject_connect(&e);
                        self.apply(transition, None);
                    }
                }
            }
            Command::Disconnect => {
                let transition = self.machine.request_disconnect();
                self.apply(transition, None);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_supervisor_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Output { session, text, .. } => {
                self.bridge.log(text.clone());
                for log_event in self.parser.parse(&text) {
                    let transition = self.machine.handle_event(session, log_event);
                    self.apply(transition, None);
                }
            }
            SupervisorEvent::Exited { session, code } => {
                match self.supervisor.handle_exit(session, code) {
                    Some(process) => {
                        let uptime = Local::now().signed_duration_since(process.started_at);
                        info!(
                            %session,
                            pid = ?process.pid,
                            exit_code = ?process.exit_code,
                            uptime_secs = uptime.num_seconds(),
                            "Supervised process finished"
                        );
                    }
                    None => {
                        debug!(%session, "Exit reported for a process that is not supervised");
                    }
                }
                self.bridge
                    .log(format!("VPN process exited with code {}\n", code));
                let transition = self.machine.process_exited(session, code);
                self.apply(transition, None);
            }
        }
    }

    fn handle_sample(&mut self, sample: PollSample) {
        if !self.machine.is_live(sample.session) {
            debug!(session = %sample.session, "Discarding status sample from stale session");
            return;
        }

        if let Some(byte_count) = self.parser.parse_status(&sample.text) {
            let transition = self.machine.handle_event(sample.session, byte_count);
            self.apply(transition, None);
        }
    }

    /// Publish a transition and carry out its effects in order
    fn apply(&mut self, transition: Transition, credentials: Option<&Credentials>) {
        self.liveness.send_replace(self.machine.active_session());

        if transition.changed() {
            self.bridge.state_changed(transition.to);
        }

        for effect in transition.effects {
            match effect {
                Effect::SpawnProcess(session) => self.spawn_process(session, credentials),
                Effect::StopProcess => self.supervisor.stop(),
                Effect::StartPoller(session) => self.start_poller(session),
                Effect::StopPoller => {
                    if let Some(poller) = self.poller.take() {
                        poller.stop();
                    }
                }
                Effect::PublishTraffic(stats) => self.bridge.traffic_stats(stats),
                Effect::Notify(notice) => self.bridge.notice(notice),
            }
        }

        self.bridge.publish_status(self.machine.snapshot());
    }

    fn spawn_process(&mut self, session: SessionId, credentials: Option<&Credentials>) {
        let Some(credentials) = credentials else {
            warn!(%session, "Spawn requested without credentials");
            return;
        };

        match self.supervisor.start(session, credentials) {
            Ok(process) => {
                debug!(%session, pid = ?process.pid, "Supervising OpenVPN process");
            }
            Err(e) => {
                warn!(%session, "Connect attempt failed: {}", e);
                self.bridge.log(format!("Error: {}\n", e));
                let transition = self.machine.start_failed(session, &e);
                self.apply(transition, None);
            }
        }
    }

    fn start_poller(&mut self, session: SessionId) {
        let config = self.supervisor.config();
        let poller = StatusPoller::spawn(
            session,
            config.status_file.clone(),
            Duration::from_millis(config.poll_interval_ms),
            self.samples_tx.clone(),
            self.liveness.subscribe(),
        );
        // Replacing an old poller drops and aborts it
        self.poller = Some(poller);
    }

    async fn shutdown(&mut self) {
        let transition = self.machine.request_disconnect();
        self.apply(transition, None);

        if !self.supervisor.is_running() {
            return;
        }

        // The exit must still be observed and reported
        let deadline = tokio::time::sleep(SHUTDOWN_EXIT_TIMEOUT);
        tokio::pin!(deadline);
        while self.supervisor.is_running() {
            tokio::select! {
                Some(event) = self.supervisor_events.recv() => self.handle_supervisor_event(event),
                _ = &mut deadline => {
                    warn!("OpenVPN process did not exit before shutdown completed");
                    break;
                }
            }
        }
    }
}
