//! OpenVPN process supervision
//!
//! Spawns the external VPN binary, forwards its stdout/stderr as raw text
//! chunks, reports its exit and enforces that at most one process is alive.
//! Everything observed is sent as [`SupervisorEvent`]s tagged with the
//! session that started the process.

use crate::config::VpnConfig;
use crate::error::StartError;
use crate::types::{Credentials, SessionId};
use crate::vpn::credentials::{remove_credentials, write_credentials};
use chrono::{DateTime, Local};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Size of a single read from the process pipes
const READ_BUFFER_SIZE: usize = 4096;

/// How long the exit report waits for the pipes to drain
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which pipe a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Observations about the supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Raw output as read from one pipe
    Output {
        session: SessionId,
        stream: OutputStream,
        text: String,
    },

    /// Process exited; a missing exit code is reported as 0
    Exited { session: SessionId, code: i32 },
}

/// The one external VPN process that may be alive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub session: SessionId,
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    pub exit_code: Option<i32>,
}

/// Owns the lifecycle of the external VPN binary
#[derive(Debug)]
pub struct ProcessSupervisor {
    config: VpnConfig,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    current: Option<SupervisedProcess>,
}

impl ProcessSupervisor {
    /// Create a supervisor reporting to `events`
    pub fn new(config: VpnConfig, events: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        Self {
            config,
            events,
            current: None,
        }
    }

    /// Configuration used to launch the process
    pub fn config(&self) -> &VpnConfig {
        &self.config
    }

    /// True while a started process has not been observed to exit
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Fail with `ConfigMissing` when the connection profile is absent
    pub fn check_profile(&self) -> Result<(), StartError> {
        if self.config.profile.exists() {
            return Ok(());
        }
        Err(StartError::ConfigMissing {
            path: self.config.profile.to_string_lossy().to_string(),
        })
    }

    /// Spawn the VPN binary for `session`
    ///
    /// Writes the credential artifact first; its path is passed on the
    /// command line. Output and exit are reported asynchronously.
    #[tracing::instrument(skip(self, credentials), fields(binary = %self.config.openvpn_binary.display()))]
    pub fn start(
        &mut self,
        session: SessionId,
        credentials: &Credentials,
    ) -> Result<SupervisedProcess, StartError> {
        if self.current.is_some() {
            return Err(StartError::AlreadyRunning);
        }

        self.check_profile()?;

        write_credentials(&self.config.credentials_file, credentials)?;

        // Old counters must not leak into the first poll of this session
        match std::fs::remove_file(&self.config.status_file) {
            Ok(()) => debug!("Removed stale status file {:?}", self.config.status_file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove stale status file: {}", e),
        }

        let mut cmd = Command::new(&self.config.openvpn_binary);
        cmd.args(self.config.command_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {:?}: {}", self.config.openvpn_binary, e);
                if !self.config.retain_credentials {
                    remove_credentials(&self.config.credentials_file);
                }
                return Err(StartError::SpawnFailed {
                    reason: format!("{}: {}", self.config.openvpn_binary.display(), e),
                });
            }
        };

        let pid = child.id();
        info!(%session, ?pid, "OpenVPN process spawned");

        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(forward_output(
                stdout,
                session,
                OutputStream::Stdout,
                self.events.clone(),
            ))
        });
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(forward_output(
                stderr,
                session,
                OutputStream::Stderr,
                self.events.clone(),
            ))
        });

        let events = self.events.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(0),
                Err(e) => {
                    error!("Failed to wait for OpenVPN process: {}", e);
                    0
                }
            };

            // Report the exit after the last chunk of output
            for task in [stdout_task, stderr_task].into_iter().flatten() {
                if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await.is_err() {
                    warn!("Output pipe still open after process exit");
                }
            }

            info!(%session, code, "OpenVPN process exited");
            if events.send(SupervisorEvent::Exited { session, code }).is_err() {
                warn!("Exit of session {} not delivered, receiver dropped", session);
            }
        });

        let process = SupervisedProcess {
            session,
            pid,
            started_at: Local::now(),
            exit_code: None,
        };
        self.current = Some(process.clone());
        Ok(process)
    }

    /// Ask the live process to terminate
    ///
    /// Sends SIGTERM and returns immediately; the exit is observed through
    /// [`SupervisorEvent::Exited`]. No-op when nothing is running.
    pub fn stop(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid_num) = self.current.as_ref().and_then(|process| process.pid) else {
            return;
        };

        let pid = Pid::from_raw(pid_num as i32);
        info!("Sending SIGTERM to OpenVPN process {}", pid);
        match kill(pid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(nix::errno::Errno::ESRCH) => debug!("OpenVPN process {} already gone", pid),
            Err(e) => error!("Failed to send SIGTERM to {}: {}", pid, e),
        }
    }

    /// Record the exit of the process started for `session`
    ///
    /// Frees the single-instance slot and, unless configured otherwise,
    /// removes the credential artifact. Returns the finished process, or
    /// `None` if `session` is not the supervised one.
    pub fn handle_exit(&mut self, session: SessionId, code: i32) -> Option<SupervisedProcess> {
        if self.current.as_ref().map(|process| process.session) != Some(session) {
            return None;
        }

        let mut process = self.current.take()?;
        process.exit_code = Some(code);

        if !self.config.retain_credentials {
            remove_credentials(&self.config.credentials_file);
        }

        Some(process)
    }
}

/// Forward raw chunks from one pipe until EOF
async fn forward_output<R>(
    mut reader: R,
    session: SessionId,
    stream: OutputStream,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                debug!(%session, ?stream, "OpenVPN output: {}", text.trim_end());

                let event = SupervisorEvent::Output {
                    session,
                    stream,
                    text,
                };
                if events.send(event).is_err() {
                    warn!("Failed to send output event, receiver dropped");
                    break;
                }
            }
            Err(e) => {
                warn!(?stream, "Failed to read OpenVPN output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_start_without_profile_is_config_missing() {
        let temp_dir = tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut supervisor = ProcessSupervisor::new(VpnConfig::with_base_dir(temp_dir.path()), tx);

        let result = supervisor.start(SessionId::default().next(), &Credentials::new("u", "p"));

        assert!(matches!(result, Err(StartError::ConfigMissing { .. })));
        assert!(!supervisor.is_running());
        assert!(!temp_dir.path().join("auth.txt").exists());
    }

    #[test]
    fn test_check_profile() {
        let temp_dir = tempdir().unwrap();
        let config = VpnConfig::with_base_dir(temp_dir.path());
        let (tx, _rx) = mpsc::unbounded_channel();
        let supervisor = ProcessSupervisor::new(config.clone(), tx);

        assert!(matches!(
            supervisor.check_profile(),
            Err(StartError::ConfigMissing { .. })
        ));

        std::fs::write(&config.profile, "client\n").unwrap();
        assert_eq!(supervisor.check_profile(), Ok(()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handle_exit_returns_finished_process() {
        let temp_dir = tempdir().unwrap();
        let mut config = VpnConfig::with_base_dir(temp_dir.path());
        config.openvpn_binary = "true".into();
        std::fs::write(&config.profile, "client\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut supervisor = ProcessSupervisor::new(config.clone(), tx);
        let session = SessionId::default().next();
        let started = supervisor.start(session, &Credentials::new("u", "p")).unwrap();
        assert!(config.credentials_file.exists());

        let code = loop {
            match rx.recv().await.unwrap() {
                SupervisorEvent::Exited { code, .. } => break code,
                SupervisorEvent::Output { .. } => {}
            }
        };

        assert_eq!(supervisor.handle_exit(session.next(), code), None);
        let finished = supervisor.handle_exit(session, code).unwrap();
        assert_eq!(finished.exit_code, Some(0));
        assert_eq!(finished.started_at, started.started_at);
        assert!(!supervisor.is_running());
        assert!(!config.credentials_file.exists());
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let supervisor = ProcessSupervisor::new(VpnConfig::default(), tx);

        supervisor.stop();
        supervisor.stop();
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_spawn_failure_cleans_credentials() {
        let temp_dir = tempdir().unwrap();
        let mut config = VpnConfig::with_base_dir(temp_dir.path());
        config.openvpn_binary = temp_dir.path().join("no-such-openvpn");
        std::fs::write(&config.profile, "client\n").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut supervisor = ProcessSupervisor::new(config.clone(), tx);

        let result = supervisor.start(SessionId::default().next(), &Credentials::new("u", "p"));

        assert!(matches!(result, Err(StartError::SpawnFailed { .. })));
        assert!(!supervisor.is_running());
        assert!(!config.credentials_file.exists());
    }
}
