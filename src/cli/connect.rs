//! Connect command
//!
//! Runs a session controller in the foreground, renders its events and
//! disconnects on Ctrl+C. Returns once the OpenVPN process is gone.

use crate::cli::prompt::{prompt_password, prompt_required};
use crate::cli::render::render_event;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use vpnshell_core::config::toml_config::load_config;
use vpnshell_core::config::VpnConfig;
use vpnshell_core::error::{ConfigError, VpnShellError};
use vpnshell_core::vpn::{BridgeEvent, Notice, SessionController};

/// Run the connect command
pub fn run_connect(
    username: Option<String>,
    profile: Option<PathBuf>,
    json: bool,
) -> Result<(), VpnShellError> {
    let mut config = load_config()?;
    if let Some(profile) = profile {
        config.profile = profile;
    }
    config
        .validate()
        .map_err(|e| VpnShellError::Config(ConfigError::ValidationError { message: e }))?;

    let username = match username {
        Some(username) => username,
        None => prompt_required("Username")?,
    };
    let password = prompt_password("Password")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(follow_session(config, username, password, json))
}

/// What ended the session, as far as the terminal is concerned
enum SessionEnd {
    Finished,
    Failed(String),
}

async fn follow_session(
    config: VpnConfig,
    username: String,
    password: String,
    json: bool,
) -> Result<(), VpnShellError> {
    let (handle, task) = SessionController::spawn(config);
    let mut events = handle.subscribe();

    info!("Connecting as {}", username);
    handle.connect(username, password);

    let mut failure: Option<String> = None;
    let mut interrupts = 0u32;

    let end = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    render_event(&event, json);
                    if let BridgeEvent::Notice(notice) = &event {
                        if notice.is_error() {
                            failure = Some(notice.message());
                        }
                        if ends_session(notice) {
                            break match failure.take() {
                                Some(reason) => SessionEnd::Failed(reason),
                                None => SessionEnd::Finished,
                            };
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Terminal fell behind, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break SessionEnd::Finished,
            },

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    break SessionEnd::Finished;
                }
                interrupts += 1;
                if interrupts > 1 {
                    warn!("Second interrupt, shutting down without waiting");
                    break SessionEnd::Finished;
                }
                if !json {
                    println!("Disconnecting... (press Ctrl+C again to force)");
                }
                handle.disconnect();
            }
        }
    };

    handle.shutdown();
    if let Err(e) = task.await {
        warn!("Session controller task failed: {}", e);
    }

    match end {
        SessionEnd::Finished => Ok(()),
        SessionEnd::Failed(reason) => Err(VpnShellError::SessionFailed(reason)),
    }
}

/// Notices after which no process is left to watch
fn ends_session(notice: &Notice) -> bool {
    matches!(
        notice,
        Notice::ProcessExited { .. }
            | Notice::AlreadyRunning
            | Notice::ConfigMissing { .. }
            | Notice::StartFailed { .. }
    )
}
