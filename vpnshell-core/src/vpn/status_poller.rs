//! Periodic sampling of the OpenVPN status artifact
//!
//! While a session is connected the status file is read in full on a fixed
//! interval and forwarded as a [`PollSample`]. Parsing happens on the
//! controller so stdout and status counts share one write path.

use crate::error::PollError;
use crate::types::SessionId;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Full content of the status artifact read for `session`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSample {
    pub session: SessionId,
    pub text: String,
}

/// Read the whole status artifact
pub async fn read_status(path: &Path) -> Result<String, PollError> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PollError::NotFound {
            path: path.to_string_lossy().to_string(),
        },
        _ => PollError::ReadFailed {
            path: path.to_string_lossy().to_string(),
            source: e,
        },
    })
}

/// Handle to a running poll loop; the loop is aborted when dropped
#[derive(Debug)]
pub struct StatusPoller {
    session: SessionId,
    task: JoinHandle<()>,
}

impl StatusPoller {
    /// Start sampling `path` every `period` on behalf of `session`
    ///
    /// The loop ends by itself once `liveness` no longer names `session` or
    /// the sample receiver is gone.
    #[tracing::instrument(skip(samples, liveness), fields(path = %path.display()))]
    pub fn spawn(
        session: SessionId,
        path: PathBuf,
        period: Duration,
        samples: mpsc::UnboundedSender<PollSample>,
        liveness: watch::Receiver<Option<SessionId>>,
    ) -> Self {
        let task = tokio::spawn(poll_loop(session, path, period, samples, liveness));
        Self { session, task }
    }

    /// Session this poller samples for
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// True once the loop has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop sampling immediately
    pub fn stop(self) {
        debug!(session = %self.session, "Stopping status poller");
        // Drop aborts the task
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    session: SessionId,
    path: PathBuf,
    period: Duration,
    samples: mpsc::UnboundedSender<PollSample>,
    liveness: watch::Receiver<Option<SessionId>>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if *liveness.borrow() != Some(session) {
            debug!(%session, "Session no longer live, status poller exiting");
            break;
        }

        let text = match read_status(&path).await {
            Ok(text) => text,
            Err(PollError::NotFound { .. }) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        if samples.send(PollSample { session, text }).is_err() {
            debug!("Sample receiver dropped, status poller exiting");
            break;
        }
    }
}
