use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::analysis::service::AnalysisService;
use crate::analysis::types::{AnalysisOutcome, AnalysisRequest};
use crate::error::ErrorKind;

/// Deadline applied when the caller has no opinion.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(35_000);

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum Settled {
    Success,
    Failure(ErrorKind),
}

/// State of the latest orchestration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "resolution", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Pending,
    Resolved(Settled),
}

impl SessionState {
    fn resolved(outcome: &AnalysisOutcome) -> Self {
        match outcome.failure_kind() {
            None => Self::Resolved(Settled::Success),
            Some(kind) => Self::Resolved(Settled::Failure(kind)),
        }
    }
}

/// Leaves `Pending` when an `analyze` future is dropped before it settles.
///
/// The caller gave up, so the session goes back to `Idle`; the service task
/// is aborted only when `cancel_on_timeout` is set.
struct PendingSession<'a> {
    state_tx: &'a watch::Sender<SessionState>,
    session: u64,
    abort: Option<AbortHandle>,
    settled: bool,
}

impl PendingSession<'_> {
    fn settle(mut self, state: SessionState) {
        self.settled = true;
        self.state_tx.send_replace(state);
    }
}

impl Drop for PendingSession<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!(session = self.session, "analysis abandoned by caller");
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
        self.state_tx.send_replace(SessionState::Idle);
    }
}

/// Runs one analysis per captured photo, bounded by a deadline.
///
/// The service call runs in its own task and reports through a oneshot
/// channel. Whichever of {service result, deadline} settles first decides
/// the outcome; a result arriving after the deadline finds the channel
/// closed and is dropped there, failures included.
pub struct CaptureOrchestrator {
    service: Arc<dyn AnalysisService>,
    cancel_on_timeout: bool,
    next_session: AtomicU64,
    state_tx: watch::Sender<SessionState>,
}

impl CaptureOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            service,
            cancel_on_timeout: false,
            next_session: AtomicU64::new(1),
            state_tx,
        }
    }

    /// Also abort the service task when the deadline wins. The outcome is
    /// the same either way; this only frees the connection sooner.
    #[must_use]
    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    /// State of the most recent session.
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Live session state for the host (e.g. a scanning overlay).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Analyse `request`, giving up `deadline` after the request was created.
    ///
    /// Always resolves, and resolves exactly once.
    pub async fn analyze(&self, request: AnalysisRequest, deadline: Duration) -> AnalysisOutcome {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.state_tx.send_replace(SessionState::Pending);
        let mut pending = PendingSession {
            state_tx: &self.state_tx,
            session,
            abort: None,
            settled: false,
        };
        info!(
            session,
            service = self.service.name(),
            bytes = request.image().len(),
            "analysis started"
        );

        let (tx, rx) = oneshot::channel();
        let service = Arc::clone(&self.service);
        let image = request.shared_image();
        let task = tokio::spawn(async move {
            let result = service.analyze(&image).await;
            if let Err(late) = tx.send(result) {
                match late {
                    Ok(_) => debug!(session, "late analysis result discarded"),
                    Err(e) => debug!(session, "late analysis failure discarded: {e}"),
                }
            }
        });
        if self.cancel_on_timeout {
            pending.abort = Some(task.abort_handle());
        }

        let expires_at = request.created_at() + deadline;
        let outcome = tokio::select! {
            biased;
            settled = rx => match settled {
                Ok(Ok(result)) => AnalysisOutcome::success(result),
                Ok(Err(e)) => {
                    warn!(session, "analysis failed: {e}");
                    AnalysisOutcome::failure(e.kind())
                }
                Err(_) => {
                    warn!(session, "analysis task ended without a result");
                    AnalysisOutcome::failure(ErrorKind::NetworkError)
                }
            },
            () = tokio::time::sleep_until(expires_at) => {
                warn!(session, "analysis exceeded {} ms deadline", deadline.as_millis());
                if self.cancel_on_timeout {
                    task.abort();
                }
                AnalysisOutcome::failure(ErrorKind::Timeout)
            }
        };

        pending.settle(SessionState::resolved(&outcome));
        info!(
            session,
            elapsed_ms = request.created_at().elapsed().as_millis() as u64,
            success = outcome.is_success(),
            "analysis resolved"
        );
        outcome
    }
}
