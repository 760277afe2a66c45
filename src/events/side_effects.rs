//! Queue for work that must not block or fail a checkout response.
//!
//! Calendar sync and confirmation emails are submitted here after the
//! checkout response is already determined. A background worker drains the
//! queue, bounds each attempt with a timeout, retries with exponential
//! backoff, and logs a dead-letter line once a job exhausts its attempts.
//! The request path only ever observes a failed `try_send`, which is logged
//! and swallowed.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::calendar::CalendarSyncService;
use crate::services::notifications::{EmailMessage, NotificationService};

#[derive(Debug, Clone)]
pub enum SideEffectJob {
    /// Push a materialized booking to the business's external calendar.
    CalendarSync { booking_id: Uuid },
    /// Deliver one rendered email. One job per message so a retry never
    /// resends an already-delivered mail.
    Email { message: EmailMessage },
}

impl SideEffectJob {
    fn describe(&self) -> String {
        match self {
            SideEffectJob::CalendarSync { booking_id } => {
                format!("calendar-sync booking={}", booking_id)
            }
            SideEffectJob::Email { message } => format!("email to={}", message.to),
        }
    }
}

#[derive(Debug)]
pub struct QueuedJob {
    pub job: SideEffectJob,
    pub trace_id: String,
    pub attempt: u32,
}

/// Submission handle held by the request path.
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::Sender<QueuedJob>,
}

impl SideEffectQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a job. Never blocks and never fails the caller; a full or
    /// closed queue is logged and the job is dropped.
    pub fn submit(&self, job: SideEffectJob, trace_id: &str) {
        let queued = QueuedJob {
            job,
            trace_id: trace_id.to_string(),
            attempt: 1,
        };
        if let Err(e) = self.tx.try_send(queued) {
            warn!(%trace_id, "side-effect queue rejected job: {}", e);
        }
    }

    fn requeue_after(&self, mut queued: QueuedJob, delay: Duration) {
        queued.attempt += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(queued).await {
                warn!("side-effect retry dropped, queue closed: {}", e);
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub job_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.side_effect_max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.side_effect_backoff_ms),
            job_timeout: Duration::from_secs(cfg.side_effect_timeout_secs),
        }
    }

    /// Backoff before re-running a job that has failed `attempt` times.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Spawn the queue worker. Jobs run one at a time; ordering between jobs is
/// not guaranteed once retries are in flight.
pub fn spawn_worker(
    queue: SideEffectQueue,
    mut rx: mpsc::Receiver<QueuedJob>,
    calendar: CalendarSyncService,
    mailer: NotificationService,
    policy: RetryPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("side-effect worker started");
        while let Some(queued) = rx.recv().await {
            let result = match tokio::time::timeout(
                policy.job_timeout,
                run_job(&calendar, &mailer, &queued),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ServiceError::ExternalServiceError(format!(
                    "side-effect timed out after {:?}",
                    policy.job_timeout
                ))),
            };

            let err = match result {
                Ok(()) => continue,
                Err(err) => err,
            };

            if queued.attempt < policy.max_attempts {
                let delay = policy.backoff_for(queued.attempt);
                warn!(
                    trace_id = %queued.trace_id,
                    attempt = queued.attempt,
                    "side-effect failed, retrying in {:?}: {} ({})",
                    delay,
                    err,
                    queued.job.describe()
                );
                queue.requeue_after(queued, delay);
            } else {
                error!(
                    trace_id = %queued.trace_id,
                    attempts = queued.attempt,
                    "dead-letter: side-effect abandoned: {} ({})",
                    err,
                    queued.job.describe()
                );
                if let SideEffectJob::CalendarSync { booking_id } = queued.job {
                    if let Err(e) = calendar.mark_sync_failed(booking_id).await {
                        error!(%booking_id, "failed to record calendar sync failure: {}", e);
                    }
                }
            }
        }
        info!("side-effect worker stopped");
    })
}

async fn run_job(
    calendar: &CalendarSyncService,
    mailer: &NotificationService,
    queued: &QueuedJob,
) -> Result<(), ServiceError> {
    match &queued.job {
        SideEffectJob::CalendarSync { booking_id } => {
            calendar.sync_booking(*booking_id).await.map(|_| ())
        }
        SideEffectJob::Email { message } => mailer.send(message, &queued.trace_id).await,
    }
}
