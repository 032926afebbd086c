//! Per-task webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a JSON payload to an external URL. Failed
//! attempts are retried up to three times with exponential backoff
//! (1 s, 2 s, 4 s).
//!
//! [`WebhookNotifier`] is the [`Notifier`] front end: it hands every change
//! of a task that carries a `notify_hook` to a background dispatcher, which
//! runs at most `pool_size` deliveries at once. Ordering between deliveries
//! is best-effort.

use std::sync::Arc;
use std::time::Duration;

use drawq_core::Task;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notifier;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers task snapshots to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a new delivery service with a pre-configured HTTP client.
    pub fn new() -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// POST the snapshot of `task` to `url`.
    ///
    /// A failed attempt is retried after each delay in the backoff
    /// schedule; the error of the last attempt is returned once the
    /// schedule is exhausted.
    pub async fn deliver(&self, url: &str, task: &Task) -> Result<(), WebhookError> {
        let body = webhook_payload(task);
        let mut backoff = RETRY_DELAYS_SECS.iter().map(|secs| Duration::from_secs(*secs));
        let mut attempt = 1;

        loop {
            let err = match self.post(url, &body).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            let Some(delay) = backoff.next() else {
                tracing::error!(attempts = attempt, url, task_id = %task.id, error = %err, "Giving up on webhook");
                return Err(err);
            };

            tracing::warn!(
                attempt,
                url,
                task_id = %task.id,
                retry_in_secs = delay.as_secs(),
                error = %err,
                "Webhook attempt failed"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<(), WebhookError> {
        let status = self.client.post(url).json(body).send().await?.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::HttpStatus(status.as_u16()))
        }
    }
}

/// JSON body posted for a task change: the full snapshot.
fn webhook_payload(task: &Task) -> serde_json::Value {
    serde_json::to_value(task).unwrap_or_else(|e| {
        tracing::error!(task_id = %task.id, error = %e, "Failed to serialize task for webhook");
        serde_json::json!({ "id": task.id, "status": task.status() })
    })
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// [`Notifier`] that posts each change to the task's own `notify_hook`.
pub struct WebhookNotifier {
    tx: mpsc::UnboundedSender<Task>,
}

impl WebhookNotifier {
    /// Spawn the delivery dispatcher and return the notifier front end.
    ///
    /// The dispatcher stops when `cancel` fires or every notifier handle is
    /// dropped. Deliveries already in flight run to completion.
    pub fn start(
        pool_size: usize,
        cancel: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), WebhookError> {
        let delivery = Arc::new(WebhookDelivery::new()?);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch(delivery, rx, pool_size.max(1), cancel));
        Ok((Self { tx }, handle))
    }
}

impl Notifier for WebhookNotifier {
    fn notify_task_change(&self, task: &Task) {
        if task.notify_hook.is_none() {
            return;
        }
        if self.tx.send(task.clone()).is_err() {
            tracing::warn!(task_id = %task.id, "Webhook dispatcher stopped, dropping notification");
        }
    }
}

async fn dispatch(
    delivery: Arc<WebhookDelivery>,
    mut rx: mpsc::UnboundedReceiver<Task>,
    pool_size: usize,
    cancel: CancellationToken,
) {
    let slots = Arc::new(Semaphore::new(pool_size));
    tracing::info!(pool_size, "Webhook dispatcher started");

    loop {
        let task = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(task) => task,
                None => break,
            },
        };

        let Some(url) = task.notify_hook.clone() else {
            continue;
        };

        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let delivery = Arc::clone(&delivery);
        tokio::spawn(async move {
            let _permit = permit;
            if delivery.deliver(&url, &task).await.is_ok() {
                tracing::debug!(task_id = %task.id, status = %task.status(), "Webhook delivered");
            }
        });
    }

    tracing::info!("Webhook dispatcher stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
