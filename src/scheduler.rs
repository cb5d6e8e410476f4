//! Trigger scheduling.
//!
//! A [`TriggerScheduler`] fires a payload back to its owner at an
//! absolute instant. Platforms with an exact-alarm permission can refuse
//! exact arming with [`SchedulerError::PermissionDenied`]; the engine
//! then re-arms best-effort at the same instant. Once armed, a trigger
//! belongs to the scheduler until it fires or is cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::notify::DeparturePayload;

/// Opaque handle to an armed trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(u64);

impl TriggerHandle {
    /// Mint a handle from a scheduler-assigned id. Ids must be unique
    /// within one scheduler instance.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A trigger that has fired, delivered to whoever holds the fire channel.
#[derive(Debug)]
pub struct FiredTrigger {
    pub handle: TriggerHandle,
    pub payload: DeparturePayload,
}

/// Arms and cancels absolute-time triggers.
#[async_trait]
pub trait TriggerScheduler: Send + Sync {
    /// Arm a trigger at `at`. With `exact` set, the platform is asked
    /// for exact-time delivery and may refuse with
    /// [`SchedulerError::PermissionDenied`].
    async fn arm(
        &self,
        at: DateTime<Utc>,
        exact: bool,
        payload: DeparturePayload,
    ) -> std::result::Result<TriggerHandle, SchedulerError>;

    /// Cancel an armed trigger. Cancelling a trigger that already fired
    /// is a no-op.
    async fn cancel(&self, handle: TriggerHandle);
}

/// In-process scheduler backed by tokio timers.
///
/// Fired triggers are delivered over an unbounded channel; the embedding
/// host forwards them to [`DepartureEngine::handle_fired`].
///
/// [`DepartureEngine::handle_fired`]: crate::engine::DepartureEngine::handle_fired
pub struct TokioScheduler {
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, tokio::task::JoinHandle<()>>>>,
    fired_tx: mpsc::UnboundedSender<FiredTrigger>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiving end of its fire channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTrigger>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_id: AtomicU64::new(1),
                tasks: Arc::new(Mutex::new(HashMap::new())),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Number of triggers currently armed.
    pub fn armed_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[async_trait]
impl TriggerScheduler for TokioScheduler {
    async fn arm(
        &self,
        at: DateTime<Utc>,
        _exact: bool,
        payload: DeparturePayload,
    ) -> std::result::Result<TriggerHandle, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TriggerHandle(id);

        // Past instants fire immediately
        let delay = (at - Utc::now()).to_std().unwrap_or_default();

        let tasks = Arc::clone(&self.tasks);
        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().remove(&id);
            if fired_tx.send(FiredTrigger { handle, payload }).is_err() {
                warn!("Trigger {} fired but no receiver is listening", id);
            }
        });

        self.tasks.lock().insert(id, task);
        debug!("Armed trigger {} for {}", id, at);
        Ok(handle)
    }

    async fn cancel(&self, handle: TriggerHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.id()) {
            task.abort();
            debug!("Cancelled trigger {}", handle.id());
        }
    }
}
