//! Event batching: bounded intake, windowed accumulation, flush on volume or staleness.
//!
//! Producers push records through an [`EventIntake`] without ever blocking. The
//! [`EventManager`] loop moves them into the current batch. The first record of a
//! batch opens a window whose flush task sends the batch when the staleness
//! timeout elapses, or earlier when the loop reports the window as full. A full
//! window is the only place where the loop waits for delivery, so at most one
//! send is in flight per session.

use crate::backend::api::BatchEvent;
use crate::backend::SessionTransport;
use crate::events::EventRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

type Batch = Arc<Mutex<Vec<BatchEvent>>>;

/// Upper bound on records per batch, and so on the intake queue capacity.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Producer side of the bounded intake queue.
#[derive(Clone, Debug)]
pub struct EventIntake {
    tx: mpsc::Sender<EventRecord>,
}

impl EventIntake {
    /// Enqueue without blocking. Returns `false` when the record was dropped because the
    /// queue is full or the manager is gone.
    pub fn add(&self, record: EventRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("event queue is full, dropping the event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event manager stopped, dropping the event");
                false
            }
        }
    }

    /// Records waiting in the intake queue.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Signals of one accumulation window, created fresh when its first record arrives.
struct Window {
    full: oneshot::Sender<()>,
    /// Completes once the flush task has sent the batch or observed cancellation.
    flushed: JoinHandle<()>,
}

pub struct EventManager {
    rulespack_id: String,
    batch_size: usize,
    max_staleness: Duration,
    rx: mpsc::Receiver<EventRecord>,
    batch: Batch,
}

impl EventManager {
    /// Create the manager and its intake. The intake capacity equals `batch_size`,
    /// clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(
        rulespack_id: impl Into<String>,
        batch_size: usize,
        max_staleness: Duration,
    ) -> (Self, EventIntake) {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        let (tx, rx) = mpsc::channel(batch_size);
        let manager = Self {
            rulespack_id: rulespack_id.into(),
            batch_size,
            max_staleness,
            rx,
            batch: Arc::new(Mutex::new(Vec::new())),
        };
        (manager, EventIntake { tx })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    /// Accumulation loop; runs until `cancel` fires or every intake handle is dropped.
    ///
    /// A partially filled batch is not flushed on cancellation.
    pub async fn run<T>(
        mut self,
        cancel: CancellationToken,
        client: Arc<T>,
        session_id: String,
    ) where
        T: SessionTransport + ?Sized + 'static,
    {
        let session_id: Arc<str> = session_id.into();
        let mut window: Option<Window> = None;

        loop {
            let mut record = tokio::select! {
                _ = cancel.cancelled() => break,
                record = self.rx.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };
            debug!(event_id = %record.id, "new event");
            record.set_rulespack_id(&self.rulespack_id);

            let batch_len = {
                let mut batch = self.batch.lock().await;
                batch.push(BatchEvent::from(record));
                batch.len()
            };

            if batch_len == 1 {
                debug!(staleness = ?self.max_staleness, "batching event data");
                window = Some(self.open_window(&cancel, &client, &session_id));
            }
            if batch_len >= self.batch_size {
                let Some(Window { full, flushed }) = window.take() else {
                    continue;
                };
                // The flush task may already be sending on staleness; it then no
                // longer listens and the signal is moot.
                let _ = full.send(());
                if let Err(e) = flushed.await {
                    error!(error = %e, "event batch flush task failed");
                }
            }
        }

        // Let the current flush task observe cancellation or finish its send.
        if let Some(Window { flushed, .. }) = window {
            drop(flushed.await);
        }
        debug!("event manager stopped");
    }

    fn open_window<T>(&self, cancel: &CancellationToken, client: &Arc<T>, session_id: &Arc<str>) -> Window
    where
        T: SessionTransport + ?Sized + 'static,
    {
        let (full, full_rx) = oneshot::channel();
        let cancel = cancel.clone();
        let client = Arc::clone(client);
        let session_id = Arc::clone(session_id);
        let batch = Arc::clone(&self.batch);
        let staleness = self.max_staleness;

        let flushed = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(staleness) => debug!("event batch data staleness reached"),
                _ = full_rx => debug!("event batch is full"),
            }
            send_batch(&batch, client.as_ref(), &session_id).await;
        }
        .in_current_span());
        Window { full, flushed }
    }
}

/// Send the current batch and truncate it, whatever the outcome. Failed batches are dropped.
async fn send_batch<T>(batch: &Mutex<Vec<BatchEvent>>, client: &T, session_id: &str)
where
    T: SessionTransport + ?Sized,
{
    let mut batch = batch.lock().await;
    if batch.is_empty() {
        return;
    }
    match client.batch(session_id, &batch).await {
        Ok(()) => debug!(count = batch.len(), "event batch sent"),
        Err(e) => error!(error = %e, count = batch.len(), "could not send an event batch"),
    }
    batch.clear();
}
