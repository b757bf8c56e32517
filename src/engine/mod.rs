mod error;
mod mutations;
mod queries;
mod store;
mod validate;

pub use error::EngineError;
pub use store::CalendarState;
pub use validate::{BlockRequest, BookingRequest};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::warn;

use crate::catalog::SlotCatalog;
use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::Event;
use crate::notify::{Notice, NotifyHub};
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub(super) calendar: Arc<RwLock<CalendarState>>,
    pub(super) catalog: SlotCatalog,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        catalog: SlotCatalog,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = CalendarState::new();
        for event in &events {
            if !state.apply_event(event) {
                // A clean log never conflicts with itself; a hand-damaged
                // one loses the offending entry rather than the whole boot.
                warn!(?event, "replay: skipping event that conflicts with rebuilt state");
            }
        }

        Ok(Self {
            calendar: Arc::new(RwLock::new(state)),
            catalog,
            wal_tx,
            notify,
        })
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("log writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("log writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    /// WAL-append + apply + notify in one call, in that order: state is
    /// never mutated before its event is durable. Returns whether the event
    /// applied cleanly; an insert refused by an occupied key comes back
    /// false and nothing is announced. Caller holds the calendar write lock.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut CalendarState,
        event: Event,
    ) -> Result<bool, EngineError> {
        self.wal_append(&event).await?;
        let applied = state.apply_event(&event);
        if applied
            && let Some(notice) = Notice::for_event(&event)
        {
            self.notify.send(notice);
        }
        Ok(applied)
    }

    /// Rewrite the log to the minimal event sequence for the standing
    /// state. The calendar write lock is held across the swap, so no append
    /// lands between snapshot and rewrite.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let state = self.calendar.write().await;
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events: state.as_events(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("log writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Store("log writer dropped response".into()))?
            .map_err(|e| EngineError::Store(e.to_string()))
    }
}
