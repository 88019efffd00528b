use std::{future::Future, sync::Arc, time::Duration};

use shared::{
    domain::{Booking, BookingId},
    template::SlotTemplate,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    board::{ReconcileReport, ReconciliationMismatch, Revision, SlotBoard, SlotStatus, Ticket},
    error::{BookingError, TransportError},
    sync_client::{SyncClient, DEFAULT_REQUEST_TIMEOUT},
};

const CANCEL_RETRY_ATTEMPTS: usize = 3;
const CANCEL_RETRY_DELAY: Duration = Duration::from_millis(500);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub request_timeout: Duration,
    pub cancel_retry_attempts: usize,
    pub cancel_retry_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cancel_retry_attempts: CANCEL_RETRY_ATTEMPTS,
            cancel_retry_delay: CANCEL_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Reconciled { booked: usize, free: usize },
    Mismatch(ReconciliationMismatch),
    SlotUpdated { time: String, status: SlotStatus },
    BookFailed { time: String, reason: String },
    CancelFailed {
        time: String,
        id: BookingId,
        reason: String,
    },
}

struct ControllerState {
    board: SlotBoard,
    next_ticket: Ticket,
    revision: Revision,
    issued_fetches: u64,
    applied_fetch: u64,
}

impl ControllerState {
    fn take_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn next_revision(&mut self) -> Revision {
        self.revision += 1;
        self.revision
    }
}

pub enum CancelOutcome {
    NotOnBoard,
    Pending(CancelHandle),
}

pub struct CancelHandle {
    time: String,
    id: BookingId,
    task: JoinHandle<Result<(), BookingError>>,
}

impl CancelHandle {
    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn id(&self) -> &BookingId {
        &self.id
    }

    pub async fn finished(self) -> Result<(), BookingError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(BookingError::TaskAborted(err.to_string())),
        }
    }
}

pub struct BookingController {
    sync: Arc<dyn SyncClient>,
    template: SlotTemplate,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<BoardEvent>,
}

impl BookingController {
    pub fn new(sync: Arc<dyn SyncClient>, template: SlotTemplate) -> Arc<Self> {
        Self::new_with_config(sync, template, ControllerConfig::default())
    }

    pub fn new_with_config(
        sync: Arc<dyn SyncClient>,
        template: SlotTemplate,
        config: ControllerConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let board = SlotBoard::new(&template);
        Arc::new(Self {
            sync,
            template,
            config,
            inner: Mutex::new(ControllerState {
                board,
                next_ticket: 0,
                revision: 0,
                issued_fetches: 0,
                applied_fetch: 0,
            }),
            events,
        })
    }

    pub fn template(&self) -> &SlotTemplate {
        &self.template
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SlotBoard {
        self.inner.lock().await.board.clone()
    }

    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn bounded<T, E>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, E>
    where
        E: From<TransportError>,
    {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                operation,
                timeout: self.config.request_timeout,
            }
            .into()),
        }
    }

    pub async fn load_and_reconcile(&self) -> Result<ReconcileReport, BookingError> {
        let (fetch_seq, taken_at) = {
            let mut guard = self.inner.lock().await;
            guard.issued_fetches += 1;
            (guard.issued_fetches, guard.revision)
        };

        let bookings = self.bounded("fetch_all", self.sync.fetch_all()).await?;

        let mut guard = self.inner.lock().await;
        let (board, mut report) =
            SlotBoard::reconcile(&self.template, &bookings, Some(&guard.board), taken_at);
        if fetch_seq < guard.applied_fetch {
            debug!(fetch_seq, applied = guard.applied_fetch, "discarding superseded snapshot");
            report.superseded = true;
            return Ok(report);
        }
        guard.board = board;
        guard.applied_fetch = fetch_seq;
        drop(guard);

        for mismatch in &report.mismatches {
            warn!(
                id = %mismatch.booking.id,
                time = %mismatch.booking.time,
                "remote booking does not match any slot; dropped"
            );
            self.emit(BoardEvent::Mismatch(mismatch.clone()));
        }
        for duplicate in &report.duplicates {
            warn!(
                id = %duplicate.id,
                time = %duplicate.time,
                "remote store repeats a slot or booking id; keeping the first"
            );
        }
        info!(
            booked = report.booked,
            free = report.free,
            mismatches = report.mismatches.len(),
            "board reconciled"
        );
        self.emit(BoardEvent::Reconciled {
            booked: report.booked,
            free: report.free,
        });
        Ok(report)
    }

    pub async fn book(&self, time: &str, name: &str, phone: &str) -> Result<Booking, BookingError> {
        let ticket = {
            let mut guard = self.inner.lock().await;
            let ticket = guard.take_ticket();
            guard.board.apply_book(time, ticket, name, phone)?;
            ticket
        };
        self.emit(BoardEvent::SlotUpdated {
            time: time.to_string(),
            status: SlotStatus::PendingBook,
        });

        match self.bounded("create", self.sync.create(time, name, phone)).await {
            Ok(booking) => {
                if booking.time != time {
                    warn!(
                        requested = time,
                        returned = %booking.time,
                        "remote store echoed a different time"
                    );
                }
                let applied = {
                    let mut guard = self.inner.lock().await;
                    let revision = guard.next_revision();
                    guard.board.confirm_book(time, ticket, &booking, revision)
                };
                if applied {
                    info!(time, id = %booking.id, "slot booked");
                    self.emit(BoardEvent::SlotUpdated {
                        time: time.to_string(),
                        status: SlotStatus::Booked,
                    });
                } else {
                    debug!(time, ticket, "book completion superseded by reconcile");
                }
                Ok(booking)
            }
            Err(err) => {
                let err = BookingError::from(err);
                let rolled_back = self.inner.lock().await.board.rollback_book(time, ticket);
                warn!(time, rolled_back, error = %err, "booking failed");
                if rolled_back {
                    self.emit(BoardEvent::SlotUpdated {
                        time: time.to_string(),
                        status: SlotStatus::Free,
                    });
                }
                self.emit(BoardEvent::BookFailed {
                    time: time.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Frees the slot held by `id` right away and settles the remote cancel in
    /// the background.
    pub async fn cancel(self: &Arc<Self>, id: &BookingId) -> CancelOutcome {
        let (time, ticket) = {
            let mut guard = self.inner.lock().await;
            let ticket = guard.take_ticket();
            match guard.board.apply_cancel(id, ticket) {
                Some(time) => (time, ticket),
                None => {
                    debug!(%id, "cancel for booking not on board ignored");
                    return CancelOutcome::NotOnBoard;
                }
            }
        };
        self.emit(BoardEvent::SlotUpdated {
            time: time.clone(),
            status: SlotStatus::PendingCancel,
        });

        let controller = Arc::clone(self);
        let task_time = time.clone();
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            controller
                .settle_cancel(task_time, task_id, ticket)
                .await
        });

        CancelOutcome::Pending(CancelHandle {
            time,
            id: id.clone(),
            task,
        })
    }

    async fn settle_cancel(
        &self,
        time: String,
        id: BookingId,
        ticket: Ticket,
    ) -> Result<(), BookingError> {
        let attempts = self.config.cancel_retry_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.bounded("cancel", self.sync.cancel(&id)).await {
                Ok(()) => {
                    let applied = {
                        let mut guard = self.inner.lock().await;
                        let revision = guard.next_revision();
                        guard.board.confirm_cancel(&time, ticket, revision)
                    };
                    if applied {
                        info!(%time, %id, "booking cancelled");
                        self.emit(BoardEvent::SlotUpdated {
                            time,
                            status: SlotStatus::Free,
                        });
                    } else {
                        debug!(%time, ticket, "cancel completion superseded by reconcile");
                    }
                    return Ok(());
                }
                Err(err) => {
                    warn!(%time, %id, attempt, attempts, error = %err, "remote cancel failed");
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.cancel_retry_delay).await;
                    }
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| TransportError::Other("cancel was never attempted".to_string()));
        let rolled_back = self.inner.lock().await.board.rollback_cancel(&time, ticket);
        if rolled_back {
            warn!(%time, %id, "restored booking after failed cancel");
            self.emit(BoardEvent::SlotUpdated {
                time: time.clone(),
                status: SlotStatus::Booked,
            });
        }
        self.emit(BoardEvent::CancelFailed {
            time,
            id: id.clone(),
            reason: source.to_string(),
        });
        Err(BookingError::CancelFailed { id, source })
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
