use std::time::Duration;

use shared::domain::BookingId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("remote store answered {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("remote store already holds a booking at {time}")]
    Conflict { time: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("no slot at {time} on this board")]
    UnknownSlot { time: String },
    #[error("slot {time} is already booked")]
    SlotOccupied { time: String },
    #[error("slot {time} already has an operation in flight")]
    OperationInFlight { time: String },
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),
    #[error("slot {time} was taken by another client")]
    SlotTaken { time: String },
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("cancel of booking {id} did not reach the remote store: {source}")]
    CancelFailed {
        id: BookingId,
        #[source]
        source: TransportError,
    },
    #[error("background cancel task ended abnormally: {0}")]
    TaskAborted(String),
}

impl From<SyncError> for BookingError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::Transport(err) => Self::Transport(err),
            SyncError::Conflict { time } => Self::SlotTaken { time },
        }
    }
}
