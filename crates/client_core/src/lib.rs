pub mod board;
pub mod controller;
pub mod error;
pub mod sync_client;

pub use board::{ReconcileReport, ReconciliationMismatch, Slot, SlotBoard, SlotState, SlotStatus};
pub use controller::{BoardEvent, BookingController, CancelHandle, CancelOutcome, ControllerConfig};
pub use error::{BookingError, PreconditionViolation, SyncError, TransportError};
pub use sync_client::{HttpSyncClient, SyncClient, DEFAULT_REQUEST_TIMEOUT};
