use std::{fmt::Write as _, sync::Arc};

use client_core::{
    BookingController, BookingError, CancelOutcome, Slot, SlotBoard, SlotState, SlotStatus,
};
use shared::domain::{Booking, BookingId};
use thiserror::Error;

pub const BOARD_TITLE: &str = "Appointment Sign Up";
const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Name is required.")]
    MissingName,
    #[error("Phone Number is required.")]
    MissingPhone,
    #[error("Phone Number may only contain digits, spaces, '+', '-', '.', '(' and ')'.")]
    InvalidPhoneCharacters,
    #[error("Phone Number needs at least {MIN_PHONE_DIGITS} digits.")]
    TooFewPhoneDigits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingForm {
    pub name: String,
    pub phone: String,
}

pub fn validate_booking_form(name: &str, phone: &str) -> Result<BookingForm, FormError> {
    let name = name.trim();
    let phone = phone.trim();
    if name.is_empty() {
        return Err(FormError::MissingName);
    }
    if phone.is_empty() {
        return Err(FormError::MissingPhone);
    }
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '.' | '(' | ')'))
    {
        return Err(FormError::InvalidPhoneCharacters);
    }
    if phone.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS {
        return Err(FormError::TooFewPhoneDigits);
    }
    Ok(BookingForm {
        name: name.to_string(),
        phone: phone.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("no booking with id {0} on the board")]
    UnknownBooking(BookingId),
    #[error("cancel not confirmed")]
    Declined,
}

/// Free-slot click: validates the submitted form and books the slot.
pub async fn on_slot_free_clicked(
    controller: &BookingController,
    time: &str,
    name: &str,
    phone: &str,
) -> Result<Booking, ActionError> {
    let form = validate_booking_form(name, phone)?;
    Ok(controller.book(time, &form.name, &form.phone).await?)
}

/// Booked-slot click: asks for confirmation, frees the slot, then waits for
/// the remote cancel to settle.
pub async fn on_slot_booked_clicked(
    controller: &Arc<BookingController>,
    id: &BookingId,
    confirm: impl FnOnce(&Slot) -> bool,
) -> Result<String, ActionError> {
    let board = controller.snapshot().await;
    let slot = board
        .slot_by_id(id)
        .ok_or_else(|| ActionError::UnknownBooking(id.clone()))?;
    if !confirm(slot) {
        return Err(ActionError::Declined);
    }

    match controller.cancel(id).await {
        CancelOutcome::NotOnBoard => Err(ActionError::UnknownBooking(id.clone())),
        CancelOutcome::Pending(handle) => {
            let time = handle.time().to_string();
            handle.finished().await?;
            Ok(time)
        }
    }
}

fn status_label(slot: &Slot) -> &'static str {
    match slot.status() {
        SlotStatus::Free => "open",
        SlotStatus::PendingBook => "booking...",
        SlotStatus::Booked => "booked",
        SlotStatus::PendingCancel => "cancelling...",
    }
}

pub fn render_board(board: &SlotBoard) -> String {
    let rows: Vec<[String; 5]> = board
        .iter()
        .map(|slot| {
            let (id, name, phone) = match slot.state() {
                SlotState::Booked(occupant) => (
                    occupant.id.to_string(),
                    occupant.name.clone(),
                    occupant.phone.clone(),
                ),
                SlotState::PendingBook { name, phone, .. } => {
                    (String::new(), name.clone(), phone.clone())
                }
                SlotState::Free | SlotState::PendingCancel { .. } => {
                    (String::new(), String::new(), String::new())
                }
            };
            [
                slot.time().to_string(),
                name,
                phone,
                status_label(slot).to_string(),
                id,
            ]
        })
        .collect();

    let header = ["Time", "Name", "Phone Number", "Status", "Booking"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{BOARD_TITLE}");
    let _ = writeln!(out, "{}", format_row(&header.map(String::from), &widths));
    let _ = writeln!(
        out,
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for row in &rows {
        let _ = writeln!(out, "{}", format_row(row, &widths));
    }
    let _ = write!(
        out,
        "{} open, {} booked",
        board.free_count(),
        board.booked_count()
    );
    out
}

fn format_row(cells: &[String; 5], widths: &[usize; 5]) -> String {
    cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use client_core::{SyncClient, SyncError, TransportError};
    use shared::template::SlotTemplate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSync {
        creates: AtomicUsize,
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl SyncClient for CountingSync {
        async fn fetch_all(&self) -> Result<Vec<Booking>, TransportError> {
            Ok(vec![Booking {
                id: BookingId::from("1"),
                time: "8:00 AM".into(),
                name: "A".into(),
                phone: "555-0001".into(),
            }])
        }

        async fn create(&self, time: &str, name: &str, phone: &str) -> Result<Booking, SyncError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(Booking {
                id: BookingId::from("2"),
                time: time.into(),
                name: name.into(),
                phone: phone.into(),
            })
        }

        async fn cancel(&self, _id: &BookingId) -> Result<(), TransportError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn controller() -> (Arc<BookingController>, Arc<CountingSync>) {
        let sync = Arc::new(CountingSync::default());
        let template = SlotTemplate::from_labels(["8:00 AM", "8:30 AM"]).expect("template");
        let controller = BookingController::new(sync.clone(), template);
        controller.load_and_reconcile().await.expect("reconcile");
        (controller, sync)
    }

    #[tokio::test]
    async fn invalid_form_never_books() {
        let (controller, sync) = controller().await;
        let err = on_slot_free_clicked(&controller, "8:30 AM", "", "555-0002")
            .await
            .expect_err("invalid");
        assert!(matches!(err, ActionError::Form(FormError::MissingName)));
        assert_eq!(sync.creates.load(Ordering::SeqCst), 0);

        let booking = on_slot_free_clicked(&controller, "8:30 AM", " B ", "555-0002")
            .await
            .expect("book");
        assert_eq!(booking.name, "B");
        assert_eq!(sync.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declined_confirmation_keeps_booking() {
        let (controller, sync) = controller().await;
        let id = BookingId::from("1");

        let err = on_slot_booked_clicked(&controller, &id, |_| false)
            .await
            .expect_err("declined");
        assert!(matches!(err, ActionError::Declined));
        assert_eq!(sync.cancels.load(Ordering::SeqCst), 0);

        let time = on_slot_booked_clicked(&controller, &id, |slot| slot.time() == "8:00 AM")
            .await
            .expect("cancel");
        assert_eq!(time, "8:00 AM");
        assert!(controller.snapshot().await.slot("8:00 AM").expect("slot").is_free());
    }

    #[test]
    fn form_requires_name_and_phone() {
        assert_eq!(
            validate_booking_form(" ", "555-0001"),
            Err(FormError::MissingName)
        );
        assert_eq!(validate_booking_form("A", ""), Err(FormError::MissingPhone));
    }

    #[test]
    fn form_checks_phone_shape() {
        assert_eq!(
            validate_booking_form("A", "call me"),
            Err(FormError::InvalidPhoneCharacters)
        );
        assert_eq!(
            validate_booking_form("A", "555-01"),
            Err(FormError::TooFewPhoneDigits)
        );
        assert_eq!(
            validate_booking_form(" A ", "+1 (555) 010-0001"),
            Ok(BookingForm {
                name: "A".into(),
                phone: "+1 (555) 010-0001".into(),
            })
        );
    }

    #[test]
    fn render_lists_every_slot_in_order() {
        let template = shared::template::SlotTemplate::default();
        let board = SlotBoard::new(&template);
        let rendered = render_board(&board);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], BOARD_TITLE);
        assert!(lines[1].starts_with("Time"));
        assert!(lines[1].contains("Phone Number"));
        assert!(lines[3].starts_with("8:00 AM"));
        assert!(lines[19].starts_with("4:00 PM"));
        assert_eq!(lines[20], "17 open, 0 booked");
    }
}
