use std::collections::{HashMap, HashSet};

use shared::{
    domain::{Booking, BookingId, Occupant},
    template::SlotTemplate,
};

use crate::error::PreconditionViolation;

pub type Ticket = u64;
pub type Revision = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Free,
    PendingBook {
        ticket: Ticket,
        name: String,
        phone: String,
    },
    Booked(Occupant),
    /// Presented as free; keeps the occupant so a failed remote cancel can restore it.
    PendingCancel { ticket: Ticket, occupant: Occupant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Free,
    PendingBook,
    Booked,
    PendingCancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    time: String,
    state: SlotState,
    /// Revision of the last book or cancel confirmed locally for this slot.
    settled_at: Revision,
}

impl Slot {
    fn free(time: &str) -> Self {
        Self {
            time: time.to_string(),
            state: SlotState::Free,
            settled_at: 0,
        }
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        match &self.state {
            SlotState::Booked(occupant) => Some(occupant),
            _ => None,
        }
    }

    pub fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Free => SlotStatus::Free,
            SlotState::PendingBook { .. } => SlotStatus::PendingBook,
            SlotState::Booked(_) => SlotStatus::Booked,
            SlotState::PendingCancel { .. } => SlotStatus::PendingCancel,
        }
    }

    pub fn is_free(&self) -> bool {
        self.occupant().is_none()
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            SlotState::PendingBook { .. } | SlotState::PendingCancel { .. }
        )
    }

    fn holds_ticket(&self, ticket: Ticket) -> bool {
        match self.state {
            SlotState::PendingBook { ticket: held, .. }
            | SlotState::PendingCancel { ticket: held, .. } => held == ticket,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationMismatch {
    pub booking: Booking,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub booked: usize,
    pub free: usize,
    pub mismatches: Vec<ReconciliationMismatch>,
    pub duplicates: Vec<Booking>,
    /// Set when a newer snapshot had already been applied; the board was left untouched.
    pub superseded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBoard {
    slots: Vec<Slot>,
    positions: HashMap<String, usize>,
}

impl SlotBoard {
    pub fn new(template: &SlotTemplate) -> Self {
        let slots: Vec<Slot> = template
            .canonical_times()
            .iter()
            .map(|time| Slot::free(time))
            .collect();
        let positions = slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (slot.time.clone(), idx))
            .collect();
        Self { slots, positions }
    }

    /// Merges a remote snapshot onto a fresh board. In-flight operations on
    /// `previous` survive only where the snapshot does not contradict them.
    /// Slots settled after revision `taken_at` keep their local state, since
    /// the snapshot may predate that book or cancel.
    pub(crate) fn reconcile(
        template: &SlotTemplate,
        bookings: &[Booking],
        previous: Option<&SlotBoard>,
        taken_at: Revision,
    ) -> (Self, ReconcileReport) {
        let mut board = Self::new(template);
        let mut report = ReconcileReport::default();

        let mut by_time: HashMap<&str, &Booking> = HashMap::with_capacity(bookings.len());
        let mut placed_ids: HashSet<&BookingId> = HashSet::with_capacity(bookings.len());
        for booking in bookings {
            if !board.positions.contains_key(&booking.time) {
                report.mismatches.push(ReconciliationMismatch {
                    booking: booking.clone(),
                });
                continue;
            }
            if by_time.contains_key(booking.time.as_str()) || placed_ids.contains(&booking.id) {
                report.duplicates.push(booking.clone());
                continue;
            }
            placed_ids.insert(&booking.id);
            by_time.insert(booking.time.as_str(), booking);
        }

        for slot in &mut board.slots {
            let local = previous.and_then(|prev| prev.slot(&slot.time));
            if let Some(local) = local.filter(|local| local.settled_at > taken_at) {
                slot.state = local.state.clone();
                slot.settled_at = local.settled_at;
                continue;
            }
            slot.settled_at = local.map_or(0, |local| local.settled_at);

            let remote = by_time.get(slot.time.as_str()).copied();
            let carried = local.map(Slot::state);
            slot.state = match (remote, carried) {
                (None, Some(state)) if matches!(state, SlotState::PendingBook { .. }) => {
                    state.clone()
                }
                (Some(booking), Some(SlotState::PendingCancel { ticket, occupant }))
                    if occupant.id == booking.id =>
                {
                    SlotState::PendingCancel {
                        ticket: *ticket,
                        occupant: booking.occupant(),
                    }
                }
                (Some(booking), _) => SlotState::Booked(booking.occupant()),
                (None, _) => SlotState::Free,
            };
        }

        report.booked = board.booked_count();
        report.free = board.free_count();
        (board, report)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, time: &str) -> Option<&Slot> {
        self.positions.get(time).map(|&idx| &self.slots[idx])
    }

    pub fn slot_by_id(&self, id: &BookingId) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|slot| slot.occupant().is_some_and(|occupant| &occupant.id == id))
    }

    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_free()).count()
    }

    pub fn booked_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    fn slot_mut(&mut self, time: &str) -> Option<&mut Slot> {
        let idx = *self.positions.get(time)?;
        self.slots.get_mut(idx)
    }

    pub(crate) fn apply_book(
        &mut self,
        time: &str,
        ticket: Ticket,
        name: &str,
        phone: &str,
    ) -> Result<(), PreconditionViolation> {
        let slot = self
            .slot_mut(time)
            .ok_or_else(|| PreconditionViolation::UnknownSlot {
                time: time.to_string(),
            })?;
        match slot.state {
            SlotState::Free => {
                slot.state = SlotState::PendingBook {
                    ticket,
                    name: name.to_string(),
                    phone: phone.to_string(),
                };
                Ok(())
            }
            SlotState::Booked(_) => Err(PreconditionViolation::SlotOccupied {
                time: time.to_string(),
            }),
            SlotState::PendingBook { .. } | SlotState::PendingCancel { .. } => {
                Err(PreconditionViolation::OperationInFlight {
                    time: time.to_string(),
                })
            }
        }
    }

    pub(crate) fn confirm_book(
        &mut self,
        time: &str,
        ticket: Ticket,
        booking: &Booking,
        revision: Revision,
    ) -> bool {
        match self.slot_mut(time) {
            Some(slot) if slot.holds_ticket(ticket) => {
                slot.state = SlotState::Booked(booking.occupant());
                slot.settled_at = revision;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn rollback_book(&mut self, time: &str, ticket: Ticket) -> bool {
        match self.slot_mut(time) {
            Some(slot) if slot.holds_ticket(ticket) => {
                slot.state = SlotState::Free;
                true
            }
            _ => false,
        }
    }

    /// Returns the time of the slot now pending cancel, or `None` when no
    /// booked slot carries `id`.
    pub(crate) fn apply_cancel(&mut self, id: &BookingId, ticket: Ticket) -> Option<String> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.occupant().is_some_and(|occupant| &occupant.id == id))?;
        let SlotState::Booked(occupant) = &slot.state else {
            return None;
        };
        let occupant = occupant.clone();
        slot.state = SlotState::PendingCancel { ticket, occupant };
        Some(slot.time.clone())
    }

    pub(crate) fn confirm_cancel(&mut self, time: &str, ticket: Ticket, revision: Revision) -> bool {
        match self.slot_mut(time) {
            Some(slot) if slot.holds_ticket(ticket) => {
                slot.state = SlotState::Free;
                slot.settled_at = revision;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn rollback_cancel(&mut self, time: &str, ticket: Ticket) -> bool {
        match self.slot_mut(time) {
            Some(slot) if slot.holds_ticket(ticket) => {
                if let SlotState::PendingCancel { occupant, .. } = &slot.state {
                    let occupant = occupant.clone();
                    slot.state = SlotState::Booked(occupant);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(id: &str, time: &str, name: &str, phone: &str) -> Booking {
        Booking {
            id: BookingId::from(id),
            time: time.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }

    fn two_slot_template() -> SlotTemplate {
        SlotTemplate::from_labels(["8:00 AM", "8:30 AM"]).expect("template")
    }

    #[test]
    fn new_board_has_one_free_slot_per_template_time() {
        let template = SlotTemplate::default();
        let board = SlotBoard::new(&template);
        assert_eq!(board.len(), template.len());
        assert_eq!(board.free_count(), template.len());
        let times: Vec<&str> = board.iter().map(Slot::time).collect();
        let expected: Vec<&str> = template.canonical_times().iter().map(String::as_str).collect();
        assert_eq!(times, expected);
    }

    #[test]
    fn reconcile_fills_matching_slots() {
        let template = two_slot_template();
        let remote = vec![booking("1", "8:00 AM", "A", "555-0001")];
        let (board, report) = SlotBoard::reconcile(&template, &remote, None, 0);

        let first = board.slot("8:00 AM").expect("slot");
        assert_eq!(first.status(), SlotStatus::Booked);
        let occupant = first.occupant().expect("occupant");
        assert_eq!(occupant.id, BookingId::from("1"));
        assert_eq!(occupant.name, "A");
        assert_eq!(occupant.phone, "555-0001");

        assert!(board.slot("8:30 AM").expect("slot").is_free());
        assert_eq!(report.booked, 1);
        assert_eq!(report.free, 1);
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn reconcile_reports_unmatched_and_duplicate_bookings() {
        let template = two_slot_template();
        let remote = vec![
            booking("1", "8:30 AM", "A", "555-0001"),
            booking("2", "7:00 PM", "B", "555-0002"),
            booking("3", "8:30 AM", "C", "555-0003"),
        ];
        let (board, report) = SlotBoard::reconcile(&template, &remote, None, 0);

        assert_eq!(board.len(), 2);
        assert_eq!(
            board.slot("8:30 AM").and_then(Slot::occupant).map(|o| o.id.clone()),
            Some(BookingId::from("1"))
        );
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].booking.id, BookingId::from("2"));
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].id, BookingId::from("3"));
    }

    #[test]
    fn reconcile_is_idempotent_and_keeps_template_order() {
        let template = SlotTemplate::default();
        let remote = vec![
            booking("9", "3:30 PM", "Z", "555-0009"),
            booking("4", "9:00 AM", "D", "555-0004"),
        ];
        let (first, _) = SlotBoard::reconcile(&template, &remote, None, 0);
        let (second, _) = SlotBoard::reconcile(&template, &remote, Some(&first), 0);
        assert_eq!(first, second);
        assert_eq!(first.free_count() + first.booked_count(), template.len());
        assert_eq!(first.slots()[2].time(), "9:00 AM");
        assert_eq!(first.slots()[15].time(), "3:30 PM");
    }

    #[test]
    fn reconcile_keeps_uncontradicted_pending_book() {
        let template = two_slot_template();
        let mut board = SlotBoard::new(&template);
        board.apply_book("8:30 AM", 7, "B", "555-0002").expect("book");

        let (merged, _) = SlotBoard::reconcile(&template, &[], Some(&board), 0);
        assert_eq!(
            merged.slot("8:30 AM").map(Slot::status),
            Some(SlotStatus::PendingBook)
        );

        let remote = vec![booking("5", "8:30 AM", "X", "555-0005")];
        let (superseded, _) = SlotBoard::reconcile(&template, &remote, Some(&board), 0);
        assert_eq!(
            superseded.slot("8:30 AM").map(Slot::status),
            Some(SlotStatus::Booked)
        );
        let mut superseded = superseded;
        assert!(!superseded.confirm_book("8:30 AM", 7, &booking("2", "8:30 AM", "B", "555-0002"), 1));
    }

    #[test]
    fn book_requires_free_slot() {
        let template = two_slot_template();
        let remote = vec![booking("1", "8:00 AM", "A", "555-0001")];
        let (mut board, _) = SlotBoard::reconcile(&template, &remote, None, 0);

        assert_eq!(
            board.apply_book("8:00 AM", 1, "B", "555-0002"),
            Err(PreconditionViolation::SlotOccupied {
                time: "8:00 AM".into()
            })
        );
        assert_eq!(
            board.apply_book("9:00 AM", 1, "B", "555-0002"),
            Err(PreconditionViolation::UnknownSlot {
                time: "9:00 AM".into()
            })
        );
        board.apply_book("8:30 AM", 1, "B", "555-0002").expect("book");
        assert_eq!(
            board.apply_book("8:30 AM", 2, "C", "555-0003"),
            Err(PreconditionViolation::OperationInFlight {
                time: "8:30 AM".into()
            })
        );
    }

    #[test]
    fn pending_cancel_presents_as_free_and_rolls_back() {
        let template = two_slot_template();
        let remote = vec![booking("1", "8:00 AM", "A", "555-0001")];
        let (mut board, _) = SlotBoard::reconcile(&template, &remote, None, 0);

        let time = board.apply_cancel(&BookingId::from("1"), 3).expect("cancel");
        assert_eq!(time, "8:00 AM");
        let slot = board.slot(&time).expect("slot");
        assert!(slot.is_free());
        assert!(slot.occupant().is_none());
        assert_eq!(board.free_count(), 2);

        assert!(board.apply_cancel(&BookingId::from("1"), 4).is_none());
        assert!(!board.rollback_cancel(&time, 4));
        assert!(board.rollback_cancel(&time, 3));
        assert_eq!(
            board.slot_by_id(&BookingId::from("1")).map(Slot::time),
            Some("8:00 AM")
        );
    }

    #[test]
    fn reconcile_reports_one_id_on_two_times() {
        let template = two_slot_template();
        let remote = vec![
            booking("1", "8:00 AM", "A", "555-0001"),
            booking("1", "8:30 AM", "A", "555-0001"),
        ];
        let (board, report) = SlotBoard::reconcile(&template, &remote, None, 0);

        assert_eq!(board.booked_count(), 1);
        assert_eq!(
            board.slot_by_id(&BookingId::from("1")).map(Slot::time),
            Some("8:00 AM")
        );
        assert!(board.slot("8:30 AM").expect("slot").is_free());
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].time, "8:30 AM");
    }

    #[test]
    fn snapshot_older_than_settled_slot_keeps_local_state() {
        let template = two_slot_template();
        let before = vec![booking("1", "8:00 AM", "A", "555-0001")];
        let (mut board, _) = SlotBoard::reconcile(&template, &before, None, 0);

        board.apply_book("8:30 AM", 1, "B", "555-0002").expect("book");
        assert!(board.confirm_book("8:30 AM", 1, &booking("2", "8:30 AM", "B", "555-0002"), 1));
        let time = board.apply_cancel(&BookingId::from("1"), 2).expect("cancel");
        assert!(board.confirm_cancel(&time, 2, 2));

        let (stale, report) = SlotBoard::reconcile(&template, &before, Some(&board), 0);
        assert!(stale.slot("8:00 AM").expect("slot").is_free());
        assert_eq!(
            stale.slot("8:30 AM").and_then(Slot::occupant).map(|o| o.id.clone()),
            Some(BookingId::from("2"))
        );
        assert_eq!(report.booked, 1);

        let after = vec![booking("3", "8:00 AM", "C", "555-0003")];
        let (fresh, _) = SlotBoard::reconcile(&template, &after, Some(&stale), 2);
        assert_eq!(
            fresh.slot("8:00 AM").and_then(Slot::occupant).map(|o| o.id.clone()),
            Some(BookingId::from("3"))
        );
        assert!(fresh.slot("8:30 AM").expect("slot").is_free());
    }
}
