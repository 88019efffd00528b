use std::sync::Arc;

use shared::domain::{Booking, BookingId};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("slot {time} already holds a booking")]
    SlotTaken { time: String },
}

/// One booking per time; insertion order is kept for listing.
#[derive(Clone, Default)]
pub struct BookingStore {
    bookings: Arc<RwLock<Vec<Booking>>>,
}

impl BookingStore {
    pub async fn list(&self) -> Vec<Booking> {
        self.bookings.read().await.clone()
    }

    pub async fn insert(&self, time: &str, name: &str, phone: &str) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.iter().any(|booking| booking.time == time) {
            return Err(StoreError::SlotTaken {
                time: time.to_string(),
            });
        }
        let booking = Booking {
            id: BookingId(Uuid::new_v4().simple().to_string()),
            time: time.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        bookings.push(booking.clone());
        Ok(booking)
    }

    pub async fn remove(&self, id: &BookingId) -> Option<Booking> {
        let mut bookings = self.bookings.write().await;
        let idx = bookings.iter().position(|booking| &booking.id == id)?;
        Some(bookings.remove(idx))
    }
}
