use serde::{Deserialize, Serialize};

use crate::domain::{Booking, BookingId};

pub const ALL_BOOKINGS_ROUTE: &str = "api/all";
pub const CREATE_BOOKING_ROUTE: &str = "api/create";
pub const CANCEL_BOOKING_ROUTE: &str = "api/cancel";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingList {
    pub data: Vec<Booking>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub time: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub id: BookingId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAck {
    pub id: BookingId,
    #[serde(default)]
    pub cancelled: bool,
}
