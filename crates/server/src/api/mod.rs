use shared::{
    domain::Booking,
    error::{ApiError, ErrorCode},
    protocol::{BookingList, CancelAck, CancelBookingRequest, CreateBookingRequest},
    template::SlotTemplate,
};
use tracing::info;

use crate::store::{BookingStore, StoreError};

const MAX_FIELD_CHARS: usize = 120;

#[derive(Clone)]
pub struct ApiContext {
    pub store: BookingStore,
    pub template: SlotTemplate,
}

pub async fn list_bookings(ctx: &ApiContext) -> BookingList {
    BookingList {
        data: ctx.store.list().await,
    }
}

pub async fn create_booking(
    ctx: &ApiContext,
    req: CreateBookingRequest,
) -> Result<Booking, ApiError> {
    if !ctx.template.contains(&req.time) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{} is not a bookable time", req.time),
        ));
    }
    let name = required_field("name", &req.name)?;
    let phone = required_field("phone", &req.phone)?;

    let booking = ctx
        .store
        .insert(&req.time, name, phone)
        .await
        .map_err(|err| match err {
            StoreError::SlotTaken { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),
        })?;
    info!(id = %booking.id, time = %booking.time, "booking created");
    Ok(booking)
}

pub async fn cancel_booking(
    ctx: &ApiContext,
    req: CancelBookingRequest,
) -> Result<CancelAck, ApiError> {
    let removed = ctx
        .store
        .remove(&req.id)
        .await
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "booking not found"))?;
    info!(id = %removed.id, time = %removed.time, "booking cancelled");
    Ok(CancelAck {
        id: removed.id,
        cancelled: true,
    })
}

fn required_field<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} is required"),
        ));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} is too long"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
