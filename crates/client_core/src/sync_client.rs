use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{Booking, BookingId},
    error::ApiError,
    protocol::{
        BookingList, CancelBookingRequest, CreateBookingRequest, ALL_BOOKINGS_ROUTE,
        CANCEL_BOOKING_ROUTE, CREATE_BOOKING_ROUTE,
    },
};
use tracing::debug;
use url::Url;

use crate::error::{SyncError, TransportError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn fetch_all(&self) -> std::result::Result<Vec<Booking>, TransportError>;
    async fn create(
        &self,
        time: &str,
        name: &str,
        phone: &str,
    ) -> std::result::Result<Booking, SyncError>;
    async fn cancel(&self, id: &BookingId) -> std::result::Result<(), TransportError>;
}

pub struct HttpSyncClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpSyncClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("invalid remote store url '{base_url}'"))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(route)
            .map_err(|e| TransportError::Other(format!("invalid route {route}: {e}")))
    }

    async fn send(
        &self,
        operation: &'static str,
        url: &Url,
        request: RequestBuilder,
    ) -> std::result::Result<Response, TransportError> {
        debug!(%url, operation, "remote store request");
        request.send().await.map_err(|source| {
            if source.is_timeout() {
                TransportError::Timeout {
                    operation,
                    timeout: self.timeout,
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        })
    }
}

async fn status_error(url: &Url, response: Response) -> TransportError {
    let status = response.status().as_u16();
    let message = match response.json::<ApiError>().await {
        Ok(body) => body.message,
        Err(_) => "no error body".to_string(),
    };
    TransportError::Status {
        url: url.to_string(),
        status,
        message,
    }
}

fn decode_error(url: &Url, source: reqwest::Error) -> TransportError {
    TransportError::Decode {
        url: url.to_string(),
        source,
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn fetch_all(&self) -> std::result::Result<Vec<Booking>, TransportError> {
        let url = self.endpoint(ALL_BOOKINGS_ROUTE)?;
        let response = self
            .send("fetch_all", &url, self.http.get(url.clone()))
            .await?;
        if !response.status().is_success() {
            return Err(status_error(&url, response).await);
        }
        let list: BookingList = response
            .json()
            .await
            .map_err(|e| decode_error(&url, e))?;
        Ok(list.data)
    }

    async fn create(
        &self,
        time: &str,
        name: &str,
        phone: &str,
    ) -> std::result::Result<Booking, SyncError> {
        let url = self.endpoint(CREATE_BOOKING_ROUTE)?;
        let body = CreateBookingRequest {
            time: time.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        let response = self
            .send("create", &url, self.http.post(url.clone()).json(&body))
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(SyncError::Conflict {
                time: time.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(status_error(&url, response).await.into());
        }
        let booking: Booking = response
            .json()
            .await
            .map_err(|e| decode_error(&url, e))?;
        Ok(booking)
    }

    async fn cancel(&self, id: &BookingId) -> std::result::Result<(), TransportError> {
        let url = self.endpoint(CANCEL_BOOKING_ROUTE)?;
        let body = CancelBookingRequest { id: id.clone() };
        let response = self
            .send("cancel", &url, self.http.post(url.clone()).json(&body))
            .await?;
        // Already gone on the remote side.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%id, "remote store no longer holds booking");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(status_error(&url, response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/sync_client_tests.rs"]
mod tests;
