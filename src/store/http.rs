//! REST adapter for the remote delivery API.
//!
//! The remote side marks "never confirmed" with an ancient date instead of
//! null. That convention stops here: anything dated 1900 or earlier is
//! decoded as `None` before it reaches the domain. Timestamps without an
//! offset (the store's usual min-date form, `0001-01-01T00:00:00`) are read
//! as UTC.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::{DeliveryStore, StoreError};
use crate::domain::delivery::{
    Delivery, DeliveryStatus, OrderRef, PaymentMethod, ProductItem, TransitionAck, TransitionRequest,
};

const SENTINEL_MAX_YEAR: i32 = 1900;

fn unset_if_sentinel(date: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    date.filter(|d| d.year() > SENTINEL_MAX_YEAR)
}

fn parse_wire_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    raw.parse::<NaiveDate>()
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn wire_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_wire_date(&raw).ok_or_else(|| <D::Error as de::Error>::custom(format!("invalid timestamp {raw:?}")))
}

fn optional_wire_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_wire_date(&raw).ok_or_else(|| <D::Error as de::Error>::custom(format!("invalid timestamp {raw:?}"))))
        .transpose()
}

/// Delivery as the remote API sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryRecord {
    id: Uuid,
    status: DeliveryStatus,
    #[serde(deserialize_with = "wire_date")]
    date: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_wire_date")]
    confirmed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    crates: Option<u32>,
    #[serde(default)]
    amount_received: Option<f64>,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    observations: Option<String>,
    #[serde(default)]
    product_items: Vec<ProductItem>,
    #[serde(default)]
    order: Option<OrderRef>,
}

impl From<DeliveryRecord> for Delivery {
    fn from(record: DeliveryRecord) -> Self {
        Delivery {
            id: record.id,
            status: record.status,
            date: record.date,
            confirmed_date: unset_if_sentinel(record.confirmed_date),
            crates: record.crates.unwrap_or(0),
            amount_received: record.amount_received,
            payment_method: record.payment_method,
            observations: record.observations,
            product_items: record.product_items,
            order: record.order,
        }
    }
}

/// Transition acknowledgement as the remote API sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckRecord {
    status: DeliveryStatus,
    #[serde(default, deserialize_with = "optional_wire_date")]
    confirmed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    crates: Option<u32>,
}

impl From<AckRecord> for TransitionAck {
    fn from(record: AckRecord) -> Self {
        TransitionAck {
            status: record.status,
            confirmed_date: unset_if_sentinel(record.confirmed_date),
            amount: record.amount,
            payment_method: record.payment_method,
            crates: record.crates,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    field: Option<String>,
    #[serde(alias = "message")]
    error: String,
}

#[derive(Serialize)]
struct ObservationsPatch<'a> {
    observations: Option<&'a str>,
}

/// Map a non-success response to a store error.
fn error_from_response(id: Uuid, status: StatusCode, body: &str) -> StoreError {
    if status == StatusCode::NOT_FOUND {
        return StoreError::NotFound(id);
    }

    let parsed = serde_json::from_str::<ErrorBody>(body).ok();

    if status.is_client_error() {
        return match parsed {
            Some(ErrorBody { field, error }) => StoreError::Rejected { field, message: error },
            None => StoreError::Rejected {
                field: None,
                message: format!("HTTP {status}"),
            },
        };
    }

    let detail = parsed.map(|b| b.error).unwrap_or_else(|| body.trim().to_string());
    StoreError::Transport(format!("HTTP {status}: {detail}"))
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Transport("request timed out".to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

pub struct HttpDeliveryStore {
    client: Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl HttpDeliveryStore {
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.example.com/v1`
    /// * `timeout` - per-request timeout applied by the HTTP client
    pub fn new(base_url: &str, timeout: Duration, breaker: CircuitBreakerConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: CircuitBreaker::new(breaker),
        })
    }

    fn delivery_url(&self, id: Uuid) -> String {
        format!("{}/deliveries/{}", self.base_url, id)
    }

    async fn read_body(id: Uuid, response: Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = error_from_response(id, status, &body);
            tracing::warn!(delivery_id = %id, status = %status, error = %err, "Delivery store returned an error");
            return Err(err);
        }

        Ok(body)
    }
}

#[async_trait]
impl DeliveryStore for HttpDeliveryStore {
    async fn fetch(&self, id: Uuid) -> Result<Delivery, StoreError> {
        self.breaker
            .call(async {
                let response = self
                    .client
                    .get(self.delivery_url(id))
                    .send()
                    .await
                    .map_err(transport_error)?;
                let body = Self::read_body(id, response).await?;
                let record: DeliveryRecord = decode(&body)?;
                Ok::<_, StoreError>(Delivery::from(record))
            })
            .await
    }

    async fn transition(&self, id: Uuid, request: &TransitionRequest) -> Result<TransitionAck, StoreError> {
        tracing::debug!(delivery_id = %id, status = %request.status, "Sending transition to delivery store");

        self.breaker
            .call(async {
                let response = self
                    .client
                    .patch(format!("{}/status", self.delivery_url(id)))
                    .json(request)
                    .send()
                    .await
                    .map_err(transport_error)?;
                let body = Self::read_body(id, response).await?;
                let record: AckRecord = decode(&body)?;
                Ok::<_, StoreError>(TransitionAck::from(record))
            })
            .await
    }

    async fn update_observations(&self, id: Uuid, observations: Option<&str>) -> Result<(), StoreError> {
        self.breaker
            .call(async {
                let response = self
                    .client
                    .patch(self.delivery_url(id))
                    .json(&ObservationsPatch { observations })
                    .send()
                    .await
                    .map_err(transport_error)?;
                Self::read_body(id, response).await.map(|_| ())
            })
            .await
    }
}
