//! Remote update client
//!
//! Wraps a [`Transport`] with the retry discipline shared by all three
//! operations: up to `max_retries` attempts, linear backoff of
//! `backoff * attempt` between them, decode only on success.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::endpoints;
use super::transport::{HttpTransport, Transport, TransportRequest};
use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use crate::model::{Order, SearchResult, Shipment, ShipmentTrack, TrackingRecord};

/// What happened to one tracking record on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Tracking appended to the order's first shipment
    Updated { order_id: i64, shipment_id: i64 },
    /// The order has no shipment yet; nothing was written
    NoShipment { order_id: i64 },
}

/// Client for the order/shipment service
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    max_retries: u32,
    backoff: Duration,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            transport,
            max_retries: max_retries.max(1),
            backoff,
        }
    }

    /// Client over HTTP using the configured endpoint, token and retry policy
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            Arc::new(transport),
            config.max_retries,
            config.retry_backoff(),
        ))
    }

    /// Find the order whose increment identifier equals `order_number`
    pub async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> std::result::Result<Order, RemoteError> {
        let result: SearchResult<Order> = self
            .call(
                "find_order_by_number",
                &endpoints::orders_by_increment_id(order_number),
            )
            .await?;

        let order = result
            .into_items()
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound {
                order_number: order_number.to_string(),
            })?;

        debug!(order_number, order_id = order.entity_id, "Order found");
        Ok(order)
    }

    /// List shipments of an order; empty when none has been created yet
    pub async fn find_shipments_for_order(
        &self,
        order_id: i64,
    ) -> std::result::Result<Vec<Shipment>, RemoteError> {
        let result: SearchResult<Shipment> = self
            .call(
                "find_shipments_for_order",
                &endpoints::shipments_by_order_id(order_id),
            )
            .await?;

        let shipments = result.into_items();
        debug!(order_id, shipment_count = shipments.len(), "Shipments listed");
        Ok(shipments)
    }

    /// Append a tracking entry to a shipment
    pub async fn append_tracking(
        &self,
        shipment_id: i64,
        order_id: i64,
        record: &TrackingRecord,
    ) -> std::result::Result<(), RemoteError> {
        let track = ShipmentTrack {
            order_id,
            parent_id: shipment_id,
            track_number: record.tracking_number.clone(),
            title: record.title.clone(),
            carrier_code: record.carrier_code.clone(),
        };

        let request =
            endpoints::append_track(&track).map_err(|source| RemoteError::Encode {
                operation: "append_tracking",
                source,
            })?;

        let _: serde_json::Value = self.call("append_tracking", &request).await?;
        Ok(())
    }

    /// Push one validated record: order lookup, shipment lookup, append
    ///
    /// Only the first shipment returned is updated.
    pub async fn sync_tracking(
        &self,
        record: &TrackingRecord,
    ) -> std::result::Result<SyncOutcome, RemoteError> {
        let order = self.find_order_by_number(&record.order_number).await?;
        let shipments = self.find_shipments_for_order(order.entity_id).await?;

        let Some(shipment) = shipments.first() else {
            warn!(
                order_number = %record.order_number,
                order_id = order.entity_id,
                "No shipments found for order, skipping tracking update"
            );
            return Ok(SyncOutcome::NoShipment {
                order_id: order.entity_id,
            });
        };

        if shipments.len() > 1 {
            debug!(
                order_id = order.entity_id,
                shipment_count = shipments.len(),
                "Order has several shipments, updating the first"
            );
        }

        self.append_tracking(shipment.entity_id, order.entity_id, record)
            .await?;

        info!(
            order_number = %record.order_number,
            tracking_number = %record.tracking_number,
            carrier_code = %record.carrier_code,
            shipment_id = shipment.entity_id,
            "Tracking information updated"
        );

        Ok(SyncOutcome::Updated {
            order_id: order.entity_id,
            shipment_id: shipment.entity_id,
        })
    }

    /// Send `request` until it succeeds or the attempt budget is spent
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: &TransportRequest,
    ) -> std::result::Result<T, RemoteError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let (status, body, message) = match self.transport.execute(request).await {
                Ok(response) if response.is_success() => {
                    return decode(operation, &response.body);
                },
                Ok(response) => {
                    warn!(
                        operation,
                        attempt,
                        status = response.status,
                        response = %response.body,
                        "Remote service returned an error"
                    );
                    let message = format!("api error (status: {}): {}", response.status, response.body);
                    (Some(response.status), Some(response.body), message)
                },
                Err(failure) => {
                    warn!(operation, attempt, error = %failure, "Remote request failed");
                    (None, None, failure.to_string())
                },
            };

            if attempt >= self.max_retries {
                return Err(RemoteError::Transport {
                    operation,
                    attempts: attempt,
                    status,
                    body,
                    message,
                });
            }

            let delay = self.backoff * attempt;
            debug!(operation, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Decode a success body; an empty body decodes as JSON `null`
fn decode<T: DeserializeOwned>(
    operation: &'static str,
    body: &str,
) -> std::result::Result<T, RemoteError> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|source| RemoteError::Decode { operation, source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::remote::{TransportFailure, TransportResponse};
    use crate::test_support::{client_for, FakeOrderService, ScriptedTransport};
    use serde_json::json;
    use tokio::time::Instant;

    fn order_listing() -> TransportResponse {
        TransportResponse::new(
            200,
            json!({"items": [{"entity_id": 9, "increment_id": "42"}], "total_count": 1})
                .to_string(),
        )
    }

    fn record() -> TrackingRecord {
        TrackingRecord::new("42", "TN-1", "ups", "UPS")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_with_linear_backoff() {
        let transport = ScriptedTransport::new(vec![Err(TransportFailure(
            "connection refused".to_string(),
        ))]);
        let client = RemoteClient::new(transport.clone(), 3, Duration::from_secs(1));

        let start = Instant::now();
        let err = client.find_order_by_number("42").await.unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(transport.calls(), 3);
        // 1s after the first failure, 2s after the second, none after the last
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3100), "elapsed {:?}", elapsed);
        match err {
            RemoteError::Transport {
                attempts, status, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, None);
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_second_attempt_stops_retrying() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportResponse::new(502, "bad gateway")),
            Ok(order_listing()),
        ]);
        let client = RemoteClient::new(transport.clone(), 5, Duration::from_secs(2));

        let start = Instant::now();
        let order = client.find_order_by_number("42").await.unwrap();

        assert_eq!(order.entity_id, 9);
        assert_eq!(transport.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let transport =
            ScriptedTransport::new(vec![Ok(TransportResponse::new(503, "maintenance"))]);
        let client = client_for(transport.clone(), 2);

        let err = client.find_shipments_for_order(9).await.unwrap_err();

        assert_eq!(transport.calls(), 2);
        match err {
            RemoteError::Transport {
                operation,
                attempts,
                status,
                body,
                ..
            } => {
                assert_eq!(operation, "find_shipments_for_order");
                assert_eq!(attempts, 2);
                assert_eq!(status, Some(503));
                assert_eq!(body.as_deref(), Some("maintenance"));
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_each_retry_resends_the_same_request() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportResponse::new(500, "")),
            Ok(TransportResponse::new(500, "")),
            Ok(TransportResponse::new(201, "")),
        ]);
        let client = client_for(transport.clone(), 3);

        client.append_tracking(1009, 9, &record()).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r == &requests[0]));
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(TransportResponse::new(200, "<html>"))]);
        let client = client_for(transport.clone(), 3);

        let err = client.find_order_by_number("42").await.unwrap_err();

        assert!(matches!(err, RemoteError::Decode { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_order_listing_is_not_found() {
        let client = client_for(Arc::new(FakeOrderService::new().missing_order("42")), 3);

        let err = client.find_order_by_number("42").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { ref order_number } if order_number == "42"));
    }

    #[tokio::test]
    async fn test_no_shipments_is_empty_not_error() {
        let client = client_for(Arc::new(FakeOrderService::new().without_shipments("42")), 3);

        assert!(client.find_shipments_for_order(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_updates_first_shipment() {
        let transport = ScriptedTransport::new(vec![
            Ok(order_listing()),
            Ok(TransportResponse::new(
                200,
                json!({
                    "items": [
                        {"entity_id": 500, "order_id": 9},
                        {"entity_id": 501, "order_id": 9}
                    ],
                    "total_count": 2
                })
                .to_string(),
            )),
            Ok(TransportResponse::new(200, "{}")),
        ]);
        let client = client_for(transport.clone(), 3);

        let outcome = client.sync_tracking(&record()).await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Updated {
                order_id: 9,
                shipment_id: 500
            }
        );
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        let body = requests[2].body.clone().unwrap();
        assert_eq!(body["entity"]["parent_id"], 500);
        assert_eq!(body["entity"]["order_id"], 9);
        assert_eq!(body["entity"]["track_number"], "TN-1");
    }

    #[tokio::test]
    async fn test_sync_without_shipment_writes_nothing() {
        let service = Arc::new(FakeOrderService::new().without_shipments("42"));
        let client = client_for(service.clone(), 3);

        let outcome = client.sync_tracking(&record()).await.unwrap();

        assert_eq!(outcome, SyncOutcome::NoShipment { order_id: 42 });
        assert_eq!(service.calls_to(endpoints::SHIPMENT_TRACK_PATH), 0);
    }

    #[tokio::test]
    async fn test_sync_stops_at_missing_order() {
        let service = Arc::new(FakeOrderService::new().missing_order("42"));
        let client = client_for(service.clone(), 3);

        assert!(client.sync_tracking(&record()).await.is_err());
        assert_eq!(service.total_calls(), 1);
    }
}
