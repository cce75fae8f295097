//! In-memory transports for unit tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::remote::{
    endpoints, RemoteClient, Transport, TransportFailure, TransportRequest, TransportResponse,
};

pub(crate) type Reply = Result<TransportResponse, TransportFailure>;

/// Replays a fixed sequence of replies, then repeats the last one
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &TransportRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(TransportFailure("no scripted reply".to_string())))
    }
}

/// Minimal order service: every order exists unless listed otherwise
///
/// Order `N` (numeric order numbers) gets entity id `N`, its single shipment
/// gets entity id `N + 1000`.
#[derive(Default)]
pub(crate) struct FakeOrderService {
    pub missing_orders: HashSet<String>,
    pub orders_without_shipments: HashSet<String>,
    pub failing_tracks: HashSet<String>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing_order(mut self, order_number: &str) -> Self {
        self.missing_orders.insert(order_number.to_string());
        self
    }

    pub fn without_shipments(mut self, order_number: &str) -> Self {
        self.orders_without_shipments.insert(order_number.to_string());
        self
    }

    pub fn failing_track(mut self, tracking_number: &str) -> Self {
        self.failing_tracks.insert(tracking_number.to_string());
        self
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn appended(&self) -> Vec<serde_json::Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.body.clone())
            .collect()
    }

    fn filter_value(request: &TransportRequest) -> String {
        request
            .query
            .iter()
            .find(|(k, _)| k.ends_with("[value]"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for FakeOrderService {
    async fn execute(&self, request: &TransportRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());

        let body = match request.path.as_str() {
            endpoints::ORDERS_PATH => {
                let number = Self::filter_value(request);
                if self.missing_orders.contains(&number) {
                    json!({ "items": [], "total_count": 0 })
                } else {
                    let id: i64 = number.parse().unwrap_or(1);
                    json!({
                        "items": [{ "entity_id": id, "increment_id": number, "status": "processing" }],
                        "total_count": 1
                    })
                }
            },
            endpoints::SHIPMENTS_PATH => {
                let order_id: i64 = Self::filter_value(request).parse().unwrap_or(1);
                if self.orders_without_shipments.contains(&order_id.to_string()) {
                    json!({ "items": [], "total_count": 0 })
                } else {
                    json!({
                        "items": [{ "entity_id": order_id + 1000, "order_id": order_id }],
                        "total_count": 1
                    })
                }
            },
            endpoints::SHIPMENT_TRACK_PATH => {
                let number = request
                    .body
                    .as_ref()
                    .and_then(|b| b["entity"]["track_number"].as_str())
                    .unwrap_or_default()
                    .to_string();
                if self.failing_tracks.contains(&number) {
                    return Ok(TransportResponse::new(400, r#"{"message":"rejected"}"#));
                }
                json!({ "entity_id": 1 })
            },
            other => return Ok(TransportResponse::new(404, format!("unknown path {}", other))),
        };

        Ok(TransportResponse::new(200, body.to_string()))
    }
}

/// Client over `transport` with a 1ms backoff unit
pub(crate) fn client_for(transport: Arc<dyn Transport>, max_retries: u32) -> RemoteClient {
    RemoteClient::new(transport, max_retries, Duration::from_millis(1))
}
