//! Request builders for the order service
//!
//! Listings use the `searchCriteria` filter-group query syntax with a single
//! equality filter.

use reqwest::Method;

use super::transport::TransportRequest;
use crate::model::{EntityEnvelope, ShipmentTrack};

/// Order listing path
pub const ORDERS_PATH: &str = "orders";

/// Shipment listing path
pub const SHIPMENTS_PATH: &str = "shipments";

/// Tracking append path
pub const SHIPMENT_TRACK_PATH: &str = "shipment/track";

/// Query pairs selecting rows where `field == value`
pub fn equality_filter(field: &str, value: &str) -> Vec<(String, String)> {
    const PREFIX: &str = "searchCriteria[filter_groups][0][filters][0]";
    vec![
        (format!("{}[field]", PREFIX), field.to_string()),
        (format!("{}[value]", PREFIX), value.to_string()),
        (format!("{}[condition_type]", PREFIX), "eq".to_string()),
    ]
}

/// Look up orders by increment identifier
pub fn orders_by_increment_id(order_number: &str) -> TransportRequest {
    TransportRequest {
        method: Method::GET,
        path: ORDERS_PATH.to_string(),
        query: equality_filter("increment_id", order_number),
        body: None,
    }
}

/// Look up shipments belonging to an order
pub fn shipments_by_order_id(order_id: i64) -> TransportRequest {
    TransportRequest {
        method: Method::GET,
        path: SHIPMENTS_PATH.to_string(),
        query: equality_filter("order_id", &order_id.to_string()),
        body: None,
    }
}

/// Append a tracking entry to a shipment
pub fn append_track(track: &ShipmentTrack) -> serde_json::Result<TransportRequest> {
    Ok(TransportRequest {
        method: Method::POST,
        path: SHIPMENT_TRACK_PATH.to_string(),
        query: Vec::new(),
        body: Some(serde_json::to_value(EntityEnvelope { entity: track })?),
    })
}
