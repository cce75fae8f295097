//! Tracking records and the remote order/shipment shapes

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The four required fields of a tracking record, in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    OrderNumber,
    TrackingNumber,
    CarrierCode,
    Title,
}

impl RecordField {
    /// Fixed check order used by [`TrackingRecord::validate`] and the header mapping
    pub const ALL: [RecordField; 4] = [
        RecordField::OrderNumber,
        RecordField::TrackingNumber,
        RecordField::CarrierCode,
        RecordField::Title,
    ];

    /// CSV column name for this field
    pub fn column(self) -> &'static str {
        match self {
            RecordField::OrderNumber => "order_number",
            RecordField::TrackingNumber => "tracking_number",
            RecordField::CarrierCode => "carrier_code",
            RecordField::Title => "title",
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordField::OrderNumber => write!(f, "order number"),
            RecordField::TrackingNumber => write!(f, "tracking number"),
            RecordField::CarrierCode => write!(f, "carrier code"),
            RecordField::Title => write!(f, "title"),
        }
    }
}

/// One row of a tracking batch file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub order_number: String,
    pub tracking_number: String,
    pub carrier_code: String,
    pub title: String,
}

impl TrackingRecord {
    /// Build a record from raw cell values, trimming surrounding whitespace
    pub fn new(
        order_number: &str,
        tracking_number: &str,
        carrier_code: &str,
        title: &str,
    ) -> Self {
        Self {
            order_number: order_number.trim().to_string(),
            tracking_number: tracking_number.trim().to_string(),
            carrier_code: carrier_code.trim().to_string(),
            title: title.trim().to_string(),
        }
    }

    pub fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::OrderNumber => &self.order_number,
            RecordField::TrackingNumber => &self.tracking_number,
            RecordField::CarrierCode => &self.carrier_code,
            RecordField::Title => &self.title,
        }
    }

    /// Reject the record if any required field is blank
    ///
    /// Fields are checked in [`RecordField::ALL`] order and the first blank
    /// one is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match RecordField::ALL
            .into_iter()
            .find(|field| self.field(*field).trim().is_empty())
        {
            Some(field) => Err(ValidationError::MissingField(field)),
            None => Ok(()),
        }
    }
}

/// Remote order, looked up by its increment identifier (the order number)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub entity_id: i64,
    pub increment_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Remote shipment belonging to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub entity_id: i64,
    #[serde(default)]
    pub increment_id: Option<String>,
    pub order_id: i64,
}

/// Search envelope returned by the order and shipment listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
}

impl<T> SearchResult<T> {
    /// Items of the listing, or none when the service reports an empty result
    pub fn into_items(self) -> Vec<T> {
        if self.total_count == 0 {
            Vec::new()
        } else {
            self.items
        }
    }
}

/// Tracking entry appended to a shipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentTrack {
    pub order_id: i64,
    pub parent_id: i64,
    pub track_number: String,
    pub title: String,
    pub carrier_code: String,
}

/// Write bodies are wrapped in an `entity` envelope
#[derive(Debug, Clone, Serialize)]
pub struct EntityEnvelope<'a, T> {
    pub entity: &'a T,
}
