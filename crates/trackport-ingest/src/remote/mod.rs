//! Remote order service access
//!
//! - [`transport`]: the request/response seam and its HTTP implementation
//! - [`endpoints`]: request builders for orders, shipments and tracking
//! - [`client`]: retrying client and the per-record sync flow

pub mod client;
pub mod endpoints;
pub mod transport;

pub use client::{RemoteClient, SyncOutcome};
pub use transport::{
    HttpTransport, Transport, TransportFailure, TransportRequest, TransportResponse,
};
