//! Remote client over real HTTP against a mock order service

use serde_json::json;
use trackport_ingest::{RemoteClient, RemoteConfig, RemoteError, SyncOutcome, TrackingRecord};
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const FILTER: &str = "searchCriteria[filter_groups][0][filters][0]";

fn client(server: &MockServer, max_retries: u32) -> RemoteClient {
    let mut config = RemoteConfig::new(format!("{}/rest/V1/", server.uri()), "secret-token");
    config.max_retries = max_retries;
    config.retry_backoff_ms = 1;
    RemoteClient::from_config(&config).expect("Failed to build client")
}

async fn mount_order(server: &MockServer, order_number: &str, entity_id: i64) {
    Mock::given(method("GET"))
        .and(path("/rest/V1/orders"))
        .and(query_param(format!("{}[field]", FILTER), "increment_id"))
        .and(query_param(format!("{}[value]", FILTER), order_number))
        .and(query_param(format!("{}[condition_type]", FILTER), "eq"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "entity_id": entity_id, "increment_id": order_number, "status": "processing" }],
            "total_count": 1
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_order_lookup_sends_bearer_token_and_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/V1/orders"))
        .and(header("authorization", "Bearer secret-token"))
        .and(query_param(format!("{}[value]", FILTER), "100000123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "entity_id": 17, "increment_id": "100000123" }],
            "total_count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = client(&server, 3)
        .find_order_by_number("100000123")
        .await
        .expect("Order lookup failed");

    assert_eq!(order.entity_id, 17);
    assert_eq!(order.increment_id, "100000123");
}

#[tokio::test]
async fn test_sync_appends_to_first_shipment() {
    let server = MockServer::start().await;
    mount_order(&server, "100000123", 17).await;

    Mock::given(method("GET"))
        .and(path("/rest/V1/shipments"))
        .and(query_param(format!("{}[field]", FILTER), "order_id"))
        .and(query_param(format!("{}[value]", FILTER), "17"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "entity_id": 300, "order_id": 17 },
                { "entity_id": 301, "order_id": 17 }
            ],
            "total_count": 2
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/V1/shipment/track"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "entity": {
                "order_id": 17,
                "parent_id": 300,
                "track_number": "1Z999AA10123456784",
                "title": "UPS Ground",
                "carrier_code": "ups"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("12"))
        .expect(1)
        .mount(&server)
        .await;

    let record = TrackingRecord::new("100000123", "1Z999AA10123456784", "ups", "UPS Ground");
    let outcome = client(&server, 3)
        .sync_tracking(&record)
        .await
        .expect("Sync failed");

    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            order_id: 17,
            shipment_id: 300
        }
    );
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/V1/orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "items": [], "total_count": 0 })),
        )
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .find_order_by_number("nope")
        .await
        .expect_err("Lookup should fail");

    assert!(matches!(err, RemoteError::NotFound { .. }));
}

#[tokio::test]
async fn test_server_errors_retried_until_budget_spent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/V1/shipments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .find_shipments_for_order(17)
        .await
        .expect_err("Lookup should fail");

    match err {
        RemoteError::Transport {
            attempts,
            status,
            body,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(status, Some(500));
            assert_eq!(body.as_deref(), Some("database unavailable"));
        },
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_success_body_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/V1/shipment/track"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = TrackingRecord::new("1", "TN", "dhl", "DHL");
    client(&server, 3)
        .append_tracking(5, 1, &record)
        .await
        .expect("Append failed");
}
