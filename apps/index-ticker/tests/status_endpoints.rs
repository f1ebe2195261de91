//! Status Endpoint Integration Tests
//!
//! Feed frames flow through `SnapshotSync` and show up on the HTTP routes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use index_ticker::infrastructure::status::router;
use index_ticker::{EntityStore, FeedConfig, FeedSubscription, SnapshotSync, StatusServerState};
use serde_json::Value;
use tower::ServiceExt;

use common::{TestFeed, wait_until};

async fn get_json(state: &Arc<StatusServerState>, uri: &str) -> (StatusCode, Value) {
    let response = router(Arc::clone(state))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn feed_updates_are_served() {
    let feed = TestFeed::start().await;
    let sync = Arc::new(SnapshotSync::new(Arc::new(EntityStore::seeded())));
    let mut subscription = FeedSubscription::new(FeedConfig::new(feed.url.clone()));
    let state = Arc::new(StatusServerState::new(
        "test",
        Arc::clone(&sync),
        subscription.feed_state(),
    ));

    subscription.open(Arc::clone(&sync)).await.unwrap();
    feed.send_text(r#"{"symbol":"NIFTY50","lastPrice":22050.5,"changePercent":0.7}"#);
    feed.send_text(r#"{"symbol":"MIDCAP","lastPrice":10500.0}"#);
    wait_until(|| sync.stats().total() == 2).await;

    let (status, nifty) = get_json(&state, "/snapshots/NIFTY50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(nifty["lastPrice"], 22050.5);
    assert_eq!(nifty["changePercent"], 0.7);
    assert_eq!(nifty["dayLow"], 21900.0);

    let (_, midcap) = get_json(&state, "/snapshots/MIDCAP").await;
    let keys: Vec<_> = midcap.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys.len(), 2, "only symbol and lastPrice expected: {keys:?}");

    let (_, all) = get_json(&state, "/snapshots").await;
    assert_eq!(all.as_array().unwrap().len(), 4);

    let (status, health) = get_json(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["feed"]["state"], "open");
    assert_eq!(health["feed"]["messages_received"], 2);
    assert_eq!(health["merges"]["created"], 1);
    assert_eq!(health["merges"]["updated"], 1);
    assert_eq!(health["entities"], 4);

    subscription.close().await;

    let (status, health) = get_json(&state, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["feed"]["state"], "closed");
}
