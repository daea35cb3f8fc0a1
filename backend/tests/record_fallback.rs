//! Behaviour of the record and list paths against scripted pools.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{Offset, Utc};
use click_recorder::domain::ports::{EventPoolError, PoolProfile};
use click_recorder::domain::{ClickService, ErrorCode, PoolContext, TransportFailureKind};
use click_recorder::inbound::gateway::{ClickGateway, ProxyRequest};
use mockable::DefaultClock;
use rstest::rstest;

mod support;

use support::{FakeBehaviour, FakePoolFactory, fake_target};

fn service_over(factory: Arc<FakePoolFactory>) -> ClickService {
    let pools = PoolContext::new(factory, fake_target(), PoolProfile::serverless());
    ClickService::new(
        Arc::new(pools),
        Arc::new(DefaultClock),
        Duration::from_secs(5),
    )
}

fn failing_ping(message: &str) -> FakeBehaviour {
    FakeBehaviour {
        ping: Some(EventPoolError::connect(
            TransportFailureKind::from_message(message),
            message,
        )),
        list: None,
    }
}

#[rstest]
#[case("dial tcp: lookup cluster.dsql.us-east-1.on.aws: no such host", true)]
#[case("dial tcp 10.0.0.1:5432: connect: connection refused", true)]
#[case("read tcp 10.0.0.2:5432: i/o timeout", true)]
#[case("FATAL: permission denied for database postgres", false)]
fn unreachable_markers_are_classified(#[case] message: &str, #[case] unreachable: bool) {
    let err = EventPoolError::connect(TransportFailureKind::from_message(message), message);
    assert_eq!(err.is_environment_unreachable(), unreachable);
}

#[rstest]
#[case("no such host")]
#[case("connection refused")]
#[case("i/o timeout")]
#[tokio::test]
async fn unreachable_ping_yields_mock_receipt(#[case] message: &str) {
    let factory = Arc::new(FakePoolFactory::new(vec![failing_ping(message)]));
    let service = service_over(Arc::clone(&factory));

    let receipt = service
        .record_event("UA-1", "10.0.0.5")
        .await
        .expect("mock receipt");

    assert!(receipt.local_mode);
    assert!(receipt.note.is_some());
    assert_eq!(factory.pool(0).inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unclassified_ping_failure_is_an_error() {
    let factory = Arc::new(FakePoolFactory::new(vec![failing_ping(
        "unexpected message type from server",
    )]));
    let service = service_over(Arc::clone(&factory));

    let err = service
        .record_event("UA-1", "10.0.0.5")
        .await
        .expect_err("genuine failure");

    assert_eq!(err.code(), ErrorCode::Connection);
    assert!(!err.message().contains("mock"));
    assert_eq!(factory.pool(0).inserts.load(Ordering::SeqCst), 0);
    assert_eq!(factory.pool(0).closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn record_then_list_round_trips_in_memory() {
    let factory = Arc::new(FakePoolFactory::new(vec![FakeBehaviour::default()]));
    let service = service_over(Arc::clone(&factory));

    let receipt = service
        .record_event("UA-1", "10.0.0.5")
        .await
        .expect("receipt");
    let rows = service.list_events().await.expect("rows");

    assert!(!receipt.local_mode);
    assert_eq!(rows.len(), 1);
    let row = serde_json::to_value(&rows[0]).expect("row json");
    assert_eq!(row["id"], receipt.inserted_id);
    assert_eq!(row["user_agent"], "UA-1");
    assert_eq!(row["ip_address"], "10.0.0.5");
    assert_eq!(factory.builds(), 1);
}

#[tokio::test]
async fn list_failure_rebuilds_the_pool_on_next_call() {
    let factory = Arc::new(FakePoolFactory::new(vec![
        FakeBehaviour {
            ping: None,
            list: Some(EventPoolError::query("relation \"button_clicks\" does not exist")),
        },
        FakeBehaviour::default(),
    ]));
    let service = service_over(Arc::clone(&factory));

    let err = service.list_events().await.expect_err("query failure");
    let rows = service.list_events().await.expect("second call succeeds");

    assert_eq!(err.code(), ErrorCode::Query);
    assert!(rows.is_empty());
    assert_eq!(factory.builds(), 2);
    assert_eq!(factory.pool(0).closes.load(Ordering::SeqCst), 1);
    assert_eq!(service.pools().generation().await, 2);
}

#[tokio::test]
async fn options_never_builds_a_pool() {
    let factory = Arc::new(FakePoolFactory::new(vec![FakeBehaviour::default()]));
    let service = Arc::new(service_over(Arc::clone(&factory)));
    let gateway = ClickGateway::new(Ok(service), "cluster", Utc.fix(), Arc::new(DefaultClock));
    let request = ProxyRequest {
        http_method: "OPTIONS".to_owned(),
        ..ProxyRequest::default()
    };

    let responses = [
        gateway.handle(&request).await,
        gateway.handle_record(&request).await,
        gateway.handle_list(&request).await,
    ];

    assert!(responses.iter().all(|r| r.status_code == 200 && r.body.is_empty()));
    assert_eq!(factory.builds(), 0);
}
