mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use purge_core::{Partition, PartitionPlan, Signal};
use purge_engine::{
    Confirmation, ContentSource, Controller, DeletionActions, EngineParts, Governor,
    GovernedTransport, HttpContentSource, HttpDeletionActions, MemoryCursorStore, ReqwestTransport,
    RunEnd, SourceError, Transport, TransportErrorKind, TransportRequest, TransportSettings,
};
use serde_json::json;
use support::*;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> ReqwestTransport {
    init_logging();
    ReqwestTransport::new(TransportSettings {
        base_url: format!("{}/api", server.uri()),
        ..TransportSettings::default()
    })
    .unwrap()
}

fn iso_days_ago(days: i64) -> String {
    (now() - chrono::Duration::days(days)).to_rfc3339()
}

#[tokio::test]
async fn requests_are_resolved_against_the_base_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .and(query_param("sort", "hot"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server)
        .execute(TransportRequest::get("/listing").with_query("sort", "hot"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"{}");
}

#[tokio::test]
async fn non_success_status_is_a_response_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items/x/delete"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let response = transport(&server)
        .execute(TransportRequest::post("items/x/delete"))
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    let err = response.require_success().unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::HttpStatus(503));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(TransportSettings {
        base_url: server.uri(),
        max_bytes: 16,
        ..TransportSettings::default()
    })
    .unwrap();
    let err = transport
        .execute(TransportRequest::get("api/listing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, TransportErrorKind::TooLarge { max_bytes: 16 });
}

#[tokio::test]
async fn governed_transport_reports_throttling_to_the_governor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let governor = Governor::new(test_config().rate_limit);
    let governed = GovernedTransport::new(transport(&server), governor.clone());

    for _ in 0..2 {
        let response = governed.execute(TransportRequest::get("listing")).await.unwrap();
        assert!(response.is_throttled());
    }
    let snapshot = governor.snapshot();
    assert!(snapshot.active);
    assert_eq!(snapshot.multiplier, 2);

    governed.execute(TransportRequest::get("listing")).await.unwrap();
    assert_eq!(governor.snapshot().multiplier, 1);
}

#[tokio::test]
async fn unreachable_remote_does_not_touch_the_governor() {
    init_logging();
    // Nothing listens on port 1, so the connection is refused outright.
    let base_url = "http://127.0.0.1:1/api".to_string();
    let governor = Governor::new(test_config().rate_limit);
    governor.observe(Signal::Throttled);
    governor.observe(Signal::Throttled);
    let governed = GovernedTransport::new(
        ReqwestTransport::new(TransportSettings {
            base_url,
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(1),
            ..TransportSettings::default()
        })
        .unwrap(),
        governor.clone(),
    );

    assert!(governed.execute(TransportRequest::get("listing")).await.is_err());
    assert_eq!(governor.snapshot().multiplier, 2);
}

#[tokio::test]
async fn listing_is_parsed_and_paginated_by_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .and(query_param("sort", "new"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "a", "created_at": "2024-01-01T00:00:00Z", "text": "hello" },
                { "id": "b", "created_at": 1700000000 }
            ],
            "after": "t2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .and(query_param("sort", "new"))
        .and(query_param("after", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "c" }],
            "after": null
        })))
        .mount(&server)
        .await;

    let mut source = HttpContentSource::new(Arc::new(transport(&server)), "listing");
    source.navigate_to(Partition::New).await.unwrap();
    assert_eq!(source.current_partition().await, Some(Partition::New));

    let first = source.list_candidates().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].handle.0, "a");
    assert_eq!(first[0].created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(first[0].text.as_deref(), Some("hello"));
    assert_eq!(first[1].created_at.as_deref(), Some("1700000000"));
    assert!(first[1].created_at_utc().is_some());
    assert!(source.has_next_page().await);

    source.go_to_next_page().await.unwrap();
    let second = source.list_candidates().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].created_at, None);
    assert!(!source.has_next_page().await);
}

#[tokio::test]
async fn throttled_listing_is_reported_as_throttling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let governor = Governor::new(test_config().rate_limit);
    let governed = GovernedTransport::new(transport(&server), governor.clone());
    let mut source = HttpContentSource::new(Arc::new(governed), "listing");
    source.navigate_to(Partition::New).await.unwrap();

    let result = source.list_candidates().await;

    assert!(matches!(result, Err(SourceError::Throttled)), "{result:?}");
    assert!(governor.snapshot().active);
}

#[tokio::test]
async fn listing_before_navigation_is_an_error() {
    let server = MockServer::start().await;
    let mut source = HttpContentSource::new(Arc::new(transport(&server)), "listing");
    assert!(source.list_candidates().await.is_err());
}

#[tokio::test]
async fn delete_protocol_posts_begin_then_confirm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items/a/delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "confirmation": "tok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/a/delete/confirm"))
        .and(body_json(json!({ "confirmation": "tok" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let actions = HttpDeletionActions::new(Arc::new(transport(&server)));
    let candidate = aged("a", 40);
    let confirmation = actions.begin_delete(&candidate).await.unwrap();
    assert_eq!(confirmation, Some(Confirmation("tok".to_string())));

    actions
        .confirm_delete(&candidate, Confirmation("tok".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn forbidden_or_missing_items_offer_no_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items/theirs/delete"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/gone/delete"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/blank/delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let actions = HttpDeletionActions::new(Arc::new(transport(&server)));
    for id in ["theirs", "gone", "blank"] {
        assert_eq!(actions.begin_delete(&aged(id, 40)).await.unwrap(), None, "{id}");
    }
}

#[tokio::test]
async fn server_error_on_begin_is_a_transport_fault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items/a/delete"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let actions = HttpDeletionActions::new(Arc::new(transport(&server)));
    let err = actions.begin_delete(&aged("a", 40)).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::HttpStatus(500));
}

#[tokio::test]
async fn controller_runs_end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .and(query_param("sort", "new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "young", "created_at": iso_days_ago(2) },
                { "id": "old", "created_at": iso_days_ago(30) }
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "young", "created_at": iso_days_ago(2) }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/old/delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "confirmation": "c-old" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/old/delete/confirm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/items/young/delete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.confirm_delay = Duration::from_millis(5);
    config.page_delay = Duration::from_millis(5);
    let plan = PartitionPlan::new(vec![Partition::New, Partition::Top]).unwrap();
    let governor = Governor::new(config.rate_limit);
    let transport: Arc<dyn Transport> =
        Arc::new(GovernedTransport::new(transport(&server), governor.clone()));
    let store = MemoryCursorStore::new(plan.clone());
    let sink = RecordingSink::default();
    let mut controller = Controller::new(
        EngineParts {
            plan,
            source: Box::new(HttpContentSource::new(transport.clone(), "listing")),
            actions: Arc::new(HttpDeletionActions::new(transport)),
            store: Box::new(store.clone()),
            governor,
            config,
        },
        Arc::new(sink.clone()),
    );

    let end = controller.run(TEN_DAYS, &CancellationToken::new()).await;

    assert_eq!(end, RunEnd::Complete);
    assert_eq!(sink.completed_partitions(), vec![Partition::New, Partition::Top]);
    assert_eq!(controller.counters().deleted, 1);
    assert_eq!(controller.counters().preserved, 1);
    assert_eq!(store.raw(), None);
}
