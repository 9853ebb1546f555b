//! HTTP storage and tracking collaborators against a mock server.

use crate::helpers::{is_player_load, structured, wait_for};
use reel::config::ReelConfig;
use reel::storage::{HttpSigningStorage, VideoStorage, playable_url};
use reel::tracking::{FetchRecord, HttpTracker, Tracker};
use reel::{CatalogEntry, Collaborators, EventSource, PlaybackRuntime, RuntimeEvent, VideoCatalog};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn signing_joins_relative_urls_onto_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/sign"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({"path": "videos/tour.mp4", "expires_in": 60})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"signedURL": "/object/sign/videos/tour.mp4?token=abc"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = HttpSigningStorage::new(
        &format!("{}/storage/v1/sign", server.uri()),
        Some("secret".into()),
    )
    .expect("storage");
    let url = storage
        .signed_url("videos/tour.mp4", Duration::from_secs(60))
        .await
        .expect("signed url");
    assert_eq!(url, format!("{}/object/sign/videos/tour.mp4?token=abc", server.uri()));
}

#[tokio::test]
async fn absolute_sources_skip_signing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let storage = HttpSigningStorage::new(&server.uri(), None).expect("storage");
    let url = playable_url(&storage, " https://cdn.example.test/a.mp4 ", Duration::from_secs(5))
        .await
        .expect("pass-through");
    assert_eq!(url, "https://cdn.example.test/a.mp4");
}

#[tokio::test]
async fn signing_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let storage = HttpSigningStorage::new(&server.uri(), None).expect("storage");
    let err = storage
        .signed_url("videos/tour.mp4", Duration::from_secs(5))
        .await
        .expect_err("forbidden");
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn tracker_posts_fetch_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(json!({"event": "fetch_video", "title": "Welcome Tour", "index": 0})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = HttpTracker::new(&format!("{}/events", server.uri()), None).expect("tracker");
    tracker
        .record_fetch(&FetchRecord::new("Welcome Tour", 0))
        .await
        .expect("tracked");
}

/// Runtime wired to a mock server for both signing and tracking.
fn mocked_runtime(server: &MockServer) -> (PlaybackRuntime, broadcast::Receiver<RuntimeEvent>) {
    let mut config = ReelConfig::default();
    config.storage.signed_url_endpoint = Some(format!("{}/sign", server.uri()));
    config.tracking.endpoint = Some(format!("{}/track", server.uri()));
    let collaborators = Collaborators::from_config(&config).expect("collaborators");

    let (tx, rx) = broadcast::channel(64);
    let mut runtime = PlaybackRuntime::new(&config, collaborators, tx);
    runtime.start_session(
        VideoCatalog::new(vec![CatalogEntry::new("Welcome Tour", "videos/tour.mp4")])
            .expect("catalog"),
    );
    (runtime, rx)
}

async fn wait_for_requests(server: &MockServer, route: &str, count: usize) -> bool {
    for _ in 0..50 {
        let seen = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == route)
            .count();
        if seen >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn runtime_loads_signed_url_and_tracks_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"signed_url": "https://cdn.example.test/tour.mp4?sig=1"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/track"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (mut runtime, mut rx) = mocked_runtime(&server);
    runtime.handle_event(
        EventSource::Broadcast,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
    );

    let load = wait_for(&mut rx, Duration::from_secs(2), is_player_load)
        .await
        .expect("player load");
    assert_eq!(
        load,
        RuntimeEvent::PlayerLoad {
            title: "Welcome Tour".into(),
            index: 0,
            url: "https://cdn.example.test/tour.mp4?sig=1".into(),
        }
    );
    assert!(wait_for_requests(&server, "/track", 1).await);
}

#[tokio::test]
async fn collaborator_failures_never_touch_playback_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mut runtime, mut rx) = mocked_runtime(&server);
    runtime.handle_event(
        EventSource::Broadcast,
        &structured("fetch_video", json!({"title": "Welcome Tour"})),
    );
    assert!(wait_for_requests(&server, "/sign", 1).await);
    assert!(wait_for_requests(&server, "/track", 1).await);

    let load = wait_for(&mut rx, Duration::from_millis(200), is_player_load).await;
    assert!(load.is_none());
    assert_eq!(
        runtime.session().current_video().map(|v| v.title.as_str()),
        Some("Welcome Tour")
    );
}
