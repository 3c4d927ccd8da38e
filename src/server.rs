//! HTTP surface of the browser display.
//!
//! `GET /current-track` answers from the last poll; playback commands go
//! through the [`CommandRelay`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::error::RelayError;
use crate::relay::CommandRelay;
use crate::state::SnapshotCell;
use crate::types::{Snapshot, TrackPayload};

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

#[derive(Clone)]
pub struct AppState {
    pub snapshot: SnapshotCell,
    pub relay: Arc<CommandRelay>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/current-track", get(current_track))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Display server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn current_track(State(state): State<AppState>) -> Response {
    match state.snapshot.load().as_ref() {
        Snapshot::Track(track) => Json(TrackPayload::from(track)).into_response(),
        Snapshot::Pending | Snapshot::Idle => Json(TrackPayload::idle()).into_response(),
        Snapshot::Failed(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response(),
    }
}

async fn play(State(state): State<AppState>) -> Response {
    command_response("Play", state.relay.play().await)
}

async fn pause(State(state): State<AppState>) -> Response {
    command_response("Pause", state.relay.pause().await)
}

async fn next(State(state): State<AppState>) -> Response {
    command_response("Next", state.relay.next().await)
}

async fn previous(State(state): State<AppState>) -> Response {
    command_response("Previous", state.relay.previous().await)
}

fn command_response(command: &str, result: Result<(), RelayError>) -> Response {
    match result {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => {
            log::error!("{} error: {}", command, err);
            let status = match err {
                RelayError::NoDevice => StatusCode::NOT_FOUND,
                RelayError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub::{device, Call, StubClient};
    use crate::error::ProviderError;
    use crate::types::sample_state;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(stub: &Arc<StubClient>) -> (Router, SnapshotCell) {
        let snapshot = SnapshotCell::new();
        let relay = CommandRelay::new(stub.clone()).with_skip_settle(Duration::ZERO);
        let router = create_router(AppState {
            snapshot: snapshot.clone(),
            relay: Arc::new(relay),
        });
        (router, snapshot)
    }

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_serves_the_page() {
        let (router, _) = app(&Arc::new(StubClient::default()));
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("/current-track"));
    }

    #[test]
    fn page_clears_the_track_when_nothing_plays() {
        let clear = INDEX_HTML
            .split("function clearTrack()")
            .nth(1)
            .and_then(|rest| rest.split("\n    }\n").next())
            .expect("clearTrack helper");
        for reset in [
            "'No Track Playing'",
            "'album-art').src = ''",
            "style.width = '0%'",
            "'current-time').textContent = '0:00'",
            "'total-time').textContent = '0:00'",
        ] {
            assert!(clear.contains(reset), "missing {reset}");
        }

        let update = INDEX_HTML
            .split("async function updateCurrentTrack()")
            .nth(1)
            .expect("update function");
        let error_branch = update.split("} else if (data.name)").next().unwrap();
        assert!(error_branch.contains("clearTrack();"));
        let idle_branch = update.split("} else {").nth(1).unwrap();
        assert!(idle_branch.trim_start().starts_with("clearTrack();"));
    }

    #[tokio::test]
    async fn current_track_before_first_poll_is_not_playing() {
        let (router, _) = app(&Arc::new(StubClient::default()));
        let (status, body) = send(router, "GET", "/current-track").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "playing": false }));
    }

    #[tokio::test]
    async fn current_track_idle_has_no_track_fields() {
        let (router, snapshot) = app(&Arc::new(StubClient::default()));
        snapshot.store(Snapshot::Idle);
        let (_, body) = send(router, "GET", "/current-track").await;
        assert_eq!(body, json!({ "playing": false }));
    }

    #[tokio::test]
    async fn current_track_reports_full_payload() {
        let (router, snapshot) = app(&Arc::new(StubClient::default()));
        snapshot.store(Snapshot::Track(sample_state("Song", "Artist")));

        let (status, body) = send(router, "GET", "/current-track").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["playing"], json!(true));
        assert_eq!(body["name"], json!("Song"));
        assert_eq!(body["artist"], json!("Artist"));
        assert_eq!(body["albumArt"], json!("https://i.scdn.co/image/abc"));
        assert_eq!(body["progress"], json!(42000));
    }

    #[tokio::test]
    async fn current_track_failure_is_500() {
        let (router, snapshot) = app(&Arc::new(StubClient::default()));
        snapshot.store(Snapshot::Failed("http error: status code 401".into()));
        let (status, body) = send(router, "GET", "/current-track").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "http error: status code 401" }));
    }

    #[tokio::test]
    async fn play_without_devices_is_404_payload() {
        let stub = Arc::new(StubClient::with_devices(Vec::new()));
        let (router, _) = app(&stub);
        let (status, body) = send(router, "POST", "/play").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "No devices available" }));
    }

    #[tokio::test]
    async fn pause_reports_success() {
        let stub = Arc::new(StubClient::with_devices(vec![device("desk", true)]));
        let (router, _) = app(&stub);
        let (status, body) = send(router, "POST", "/pause").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
        assert_eq!(stub.calls().last(), Some(&Call::Pause(Some("desk".into()))));
    }

    #[tokio::test]
    async fn provider_failure_is_500_payload() {
        let stub = Arc::new(StubClient::default());
        stub.fail_commands(ProviderError::Request("Player command failed".into()));
        let (router, _) = app(&stub);
        let (status, body) = send(router, "POST", "/next").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Player command failed" }));
    }

    #[tokio::test]
    async fn commands_reject_get() {
        let (router, _) = app(&Arc::new(StubClient::default()));
        let response = router
            .oneshot(Request::builder().uri("/previous").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
