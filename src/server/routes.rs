//! HTTP routes
//!
//! - `GET /push` streams orchestrator frames
//! - `GET /logs?client=<id>&levels=a,b&branches=a,b` or `&keywords=a,b`
//!   streams hub log events
//! - `POST /control?client=<id>` applies a hub control message

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::PushServerConfig;
use super::sse_adapter::SseAdapter;
use crate::hub::{ClientFilter, FilterSpec, HubError, LogStreamHub};
use crate::orchestrator::PushOrchestrator;
use crate::wire::SseEvent;

const MAX_CLIENT_ID_LEN: usize = 64;

fn is_valid_client_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CLIENT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// State shared by every handler
pub(crate) struct AppState {
    pub(crate) config: PushServerConfig,
    pub(crate) orchestrator: Arc<PushOrchestrator>,
    pub(crate) hub: Arc<LogStreamHub>,
    next_stream_id: AtomicU64,
    stream_slots: Option<Arc<Semaphore>>,
    /// Flipped to `true` to end every open event stream
    pub(crate) shutdown: watch::Sender<bool>,
}

impl AppState {
    pub(crate) fn new(
        config: PushServerConfig,
        orchestrator: Arc<PushOrchestrator>,
        hub: Arc<LogStreamHub>,
    ) -> Self {
        let stream_slots = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            orchestrator,
            hub,
            next_stream_id: AtomicU64::new(1),
            stream_slots,
            shutdown: watch::Sender::new(false),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve a stream slot, or `503` when the limit is reached
    fn acquire_slot(&self) -> Result<Option<OwnedSemaphorePermit>, StatusCode> {
        match &self.stream_slots {
            Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(_) => {
                    tracing::warn!(
                        max = self.config.max_connections,
                        "Stream rejected: limit reached"
                    );
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                }
            },
            None => Ok(None),
        }
    }
}

/// Build the axum router
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_request_bytes;
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/push", get(push_stream))
        .route("/logs", get(log_stream))
        .route("/control", post(control))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Who to deregister when a stream goes away
enum Departure {
    Push {
        orchestrator: Arc<PushOrchestrator>,
        id: String,
    },
    Logs {
        hub: Arc<LogStreamHub>,
        id: String,
    },
}

/// Lives as long as a response stream; deregisters the stream and frees its
/// slot when dropped
struct StreamGuard {
    departure: Option<Departure>,
    _slot: Option<OwnedSemaphorePermit>,
}

impl StreamGuard {
    fn new(departure: Departure, slot: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            departure: Some(departure),
            _slot: slot,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(departure) = self.departure.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        runtime.spawn(async move {
            match departure {
                Departure::Push { orchestrator, id } => {
                    orchestrator.remove_connection(&id).await;
                }
                Departure::Logs { hub, id } => {
                    hub.remove_client(&id).await;
                }
            }
        });
    }
}

/// SSE response over a queue of events
///
/// Ends when the queue closes or the server shuts down.
fn event_stream(
    state: &AppState,
    rx: mpsc::Receiver<SseEvent>,
    guard: StreamGuard,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut shutdown = state.shutdown.subscribe();
    let stopped = async move {
        // Dropped with the response body
        let _guard = guard;
        let _ = shutdown.wait_for(|stop| *stop).await;
    };

    let stream = ReceiverStream::new(rx)
        .take_until(stopped)
        .map(|event| Ok(Event::from(event)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.config.keep_alive_interval))
}

async fn push_stream(State(state): State<Arc<AppState>>) -> Response {
    let slot = match state.acquire_slot() {
        Ok(slot) => slot,
        Err(status) => return status.into_response(),
    };

    let id = format!("push-{}", state.next_id());
    let (adapter, rx) = SseAdapter::channel(
        id.clone(),
        state.config.channel_capacity,
        state.config.slow_threshold,
        state.config.send_timeout,
    );
    state.orchestrator.add_connection(Arc::new(adapter)).await;

    let guard = StreamGuard::new(
        Departure::Push {
            orchestrator: Arc::clone(&state.orchestrator),
            id,
        },
        slot,
    );
    event_stream(&state, rx, guard).into_response()
}

/// Query string of `GET /logs`
#[derive(Debug, Default, Deserialize)]
struct LogsQuery {
    client: Option<String>,
    branches: Option<String>,
    levels: Option<String>,
    keywords: Option<String>,
}

/// Initial filter from `branches`/`levels` or `keywords` lists
fn filter_from_query(query: &LogsQuery) -> Result<Option<ClientFilter>, String> {
    let list = |value: &Option<String>| -> Option<Vec<String>> {
        value.as_ref().map(|v| {
            v.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    };

    let spec = match (
        list(&query.keywords),
        list(&query.branches),
        list(&query.levels),
    ) {
        (Some(keywords), _, _) => FilterSpec::Keyword { keywords },
        (None, None, None) => return Ok(None),
        (None, branches, levels) => FilterSpec::BranchesLevels {
            branches: branches.unwrap_or_default(),
            levels: levels.unwrap_or_default(),
        },
    };

    ClientFilter::from_spec(spec).map(Some)
}

fn hub_error_status(error: &HubError) -> StatusCode {
    match error {
        HubError::DuplicateClient(_) => StatusCode::CONFLICT,
        HubError::MaxClients(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn log_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let id = match query.client.as_deref() {
        Some(id) if is_valid_client_id(id) => id.to_string(),
        Some(_) => return (StatusCode::BAD_REQUEST, "invalid client id").into_response(),
        None => format!("log-{}", state.next_id()),
    };

    let filter = match filter_from_query(&query) {
        Ok(filter) => filter,
        Err(reason) => {
            tracing::debug!(client = %id, reason = %reason, "Invalid filter in query");
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    let slot = match state.acquire_slot() {
        Ok(slot) => slot,
        Err(status) => return status.into_response(),
    };

    let stream = match state.hub.add_client(id.clone(), filter).await {
        Ok(stream) => stream,
        Err(e) => return (hub_error_status(&e), e.to_string()).into_response(),
    };

    let guard = StreamGuard::new(
        Departure::Logs {
            hub: Arc::clone(&state.hub),
            id,
        },
        slot,
    );
    event_stream(&state, stream.into_receiver(), guard).into_response()
}

/// Query string of `POST /control`
#[derive(Debug, Default, Deserialize)]
struct ControlQuery {
    #[serde(default)]
    client: String,
}

async fn control(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ControlQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let message = match payload {
        Ok(Json(value)) => Some(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection.into_response();
        }
        Err(rejection) => {
            tracing::debug!(client = %query.client, error = %rejection, "Control body rejected");
            None
        }
    };

    let response = state.hub.handle_control_value(&query.client, message).await;
    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::clock::ManualClock;
    use crate::emitter::{EmitterRegistry, HeartbeatEmitter};
    use crate::hub::{HubConfig, LogEvent};
    use crate::orchestrator::OrchestratorConfig;

    const START: u64 = 1_700_000_000_000;

    fn state(config: PushServerConfig) -> (Arc<AppState>, ManualClock) {
        let clock = ManualClock::new(START);

        let mut registry = EmitterRegistry::new();
        registry
            .register(Arc::new(HeartbeatEmitter::new("hb", 1_000)))
            .unwrap();
        registry.seal();

        let orchestrator = Arc::new(
            PushOrchestrator::new(
                OrchestratorConfig::default(),
                Arc::new(registry),
                Arc::new(clock.clone()),
            )
            .unwrap(),
        );
        let hub = Arc::new(LogStreamHub::new(
            HubConfig::default(),
            Arc::new(clock.clone()),
        ));

        (Arc::new(AppState::new(config, orchestrator, hub)), clock)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Read body chunks until one contains `needle`
    async fn read_until(body: &mut axum::body::BodyDataStream, needle: &str) -> String {
        let read = async {
            let mut seen = String::new();
            while !seen.contains(needle) {
                let chunk = body.next().await.expect("stream ended").unwrap();
                seen.push_str(std::str::from_utf8(&chunk).unwrap());
            }
            seen
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    async fn wait_until_empty(orchestrator: &PushOrchestrator) {
        for _ in 0..100 {
            if orchestrator.connection_ids().await.is_empty() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("connection still registered");
    }

    #[test]
    fn test_client_id_validation() {
        assert!(is_valid_client_id("viewer-1.a_b"));
        assert!(!is_valid_client_id(""));
        assert!(!is_valid_client_id("bad id"));
        assert!(!is_valid_client_id(&"x".repeat(65)));
    }

    #[test]
    fn test_filter_from_query() {
        let query = LogsQuery {
            levels: Some("error,warn".into()),
            ..Default::default()
        };
        let filter = filter_from_query(&query).unwrap().unwrap();
        assert!(filter.matches(&crate::hub::FilterInput {
            level: "warn",
            branch: "api",
            message: "",
        }));

        assert!(filter_from_query(&LogsQuery::default()).unwrap().is_none());

        let query = LogsQuery {
            keywords: Some(String::new()),
            ..Default::default()
        };
        assert!(filter_from_query(&query).is_err());
    }

    #[tokio::test]
    async fn test_push_stream_receives_heartbeat() {
        let (state, clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));

        let response = app.oneshot(get("/push")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(state.orchestrator.connection_ids().await, vec!["push-1"]);

        clock.advance(100);
        state.orchestrator.tick().await;

        let mut body = response.into_body().into_data_stream();
        let seen = read_until(&mut body, "\"t\":\"hb\"").await;
        assert!(seen.contains("event: heartbeat\n"));
        assert!(seen.contains(&format!("id: {}\n", START + 100)));

        drop(body);
        wait_until_empty(&state.orchestrator).await;
    }

    #[tokio::test]
    async fn test_log_stream_and_control() {
        let (state, _clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));
        let hub = Arc::clone(&state.hub);

        // Percent-encoded comma in the level list
        let response = app
            .clone()
            .oneshot(get("/logs?client=viewer&levels=error%2Cwarn"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let mut body = response.into_body().into_data_stream();
        read_until(&mut body, "event: ready").await;

        hub.broadcast_log(LogEvent::new(1, "debug", "api", "hidden")).await;
        hub.broadcast_log(LogEvent::new(2, "warn", "api", "careful")).await;
        let seen = read_until(&mut body, "careful").await;
        assert!(!seen.contains("hidden"));

        let response = app
            .clone()
            .oneshot(post_json(
                "/control?client=viewer",
                r#"{"type":"filter:update","tag":"t1","spec":{"kind":"branches-levels","levels":["error"]}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"type":"filter:ack","tag":"t1"}"#);

        hub.broadcast_log(LogEvent::new(3, "warn", "api", "skip me")).await;
        hub.broadcast_log(LogEvent::new(4, "error", "api", "boom")).await;
        let seen = read_until(&mut body, "boom").await;
        assert!(!seen.contains("skip me"));

        let stats = hub.client_stats("viewer").await.unwrap();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.filtered_out, 2);

        drop(body);
        for _ in 0..100 {
            if hub.client_count().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(hub.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_control_body_not_json() {
        let (state, _clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));
        let _stream = state.hub.add_client("c1", None).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/control?client=c1")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            body_text(response).await,
            r#"{"type":"filter:error","tag":"","reason":"invalid_message"}"#
        );

        let response = app
            .oneshot(post_json("/control", r#"{"type":"filter:update","tag":"x"}"#))
            .await
            .unwrap();
        assert_eq!(
            body_text(response).await,
            r#"{"type":"filter:error","tag":"x","reason":"auth_failed"}"#
        );
    }

    #[tokio::test]
    async fn test_control_body_too_large() {
        let (state, _clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));

        let huge = format!(r#"{{"tag":"{}"}}"#, "x".repeat(16 * 1024));
        let response = app
            .oneshot(post_json("/control?client=c1", &huge))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_log_stream_rejections() {
        let (state, _clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));

        let response = app
            .clone()
            .oneshot(get("/logs?client=bad%20id"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(get("/logs?keywords=")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let first = app.clone().oneshot(get("/logs?client=dup")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.clone().oneshot(get("/logs?client=dup")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let response = app.oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        drop(first);
    }

    #[tokio::test]
    async fn test_stream_limit() {
        let (state, _clock) = state(PushServerConfig::default().max_connections(1));
        let app = router(Arc::clone(&state));

        let first = app.clone().oneshot(get("/push")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.clone().oneshot(get("/push")).await.unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        let logs = app.clone().oneshot(get("/logs")).await.unwrap();
        assert_eq!(logs.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.hub.client_count().await, 0);

        // Dropping the stream frees its slot
        drop(first);
        let third = app.oneshot(get("/push")).await.unwrap();
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_streams() {
        let (state, _clock) = state(PushServerConfig::default());
        let app = router(Arc::clone(&state));

        let response = app.oneshot(get("/logs?client=c1")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        read_until(&mut body, "event: ready").await;

        state.shutdown.send_replace(true);
        let end = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }
}
