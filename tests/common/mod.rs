//! Fake Core and Index backends plus a gateway wired to them.
#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use cover_app::{build_app, build_registry, Gateway};
use cover_kernel::settings::{DetailPolicy, Settings, UpstreamSettings};

/// `bookId` whose saga steps each take [`SLOW_STEP`] on the Core fake.
pub const SLOW_BOOK: i64 = 21;
/// Borrow id issued for [`SLOW_BOOK`].
pub const SLOW_BORROW: i64 = 121;
pub const SLOW_STEP: Duration = Duration::from_millis(400);

/// One request observed by a fake backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub service: &'static str,
    pub method: String,
    pub path: String,
    pub cookie: Option<String>,
}

/// Shared log of every request the fakes received, plus the last
/// appointment body Core was sent.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Recorded>>>,
    appointment_bodies: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, service: &str, method: &str, path_prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.service == service && c.method == method && c.path.starts_with(path_prefix))
            .count()
    }

    pub fn appointment_bodies(&self) -> Vec<Value> {
        self.appointment_bodies.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[derive(Clone)]
struct Tap {
    recorder: Recorder,
    service: &'static str,
}

async fn record(State(tap): State<Tap>, request: Request, next: Next) -> Response {
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    tap.recorder.calls.lock().unwrap().push(Recorded {
        service: tap.service,
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        cookie,
    });
    next.run(request).await
}

fn tap(recorder: Recorder, service: &'static str) -> Tap {
    Tap { recorder, service }
}

fn has_cookie(headers: &HeaderMap) -> bool {
    headers.contains_key(header::COOKIE)
}

async fn shelf(Path(params): Path<Vec<(String, String)>>) -> Response {
    let user = params
        .iter()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    match user.as_str() {
        "empty" => Json(json!({ "books": [] })).into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "db down").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Json(json!({ "books": [] })).into_response()
        }
        "bare" => Json(json!([{ "isbn": "A" }])).into_response(),
        "trio" => Json(json!({
            "books": [{ "isbn": "A" }, { "isbn": "B" }, { "isbn": "C" }]
        }))
        .into_response(),
        _ => Json(json!({
            "books": [
                { "isbn": "A", "ownerId": 42, "status": "available" },
                { "isbn": "B", "ownerId": 42, "status": "lent" }
            ]
        }))
        .into_response(),
    }
}

/// Core fake: the system of record.
pub async fn spawn_core(recorder: Recorder) -> SocketAddr {
    let bodies = recorder.appointment_bodies.clone();

    let app = Router::new()
        .route("/test", get(|| async { Json(json!({ "service": "core", "ok": true })) }))
        .route(
            "/auth/login",
            post(|Json(user): Json<Value>| async move {
                if user["username"] == "mallory" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" })))
                        .into_response();
                }
                let mut headers = HeaderMap::new();
                headers.append(header::SET_COOKIE, "sid=s%3Afresh; Path=/; HttpOnly".parse().unwrap());
                headers.append(header::SET_COOKIE, "remember=1; Path=/".parse().unwrap());
                (StatusCode::OK, headers, Json(json!({ "user": user }))).into_response()
            }),
        )
        .route(
            "/auth/logout",
            post(|| async {
                (
                    StatusCode::OK,
                    [(header::SET_COOKIE, "sid=; Max-Age=0")],
                    Json(json!({})),
                )
            }),
        )
        .route(
            "/user/add",
            put(|Json(body): Json<Value>| async move {
                (StatusCode::CREATED, Json(json!({ "id": 5, "user": body["user"] })))
            }),
        )
        .route(
            "/user/me",
            get(|headers: HeaderMap| async move {
                if has_cookie(&headers) {
                    Json(json!({ "id": 42, "username": "ada" })).into_response()
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "not logged in" })))
                        .into_response()
                }
            }),
        )
        .route(
            "/user/me/score",
            post(|Json(body): Json<Value>| async move { Json(json!({ "id": 42, "score": 10, "n": body["n"] })) }),
        )
        .route("/user/me/appointments/for", get(|| async { Json(json!([{ "id": 1 }])) }))
        .route("/user/me/appointments/with", get(|| async { Json(json!([])) }))
        .route("/user/{id}/books", get(shelf))
        .route("/user/{id}/books/{shelf}", get(shelf))
        .route(
            "/borrow",
            post(|Json(body): Json<Value>| async move {
                if body["bookId"] == 13 {
                    (StatusCode::CONFLICT, Json(json!({ "message": "already borrowed" })))
                        .into_response()
                } else if body["bookId"] == SLOW_BOOK {
                    tokio::time::sleep(SLOW_STEP).await;
                    Json(json!(SLOW_BORROW)).into_response()
                } else {
                    Json(json!(99)).into_response()
                }
            }),
        )
        .route(
            "/borrow/{id}",
            get(|Path(id): Path<i64>| async move {
                if id == SLOW_BORROW {
                    tokio::time::sleep(SLOW_STEP).await;
                }
                Json(json!({ "id": id, "bookId": 7, "borrowerId": 42, "createdAt": "2026-10-19" }))
            }),
        )
        .route(
            "/user/me/appointments",
            put(move |Json(body): Json<Value>| {
                let bodies = bodies.clone();
                async move {
                    bodies.lock().unwrap().push(body.clone());
                    if body["meeting"]["borrow"]["id"] == SLOW_BORROW {
                        tokio::time::sleep(SLOW_STEP).await;
                    }
                    if body["meeting"]["message"] == "explode" {
                        return (StatusCode::INTERNAL_SERVER_ERROR, "appointment store down")
                            .into_response();
                    }
                    Json(json!({ "id": 1, "meeting": body["meeting"] })).into_response()
                }
            }),
        )
        .route(
            "/isborrowed/{user}/{book}",
            get(|| async { Json(Value::Null) }),
        )
        .route(
            "/book/add",
            put(|Json(body): Json<Value>| async move { Json(json!({ "added": body["book"] })) }),
        )
        .route(
            "/owners/{isbn}",
            get(|Path(isbn): Path<String>| async move { Json(json!([{ "id": 42, "isbn": isbn }])) }),
        )
        .route(
            "/book/read",
            post(|Json(body): Json<Value>| async move { Json(json!({ "read": body })) }),
        )
        .layer(middleware::from_fn_with_state(tap(recorder, "core"), record));

    serve(app).await
}

/// How the Index fake behaves.
#[derive(Debug, Clone, Default)]
pub struct IndexFake {
    /// ISBNs answered with 404.
    pub failing: HashSet<String>,
    /// Added before every answer, `/test` included.
    pub delay: Duration,
    /// `/test` answers plain text instead of JSON.
    pub plain_status: bool,
}

impl IndexFake {
    pub fn failing(isbns: &[&str]) -> Self {
        Self {
            failing: isbns.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

async fn index_status(State(fake): State<Arc<IndexFake>>) -> Response {
    tokio::time::sleep(fake.delay).await;
    if fake.plain_status {
        (StatusCode::OK, "it's working!").into_response()
    } else {
        Json(json!({ "service": "index" })).into_response()
    }
}

async fn index_book(State(fake): State<Arc<IndexFake>>, Path(isbn): Path<String>) -> Response {
    tokio::time::sleep(fake.delay).await;
    if fake.failing.contains(&isbn) {
        (StatusCode::NOT_FOUND, Json(json!({ "message": "unknown isbn", "isbn": isbn })))
            .into_response()
    } else {
        Json(json!({ "isbn": isbn, "title": format!("Title {isbn}") })).into_response()
    }
}

/// Index fake: answers every ISBN except those in `failing`.
pub async fn spawn_index(recorder: Recorder, failing: &[&str]) -> SocketAddr {
    spawn_index_with(recorder, IndexFake::failing(failing)).await
}

pub async fn spawn_index_with(recorder: Recorder, fake: IndexFake) -> SocketAddr {
    let app = Router::new()
        .route("/test", get(index_status))
        .route("/book/{isbn}", get(index_book))
        .with_state(Arc::new(fake))
        .layer(middleware::from_fn_with_state(tap(recorder, "index"), record));

    serve(app).await
}

fn upstream(addr: SocketAddr, timeout_ms: u64) -> UpstreamSettings {
    UpstreamSettings {
        scheme: "http".to_string(),
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_ms,
    }
}

pub fn settings_for(core: SocketAddr, index: SocketAddr, policy: DetailPolicy) -> Settings {
    let mut settings = Settings::default();
    settings.upstreams.core = upstream(core, 500);
    settings.upstreams.index = upstream(index, 500);
    settings.aggregation.detail_policy = policy;
    settings.server.request_timeout_ms = 5000;
    settings
}

pub fn gateway_for(core: SocketAddr, index: SocketAddr, policy: DetailPolicy) -> Gateway {
    Gateway::from_settings(&settings_for(core, index, policy)).unwrap()
}

/// Fakes plus the full gateway router, served on an ephemeral port.
pub struct TestApp {
    pub base_url: String,
    pub recorder: Recorder,
    pub http: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn spawn_app_with(
    policy: DetailPolicy,
    failing_isbns: &[&str],
    index_up: bool,
) -> TestApp {
    spawn_app_configured(failing_isbns, index_up, |settings| {
        settings.aggregation.detail_policy = policy;
    })
    .await
}

/// Like [`spawn_app_with`], with a last say over the gateway settings.
pub async fn spawn_app_configured(
    failing_isbns: &[&str],
    index_up: bool,
    configure: impl FnOnce(&mut Settings),
) -> TestApp {
    let recorder = Recorder::default();
    let core = spawn_core(recorder.clone()).await;
    let index = if index_up {
        spawn_index(recorder.clone(), failing_isbns).await
    } else {
        dead_addr().await
    };

    let mut settings = settings_for(core, index, DetailPolicy::FailFast);
    configure(&mut settings);
    let gateway = Arc::new(Gateway::from_settings(&settings).unwrap());
    let registry = build_registry(gateway);
    let app = build_app(&registry, &settings);
    let addr = serve(app).await;

    TestApp {
        base_url: format!("http://{addr}"),
        recorder,
        http: reqwest::Client::new(),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(DetailPolicy::FailFast, &[], true).await
}
