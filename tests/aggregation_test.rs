//! Shelf listings joined with catalogue details.

mod common;

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{
    gateway_for, spawn_app, spawn_app_with, spawn_core, spawn_index, spawn_index_with, IndexFake,
    Recorder,
};
use cover_app::services::Shelf;
use cover_kernel::settings::DetailPolicy;
use cover_upstream::{Backend, SessionCredential, UpstreamError};

#[tokio::test]
async fn joined_list_keeps_core_order_and_length() {
    let recorder = Recorder::default();
    let gateway = gateway_for(
        spawn_core(recorder.clone()).await,
        spawn_index(recorder.clone(), &[]).await,
        DetailPolicy::FailFast,
    );

    let books = gateway
        .aggregator()
        .list_with_details(&Shelf::Library.core_path("42"), &SessionCredential::Anonymous)
        .await
        .unwrap();

    let isbns: Vec<&str> = books.iter().map(|b| b.summary.isbn.as_str()).collect();
    assert_eq!(isbns, vec!["A", "B"]);
    assert_eq!(books[0].detail.as_ref().unwrap().0["title"], "Title A");
    assert_eq!(books[1].detail.as_ref().unwrap().0["title"], "Title B");
    assert_eq!(recorder.count("index", "GET", "/book/"), 2);
}

#[tokio::test]
async fn lookups_are_issued_concurrently() {
    let recorder = Recorder::default();
    let delay = Duration::from_millis(300);
    let gateway = gateway_for(
        spawn_core(recorder.clone()).await,
        spawn_index_with(recorder.clone(), IndexFake::delayed(delay)).await,
        DetailPolicy::FailFast,
    );

    let started = Instant::now();
    let books = gateway
        .aggregator()
        .list_with_details(&Shelf::Library.core_path("trio"), &SessionCredential::Anonymous)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(books.len(), 3);
    assert_eq!(recorder.count("index", "GET", "/book/"), 3);
    // One after the other would take three delays.
    assert!(elapsed < delay * 2, "took {elapsed:?}");
}

#[tokio::test]
async fn fail_fast_reports_the_failing_lookup() {
    let recorder = Recorder::default();
    let gateway = gateway_for(
        spawn_core(recorder.clone()).await,
        spawn_index(recorder.clone(), &["B"]).await,
        DetailPolicy::FailFast,
    );

    let err = gateway
        .aggregator()
        .list_with_details(&Shelf::Library.core_path("42"), &SessionCredential::Anonymous)
        .await
        .unwrap_err();

    match err {
        UpstreamError::Status {
            service,
            path,
            status,
            ..
        } => {
            assert_eq!(service, Backend::Index);
            assert_eq!(path, "/book/B");
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        other => panic!("expected an Index status error, got {other:?}"),
    }
}

#[tokio::test]
async fn partial_policy_marks_failed_entries() {
    let recorder = Recorder::default();
    let gateway = gateway_for(
        spawn_core(recorder.clone()).await,
        spawn_index(recorder.clone(), &["B"]).await,
        DetailPolicy::Partial,
    );

    let books = gateway
        .aggregator()
        .list_with_details(&Shelf::Reading.core_path("42"), &SessionCredential::Anonymous)
        .await
        .unwrap();

    assert_eq!(books.len(), 2);
    assert!(books[0].detail.is_some());
    assert!(books[0].detail_error.is_none());
    assert!(books[1].detail.is_none());
    assert!(books[1].detail_error.as_ref().unwrap().contains("/book/B"));
}

#[tokio::test]
async fn raw_list_makes_no_index_calls() {
    let app = spawn_app().await;

    let response = app
        .http
        .get(app.url("/api/user/42/books/borrowed/raw"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body[0]["isbn"], "A");
    assert!(body[0].get("detail").is_none());
    assert_eq!(app.recorder.count("core", "GET", "/user/42/books/borrowed"), 1);
    assert_eq!(app.recorder.count("index", "GET", "/book/"), 0);
}

#[tokio::test]
async fn every_shelf_route_hits_its_core_listing() {
    let app = spawn_app().await;

    for (route, core_path) in [
        ("/api/user/42/books", "/user/42/books"),
        ("/api/user/42/books/reading", "/user/42/books/reading"),
        ("/api/user/42/books/read", "/user/42/books/read"),
        ("/api/user/42/books/borrowed", "/user/42/books/borrowed"),
    ] {
        let response = app.http.get(app.url(route)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{route}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2, "{route}");
        assert!(app
            .recorder
            .calls()
            .iter()
            .any(|c| c.service == "core" && c.path == core_path));
    }
}

#[tokio::test]
async fn joined_route_serializes_summary_with_detail() {
    let app = spawn_app().await;

    let body: Value = app
        .http
        .get(app.url("/api/user/42/books"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body[0],
        json!({
            "isbn": "A",
            "ownerId": 42,
            "status": "available",
            "detail": { "isbn": "A", "title": "Title A" }
        })
    );
}

#[tokio::test]
async fn identical_requests_yield_identical_bytes() {
    let app = spawn_app().await;

    let first = app
        .http
        .get(app.url("/api/user/42/books"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let second = app
        .http
        .get(app.url("/api/user/42/books"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_and_bare_listings() {
    let app = spawn_app().await;

    let empty: Value = app
        .http
        .get(app.url("/api/user/empty/books"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, json!([]));

    let bare: Value = app
        .http
        .get(app.url("/api/user/bare/books"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bare[0]["detail"]["title"], "Title A");
}

#[tokio::test]
async fn failed_lookup_is_a_bad_gateway_with_index_details() {
    let app = spawn_app_with(DetailPolicy::FailFast, &["B"], true).await;

    let response = app.http.get(app.url("/api/user/42/books")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");
    assert_eq!(body["error"]["details"][0]["service"], "index");
    assert_eq!(body["error"]["details"][0]["path"], "/book/B");
    assert_eq!(body["error"]["details"][0]["status"], 404);
}
