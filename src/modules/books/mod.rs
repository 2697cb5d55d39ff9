use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use cover_http::AppError;
use cover_kernel::{InitCtx, Module};
use cover_upstream::{Backend, SessionCredential};

use super::{operation, relay};
use crate::gateway::Gateway;
use crate::services::models::{BookSummary, CombinedBook};
use crate::services::Shelf;

/// Shelf listings joined with the catalogue, plus the book passthroughs
pub struct BooksModule {
    gateway: Arc<Gateway>,
}

impl BooksModule {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[derive(Debug, Deserialize)]
struct AddBookRequest {
    book: Map<String, Value>,
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            detail_policy = ?ctx.settings.aggregation.detail_policy,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let mut router = Router::new();
        for shelf in Shelf::ALL {
            let joined = format!("/user/{{id}}/books{}", shelf.suffix());
            let raw = format!("{joined}/raw");
            router = router
                .route(
                    &joined,
                    get(
                        move |State(gateway): State<Arc<Gateway>>,
                              Path(user_id): Path<String>,
                              session: SessionCredential| {
                            list_joined(gateway, shelf, user_id, session)
                        },
                    ),
                )
                .route(
                    &raw,
                    get(
                        move |State(gateway): State<Arc<Gateway>>,
                              Path(user_id): Path<String>,
                              session: SessionCredential| {
                            list_raw(gateway, shelf, user_id, session)
                        },
                    ),
                );
        }

        router
            .route("/isborrowed/{user_id}/{book_id}", get(is_borrowed))
            .route("/book/add", put(add_book))
            .route("/owners/{isbn}", get(owners))
            .route("/book/read", post(set_read))
            .with_state(self.gateway.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut paths = Map::new();
        for shelf in Shelf::ALL {
            let joined = format!("/user/{{id}}/books{}", shelf.suffix());
            paths.insert(
                format!("{joined}/raw"),
                json!({ "get": operation("Books", "Shelf listing as Core keeps it", "200", "BookSummary list") }),
            );
            paths.insert(
                joined,
                json!({ "get": operation("Books", "Shelf listing joined with catalogue details", "200", "CombinedBook list") }),
            );
        }
        paths.insert(
            "/isborrowed/{user_id}/{book_id}".to_string(),
            json!({ "get": operation("Books", "Borrow of a book by a user, if any", "200", "Borrow or null") }),
        );
        paths.insert(
            "/book/add".to_string(),
            json!({ "put": operation("Books", "Add a book to the current user's library", "200", "Created ownership") }),
        );
        paths.insert(
            "/owners/{isbn}".to_string(),
            json!({ "get": operation("Books", "Owners of a book", "200", "Owner list") }),
        );
        paths.insert(
            "/book/read".to_string(),
            json!({ "post": operation("Books", "Mark a book as read", "200", "Updated reading state") }),
        );

        Some(json!({ "paths": paths }))
    }
}

async fn list_joined(
    gateway: Arc<Gateway>,
    shelf: Shelf,
    user_id: String,
    session: SessionCredential,
) -> Result<Json<Vec<CombinedBook>>, AppError> {
    let path = shelf.core_path(&user_id);
    let books = gateway
        .aggregator()
        .list_with_details(&path, &session)
        .await
        .map_err(|err| match err.service() {
            // The listing exists; one of its catalogue entries does not resolve.
            Backend::Index => AppError::Lookup(err),
            Backend::Core => AppError::Upstream(err),
        })?;
    Ok(Json(books))
}

async fn list_raw(
    gateway: Arc<Gateway>,
    shelf: Shelf,
    user_id: String,
    session: SessionCredential,
) -> Result<Json<Vec<BookSummary>>, AppError> {
    let path = shelf.core_path(&user_id);
    let books = gateway.aggregator().list_raw(&path, &session).await?;
    Ok(Json(books))
}

async fn is_borrowed(
    State(gateway): State<Arc<Gateway>>,
    Path((user_id, book_id)): Path<(String, String)>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    let path = format!(
        "/isborrowed/{}/{}",
        urlencoding::encode(&user_id),
        urlencoding::encode(&book_id)
    );
    let response = gateway
        .core()
        .exchange::<(), Value>(Method::GET, &path, None, &session)
        .await?;
    Ok(relay(response))
}

async fn add_book(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<AddBookRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(AddBookRequest { book }) = payload?;
    let response = gateway
        .core()
        .exchange::<_, Value>(Method::PUT, "/book/add", Some(&json!({ "book": book })), &session)
        .await?;
    Ok(relay(response))
}

async fn owners(
    State(gateway): State<Arc<Gateway>>,
    Path(isbn): Path<String>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    let path = format!("/owners/{}", urlencoding::encode(&isbn));
    let response = gateway
        .core()
        .exchange::<(), Value>(Method::GET, &path, None, &session)
        .await?;
    Ok(relay(response))
}

async fn set_read(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let response = gateway
        .core()
        .exchange::<_, Value>(Method::POST, "/book/read", Some(&body), &session)
        .await?;
    Ok(relay(response))
}

/// Create a new instance of the books module
pub fn create_module(gateway: Arc<Gateway>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(gateway))
}
