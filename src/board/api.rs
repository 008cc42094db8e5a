use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::error;

use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::models::Item;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::{BoardError, OrderingError};
use crate::ordering::{DropEvent, MoveOutcome, MoveTarget, Reorderer};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub reorderer: Reorderer<DbHandle>,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub sort_key: Option<f64>,
}

/// Either `target_index`, or one or both of `prev_id` / `next_id`.
#[derive(Deserialize)]
pub struct MoveItemRequest {
    pub target_index: Option<usize>,
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
}

impl MoveItemRequest {
    fn target(self) -> Result<MoveTarget, ApiError> {
        match (self.target_index, self.prev_id, self.next_id) {
            (Some(index), None, None) => Ok(MoveTarget::Index(index)),
            (Some(_), _, _) => Err(ApiError::BadRequest(
                "target_index cannot be combined with prev_id/next_id".into(),
            )),
            (None, None, None) => Err(ApiError::BadRequest(
                "target_index or prev_id/next_id is required".into(),
            )),
            (None, prev, next) => Ok(MoveTarget::Between { prev, next }),
        }
    }
}

#[derive(Serialize)]
pub struct MoveResponse {
    pub outcome: MoveOutcome,
    pub items: Vec<Item>,
}

#[derive(Serialize)]
pub struct RenumberResponse {
    pub written: usize,
    pub items: Vec<Item>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::ItemNotFound { .. }
            | BoardError::Ordering(OrderingError::ItemNotFound { .. }) => {
                ApiError::NotFound(err.to_string())
            }
            BoardError::InvalidRequest(_)
            | BoardError::Ordering(OrderingError::NeighbourNotFound { .. }) => {
                ApiError::BadRequest(err.to_string())
            }
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<OrderingError> for ApiError {
    fn from(err: OrderingError) -> Self {
        BoardError::from(err).into()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/collections", get(list_collections))
        .route(
            "/api/collections/{collection}/items",
            get(list_items).post(create_item),
        )
        .route(
            "/api/collections/{collection}/items/{id}/move",
            patch(move_item),
        )
        .route(
            "/api/collections/{collection}/renumber",
            post(renumber_collection),
        )
        .route("/api/items/{id}", delete(delete_item))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

async fn load_items(state: &SharedState, collection: String) -> Result<Vec<Item>, ApiError> {
    state
        .db
        .call(move |db| db.list_items(&collection))
        .await
        .map_err(|e| BoardError::Database(e).into())
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_collections(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let collections = state
        .db
        .call(|db| db.list_collections())
        .await
        .map_err(BoardError::Database)?;
    Ok(Json(collections))
}

async fn list_items(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_items(&state, collection).await?))
}

async fn create_item(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    Json(req): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(BoardError::InvalidRequest("title must not be empty".into()).into());
    }
    if req.sort_key.is_some_and(|k| !k.is_finite()) {
        return Err(BoardError::InvalidRequest("sort_key must be finite".into()).into());
    }
    let sort_key = req.sort_key;
    let item = state
        .db
        .call(move |db| db.create_item(&collection, &title, sort_key))
        .await
        .map_err(BoardError::Database)?;
    broadcast_message(&state.ws_tx, &WsMessage::ItemCreated { item: item.clone() });
    Ok((StatusCode::CREATED, Json(item)))
}

async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .call(move |db| {
            let item = db.get_item(id)?;
            if item.is_some() {
                db.delete_item(id)?;
            }
            Ok(item)
        })
        .await
        .map_err(BoardError::Database)?;
    match deleted {
        Some(item) => {
            broadcast_message(
                &state.ws_tx,
                &WsMessage::ItemDeleted {
                    item_id: id,
                    collection: item.collection,
                },
            );
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(BoardError::ItemNotFound { id }.into()),
    }
}

async fn move_item(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, i64)>,
    Json(req): Json<MoveItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = DropEvent {
        item_id: id.to_string(),
        target: req.target()?,
    };
    let (outcome, _view) = state.reorderer.move_fresh(&collection, &event).await?;

    let status = match &outcome {
        MoveOutcome::Unchanged => StatusCode::OK,
        MoveOutcome::Applied { item_id, key } => {
            broadcast_message(
                &state.ws_tx,
                &WsMessage::ItemMoved {
                    collection: collection.clone(),
                    item_id: item_id.clone(),
                    sort_key: *key,
                },
            );
            StatusCode::OK
        }
        MoveOutcome::Renumbered { written, .. } => {
            broadcast_message(
                &state.ws_tx,
                &WsMessage::CollectionRenumbered {
                    collection: collection.clone(),
                    written: *written,
                },
            );
            StatusCode::OK
        }
        MoveOutcome::Resynced { reason } => {
            broadcast_message(
                &state.ws_tx,
                &WsMessage::CollectionResynced {
                    collection: collection.clone(),
                    reason: reason.clone(),
                },
            );
            StatusCode::CONFLICT
        }
    };

    let items = load_items(&state, collection).await?;
    Ok((status, Json(MoveResponse { outcome, items })))
}

async fn renumber_collection(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut view = state.reorderer.load(&collection).await?;
    let written = state.reorderer.renumber(&mut view).await?;
    if written > 0 {
        broadcast_message(
            &state.ws_tx,
            &WsMessage::CollectionRenumbered {
                collection: collection.clone(),
                written,
            },
        );
    }
    let items = load_items(&state, collection).await?;
    Ok(Json(RenumberResponse { written, items }))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::OrderingPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let db = DbHandle::new(BoardDb::new_in_memory().unwrap());
        let (ws_tx, _) = broadcast::channel(16);
        Arc::new(AppState {
            reorderer: Reorderer::new(Arc::new(db.clone()), OrderingPolicy::default()),
            db,
            ws_tx,
        })
    }

    fn test_app() -> Router {
        api_router().with_state(test_state())
    }

    /// Seed `tasks` with items at the given keys; returns their ids.
    fn seed(state: &SharedState, keys: &[f64]) -> Vec<i64> {
        let db = state.db.lock_sync().unwrap();
        keys.iter()
            .enumerate()
            .map(|(i, k)| {
                db.create_item("tasks", &format!("Task {}", i), Some(*k))
                    .unwrap()
                    .id
            })
            .collect()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn item_ids(value: &serde_json::Value) -> Vec<i64> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_items_empty() {
        let app = test_app();
        let request = Request::builder()
            .uri("/api/collections/tasks/items")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let items: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_create_item_appends() {
        let state = test_state();
        let app = api_router().with_state(state.clone());

        let first = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/collections/tasks/items",
                serde_json::json!({"title": "Buy seeds"}),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let first: serde_json::Value = body_json(first.into_body()).await;
        assert_eq!(first["title"], "Buy seeds");
        assert_eq!(first["sort_key"], 100000.0);

        let second = app
            .oneshot(json_request(
                "POST",
                "/api/collections/tasks/items",
                serde_json::json!({"title": "Plant seeds"}),
            ))
            .await
            .unwrap();
        let second: serde_json::Value = body_json(second.into_body()).await;
        assert_eq!(second["sort_key"], 100100.0);
    }

    #[tokio::test]
    async fn test_create_item_rejects_blank_title() {
        let app = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/collections/tasks/items",
                serde_json::json!({"title": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_list_collections() {
        let state = test_state();
        seed(&state, &[1.0, 2.0]);
        let app = api_router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/collections")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let collections: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(collections[0]["name"], "tasks");
        assert_eq!(collections[0]["item_count"], 2);
    }

    #[tokio::test]
    async fn test_move_to_index() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0, 30.0]);
        let app = api_router().with_state(state);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[2]),
                serde_json::json!({"target_index": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["outcome"]["status"], "applied");
        assert_eq!(body["outcome"]["key"], 15.0);
        assert_eq!(item_ids(&body["items"]), vec![ids[0], ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_move_between_neighbours() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0, 30.0]);
        let app = api_router().with_state(state);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[0]),
                serde_json::json!({"prev_id": ids[2].to_string()}),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["outcome"]["key"], 130.0);
        assert_eq!(item_ids(&body["items"]), vec![ids[1], ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn test_move_in_place_is_unchanged() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0]);
        let app = api_router().with_state(state);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[0]),
                serde_json::json!({"target_index": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["outcome"]["status"], "unchanged");
    }

    #[tokio::test]
    async fn test_move_collision_renumbers() {
        let state = test_state();
        let ids = seed(&state, &[0.0, 0.0, 5.0]);
        let app = api_router().with_state(state);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[2]),
                serde_json::json!({"target_index": 0}),
            ))
            .await
            .unwrap();
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["outcome"]["status"], "renumbered");
        assert_eq!(item_ids(&body["items"]), vec![ids[2], ids[0], ids[1]]);
        let keys: Vec<f64> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["sort_key"].as_f64().unwrap())
            .collect();
        assert_eq!(keys, vec![1000.0, 2000.0, 3000.0]);
    }

    #[tokio::test]
    async fn test_move_unknown_item_is_404() {
        let state = test_state();
        seed(&state, &[10.0]);
        let app = api_router().with_state(state);
        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/collections/tasks/items/999/move",
                serde_json::json!({"target_index": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_move_requires_target() {
        let state = test_state();
        let ids = seed(&state, &[10.0]);
        let app = api_router().with_state(state);
        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[0]),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_unknown_neighbour_is_400() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0]);
        let app = api_router().with_state(state);
        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[0]),
                serde_json::json!({"next_id": "12345"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_renumber_collection() {
        let state = test_state();
        let ids = seed(&state, &[0.5, 0.75, 0.875]);
        let app = api_router().with_state(state);
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/collections/tasks/renumber",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["written"], 3);
        assert_eq!(item_ids(&body["items"]), ids);
        assert_eq!(body["items"][2]["sort_key"], 3000.0);
    }

    #[tokio::test]
    async fn test_delete_item() {
        let state = test_state();
        let ids = seed(&state, &[1.0]);
        let app = api_router().with_state(state);

        let uri = format!("/api/items/{}", ids[0]);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_move_broadcasts_ws() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0]);
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);

        app.oneshot(json_request(
            "PATCH",
            &format!("/api/collections/tasks/items/{}/move", ids[1]),
            serde_json::json!({"target_index": 0}),
        ))
        .await
        .unwrap();

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "ItemMoved");
        assert_eq!(parsed["data"]["item_id"], ids[1].to_string());
        assert_eq!(parsed["data"]["sort_key"], 5.0);
    }

    #[tokio::test]
    async fn test_failed_move_returns_conflict_with_store_order() {
        let state = test_state();
        let ids = seed(&state, &[10.0, 20.0, 30.0]);
        state
            .db
            .lock_sync()
            .unwrap()
            .conn()
            .execute_batch(
                "CREATE TRIGGER reject_key_updates BEFORE UPDATE OF sort_key ON items
                 BEGIN SELECT RAISE(ABORT, 'database is read-only'); END;",
            )
            .unwrap();
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);

        let response = app
            .oneshot(json_request(
                "PATCH",
                &format!("/api/collections/tasks/items/{}/move", ids[2]),
                serde_json::json!({"target_index": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["outcome"]["status"], "resynced");
        assert!(
            body["outcome"]["reason"]
                .as_str()
                .unwrap()
                .contains("failed to persist order")
        );
        assert_eq!(item_ids(&body["items"]), ids);
        assert_eq!(body["items"][2]["sort_key"], 30.0);

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "CollectionResynced");
        assert_eq!(parsed["data"]["collection"], "tasks");
    }
}
