use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};

use relay_shared::Role;

use crate::store::{messages, threads};
use crate::web::AppState;

const THREAD_LISTING_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/threads", get(list_threads).post(upsert_thread))
        .route("/threads/{id}", delete(delete_thread))
        .route("/active-thread", put(set_active_thread))
        .route("/threads/{id}/messages", get(list_messages).post(add_message))
}

// --- Request types ---

#[derive(Deserialize)]
struct UpsertThreadBody {
    id: String,
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveThreadBody {
    thread_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMessageBody {
    id: Option<String>,
    role: Role,
    content: Value,
    created_at: Option<i64>,
}

pub(super) fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

// --- Handlers ---

async fn list_threads(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let threads = threads::list_threads(&state.store.conn(), THREAD_LISTING_LIMIT);
    (StatusCode::OK, Json(json!({ "threads": threads })))
}

async fn upsert_thread(
    State(state): State<AppState>,
    Json(body): Json<UpsertThreadBody>,
) -> (StatusCode, Json<Value>) {
    if body.id.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Thread id must not be empty");
    }
    match threads::upsert_thread(&state.store.conn(), &body.id, &body.title) {
        Ok(thread) => (StatusCode::OK, Json(json!({ "thread": thread }))),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if threads::delete_thread(&state.store.conn(), &id) {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        error(StatusCode::NOT_FOUND, "Thread not found")
    }
}

async fn set_active_thread(
    State(state): State<AppState>,
    Json(body): Json<ActiveThreadBody>,
) -> (StatusCode, Json<Value>) {
    if let Some(ref id) = body.thread_id
        && threads::get_thread(&state.store.conn(), id).is_none()
    {
        return error(StatusCode::NOT_FOUND, "Thread not found");
    }
    match state.host.set_active_thread(body.thread_id.as_deref()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let conn = state.store.conn();
    if threads::get_thread(&conn, &id).is_none() {
        return error(StatusCode::NOT_FOUND, "Thread not found");
    }
    let messages = messages::get_messages(&conn, &id);
    (StatusCode::OK, Json(json!({ "messages": messages })))
}

async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddMessageBody>,
) -> (StatusCode, Json<Value>) {
    let conn = state.store.conn();
    if threads::get_thread(&conn, &id).is_none() {
        return error(StatusCode::NOT_FOUND, "Thread not found");
    }
    match messages::add_message(
        &conn,
        &id,
        body.id.as_deref(),
        body.role,
        &body.content,
        body.created_at,
    ) {
        Ok(message) => (StatusCode::OK, Json(json!({ "message": message }))),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
