use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};
use tracing::debug;

use relay_shared::{AssistantReply, Role};

use crate::store::{messages, threads};
use crate::web::AppState;

use super::threads::error;

pub fn router() -> Router<AppState> {
    Router::new().route("/replies", post(post_reply))
}

/// Record a finished assistant reply and announce it to subscribers.
async fn post_reply(
    State(state): State<AppState>,
    Json(reply): Json<AssistantReply>,
) -> (StatusCode, Json<Value>) {
    let stored = {
        let conn = state.store.conn();
        if threads::get_thread(&conn, &reply.thread_id).is_none() {
            return error(StatusCode::NOT_FOUND, "Thread not found");
        }
        messages::add_message(
            &conn,
            &reply.thread_id,
            None,
            Role::Assistant,
            &reply.response.content,
            None,
        )
    };

    match stored {
        Ok(message) => {
            let delivered = state.events.publish(reply);
            debug!(message_id = %message.id, delivered, "assistant reply recorded");
            (
                StatusCode::OK,
                Json(json!({ "message": message, "delivered": delivered })),
            )
        }
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
