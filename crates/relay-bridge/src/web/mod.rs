pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde_json::json;

use crate::host::events::HostEvents;
use crate::host::store_host::StoreHost;
use crate::store::Store;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingress_token: String,
    pub store: Arc<Store>,
    pub host: Arc<StoreHost>,
    pub events: HostEvents,
}

/// Build the ingress router: `/health` is open, everything under `/api`
/// needs the bearer token.
pub fn build_router(state: AppState) -> Router {
    let api_routes = routes::api_router().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::ingress_auth::ingress_auth,
    ));

    Router::new()
        .route(
            "/health",
            get(|| async {
                Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
            }),
        )
        .nest("/api", api_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::host::HostChat;

    const TOKEN: &str = "test-ingress-token-0123456789";

    fn state() -> AppState {
        let store = Arc::new(Store::new_in_memory().unwrap());
        AppState {
            ingress_token: TOKEN.to_string(),
            host: Arc::new(StoreHost::new(store.clone())),
            store,
            events: HostEvents::new(),
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_open() {
        let (status, body) = call(&state(), request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_rejects_missing_or_wrong_token() {
        let state = state();
        let (status, _) = call(&state, request("GET", "/api/threads", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            call(&state, request("GET", "/api/threads", Some("nope"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn threads_and_messages_round_trip() {
        let state = state();
        let (status, _) = call(
            &state,
            request(
                "POST",
                "/api/threads",
                Some(TOKEN),
                Some(json!({"id": "t1", "title": "Planning"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &state,
            request(
                "POST",
                "/api/threads/t1/messages",
                Some(TOKEN),
                Some(json!({"role": "user", "content": "hello", "createdAt": 5})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["role"], "user");

        let (_, body) = call(&state, request("GET", "/api/threads", Some(TOKEN), None)).await;
        assert_eq!(body["threads"][0]["title"], "Planning");

        let (_, body) = call(
            &state,
            request("GET", "/api/threads/t1/messages", Some(TOKEN), None),
        )
        .await;
        assert_eq!(body["messages"][0]["content"], "hello");

        let (status, _) = call(
            &state,
            request("GET", "/api/threads/ghost/messages", Some(TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_thread_drops_its_messages() {
        let state = state();
        crate::store::threads::upsert_thread(&state.store.conn(), "t1", "One").unwrap();
        crate::store::messages::add_message(
            &state.store.conn(),
            "t1",
            None,
            relay_shared::Role::User,
            &json!("hi"),
            None,
        )
        .unwrap();

        let (status, _) =
            call(&state, request("DELETE", "/api/threads/t1", Some(TOKEN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.host.list_threads().await.unwrap().is_empty());
        assert!(crate::store::messages::get_messages(&state.store.conn(), "t1").is_empty());

        let (status, _) =
            call(&state, request("DELETE", "/api/threads/t1", Some(TOKEN), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn active_thread_is_visible_to_host() {
        let state = state();
        crate::store::threads::upsert_thread(&state.store.conn(), "t1", "One").unwrap();

        let (status, _) = call(
            &state,
            request(
                "PUT",
                "/api/active-thread",
                Some(TOKEN),
                Some(json!({"threadId": "t1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.host.get_active_thread().await.unwrap().unwrap().id, "t1");

        let (status, _) = call(
            &state,
            request(
                "PUT",
                "/api/active-thread",
                Some(TOKEN),
                Some(json!({"threadId": "ghost"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(
            &state,
            request(
                "PUT",
                "/api/active-thread",
                Some(TOKEN),
                Some(json!({"threadId": null})),
            ),
        )
        .await;
        assert!(state.host.get_active_thread().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replies_are_stored_and_published() {
        let state = state();
        crate::store::threads::upsert_thread(&state.store.conn(), "t1", "One").unwrap();
        let mut rx = state.events.subscribe();

        let (status, body) = call(
            &state,
            request(
                "POST",
                "/api/replies",
                Some(TOKEN),
                Some(json!({"threadId": "t1", "response": {"content": "all done"}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], 1);
        assert_eq!(rx.recv().await.unwrap().thread_id, "t1");

        let stored = state.host.get_messages("t1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, relay_shared::Role::Assistant);

        let (status, _) = call(
            &state,
            request(
                "POST",
                "/api/replies",
                Some(TOKEN),
                Some(json!({"threadId": "ghost", "response": {"content": "x"}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
