pub mod replies;
pub mod threads;

use axum::Router;

use crate::web::AppState;

/// Every authenticated `/api` route.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(threads::router())
        .merge(replies::router())
}
