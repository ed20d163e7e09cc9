//! Local HTTP API of a node.
//!
//! # Endpoints
//!
//! - `POST   /limitorder`            – sign and broadcast a new order
//! - `DELETE /limitorder/{order_id}` – withdraw one of our own orders
//! - `GET    /orderbook`             – every order this node knows about
//! - `GET    /peers`                 – peers subscribed to the order book topic

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use swapbook_core::NodeError;

use crate::state::AppState;

mod limit_order;
mod order_book;
mod peers;

/// Build the node API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/limitorder", post(limit_order::submit_limit_order))
        .route(
            "/limitorder/{order_id}",
            axum::routing::delete(limit_order::withdraw_limit_order),
        )
        .route("/orderbook", get(order_book::get_order_book))
        .route("/peers", get(peers::get_peers))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request body or path could not be understood.
    BadRequest(String),
    /// No such order in the book.
    NotFound,
    /// The order exists but another node created it.
    NotMine,
    /// Signing, encoding or publishing failed locally.
    Node(NodeError),
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Lookup(_) => ApiError::NotFound,
            NodeError::NotMine(_) => ApiError::NotMine,
            other => ApiError::Node(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "order not found").into_response(),
            ApiError::NotMine => {
                (StatusCode::FORBIDDEN, "order was not created by this node").into_response()
            }
            ApiError::Node(e) => {
                tracing::error!(error = %e, "Node API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
