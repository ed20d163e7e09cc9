use axum::{Json, extract::State, response::IntoResponse};

use crate::state::AppState;

/// `GET /peers`: ids of the subscribed peers.
pub(super) async fn get_peers(state: State<AppState>) -> impl IntoResponse {
    let mut peers: Vec<String> = state.node.peers().iter().map(|p| p.to_string()).collect();
    peers.sort();
    Json(peers)
}
