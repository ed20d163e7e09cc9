use axum::{Json, extract::State, response::IntoResponse};
use swapbook_sdk::objects::api::OrderResponse;

use crate::state::AppState;

/// `GET /orderbook`: every stored order, ours flagged with `mine`.
pub(super) async fn get_order_book(state: State<AppState>) -> impl IntoResponse {
    let orders: Vec<OrderResponse> = state
        .node
        .order_book()
        .entries()
        .await
        .into_iter()
        .map(|(stored, mine)| OrderResponse {
            order_id: stored.order_id.to_string(),
            peer_id: stored.order.peer_id,
            expiry: stored.order.expiry,
            quantity: stored.order.quantity,
            price: stored.order.price,
            buy_btc: stored.order.buy_btc,
            mine,
        })
        .collect();
    Json(orders)
}
