use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use swapbook_sdk::ContentId;
use swapbook_sdk::objects::api::{SubmitLimitOrder, SubmitLimitOrderResponse};

use super::ApiError;
use crate::state::AppState;

/// `POST /limitorder`: sign a new order with the node key and broadcast it.
pub(super) async fn submit_limit_order(
    state: State<AppState>,
    body: Result<Json<SubmitLimitOrder>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let order_id = state
        .node
        .publish_limit_order(request.quantity, request.price, request.buy_btc)
        .await?;

    tracing::info!(order_id = %order_id, "Limit order submitted");
    Ok(Json(SubmitLimitOrderResponse {
        order_id: order_id.to_string(),
    }))
}

/// `DELETE /limitorder/{order_id}`: withdraw one of our own orders.
pub(super) async fn withdraw_limit_order(
    state: State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id =
        ContentId::parse(&order_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.node.withdraw_order(&order_id).await?;
    Ok(StatusCode::OK)
}
