//! HTTP API request and response types.
//!
//! Field names follow the JSON the API has always spoken (`buyBTC`,
//! `orderId`), hence the explicit renames.

use serde::{Deserialize, Serialize};

/// Request body for `POST /limitorder`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmitLimitOrder {
    pub quantity: u64,
    pub price: u64,
    #[serde(rename = "buyBTC")]
    pub buy_btc: bool,
}

/// Response body for `POST /limitorder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLimitOrderResponse {
    pub order_id: String,
}

/// One entry of `GET /orderbook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub peer_id: String,
    /// Unix timestamp of expiry.
    pub expiry: i64,
    pub quantity: u64,
    pub price: u64,
    #[serde(rename = "buyBTC")]
    pub buy_btc: bool,
    /// Whether this node originated the order.
    pub mine: bool,
}
