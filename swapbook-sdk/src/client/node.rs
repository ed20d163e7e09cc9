//! Client for the node API (`/limitorder`, `/orderbook`, `/peers`).

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::api::{OrderResponse, SubmitLimitOrder, SubmitLimitOrderResponse};

/// Typed HTTP client for a running node.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: Client,
    base_url: Url,
}

impl NodeClient {
    /// * `base_url` – root URL of the node API (e.g. `http://127.0.0.1:4002`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /limitorder` – sign and broadcast a new order.
    pub async fn submit_limit_order(
        &self,
        order: &SubmitLimitOrder,
    ) -> Result<SubmitLimitOrderResponse, ClientError> {
        let url = self.base_url.join("/limitorder")?;
        let resp = self.http.post(url).json(order).send().await?;
        parse_response(resp).await
    }

    /// `GET /orderbook` – all open orders known to the node.
    pub async fn order_book(&self) -> Result<Vec<OrderResponse>, ClientError> {
        let url = self.base_url.join("/orderbook")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `DELETE /limitorder/{order_id}` – withdraw one of the node's own orders.
    pub async fn withdraw_order(&self, order_id: &str) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("/limitorder/{order_id}"))?;
        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `GET /peers` – currently subscribed gossip peers.
    pub async fn peers(&self) -> Result<Vec<String>, ClientError> {
        let url = self.base_url.join("/peers")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
