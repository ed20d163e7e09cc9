//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::start_node;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use swapbook_core::NodeHandle;
    use swapbook_core::config::NodeConfig;
    use swapbook_core::net::MemorySwarm;
    use swapbook_sdk::Keypair;
    use swapbook_sdk::objects::api::{OrderResponse, SubmitLimitOrderResponse};
    use tower::ServiceExt;

    async fn node(swarm: &MemorySwarm) -> NodeHandle {
        start_node(swarm, Keypair::generate().unwrap(), None, NodeConfig::default())
            .await
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_order(body: &str) -> Request<Body> {
        Request::post("/limitorder")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_for_orders(router: &Router, count: usize) -> Vec<OrderResponse> {
        for _ in 0..500 {
            let (_, body) = send(router, Request::get("/orderbook").body(Body::empty()).unwrap()).await;
            let orders: Vec<OrderResponse> = serde_json::from_slice(&body).unwrap();
            if orders.len() == count {
                return orders;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("order book never reached {count} orders");
    }

    #[tokio::test]
    async fn test_health() {
        let swarm = MemorySwarm::new();
        let router = build_router(AppState::new(node(&swarm).await));
        let (status, body) = send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_submit_then_list() {
        let swarm = MemorySwarm::new();
        let handle = node(&swarm).await;
        let router = build_router(AppState::new(handle.clone()));

        let (status, body) = send(&router, post_order(r#"{"quantity":10,"price":5000,"buyBTC":true}"#)).await;
        assert_eq!(status, StatusCode::OK);
        let created: SubmitLimitOrderResponse = serde_json::from_slice(&body).unwrap();
        assert!(created.order_id.starts_with('b'));

        let orders = wait_for_orders(&router, 1).await;
        assert_eq!(orders[0].order_id, created.order_id);
        assert_eq!(orders[0].peer_id, handle.local_peer_id().to_string());
        assert_eq!(orders[0].quantity, 10);
        assert!(orders[0].buy_btc);
        assert!(orders[0].mine);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let swarm = MemorySwarm::new();
        let router = build_router(AppState::new(node(&swarm).await));
        let (status, _) = send(&router, post_order(r#"{"quantity":"ten"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&router, post_order("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_withdraw_statuses() {
        let swarm = MemorySwarm::new();
        let ours = node(&swarm).await;
        let theirs = node(&swarm).await;
        let router = build_router(AppState::new(ours.clone()));

        let foreign = theirs.publish_limit_order(1, 1, false).await.unwrap();
        let own = ours.publish_limit_order(2, 2, true).await.unwrap();
        wait_for_orders(&router, 2).await;

        let delete = |id: String| {
            Request::delete(format!("/limitorder/{id}"))
                .body(Body::empty())
                .unwrap()
        };
        let (status, _) = send(&router, delete(foreign.to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&router, delete(own.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        wait_for_orders(&router, 1).await;
        let (status, _) = send(&router, delete(own.to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, delete("xyz".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        ours.shutdown().await;
        theirs.shutdown().await;
    }

    #[tokio::test]
    async fn test_peers_lists_subscribers() {
        let swarm = MemorySwarm::new();
        let first = node(&swarm).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = node(&swarm).await;
        let router = build_router(AppState::new(second.clone()));

        let expected = vec![first.local_peer_id().to_string()];
        let mut peers = Vec::new();
        for _ in 0..500 {
            let (_, body) = send(&router, Request::get("/peers").body(Body::empty()).unwrap()).await;
            peers = serde_json::from_slice::<Vec<String>>(&body).unwrap();
            if peers == expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(peers, expected);

        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_sdk_client_against_live_server() {
        use swapbook_sdk::client::NodeClient;
        use swapbook_sdk::objects::api::SubmitLimitOrder;

        let swarm = MemorySwarm::new();
        let handle = node(&swarm).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(
            axum::serve(listener, build_router(AppState::new(handle.clone()))).into_future(),
        );

        let client = NodeClient::new(url::Url::parse(&format!("http://{addr}")).unwrap());
        let created = client
            .submit_limit_order(&SubmitLimitOrder {
                quantity: 3,
                price: 7,
                buy_btc: false,
            })
            .await
            .unwrap();

        let mut orders = Vec::new();
        for _ in 0..500 {
            orders = client.order_book().await.unwrap();
            if !orders.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, created.order_id);
        assert!(client.peers().await.unwrap().is_empty());

        client.withdraw_order(&created.order_id).await.unwrap();
        assert!(client.withdraw_order("bogus").await.is_err());

        server.abort();
        handle.shutdown().await;
    }
}
