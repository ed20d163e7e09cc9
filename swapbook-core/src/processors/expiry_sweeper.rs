//! Periodic removal of expired orders.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;

use crate::orderbook::OrderBook;
use crate::utils::clock::unix_now;

pub struct ExpirySweeper {
    order_book: OrderBook,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(order_book: OrderBook, period: Duration) -> Self {
        Self { order_book, period }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let removed = self.order_book.sweep_expired(unix_now()).await;
                    if removed > 0 {
                        info!(removed, "Garbage collected expired orders");
                    }
                }
            }
        }
        info!("Expiry sweeper shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swapbook_sdk::objects::{LimitOrder, SignedLimitOrder, WireObject};
    use swapbook_sdk::{Keypair, OrderId, SelfCertifying, Signer};

    async fn insert(book: &OrderBook, keypair: &Keypair, expiry: i64, quantity: u64) -> OrderId {
        let order = LimitOrder {
            peer_id: keypair.peer_id().to_string(),
            expiry,
            quantity,
            price: 100,
            buy_btc: quantity % 2 == 0,
        };
        let bytes = SignedLimitOrder::sign(&order, keypair)
            .unwrap()
            .to_bytes()
            .unwrap();
        book.process_incoming_order(&bytes, false).await;
        order.order_id().unwrap()
    }

    #[tokio::test]
    async fn test_background_sweep_drops_only_expired_orders() {
        let book = OrderBook::new(Arc::new(SelfCertifying));
        let keypair = Keypair::generate().unwrap();
        let now = unix_now();

        for quantity in 1..=3 {
            insert(&book, &keypair, now + 1, quantity).await;
        }
        let mut live = Vec::new();
        for quantity in 10..=13 {
            live.push(insert(&book, &keypair, now + 3600, quantity).await);
        }
        assert_eq!(book.len().await, 7);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = ExpirySweeper::new(book.clone(), Duration::from_millis(100));
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        for _ in 0..50 {
            if book.len().await == live.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(book.len().await, live.len());
        for order_id in &live {
            assert!(book.lookup(order_id).await.is_ok());
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
