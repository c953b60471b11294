//! In-memory paper venue for dry runs.
//!
//! Orders fill immediately at their limit price and the cost is debited
//! from the paper balance, so nothing stays resting between cycles.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::platforms::VenueClient;
use crate::types::{EngineError, OpenOrder, OrderReceipt, OrderRequest};

#[derive(Debug, Default)]
struct PaperBook {
    balance: Decimal,
    fills: Vec<(String, OrderRequest)>,
}

pub struct PaperVenue {
    book: Mutex<PaperBook>,
}

impl PaperVenue {
    pub fn new(balance: Decimal) -> Self {
        Self {
            book: Mutex::new(PaperBook {
                balance,
                fills: Vec::new(),
            }),
        }
    }

    /// Every order filled so far, with its paper order id.
    pub async fn fills(&self) -> Vec<(String, OrderRequest)> {
        self.book.lock().await.fills.clone()
    }
}

#[async_trait]
impl VenueClient for PaperVenue {
    async fn get_balance(&self) -> Result<Decimal, EngineError> {
        Ok(self.book.lock().await.balance)
    }

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, EngineError> {
        Ok(Vec::new())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError> {
        let cost = order.price * order.size;
        let mut book = self.book.lock().await;
        if cost > book.balance {
            return Err(EngineError::transport(
                "paper",
                format!("insufficient paper balance: need {cost}, have {}", book.balance),
            ));
        }
        book.balance -= cost;

        let order_id = format!("paper-{}", Uuid::new_v4());
        book.fills.push((order_id.clone(), order.clone()));
        info!(
            order_id = %order_id,
            token = %order.token_id,
            price = %order.price,
            size = %order.size,
            balance = %book.balance,
            "[PAPER] Order filled"
        );

        Ok(OrderReceipt {
            order_id,
            status: "matched".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;

    fn order(price: Decimal, size: Decimal) -> OrderRequest {
        OrderRequest {
            token_id: "tok-yes".into(),
            price,
            size,
            side: Side::Buy,
        }
    }

    #[tokio::test]
    async fn test_fill_debits_balance() {
        let venue = PaperVenue::new(dec!(100));
        let receipt = venue.place_order(&order(dec!(0.45), dec!(50))).await.unwrap();
        assert!(receipt.order_id.starts_with("paper-"));
        assert_eq!(receipt.status, "matched");
        assert_eq!(venue.get_balance().await.unwrap(), dec!(77.50));
        assert_eq!(venue.fills().await.len(), 1);
        assert!(venue.get_open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_order_above_balance() {
        let venue = PaperVenue::new(dec!(10));
        let err = venue.place_order(&order(dec!(0.50), dec!(21))).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(venue.get_balance().await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn test_order_ids_are_unique() {
        let venue = PaperVenue::new(dec!(100));
        let a = venue.place_order(&order(dec!(0.10), dec!(1))).await.unwrap();
        let b = venue.place_order(&order(dec!(0.10), dec!(1))).await.unwrap();
        assert_ne!(a.order_id, b.order_id);
    }
}
