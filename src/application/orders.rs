//! Checkout: turn a cart into an immutable order.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{CartsRepo, OrdersRepo, RepoError};
use crate::domain::entities::{OrderItemRecord, OrderWithItems};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct OrderService {
    orders: Arc<dyn OrdersRepo>,
    carts: Arc<dyn CartsRepo>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrdersRepo>, carts: Arc<dyn CartsRepo>) -> Self {
        Self { orders, carts }
    }

    /// Snapshot the cart into an order, then empty the cart. Title and price
    /// are copied onto the order items so later catalog edits cannot rewrite
    /// order history.
    pub async fn place_order(&self, user: Uuid) -> Result<OrderWithItems, CheckoutError> {
        let lines = self.carts.cart_lines(user).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let items = lines
            .into_iter()
            .map(|line| OrderItemRecord {
                order_id: Uuid::nil(),
                product_id: Some(line.product.id),
                title: line.product.title,
                price_cents: line.product.price_cents,
                quantity: line.quantity,
            })
            .collect();

        let order = self.orders.create_order(user, items).await?;
        self.carts.clear_cart(user).await?;
        Ok(order)
    }

    pub async fn history(&self, user: Uuid) -> Result<Vec<OrderWithItems>, RepoError> {
        self.orders.list_orders(user).await
    }
}
