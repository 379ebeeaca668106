//! Cart operations for authenticated shoppers.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{CartsRepo, ProductsRepo, RepoError};
use crate::domain::entities::CartLine;

pub struct CartService {
    carts: Arc<dyn CartsRepo>,
    products: Arc<dyn ProductsRepo>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartsRepo>, products: Arc<dyn ProductsRepo>) -> Self {
        Self { carts, products }
    }

    pub async fn lines(&self, user: Uuid) -> Result<Vec<CartLine>, RepoError> {
        self.carts.cart_lines(user).await
    }

    pub async fn total_cents(&self, user: Uuid) -> Result<i64, RepoError> {
        Ok(self
            .lines(user)
            .await?
            .iter()
            .map(CartLine::line_total_cents)
            .sum())
    }

    /// Add one unit of a product. A vanished product is ignored rather than
    /// failing the request; the shopper just sees an unchanged cart.
    pub async fn add_product(&self, user: Uuid, product: Uuid) -> Result<(), RepoError> {
        if self.products.find_product(product).await?.is_none() {
            return Ok(());
        }
        self.carts.add_to_cart(user, product, 1).await
    }

    pub async fn remove_product(&self, user: Uuid, product: Uuid) -> Result<(), RepoError> {
        self.carts.remove_from_cart(user, product).await
    }

    pub async fn clear(&self, user: Uuid) -> Result<(), RepoError> {
        self.carts.clear_cart(user).await
    }
}
