//! Product catalog queries and admin-side mutations.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{ProductParams, ProductsRepo, RepoError};
use crate::domain::entities::ProductRecord;

pub struct CatalogService {
    products: Arc<dyn ProductsRepo>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductsRepo>) -> Self {
        Self { products }
    }

    pub async fn storefront(&self) -> Result<Vec<ProductRecord>, RepoError> {
        self.products.list_products().await
    }

    pub async fn product_detail(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        self.products.find_product(id).await
    }

    /// Products created by the given admin user, for the management panel.
    pub async fn owned_by(&self, owner: Uuid) -> Result<Vec<ProductRecord>, RepoError> {
        self.products.list_products_by_owner(owner).await
    }

    pub async fn create(
        &self,
        owner: Uuid,
        params: ProductParams,
    ) -> Result<ProductRecord, RepoError> {
        self.products.create_product(owner, params).await
    }

    /// Editable view of a product, gated on ownership.
    pub async fn editable(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<ProductRecord>, RepoError> {
        Ok(self
            .products
            .find_product(id)
            .await?
            .filter(|product| product.created_by == owner))
    }

    pub async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        params: ProductParams,
    ) -> Result<(), RepoError> {
        self.products.update_product(id, owner, params).await
    }

    pub async fn delete(&self, id: Uuid, owner: Uuid) -> Result<(), RepoError> {
        self.products.delete_product(id, owner).await
    }
}

/// Parse a price like "12.99" into cents, rejecting junk and negatives.
pub fn parse_price_cents(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return None;
    }
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction_cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse::<i64>().ok()?,
    };
    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction_cents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_price_shapes() {
        assert_eq!(parse_price_cents("12.99"), Some(1299));
        assert_eq!(parse_price_cents("12.9"), Some(1290));
        assert_eq!(parse_price_cents("12"), Some(1200));
        assert_eq!(parse_price_cents(" 0.05 "), Some(5));
    }

    #[test]
    fn rejects_junk_prices() {
        assert_eq!(parse_price_cents(""), None);
        assert_eq!(parse_price_cents("-3"), None);
        assert_eq!(parse_price_cents("12.999"), None);
        assert_eq!(parse_price_cents("abc"), None);
        assert_eq!(parse_price_cents("1.2x"), None);
    }
}
