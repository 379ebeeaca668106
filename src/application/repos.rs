//! Repository traits describing persistence adapters.
//!
//! `RepoError::NotFound` is reserved for "the row does not exist"; transport
//! and query failures surface as the other variants. Callers in the request
//! pipeline rely on that split to tell a stale reference apart from a broken
//! store.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    CartLine, OrderItemRecord, OrderWithItems, ProductRecord, SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewUserParams {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct ProductParams {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price_cents: i64,
}

/// Liveness probe for the backing store, surfaced at `/_health/db`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: NewUserParams) -> Result<UserRecord, RepoError>;
}

/// Session persistence capability: get/put/destroy by session id. The
/// request pipeline owns all session mutation; the store only round-trips
/// records.
#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn find_session(&self, id: &str) -> Result<Option<SessionRecord>, RepoError>;

    /// Insert or replace the record under its id.
    async fn put_session(&self, record: &SessionRecord) -> Result<(), RepoError>;

    async fn destroy_session(&self, id: &str) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductRecord>, RepoError>;

    async fn list_products_by_owner(&self, owner: Uuid) -> Result<Vec<ProductRecord>, RepoError>;

    async fn find_product(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError>;

    async fn create_product(
        &self,
        owner: Uuid,
        params: ProductParams,
    ) -> Result<ProductRecord, RepoError>;

    /// Update a product only when `owner` created it. `NotFound` covers both
    /// a missing row and an ownership mismatch.
    async fn update_product(
        &self,
        id: Uuid,
        owner: Uuid,
        params: ProductParams,
    ) -> Result<(), RepoError>;

    async fn delete_product(&self, id: Uuid, owner: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CartsRepo: Send + Sync {
    async fn cart_lines(&self, user: Uuid) -> Result<Vec<CartLine>, RepoError>;

    /// Add `quantity` of a product, creating the line when absent.
    async fn add_to_cart(&self, user: Uuid, product: Uuid, quantity: i64)
    -> Result<(), RepoError>;

    async fn remove_from_cart(&self, user: Uuid, product: Uuid) -> Result<(), RepoError>;

    async fn clear_cart(&self, user: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait OrdersRepo: Send + Sync {
    async fn create_order(
        &self,
        user: Uuid,
        items: Vec<OrderItemRecord>,
    ) -> Result<OrderWithItems, RepoError>;

    async fn list_orders(&self, user: Uuid) -> Result<Vec<OrderWithItems>, RepoError>;
}
