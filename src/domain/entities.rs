//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// One queued flash message. Survives exactly one redirect: reading the
/// queue drains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: String,
    pub text: String,
}

impl FlashMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: "info".to_string(),
            text: text.into(),
        }
    }
}

/// Server-side session state keyed by the cookie-carried identifier.
///
/// `is_logged_in` is the authoritative authentication flag for the session;
/// `user_id` is only a reference that is re-resolved on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: Option<Uuid>,
    pub is_logged_in: bool,
    pub csrf_token: String,
    pub flash: Vec<FlashMessage>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price_cents: i64,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A product reference plus quantity inside a user's cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product: ProductRecord,
    pub quantity: i64,
}

impl CartLine {
    pub fn line_total_cents(&self) -> i64 {
        self.product.price_cents * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_cents: i64,
    pub created_at: OffsetDateTime,
}

/// Order line with title and price snapshotted at checkout time, so later
/// product edits do not rewrite order history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemRecord {
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub title: String,
    pub price_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWithItems {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}
