use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CartsRepo, OrdersRepo, RepoError},
    domain::entities::{
        CartLine, OrderItemRecord, OrderRecord, OrderWithItems, ProductRecord,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    title: String,
    description: String,
    image_url: String,
    price_cents: i64,
    created_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    quantity: i64,
}

impl From<CartRow> for CartLine {
    fn from(row: CartRow) -> Self {
        Self {
            product: ProductRecord {
                id: row.id,
                title: row.title,
                description: row.description,
                image_url: row.image_url,
                price_cents: row.price_cents,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            quantity: row.quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_cents: i64,
    created_at: OffsetDateTime,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            total_cents: row.total_cents,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Option<Uuid>,
    title: String,
    price_cents: i64,
    quantity: i64,
}

impl From<OrderItemRow> for OrderItemRecord {
    fn from(row: OrderItemRow) -> Self {
        Self {
            order_id: row.order_id,
            product_id: row.product_id,
            title: row.title,
            price_cents: row.price_cents,
            quantity: row.quantity,
        }
    }
}

#[async_trait]
impl CartsRepo for PostgresRepositories {
    async fn cart_lines(&self, user: Uuid) -> Result<Vec<CartLine>, RepoError> {
        let rows = sqlx::query_as::<_, CartRow>(
            "SELECT p.id, p.title, p.description, p.image_url, p.price_cents, \
                    p.created_by, p.created_at, p.updated_at, ci.quantity \
             FROM cart_items ci \
             INNER JOIN products p ON p.id = ci.product_id \
             WHERE ci.user_id = $1 \
             ORDER BY p.title, p.id",
        )
        .bind(user)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn add_to_cart(
        &self,
        user: Uuid,
        product: Uuid,
        quantity: i64,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn remove_from_cart(&self, user: Uuid, product: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn clear_cart(&self, user: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl OrdersRepo for PostgresRepositories {
    async fn create_order(
        &self,
        user: Uuid,
        items: Vec<OrderItemRecord>,
    ) -> Result<OrderWithItems, RepoError> {
        let total_cents: i64 = items
            .iter()
            .map(|item| item.price_cents * item.quantity)
            .sum();

        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let order_row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (user_id, total_cents) \
             VALUES ($1, $2) \
             RETURNING id, user_id, total_cents, created_at",
        )
        .bind(user)
        .bind(total_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let order = OrderRecord::from(order_row);
        let mut stored_items = Vec::with_capacity(items.len());

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, title, price_cents, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.title)
            .bind(item.price_cents)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            stored_items.push(OrderItemRecord {
                order_id: order.id,
                ..item
            });
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(OrderWithItems {
            order,
            items: stored_items,
        })
    }

    async fn list_orders(&self, user: Uuid) -> Result<Vec<OrderWithItems>, RepoError> {
        let order_rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_cents, created_at \
             FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id",
        )
        .bind(user)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut orders = Vec::with_capacity(order_rows.len());
        for row in order_rows {
            let order = OrderRecord::from(row);
            let item_rows = sqlx::query_as::<_, OrderItemRow>(
                "SELECT order_id, product_id, title, price_cents, quantity \
                 FROM order_items WHERE order_id = $1",
            )
            .bind(order.id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

            orders.push(OrderWithItems {
                order,
                items: item_rows.into_iter().map(OrderItemRecord::from).collect(),
            });
        }

        Ok(orders)
    }
}
