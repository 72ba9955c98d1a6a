use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgExecutor, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{OrderStore, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::models::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId, OrderStatus};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Tables (see migrations/):
//   orders(order_id BIGSERIAL, customer_id, restaurant_id, order_status,
//          total_amount NUMERIC, created_at, updated_at)
//   order_items(item_id BIGSERIAL, order_id -> orders, menu_item_id,
//               quantity, price NUMERIC NULL)
//
// Every statement helper takes a generic executor so the same SQL runs
// against the pool or inside a transaction.
//
// ============================================================================

const ORDER_COLUMNS: &str =
    "order_id, customer_id, restaurant_id, order_status, total_amount, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Open a connection pool and bring the schema up to date
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!(max_connections = config.max_connections, "Connecting to Postgres...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("✅ Postgres order store ready");
        Ok(Self { pool })
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: OrderId,
    customer_id: i64,
    restaurant_id: i64,
    order_status: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.order_id,
            customer_id: row.customer_id,
            restaurant_id: row.restaurant_id,
            status: OrderStatus::new(row.order_status),
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    item_id: OrderItemId,
    order_id: OrderId,
    menu_item_id: i64,
    quantity: i32,
    price: Option<Decimal>,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| StoreError::CorruptRow {
            table: "order_items",
            reason: format!("negative quantity {} on item {}", row.quantity, row.item_id),
        })?;

        Ok(OrderItem {
            id: row.item_id,
            order_id: row.order_id,
            menu_item_id: row.menu_item_id,
            quantity,
            price: row.price,
        })
    }
}

fn quantity_column(quantity: u32) -> StoreResult<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::OutOfRange {
        column: "order_items.quantity",
        value: quantity.to_string(),
    })
}

// ============================================================================
// Statements
// ============================================================================

async fn update_order<'e>(exec: impl PgExecutor<'e>, order: &Order) -> StoreResult<()> {
    let result = sqlx::query(
        "UPDATE orders
         SET customer_id = $2, restaurant_id = $3, order_status = $4,
             total_amount = $5, created_at = $6, updated_at = $7
         WHERE order_id = $1",
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.restaurant_id)
    .bind(order.status.as_str())
    .bind(order.total_amount)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::MissingOrder(order.id));
    }
    Ok(())
}

async fn insert_item<'e>(exec: impl PgExecutor<'e>, item: NewOrderItem) -> StoreResult<OrderItem> {
    let item_id: OrderItemId = sqlx::query_scalar(
        "INSERT INTO order_items (order_id, menu_item_id, quantity, price)
         VALUES ($1, $2, $3, $4)
         RETURNING item_id",
    )
    .bind(item.order_id)
    .bind(item.menu_item_id)
    .bind(quantity_column(item.quantity)?)
    .bind(item.price)
    .fetch_one(exec)
    .await?;

    Ok(item.with_id(item_id))
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let order_id: OrderId = sqlx::query_scalar(
            "INSERT INTO orders (customer_id, restaurant_id, order_status, total_amount, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING order_id",
        )
        .bind(order.customer_id)
        .bind(order.restaurant_id)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(order_id = %order_id, "Inserted order row");
        Ok(order.with_id(order_id))
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        update_order(&self.pool, order).await?;
        debug!(order_id = %order.id, total = %order.total_amount, "Saved order row");
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Order::from))
    }

    async fn order_exists(&self, id: OrderId) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all_orders(&self) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_id"))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_orders_by_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE customer_id = $1
             ORDER BY created_at DESC, order_id DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn insert_item(&self, item: NewOrderItem) -> StoreResult<OrderItem> {
        insert_item(&self.pool, item).await
    }

    async fn find_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT item_id, order_id, menu_item_id, quantity, price
             FROM order_items
             WHERE order_id = $1
             ORDER BY item_id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderItem::try_from).collect()
    }

    async fn delete_item(&self, id: OrderItemId) -> StoreResult<()> {
        sqlx::query("DELETE FROM order_items WHERE item_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_items_atomically(
        &self,
        order: &Order,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent replacements of the same order
        let locked: Option<OrderId> =
            sqlx::query_scalar("SELECT order_id FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order.id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::MissingOrder(order.id));
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            inserted.push(insert_item(&mut *tx, item).await?);
        }

        update_order(&mut *tx, order).await?;
        tx.commit().await?;

        debug!(
            order_id = %order.id,
            item_count = inserted.len(),
            "Replaced order items in one transaction"
        );
        Ok(inserted)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
