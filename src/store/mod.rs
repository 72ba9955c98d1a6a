// ============================================================================
// Order Store - Persistence Boundary
// ============================================================================
//
// Keyed storage for orders and their items. The engine only talks to the
// `OrderStore` trait; the backend is picked at startup from configuration.
//
// Implementations:
// - postgres: sqlx-backed, durable, used in every real deployment
// - memory:   process-local tables for tests and throwaway dev runs
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::models::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId};

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Order {0} does not exist")]
    MissingOrder(OrderId),

    #[error("Value out of range for {column}: {value}")]
    OutOfRange { column: &'static str, value: String },

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order row and return it with its assigned identity
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order>;

    /// Overwrite an existing order row
    async fn save_order(&self, order: &Order) -> StoreResult<()>;

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn order_exists(&self, id: OrderId) -> StoreResult<bool>;

    async fn delete_order(&self, id: OrderId) -> StoreResult<()>;

    /// All orders in ascending id order
    async fn find_all_orders(&self) -> StoreResult<Vec<Order>>;

    /// A customer's orders, newest `created_at` first, ties by id descending
    async fn find_orders_by_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>>;

    async fn insert_item(&self, item: NewOrderItem) -> StoreResult<OrderItem>;

    /// Items of one order in insertion order
    async fn find_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>>;

    async fn delete_item(&self, id: OrderItemId) -> StoreResult<()>;

    /// Delete every item of `order`, insert `items`, and overwrite the order
    /// row, as one unit: either all of it is visible or none of it is.
    async fn replace_items_atomically(
        &self,
        order: &Order,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>>;

    /// Cheap connectivity check for health reporting
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
