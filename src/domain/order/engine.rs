use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use super::commands::{order_total, CreateOrder, OrderItemRequest, UpdateOrder};
use super::errors::OrderError;
use super::summary::OrderSummary;
use crate::messaging::{messages, EventPublisher};
use crate::metrics::Metrics;
use crate::models::{self, NewOrder, Order, OrderId};
use crate::store::OrderStore;

// ============================================================================
// Order Engine
// ============================================================================
//
// Orchestrates: Request → Store (stub, items, total rewrite) → Summary → Event
//
// The store assigns order ids on first insert, so create is a two-phase
// write: insert an empty stub, then write items against its id and rewrite
// the order with the computed total. Summaries are always rebuilt from
// stored item rows. Only create emits an event; update and delete do not.
//
// ============================================================================

/// How item replacement and the order rewrite reach the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// One store call per row. Readers may see a half-replaced item set, and a
    /// crash between the item writes and the total rewrite leaves a stale total.
    #[default]
    Sequential,
    /// Item replacement and the order rewrite commit as one unit.
    Atomic,
}

pub struct OrderEngine {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
    write_mode: WriteMode,
    metrics: Arc<Metrics>,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            events,
            write_mode: WriteMode::default(),
            metrics,
        }
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Create an order from its items and announce it on the engine bus
    pub async fn create(&self, command: CreateOrder) -> Result<OrderSummary, OrderError> {
        self.instrumented("create", self.create_order(command)).await
    }

    pub async fn get_all(&self) -> Result<Vec<OrderSummary>, OrderError> {
        self.instrumented("get_all", async {
            let orders = self.store.find_all_orders().await?;
            self.summarize_all(orders).await
        })
        .await
    }

    /// `None` when no order has this id
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<OrderSummary>, OrderError> {
        self.instrumented("get_by_id", async {
            match self.store.find_order(id).await? {
                Some(order) => Ok(Some(self.summarize(&order).await?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Replace the whole item set; `None` when no order has this id
    pub async fn update(
        &self,
        id: OrderId,
        command: UpdateOrder,
    ) -> Result<Option<OrderSummary>, OrderError> {
        self.instrumented("update", self.update_order(id, command)).await
    }

    /// `false` when no order has this id
    pub async fn delete(&self, id: OrderId) -> Result<bool, OrderError> {
        self.instrumented("delete", self.delete_order(id)).await
    }

    /// A customer's orders, newest first
    pub async fn get_history(&self, customer_id: i64) -> Result<Vec<OrderSummary>, OrderError> {
        self.instrumented("get_history", async {
            let orders = self.store.find_orders_by_customer(customer_id).await?;
            self.summarize_all(orders).await
        })
        .await
    }

    pub async fn check_store(&self) -> Result<(), OrderError> {
        self.store.ping().await.map_err(OrderError::from)
    }

    /// Wait for engine bus deliveries still in flight
    pub async fn flush_events(&self) {
        self.events.flush().await;
    }

    // ========================================================================
    // Operation bodies
    // ========================================================================

    async fn create_order(&self, command: CreateOrder) -> Result<OrderSummary, OrderError> {
        let total = order_total(&command.items)?;

        let stub = NewOrder::stub(command.customer_id, command.restaurant_id, models::now());
        let mut order = self.store.insert_order(stub).await?;
        tracing::debug!(order_id = %order.id, "Order stub inserted");

        self.write_items(&mut order, &command.items, total, false)
            .await?;
        let summary = self.summarize(&order).await?;

        tracing::info!(
            order_id = %order.id,
            customer_id = order.customer_id,
            item_count = summary.items.len(),
            total = %order.total_amount,
            "✅ Order created"
        );

        // Detached: delivery never holds up the caller
        self.events
            .publish(messages::order_placed(order.id, order.customer_id));

        Ok(summary)
    }

    async fn update_order(
        &self,
        id: OrderId,
        command: UpdateOrder,
    ) -> Result<Option<OrderSummary>, OrderError> {
        let Some(mut order) = self.store.find_order(id).await? else {
            tracing::debug!(order_id = %id, "Update skipped, order not found");
            return Ok(None);
        };

        let total = order_total(&command.items)?;

        if let Some(customer_id) = command.customer_id {
            order.customer_id = customer_id;
        }
        if let Some(restaurant_id) = command.restaurant_id {
            order.restaurant_id = restaurant_id;
        }

        self.write_items(&mut order, &command.items, total, true)
            .await?;
        let summary = self.summarize(&order).await?;

        tracing::info!(
            order_id = %order.id,
            customer_id = order.customer_id,
            item_count = summary.items.len(),
            total = %order.total_amount,
            "Order updated"
        );

        Ok(Some(summary))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, OrderError> {
        for item in self.store.find_items(id).await? {
            self.store.delete_item(item.id).await?;
        }

        if !self.store.order_exists(id).await? {
            tracing::debug!(order_id = %id, "Delete skipped, order not found");
            return Ok(false);
        }

        self.store.delete_order(id).await?;
        tracing::info!(order_id = %id, "🗑️ Order deleted");
        Ok(true)
    }

    /// Write `items` against `order`, then rewrite the order with `total`.
    /// `replacing` drops the order's current items first.
    async fn write_items(
        &self,
        order: &mut Order,
        items: &[OrderItemRequest],
        total: Decimal,
        replacing: bool,
    ) -> Result<(), OrderError> {
        match self.write_mode {
            WriteMode::Sequential => {
                if replacing {
                    for existing in self.store.find_items(order.id).await? {
                        self.store.delete_item(existing.id).await?;
                    }
                }

                for item in items {
                    self.store.insert_item(item.bind_to(order.id)).await?;
                }

                order.total_amount = total;
                order.updated_at = models::now();
                self.store.save_order(order).await?;
            }
            WriteMode::Atomic => {
                order.total_amount = total;
                order.updated_at = models::now();
                let rows = items.iter().map(|item| item.bind_to(order.id)).collect();
                self.store.replace_items_atomically(order, rows).await?;
            }
        }

        tracing::debug!(
            order_id = %order.id,
            mode = ?self.write_mode,
            item_count = items.len(),
            "Order items written"
        );
        Ok(())
    }

    async fn summarize(&self, order: &Order) -> Result<OrderSummary, OrderError> {
        let items = self.store.find_items(order.id).await?;
        Ok(OrderSummary::new(order, &items))
    }

    async fn summarize_all(&self, orders: Vec<Order>) -> Result<Vec<OrderSummary>, OrderError> {
        let mut summaries = Vec::with_capacity(orders.len());
        for order in &orders {
            summaries.push(self.summarize(order).await?);
        }
        Ok(summaries)
    }

    async fn instrumented<T, F>(&self, operation: &'static str, body: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, OrderError>>,
    {
        let timer = self
            .metrics
            .order_operation_duration
            .with_label_values(&[operation])
            .start_timer();
        let result = body.await;
        timer.observe_duration();

        self.metrics.record_operation(operation, result.is_ok());
        if let Err(e) = &result {
            tracing::error!(operation, error = %e, "Order operation failed");
        }
        result
    }
}
