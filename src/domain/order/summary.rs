use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderId, OrderItem, OrderStatus};

/// Read-facing projection of an order, always built from stored rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub menu_item_id: i64,
    pub quantity: u32,
    pub price: Option<Decimal>,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            price: item.price,
        }
    }
}

impl OrderSummary {
    pub fn new(order: &Order, items: &[OrderItem]) -> Self {
        Self {
            order_id: order.id,
            status: order.status.clone(),
            total_amount: order.total_amount,
            created_at: order.created_at,
            items: items.iter().map(OrderItemResponse::from).collect(),
        }
    }
}
