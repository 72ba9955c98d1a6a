use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use crate::models::{NewOrderItem, OrderId};

// ============================================================================
// Order Commands - what callers ask the engine to do
// ============================================================================

/// One requested line: catalog reference, quantity and unit price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub menu_item_id: i64,
    pub quantity: u32,
    /// JSON numbers are read digit for digit, never through `f64`
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub price: Option<Decimal>,
}

impl OrderItemRequest {
    /// `price × quantity`; a missing price contributes zero.
    /// `None` only on decimal overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        match self.price {
            Some(price) => price.checked_mul(Decimal::from(self.quantity)),
            None => Some(Decimal::ZERO),
        }
    }

    pub fn bind_to(&self, order_id: OrderId) -> NewOrderItem {
        NewOrderItem {
            order_id,
            menu_item_id: self.menu_item_id,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// Largest quantity an item row can hold (32-bit signed column)
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Sum of line totals, the only way an order total is ever derived.
///
/// Also the validation gate: every line is checked here, before the engine
/// writes anything, so a rejected request leaves no partial order behind.
pub fn order_total(items: &[OrderItemRequest]) -> Result<Decimal, OrderError> {
    let mut total = Decimal::ZERO;
    for item in items {
        if item.quantity > MAX_QUANTITY {
            return Err(OrderError::QuantityOutOfRange {
                menu_item_id: item.menu_item_id,
                quantity: item.quantity,
            });
        }
        total = item
            .line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or(OrderError::TotalOverflow)?;
    }
    Ok(total)
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub items: Vec<OrderItemRequest>,
}

/// Absent ids keep their stored values; `items` always replaces the whole set
#[derive(Debug, Clone, Default)]
pub struct UpdateOrder {
    pub customer_id: Option<i64>,
    pub restaurant_id: Option<i64>,
    pub items: Vec<OrderItemRequest>,
}
