use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity Types
// ============================================================================
//
// Identities are assigned by the store on first insert. Callers receive them
// back from the store and pass them around; nothing else mints them.
//
// ============================================================================

/// Store-assigned identity of an order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OrderId(i64);

impl OrderId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for OrderId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identity of an order item row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OrderItemId(i64);

impl OrderItemId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for OrderItemId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Order Status
// ============================================================================

/// Free-form status label. Only `CREATED` is produced today; other labels
/// round-trip through the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
    pub const CREATED: &'static str = "CREATED";

    pub fn created() -> Self {
        Self(Self::CREATED.to_string())
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// Current time at the precision Postgres TIMESTAMPTZ stores (microseconds),
/// so a value read back compares equal to the value written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub status: OrderStatus,
    /// Always the sum of the order's item line totals as of the last write
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order that has not been inserted yet and therefore has no identity
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewOrder {
    /// Empty order stub: status CREATED, zero total, both timestamps `now`.
    pub fn stub(customer_id: i64, restaurant_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            restaurant_id,
            status: OrderStatus::created(),
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            restaurant_id: self.restaurant_id,
            status: self.status,
            total_amount: self.total_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub menu_item_id: i64,
    pub quantity: u32,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub menu_item_id: i64,
    pub quantity: u32,
    pub price: Option<Decimal>,
}

impl NewOrderItem {
    pub fn with_id(self, id: OrderItemId) -> OrderItem {
        OrderItem {
            id,
            order_id: self.order_id,
            menu_item_id: self.menu_item_id,
            quantity: self.quantity,
            price: self.price,
        }
    }
}
