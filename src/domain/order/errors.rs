use crate::store::StoreError;

// ============================================================================
// Order Engine Errors
// ============================================================================
//
// Absence is not an error: lookups return `None`, delete returns `false`.
// Publish failures never reach this type.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Order total exceeds the representable decimal range")]
    TotalOverflow,

    #[error("Quantity {quantity} for menu item {menu_item_id} is out of range")]
    QuantityOutOfRange { menu_item_id: i64, quantity: u32 },
}
