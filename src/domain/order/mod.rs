mod commands;
mod engine;
mod errors;
mod summary;

pub use commands::{order_total, CreateOrder, OrderItemRequest, UpdateOrder, MAX_QUANTITY};
pub use engine::{OrderEngine, WriteMode};
pub use errors::OrderError;
pub use summary::{OrderItemResponse, OrderSummary};
