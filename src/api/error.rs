use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::domain::order::OrderError;
use crate::models::OrderId;

/// Errors surfaced by the HTTP boundary
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Order(OrderError::TotalOverflow) => "TOTAL_OVERFLOW",
            Self::Order(OrderError::QuantityOutOfRange { .. }) => "QUANTITY_OUT_OF_RANGE",
            Self::Order(OrderError::Persistence(_)) => "PERSISTENCE_ERROR",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_)
            | Self::Order(OrderError::TotalOverflow)
            | Self::Order(OrderError::QuantityOutOfRange { .. }) => StatusCode::BAD_REQUEST,
            Self::Order(OrderError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Store details stay in the log
        let message = match self {
            Self::Order(OrderError::Persistence(e)) => {
                tracing::error!(error = %e, "Order persistence failed");
                "Internal error, please retry later".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "code": self.error_code(),
            "message": message,
        }))
    }
}
