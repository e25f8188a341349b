use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Ledger feed unavailable: {0}")]
    Feed(#[from] ton_feed::FeedError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invoice already exists: {0}")]
    DuplicateInvoice(String),

    #[error("Could not allocate a free invoice code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<credit_core::Error> for GatewayError {
    fn from(err: credit_core::Error) -> Self {
        match err {
            credit_core::Error::InvoiceNotFound(code) => GatewayError::InvoiceNotFound(code),
            credit_core::Error::DuplicateInvoiceCode(code) => GatewayError::DuplicateInvoice(code),
            credit_core::Error::InvalidInvoice(msg) => GatewayError::Validation(msg),
            other => GatewayError::Store(other.to_string()),
        }
    }
}

impl From<settlement::Error> for GatewayError {
    fn from(err: settlement::Error) -> Self {
        match err {
            settlement::Error::InvoiceNotFound(code) => GatewayError::InvoiceNotFound(code),
            settlement::Error::Feed(e) => GatewayError::Feed(e),
            settlement::Error::Store(e) => e.into(),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<prometheus::Error> for GatewayError {
    fn from(err: prometheus::Error) -> Self {
        GatewayError::Internal(format!("Metrics error: {}", err))
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Feed(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::UserNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvoiceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DuplicateInvoice(_) => StatusCode::CONFLICT,
            GatewayError::CodeSpaceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    fn error_type(&self) -> &str {
        match self {
            GatewayError::Database(_) => "database_error",
            GatewayError::Store(_) => "store_error",
            GatewayError::Feed(_) => "feed_unavailable",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::UserNotFound(_) => "not_found",
            GatewayError::InvoiceNotFound(_) => "not_found",
            GatewayError::DuplicateInvoice(_) => "duplicate_error",
            GatewayError::CodeSpaceExhausted(_) => "code_space_exhausted",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}
