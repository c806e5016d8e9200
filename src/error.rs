// src/error.rs
//! Error types shared by vendor clients and HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure talking to a third-party API
#[derive(Error, Debug)]
pub enum VendorError {
    #[error("{vendor} request failed: {source}")]
    Http {
        vendor: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{vendor} API error ({status}): {body}")]
    Api {
        vendor: &'static str,
        status: u16,
        body: String,
    },
    #[error("{vendor} returned an unexpected payload: {message}")]
    Decode {
        vendor: &'static str,
        message: String,
    },
    #[error("{vendor} response is missing '{field}'")]
    MissingField {
        vendor: &'static str,
        field: &'static str,
    },
}

impl VendorError {
    pub fn http(vendor: &'static str, source: reqwest::Error) -> Self {
        Self::Http { vendor, source }
    }

    pub fn decode(vendor: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            vendor,
            message: message.to_string(),
        }
    }

    pub fn vendor(&self) -> &'static str {
        match self {
            Self::Http { vendor, .. }
            | Self::Api { vendor, .. }
            | Self::Decode { vendor, .. }
            | Self::MissingField { vendor, .. } => vendor,
        }
    }

    /// Whether retrying the same request later can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_connect() || source.is_timeout(),
            Self::Api { status, .. } => is_transient_status(*status),
            Self::Decode { .. } | Self::MissingField { .. } => false,
        }
    }

    /// Whether a job-creating request that failed this way never reached the vendor
    pub fn is_safe_to_resubmit(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_connect(),
            Self::Api { status, .. } => *status == 429,
            Self::Decode { .. } | Self::MissingField { .. } => false,
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Error returned by HTTP handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Vendor(#[from] VendorError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Vendor(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::NotConfigured(_) => "NOT_CONFIGURED",
            AppError::Vendor(_) => "VENDOR_ERROR",
            AppError::Database(sqlx::Error::RowNotFound) => "NOT_FOUND",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            // Don't leak SQL details to clients
            AppError::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Vendor(e) => {
                tracing::error!(vendor = e.vendor(), "Vendor call failed: {}", e);
                e.to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "code": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_transient_status(status), "{} should be transient", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_transient_status(status), "{} should be permanent", status);
        }
    }

    #[test]
    fn test_vendor_api_error_transience() {
        let err = VendorError::Api {
            vendor: "fal",
            status: 503,
            body: "busy".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.vendor(), "fal");

        let err = VendorError::MissingField {
            vendor: "a2e",
            field: "_id",
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotConfigured("Fal.ai").status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        let vendor = AppError::from(VendorError::decode("replicate", "bad json"));
        assert_eq!(vendor.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(vendor.code(), "VENDOR_ERROR");
    }
}
