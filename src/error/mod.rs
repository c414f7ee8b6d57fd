use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deadpool_redis::redis;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::infrastructure::db::entities::order::OrderStatus;

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(error: JsonRpcError, id: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error,
        }
    }

    pub fn from_error(err: &AppError, id: Option<Value>) -> Value {
        serde_json::to_value(Self::new(err.user_safe_format(), id)).unwrap_or_else(|_| {
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": { "code": -32603, "message": "Internal server error" }
            })
        })
    }
}

/// Coarse error classes every boundary maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    IllegalTransition,
    Conflict,
    GuardFailed,
    ExternalFailure,
    ValidationFailure,
    Unavailable,
    NotFound,
    Internal,
}

/// Machine-readable reason for a failed precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardReason {
    TransactionIdMissing,
    ShootingNotCompleted,
    FinalImageMissing,
    HdImageMissing,
    NoAiTasks,
    NoPicks,
    ExtraPaymentPending,
    PrinterNotAcknowledged,
    PrinterDispatchPending,
    TrackingNumberMissing,
    TaskNotSubmittable,
    TaskNotFailed,
    InsufficientBalance,
    CouponUnavailable,
    CouponExpired,
    CouponNotOwned,
    SelectionClosed,
    DispatchNotReady,
    CancelAwaitingPrinter,
    ProviderInactive,
    TriggerNotAllowed,
}

impl GuardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionIdMissing => "transaction_id_missing",
            Self::ShootingNotCompleted => "shooting_not_completed",
            Self::FinalImageMissing => "final_image_missing",
            Self::HdImageMissing => "hd_image_missing",
            Self::NoAiTasks => "no_ai_tasks",
            Self::NoPicks => "no_picks",
            Self::ExtraPaymentPending => "extra_payment_pending",
            Self::PrinterNotAcknowledged => "printer_not_acknowledged",
            Self::PrinterDispatchPending => "printer_dispatch_pending",
            Self::TrackingNumberMissing => "tracking_number_missing",
            Self::TaskNotSubmittable => "task_not_submittable",
            Self::TaskNotFailed => "task_not_failed",
            Self::InsufficientBalance => "insufficient_balance",
            Self::CouponUnavailable => "coupon_unavailable",
            Self::CouponExpired => "coupon_expired",
            Self::CouponNotOwned => "coupon_not_owned",
            Self::SelectionClosed => "selection_closed",
            Self::DispatchNotReady => "dispatch_not_ready",
            Self::CancelAwaitingPrinter => "cancel_awaiting_printer",
            Self::ProviderInactive => "provider_inactive",
            Self::TriggerNotAllowed => "trigger_not_allowed",
        }
    }
}

impl std::fmt::Display for GuardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid params - {0}")]
    InvalidParams(String),

    #[error("Internal server error - {0}")]
    InternalServerError(String),

    #[error("Database error - {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Redis error - {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("HTTP client error - {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error - {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error - {0}")]
    IoError(#[from] std::io::Error),

    #[error("TryInitError - {0}")]
    TryInitError(#[from] tracing_subscriber::util::TryInitError),

    #[error("Order not found")]
    OrderNotFound,

    #[error("AI task not found")]
    TaskNotFound,

    #[error("AI provider not found")]
    ProviderNotFound,

    #[error("Franchisee not found")]
    FranchiseeNotFound,

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Conflict - {0}")]
    Conflict(String),

    #[error("Guard failed - {0}")]
    GuardFailed(GuardReason),

    #[error("External failure from {service} - {message}")]
    ExternalFailure { service: String, message: String },

    #[error("Unavailable - {0}")]
    Unavailable(String),

    #[error("Coupon already consumed for this order")]
    CouponAlreadyConsumed,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Method not found - {0}")]
    MethodNotFound(String),
}

impl AppError {
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalFailure {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::GuardFailed(_) | Self::CouponAlreadyConsumed => ErrorKind::GuardFailed,
            Self::ExternalFailure { .. } | Self::HttpError(_) => ErrorKind::ExternalFailure,
            Self::InvalidParams(_)
            | Self::InvalidSignature
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::Unauthorized
            | Self::MethodNotFound(_) => ErrorKind::ValidationFailure,
            Self::DatabaseError(_) | Self::RedisError(_) | Self::Unavailable(_) => {
                ErrorKind::Unavailable
            }
            Self::OrderNotFound
            | Self::TaskNotFound
            | Self::ProviderNotFound
            | Self::FranchiseeNotFound
            | Self::CouponNotFound => ErrorKind::NotFound,
            Self::InternalServerError(_)
            | Self::SerializationError(_)
            | Self::IoError(_)
            | Self::TryInitError(_) => ErrorKind::Internal,
        }
    }

    /// Stable code callers can branch on.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::GuardFailed(reason) => reason.as_str(),
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Conflict(_) => "conflict",
            Self::ExternalFailure { .. } | Self::HttpError(_) => "external_failure",
            Self::InvalidParams(_) => "invalid_params",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::Unauthorized => "unauthorized",
            Self::MethodNotFound(_) => "method_not_found",
            Self::DatabaseError(_) | Self::RedisError(_) | Self::Unavailable(_) => "unavailable",
            Self::OrderNotFound => "order_not_found",
            Self::TaskNotFound => "task_not_found",
            Self::ProviderNotFound => "provider_not_found",
            Self::FranchiseeNotFound => "franchisee_not_found",
            Self::CouponNotFound => "coupon_not_found",
            Self::CouponAlreadyConsumed => "coupon_already_consumed",
            Self::InternalServerError(_)
            | Self::SerializationError(_)
            | Self::IoError(_)
            | Self::TryInitError(_) => "internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParams(_) => -32602,
            Self::InternalServerError(_) => -32603,
            Self::MethodNotFound(_) => -32601,
            Self::DatabaseError(_) => -32070,
            Self::RedisError(_) => -32071,
            Self::SerializationError(_) => -32072,
            Self::HttpError(_) => -32061,
            Self::IoError(_) | Self::TryInitError(_) => -32080,
            Self::OrderNotFound => -32030,
            Self::TaskNotFound => -32031,
            Self::ProviderNotFound => -32032,
            Self::FranchiseeNotFound => -32033,
            Self::CouponNotFound => -32034,
            Self::IllegalTransition { .. } => -32040,
            Self::Conflict(_) => -32041,
            Self::GuardFailed(_) => -32042,
            Self::CouponAlreadyConsumed => -32043,
            Self::ExternalFailure { .. } => -32060,
            Self::Unavailable(_) => -32073,
            Self::Unauthorized => -32020,
            Self::TokenExpired => -32021,
            Self::InvalidToken => -32022,
            Self::InvalidSignature => -32012,
        }
    }

    fn error_data(&self) -> Value {
        json!({ "kind": self.kind(), "reason": self.reason_code() })
    }

    pub fn user_safe_format(&self) -> JsonRpcError {
        match self {
            Self::InvalidParams(msg) => JsonRpcError {
                code: self.code(),
                message: msg.clone(),
                data: Some(self.error_data()),
            },
            Self::DatabaseError(error) => {
                tracing::error!(error = %error, "Database error");

                JsonRpcError {
                    code: self.code(),
                    message: "Service temporarily unavailable. Please try again later.".to_string(),
                    data: Some(self.error_data()),
                }
            }
            Self::RedisError(error) => {
                tracing::error!(error = %error, "Redis error");

                JsonRpcError {
                    code: self.code(),
                    message: "Service temporarily unavailable. Please try again later.".to_string(),
                    data: Some(self.error_data()),
                }
            }
            Self::HttpError(error) => {
                tracing::error!(error = %error, "Outbound HTTP error");

                JsonRpcError {
                    code: self.code(),
                    message: "Upstream service failed. Please try again.".to_string(),
                    data: Some(self.error_data()),
                }
            }
            Self::SerializationError(error) => {
                tracing::error!(error = %error, "Serialization error");

                JsonRpcError {
                    code: self.code(),
                    message: "Internal server error".to_string(),
                    data: None,
                }
            }
            Self::InternalServerError(error) => {
                tracing::error!(error = %error, "Internal server error");

                JsonRpcError {
                    code: self.code(),
                    message: "Internal server error".to_string(),
                    data: None,
                }
            }
            Self::IoError(error) => {
                tracing::error!(error = %error, "IO error");

                JsonRpcError {
                    code: self.code(),
                    message: "Service temporarily unavailable. Please try again later.".to_string(),
                    data: None,
                }
            }
            Self::TryInitError(error) => {
                tracing::error!(error = %error, "TryInitError");

                JsonRpcError {
                    code: self.code(),
                    message: "Internal server error".to_string(),
                    data: None,
                }
            }
            Self::IllegalTransition { from, to } => JsonRpcError {
                code: self.code(),
                message: format!("Order cannot move from {from} to {to}"),
                data: Some(json!({
                    "kind": self.kind(),
                    "reason": self.reason_code(),
                    "from": from,
                    "to": to,
                })),
            },
            Self::ExternalFailure { service, message } => {
                tracing::warn!(service = %service, error = %message, "External failure");

                JsonRpcError {
                    code: self.code(),
                    message: format!("{service} rejected the request"),
                    data: Some(self.error_data()),
                }
            }
            Self::MethodNotFound(method) => JsonRpcError {
                code: self.code(),
                message: format!("Method '{}' not found", method),
                data: None,
            },
            _ => JsonRpcError {
                code: self.code(),
                message: self.to_string(),
                data: Some(self.error_data()),
            },
        }
    }
}

impl From<&AppError> for JsonRpcError {
    fn from(error: &AppError) -> Self {
        error.user_safe_format()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::ValidationFailure => match &self {
                Self::InvalidSignature | Self::Unauthorized | Self::TokenExpired => {
                    StatusCode::UNAUTHORIZED
                }
                _ => StatusCode::BAD_REQUEST,
            },
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IllegalTransition | ErrorKind::Conflict | ErrorKind::GuardFailed => {
                StatusCode::CONFLICT
            }
            ErrorKind::ExternalFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let json_error = self.user_safe_format();
        let body = serde_json::to_string(&json_error)
            .unwrap_or_else(|_| r#"{"code":-32603,"message":"Internal server error"}"#.to_string());

        (status, [("content-type", "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_failures_carry_reason_codes() {
        let err = AppError::GuardFailed(GuardReason::InsufficientBalance);
        assert_eq!(err.kind(), ErrorKind::GuardFailed);
        assert_eq!(err.reason_code(), "insufficient_balance");

        let formatted = err.user_safe_format();
        let data = formatted.data.unwrap();
        assert_eq!(data["reason"], "insufficient_balance");
        assert_eq!(data["kind"], "guard_failed");
    }

    #[test]
    fn illegal_transition_reports_both_states() {
        let err = AppError::IllegalTransition {
            from: OrderStatus::Unpaid,
            to: OrderStatus::Shipped,
        };
        let formatted = err.user_safe_format();
        let data = formatted.data.unwrap();
        assert_eq!(data["from"], "unpaid");
        assert_eq!(data["to"], "shipped");
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn persistence_errors_are_unavailable() {
        let err = AppError::DatabaseError(sea_orm::DbErr::Custom("down".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.reason_code(), "unavailable");
    }
}
