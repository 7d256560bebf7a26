//! Common API DTOs
//!
//! Every endpoint answers with the same envelope:
//! `{success, message, data?, errors?, errorCode?, timestamp, pagination?}`.

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::types::{DomainError, FieldError, PaginatedResult};

/// Standard response envelope
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
            error_code: None,
            timestamp: Utc::now(),
            pagination: None,
        }
    }

    pub fn error(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
            error_code: Some(error_code.into()),
            timestamp: Utc::now(),
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, meta: PageMeta) -> Self {
        self.pagination = Some(meta);
        self
    }
}

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl PageMeta {
    pub fn from_result<T>(result: &PaginatedResult<T>) -> Self {
        Self {
            total: result.total,
            page: result.page,
            limit: result.limit,
            total_pages: result.total_pages,
        }
    }
}

/// Raw pagination query parameters; clamped by the validation layer
#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Handler error half: a status plus the error envelope
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Map the domain taxonomy onto HTTP statuses and the error envelope.
pub fn error_response(err: DomainError) -> ApiError {
    let status = match &err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::BadRequest(_)
        | DomainError::IllegalTransition(_)
        | DomainError::MachineOffline(_)
        | DomainError::PalletFull { .. }
        | DomainError::PalletMaintenance { .. }
        | DomainError::PositionTaken(_)
        | DomainError::OccupantNotFound(_)
        | DomainError::Cancelled => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::AccountLocked(_) => StatusCode::LOCKED,
        DomainError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = ApiResponse::error(err.to_string(), err.error_code());
    if let DomainError::Validation(fields) = err {
        body.errors = Some(fields);
    }
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (DomainError::not_found("booking", "id", "x"), 404),
            (DomainError::validation("phone", "bad"), 422),
            (DomainError::Conflict("dup".into()), 409),
            (DomainError::Forbidden("no".into()), 403),
            (DomainError::Unauthorized("no".into()), 401),
            (DomainError::IllegalTransition("done".into()), 400),
            (
                DomainError::PalletFull {
                    machine: "M001".into(),
                    pallet: "1".into(),
                },
                400,
            ),
            (DomainError::AccountLocked("5 attempts".into()), 423),
            (DomainError::RateLimited, 429),
            (DomainError::Unavailable("store".into()), 503),
            (DomainError::Internal("boom".into()), 500),
        ];
        for (err, expected) in cases {
            let (status, body) = error_response(err);
            assert_eq!(status.as_u16(), expected);
            assert!(!body.0.success);
            assert!(body.0.error_code.is_some());
        }
    }

    #[test]
    fn validation_errors_carry_field_details() {
        let (_, body) = error_response(DomainError::validation("otp", "must be 6 digits"));
        let errors = body.0.errors.as_ref().unwrap();
        assert_eq!(errors[0].field, "otp");
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let response = ApiResponse::success("ok", serde_json::json!({"x": 1}))
            .with_pagination(PageMeta {
                total: 5,
                page: 1,
                limit: 20,
                total_pages: 1,
            });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("errorCode").is_none());
        assert_eq!(json["pagination"]["totalPages"], 1);
        assert!(json.get("timestamp").is_some());
    }
}
