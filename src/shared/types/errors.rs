use serde::Serialize;
use thiserror::Error;

/// A single field that failed validation, as it appears in the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation failed: {}", .0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect::<Vec<_>>().join("; "))]
    Validation(Vec<FieldError>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Machine {0} is not online")]
    MachineOffline(String),

    #[error("Pallet {pallet} on machine {machine} is full")]
    PalletFull { machine: String, pallet: String },

    #[error("Pallet {pallet} on machine {machine} is under maintenance")]
    PalletMaintenance { machine: String, pallet: String },

    #[error("Position {0} is already occupied")]
    PositionTaken(u8),

    #[error("No occupant matching {0}")]
    OccupantNotFound(String),

    #[error("Account locked: {0}")]
    AccountLocked(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.into(),
        }
    }

    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable code used in the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::MachineOffline(_) => "MACHINE_OFFLINE",
            Self::PalletFull { .. } => "PALLET_FULL",
            Self::PalletMaintenance { .. } => "PALLET_MAINTENANCE",
            Self::PositionTaken(_) => "POSITION_TAKEN",
            Self::OccupantNotFound(_) => "OCCUPANT_NOT_FOUND",
            Self::AccountLocked(_) => "ACCOUNT_LOCKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Cancelled => "CANCELLED",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is likely transient (store connectivity) and the
    /// operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_lists_fields() {
        let err = DomainError::Validation(vec![
            FieldError::new("phone", "must be a 10-digit mobile number"),
            FieldError::new("email", "malformed"),
        ]);
        let text = err.to_string();
        assert!(text.contains("phone"));
        assert!(text.contains("email"));
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            DomainError::not_found("booking", "id", "abc").error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            DomainError::PalletFull {
                machine: "M001".into(),
                pallet: "1".into()
            }
            .error_code(),
            "PALLET_FULL"
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(DomainError::Unavailable("down".into()).is_transient());
        assert!(!DomainError::Internal("boom".into()).is_transient());
        assert!(!DomainError::RateLimited.is_transient());
    }
}
