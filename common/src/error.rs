use std::fmt::Display;

use thiserror::Error;

/// Every way a marketplace operation can be refused.
///
/// Authorization and transition errors are terminal for the request; validation
/// errors carry the offending field so callers can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("not permitted: {rule}")]
    Forbidden { rule: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} was expected to be {expected} but is now {actual}")]
    Conflict {
        entity: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("storage failure: {0}")]
    Store(String),
}

impl WorkflowError {
    pub fn forbidden(rule: impl Into<String>) -> Self {
        WorkflowError::Forbidden { rule: rule.into() }
    }

    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition(entity: &'static str, from: impl Display, to: impl Display) -> Self {
        WorkflowError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Field name for validation failures, used by the HTTP layer.
    pub fn field(&self) -> Option<&str> {
        match self {
            WorkflowError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Reject blank required text.
pub fn require_text(field: &str, value: &str) -> WorkflowResult<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Reject zero for quantities and prices that must be strictly positive.
pub fn require_positive(field: &str, value: u64) -> WorkflowResult<()> {
    if value == 0 {
        return Err(WorkflowError::validation(field, "must be greater than zero"));
    }
    Ok(())
}
