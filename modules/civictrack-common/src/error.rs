use thiserror::Error;

use crate::types::{IssueId, UserId};
use crate::validation::FieldError;

#[derive(Error, Debug)]
pub enum CivicError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("Issue {0} not found")]
    NotFound(IssueId),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Issue {issue_id} already flagged by user {user_id}")]
    AlreadyFlagged { issue_id: IssueId, user_id: UserId },

    /// Persistence failure. Display never carries the underlying detail.
    #[error("Internal store error")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type CivicResult<T> = std::result::Result<T, CivicError>;

impl CivicError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        CivicError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            CivicError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
