use thiserror::Error;

use civictrack_common::{CivicError, IssueId, UserId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("issue {0} not found")]
    IssueNotFound(IssueId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("issue {issue_id} already flagged by user {user_id}")]
    AlreadyFlagged { issue_id: IssueId, user_id: UserId },

    /// A persisted value that no longer maps onto the domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for CivicError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IssueNotFound(id) => CivicError::NotFound(id),
            StoreError::UserNotFound(id) => CivicError::UserNotFound(id),
            StoreError::AlreadyFlagged { issue_id, user_id } => {
                CivicError::AlreadyFlagged { issue_id, user_id }
            }
            other => CivicError::Store(Box::new(other)),
        }
    }
}
