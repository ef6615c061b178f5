//! Persistence seams consumed by the engine. Components hold these as
//! `Arc<dyn IssueStore>` / `Arc<dyn UserStore>`.

use async_trait::async_trait;

use civictrack_common::{
    Category, FlagOutcome, Issue, IssueFilter, IssueId, IssueStatus, NewFlag, NewIssue, NewUser,
    User, UserId,
};

use crate::error::StoreResult;

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Insert an already-validated issue. Status starts at `reported`.
    async fn create_issue(&self, issue: &NewIssue) -> StoreResult<IssueId>;

    /// Attach one image reference. Images keep insertion order.
    async fn add_image(&self, issue_id: IssueId, filename: &str) -> StoreResult<()>;

    /// Any issue, hidden or not.
    async fn get_by_id(&self, id: IssueId) -> StoreResult<Issue>;

    /// Visible issues matching the equality filters, in no particular order.
    async fn list_candidates(&self, filter: IssueFilter) -> StoreResult<Vec<Issue>>;

    /// Hidden issues, most-flagged first, then most recently updated.
    async fn list_flagged(&self) -> StoreResult<Vec<Issue>>;

    async fn set_status(&self, id: IssueId, status: IssueStatus) -> StoreResult<()>;

    /// Bump the flag counter without touching flag records. Returns the new count.
    async fn increment_flag(&self, id: IssueId) -> StoreResult<i64>;

    async fn set_flagged(&self, id: IssueId, flagged: bool) -> StoreResult<()>;

    /// Zero the counter, clear `is_flagged` and drop every flag record of the
    /// issue. Returns how many records were dropped.
    async fn reset_flags(&self, id: IssueId) -> StoreResult<u64>;

    /// Record one user's flag and bump the counter in a single transaction,
    /// hiding the issue once the counter reaches `hide_threshold`.
    async fn record_flag(&self, flag: &NewFlag, hide_threshold: i64) -> StoreResult<FlagOutcome>;

    async fn count_issues(&self) -> StoreResult<i64>;

    /// Only categories that have at least one issue.
    async fn issue_counts_by_category(&self) -> StoreResult<Vec<(Category, i64)>>;

    /// Only statuses that have at least one issue.
    async fn issue_counts_by_status(&self) -> StoreResult<Vec<(IssueStatus, i64)>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> StoreResult<UserId>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn set_banned(&self, id: UserId, banned: bool) -> StoreResult<()>;

    async fn count_users(&self) -> StoreResult<i64>;
}
