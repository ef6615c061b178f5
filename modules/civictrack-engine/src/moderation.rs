//! Flag / moderation state machine.
//!
//! Each issue is `Visible` or `Hidden`. A user's flag is the only automatic
//! way into `Hidden` (on reaching [`AUTO_HIDE_THRESHOLD`] distinct flags); a
//! moderator reset is the only way back.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use civictrack_common::{
    validate_flag_reason, CivicResult, IssueId, IssueStatus, NewFlag, UserId, Visibility,
    AUTO_HIDE_THRESHOLD,
};
use civictrack_store::{IssueStore, UserStore};

use crate::blob::BlobStore;
use crate::view::IssueView;

/// State of an issue right after a flag was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagReceipt {
    pub issue_id: IssueId,
    pub flag_count: i64,
    pub visibility: Visibility,
    /// This flag is the one that took the issue from `Visible` to `Hidden`.
    pub newly_hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnflagReceipt {
    pub issue_id: IssueId,
    /// Per-user flag records discarded by the reset.
    pub cleared_flags: u64,
}

pub struct Moderation {
    issues: Arc<dyn IssueStore>,
    users: Arc<dyn UserStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Moderation {
    pub fn new(issues: Arc<dyn IssueStore>, users: Arc<dyn UserStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { issues, users, blobs }
    }

    /// Record `user_id`'s flag on `issue_id`. Fails with `AlreadyFlagged` on a
    /// repeat and `NotFound` for a missing issue. Hidden issues keep counting.
    pub async fn flag(
        &self,
        issue_id: IssueId,
        user_id: UserId,
        reason: Option<String>,
    ) -> CivicResult<FlagReceipt> {
        let reason = validate_flag_reason(reason)?;

        let outcome = self
            .issues
            .record_flag(
                &NewFlag {
                    issue_id,
                    user_id,
                    reason,
                },
                AUTO_HIDE_THRESHOLD,
            )
            .await?;

        let newly_hidden = outcome.newly_hidden();
        info!(issue_id, user_id, flag_count = outcome.flag_count, "Issue flagged");
        if newly_hidden {
            info!(issue_id, flag_count = outcome.flag_count, "Issue auto-hidden");
        }

        Ok(FlagReceipt {
            issue_id,
            flag_count: outcome.flag_count,
            visibility: Visibility::from_flagged(outcome.is_flagged),
            newly_hidden,
        })
    }

    /// Moderator reset: counter to zero, `Visible`, flag records dropped.
    /// Applies whatever the current state is.
    pub async fn unflag(&self, issue_id: IssueId) -> CivicResult<UnflagReceipt> {
        let cleared_flags = self.issues.reset_flags(issue_id).await?;
        info!(issue_id, cleared_flags, "Issue flags reset by moderator");
        Ok(UnflagReceipt {
            issue_id,
            cleared_flags,
        })
    }

    /// Every hidden issue, most-flagged first, then most recently updated.
    pub async fn flagged_issues(&self) -> CivicResult<Vec<IssueView>> {
        let issues = self.issues.list_flagged().await?;
        Ok(issues
            .into_iter()
            .map(|issue| IssueView::new(issue, self.blobs.as_ref()))
            .collect())
    }

    pub async fn set_status(&self, issue_id: IssueId, status: IssueStatus) -> CivicResult<()> {
        self.issues.set_status(issue_id, status).await?;
        info!(issue_id, %status, "Issue status changed");
        Ok(())
    }

    pub async fn set_user_banned(&self, user_id: UserId, banned: bool) -> CivicResult<()> {
        self.users.set_banned(user_id, banned).await?;
        info!(user_id, banned, "User ban updated");
        Ok(())
    }
}
