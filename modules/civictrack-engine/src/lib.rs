//! CivicTrack core: issue reporting, nearby discovery, flag moderation and
//! dashboard analytics over the store traits.

pub mod analytics;
pub mod blob;
pub mod moderation;
pub mod nearby;
pub mod reporting;
pub mod view;

use std::sync::Arc;

use civictrack_store::{IssueStore, UserStore};

pub use analytics::{Analytics, AnalyticsReport, CategoryCount, StatusCount};
pub use blob::{BlobStore, LocalBlobStore};
pub use moderation::{FlagReceipt, Moderation, UnflagReceipt};
pub use nearby::{NearbyQuery, NearbySearch, SearchPolicy};
pub use reporting::{CreatedIssue, ImageUpload, Reporting};
pub use view::{IssueView, NearbyIssue};

/// The wired core. Built once at startup; every component shares the same
/// store handles.
pub struct CivicTrack {
    pub reports: Reporting,
    pub nearby: NearbySearch,
    pub moderation: Moderation,
    pub analytics: Analytics,
}

impl CivicTrack {
    pub fn new(
        issues: Arc<dyn IssueStore>,
        users: Arc<dyn UserStore>,
        blobs: Arc<dyn BlobStore>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            reports: Reporting::new(issues.clone(), blobs.clone()),
            nearby: NearbySearch::new(issues.clone(), blobs.clone(), policy),
            moderation: Moderation::new(issues.clone(), users.clone(), blobs),
            analytics: Analytics::new(issues, users),
        }
    }
}
