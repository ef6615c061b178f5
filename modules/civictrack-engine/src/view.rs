//! Caller-facing shapes of an issue.

use chrono::{DateTime, Utc};
use serde::Serialize;

use civictrack_common::{Category, Issue, IssueId, IssueStatus};

use crate::blob::BlobStore;

/// An issue with its reporter resolved to a display name and its image keys
/// resolved to public URLs. The raw reporter id never leaves the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueView {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: IssueStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub reporter: String,
    pub is_anonymous: bool,
    pub images: Vec<String>,
    pub flag_count: i64,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueView {
    pub fn new(issue: Issue, blobs: &dyn BlobStore) -> Self {
        let reporter = issue.reporter_display_name().to_string();
        let images = issue.images.iter().map(|key| blobs.public_url(key)).collect();

        Self {
            id: issue.id,
            title: issue.title,
            description: issue.description,
            category: issue.category,
            status: issue.status,
            latitude: issue.latitude,
            longitude: issue.longitude,
            address: issue.address,
            reporter,
            is_anonymous: issue.is_anonymous,
            images,
            flag_count: issue.flag_count,
            is_flagged: issue.is_flagged,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }
}

/// One nearby search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyIssue {
    #[serde(flatten)]
    pub issue: IssueView,
    /// Great-circle distance from the query point, in km.
    pub distance: f64,
}
