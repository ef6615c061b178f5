use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type IssueId = i64;
pub type UserId = i64;

/// Distinct flags after which an issue is hidden from discovery.
pub const AUTO_HIDE_THRESHOLD: i64 = 3;

pub const ANONYMOUS_REPORTER: &str = "Anonymous User";
pub const UNKNOWN_REPORTER: &str = "Unknown User";

// --- Enums ---

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Roads,
    Lighting,
    Water,
    Cleanliness,
    Safety,
    Obstructions,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Roads,
        Category::Lighting,
        Category::Water,
        Category::Cleanliness,
        Category::Safety,
        Category::Obstructions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Roads => "roads",
            Category::Lighting => "lighting",
            Category::Water => "water",
            Category::Cleanliness => "cleanliness",
            Category::Safety => "safety",
            Category::Obstructions => "obstructions",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Reported,
    InProgress,
    Resolved,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 3] = [
        IssueStatus::Reported,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Reported => "reported",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Moderation state of an issue. `Hidden` issues drop out of nearby search
/// but stay reachable by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn from_flagged(is_flagged: bool) -> Self {
        if is_flagged {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }
}

// --- Entities ---

/// A reported civic problem as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: IssueStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub reporter_id: Option<UserId>,
    /// Username of the reporting user, if the user row still exists.
    pub reporter_username: Option<String>,
    pub is_anonymous: bool,
    /// Blob keys, in upload order.
    pub images: Vec<String>,
    pub flag_count: i64,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_flagged(self.is_flagged)
    }

    pub fn reporter_display_name(&self) -> &str {
        if self.is_anonymous {
            ANONYMOUS_REPORTER
        } else {
            self.reporter_username.as_deref().unwrap_or(UNKNOWN_REPORTER)
        }
    }
}

/// Validated input for persisting a new issue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    /// `None` for anonymous reports.
    pub reporter_id: Option<UserId>,
    pub is_anonymous: bool,
}

/// Equality filters applied when gathering nearby candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub category: Option<Category>,
    pub status: Option<IssueStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFlag {
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub reason: Option<String>,
}

/// Counter state of an issue right after a flag was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagOutcome {
    pub flag_count: i64,
    pub is_flagged: bool,
    /// Hidden state before this flag landed.
    pub was_flagged: bool,
}

impl FlagOutcome {
    /// This flag moved the issue from `Visible` to `Hidden`.
    pub fn newly_hidden(&self) -> bool {
        self.is_flagged && !self.was_flagged
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
}
