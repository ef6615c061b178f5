use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use civictrack_common::{Category, CivicResult, IssueStatus};
use civictrack_store::{IssueStore, UserStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_users: i64,
    pub total_issues: i64,
    pub by_category: Vec<CategoryCount>,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: IssueStatus,
    pub count: i64,
}

/// Read-only dashboard counts. Not a consistent snapshot across the four reads.
pub struct Analytics {
    issues: Arc<dyn IssueStore>,
    users: Arc<dyn UserStore>,
}

impl Analytics {
    pub fn new(issues: Arc<dyn IssueStore>, users: Arc<dyn UserStore>) -> Self {
        Self { issues, users }
    }

    pub async fn compute(&self) -> CivicResult<AnalyticsReport> {
        let total_users = self.users.count_users().await?;
        let total_issues = self.issues.count_issues().await?;
        let by_category = self.issues.issue_counts_by_category().await?;
        let by_status = self.issues.issue_counts_by_status().await?;

        Ok(AnalyticsReport {
            total_users,
            total_issues,
            by_category: fill_categories(by_category),
            by_status: fill_statuses(by_status),
        })
    }
}

/// Every category in declaration order, zero when absent.
fn fill_categories(counts: Vec<(Category, i64)>) -> Vec<CategoryCount> {
    let counts: HashMap<Category, i64> = counts.into_iter().collect();
    Category::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: counts.get(&category).copied().unwrap_or(0),
        })
        .collect()
}

fn fill_statuses(counts: Vec<(IssueStatus, i64)>) -> Vec<StatusCount> {
    let counts: HashMap<IssueStatus, i64> = counts.into_iter().collect();
    IssueStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: counts.get(&status).copied().unwrap_or(0),
        })
        .collect()
}
