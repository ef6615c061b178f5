//! Radius search over visible issues.
//!
//! Candidates come pre-filtered from the store (hidden issues never reach
//! this point). Distance filtering and ordering happen here, in memory.

use std::sync::Arc;

use tracing::debug;

use civictrack_common::validation::{
    check_latitude, check_longitude, check_radius, parse_category, parse_f64_field, parse_status,
    FieldErrors,
};
use civictrack_common::config::{DEFAULT_MAX_SEARCH_RADIUS_KM, DEFAULT_SEARCH_RADIUS_KM};
use civictrack_common::{haversine_km, Category, CivicResult, Issue, IssueFilter, IssueStatus};
use civictrack_store::IssueStore;

use crate::blob::BlobStore;
use crate::view::{IssueView, NearbyIssue};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchPolicy {
    /// Inclusive upper bound on the requested radius.
    pub max_radius_km: f64,
    /// Radius used when the caller gives none.
    pub default_radius_km: f64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_radius_km: DEFAULT_MAX_SEARCH_RADIUS_KM,
            default_radius_km: DEFAULT_SEARCH_RADIUS_KM,
        }
    }
}

/// A typed nearby query. `radius_km: None` falls back to the policy default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    pub category: Option<Category>,
    pub status: Option<IssueStatus>,
}

impl NearbyQuery {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            radius_km: None,
            category: None,
            status: None,
        }
    }

    pub fn radius(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    /// Parse a query from raw string parameters, reporting every bad field.
    pub fn parse(
        lat: Option<&str>,
        lng: Option<&str>,
        radius: Option<&str>,
        category: Option<&str>,
        status: Option<&str>,
    ) -> CivicResult<Self> {
        let mut errors = FieldErrors::new();

        let lat = match lat {
            Some(raw) => parse_f64_field("lat", raw, &mut errors),
            None => {
                errors.push("lat", "is required");
                None
            }
        };
        let lng = match lng {
            Some(raw) => parse_f64_field("lng", raw, &mut errors),
            None => {
                errors.push("lng", "is required");
                None
            }
        };
        let radius_km = radius.and_then(|raw| parse_f64_field("radius", raw, &mut errors));
        let category = category.and_then(|raw| parse_category("category", raw, &mut errors));
        let status = status.and_then(|raw| parse_status("status", raw, &mut errors));

        let query = Self {
            lat: lat.unwrap_or_default(),
            lng: lng.unwrap_or_default(),
            radius_km,
            category,
            status,
        };
        errors.finish(query)
    }
}

pub struct NearbySearch {
    store: Arc<dyn IssueStore>,
    blobs: Arc<dyn BlobStore>,
    policy: SearchPolicy,
}

impl NearbySearch {
    pub fn new(store: Arc<dyn IssueStore>, blobs: Arc<dyn BlobStore>, policy: SearchPolicy) -> Self {
        Self {
            store,
            blobs,
            policy,
        }
    }

    pub fn policy(&self) -> SearchPolicy {
        self.policy
    }

    /// Visible issues within the radius, nearest first, ties by ascending id.
    /// An empty result is not an error.
    pub async fn find_nearby(&self, query: NearbyQuery) -> CivicResult<Vec<NearbyIssue>> {
        let radius_km = query.radius_km.unwrap_or(self.policy.default_radius_km);

        let mut errors = FieldErrors::new();
        check_latitude("lat", query.lat, &mut errors);
        check_longitude("lng", query.lng, &mut errors);
        check_radius("radius", radius_km, self.policy.max_radius_km, &mut errors);
        errors.finish(())?;

        let filter = IssueFilter {
            category: query.category,
            status: query.status,
        };
        let candidates = self.store.list_candidates(filter).await?;
        let scanned = candidates.len();

        let hits = within_radius(candidates, query.lat, query.lng, radius_km);
        debug!(
            lat = query.lat,
            lng = query.lng,
            radius_km,
            scanned,
            matched = hits.len(),
            "Nearby search"
        );

        Ok(hits
            .into_iter()
            .map(|(issue, distance)| NearbyIssue {
                issue: IssueView::new(issue, self.blobs.as_ref()),
                distance,
            })
            .collect())
    }
}

/// Keep issues at most `radius_km` from the point (boundary inclusive),
/// sorted by distance then id.
pub fn within_radius(candidates: Vec<Issue>, lat: f64, lng: f64, radius_km: f64) -> Vec<(Issue, f64)> {
    let mut hits: Vec<(Issue, f64)> = candidates
        .into_iter()
        .map(|issue| {
            let d = haversine_km(lat, lng, issue.latitude, issue.longitude);
            (issue, d)
        })
        .filter(|(_, d)| *d <= radius_km)
        .collect();

    hits.sort_by(|(a, da), (b, db)| da.total_cmp(db).then(a.id.cmp(&b.id)));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn issue_at(id: i64, lat: f64, lng: f64) -> Issue {
        let now = Utc::now();
        Issue {
            id,
            title: format!("Issue {id}"),
            description: "Somewhere in the city".into(),
            category: Category::Roads,
            status: IssueStatus::Reported,
            latitude: lat,
            longitude: lng,
            address: None,
            reporter_id: None,
            reporter_username: None,
            is_anonymous: true,
            images: vec![],
            flag_count: 0,
            is_flagged: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sorted_by_distance_then_id() {
        let hits = within_radius(
            vec![
                issue_at(3, 18.5300, 73.8502),
                issue_at(2, 18.5211, 73.8502),
                issue_at(1, 18.5211, 73.8502),
            ],
            18.5211,
            73.8502,
            3.0,
        );
        let ids: Vec<i64> = hits.iter().map(|(i, _)| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn boundary_distance_is_included() {
        let far = issue_at(9, 18.6, 73.9);
        let exact = haversine_km(18.5211, 73.8502, 18.6, 73.9);

        assert_eq!(within_radius(vec![far.clone()], 18.5211, 73.8502, exact).len(), 1);
        assert!(within_radius(vec![far], 18.5211, 73.8502, exact - 1e-9).is_empty());
    }

    #[test]
    fn parse_collects_every_bad_field() {
        let err = NearbyQuery::parse(Some("abc"), None, Some("x"), Some("potholes"), Some("done"))
            .unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["lat", "lng", "radius", "category", "status"]);
    }

    #[test]
    fn parse_accepts_optional_filters() {
        let q = NearbyQuery::parse(Some("18.5211"), Some("73.8502"), None, Some("water"), None).unwrap();
        assert_eq!(q.radius_km, None);
        assert_eq!(q.category, Some(Category::Water));
        assert_eq!(q.status, None);
    }

    #[test]
    fn empty_filters_are_rejected_not_ignored() {
        let err = NearbyQuery::parse(Some("18.5211"), Some("73.8502"), None, Some(""), Some(""))
            .unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["category", "status"]);
    }
}
