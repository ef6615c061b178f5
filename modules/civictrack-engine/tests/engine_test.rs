//! End-to-end behaviour of the core against an in-memory store.

use std::sync::Arc;

use civictrack_common::{
    haversine_km, Category, CivicError, IssueStatus, IssueSubmission, NewUser, Visibility,
};
use civictrack_engine::{
    BlobStore, CivicTrack, ImageUpload, LocalBlobStore, NearbyQuery, SearchPolicy,
};
use civictrack_store::{IssueStore, SqliteStore, UserStore};

const PUNE: (f64, f64) = (18.5211, 73.8502);

struct Harness {
    core: CivicTrack,
    store: Arc<SqliteStore>,
    _uploads: tempfile::TempDir,
}

async fn harness() -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(uploads.path()));
    let core = CivicTrack::new(store.clone(), store.clone(), blobs, SearchPolicy::default());
    Harness {
        core,
        store,
        _uploads: uploads,
    }
}

fn submission(title: &str, category: &str, lat: f64, lng: f64) -> IssueSubmission {
    IssueSubmission {
        title: title.to_string(),
        description: "Needs attention from the ward office".to_string(),
        category: category.to_string(),
        latitude: lat.to_string(),
        longitude: lng.to_string(),
        address: None,
        is_anonymous: None,
    }
}

async fn report(h: &Harness, title: &str, category: &str, lat: f64, lng: f64) -> i64 {
    h.core
        .reports
        .create_issue(submission(title, category, lat, lng), vec![], None)
        .await
        .unwrap()
        .issue_id
}

async fn user(h: &Harness, name: &str) -> i64 {
    h.store
        .create_user(&NewUser {
            email: format!("{name}@example.org"),
            username: Some(name.to_string()),
        })
        .await
        .unwrap()
}

fn nearby_ids(hits: &[civictrack_engine::NearbyIssue]) -> Vec<i64> {
    hits.iter().map(|h| h.issue.id).collect()
}

// =========================================================================
// Nearby search
// =========================================================================

#[tokio::test]
async fn nearby_returns_only_issues_in_radius_sorted_by_distance() {
    let h = harness().await;
    let b = report(&h, "Dark streetlamp", "lighting", 18.5211, 73.8700).await;
    let a = report(&h, "Pothole near stop", "roads", 18.5300, 73.8502).await;
    let _far = report(&h, "Far drain issue", "water", 18.5611, 73.8502).await;
    let here = report(&h, "Garbage at corner", "cleanliness", PUNE.0, PUNE.1).await;

    let hits = h
        .core
        .nearby
        .find_nearby(NearbyQuery::at(PUNE.0, PUNE.1).radius(3.0))
        .await
        .unwrap();

    assert_eq!(nearby_ids(&hits), vec![here, a, b]);
    for hit in &hits {
        let d = haversine_km(PUNE.0, PUNE.1, hit.issue.latitude, hit.issue.longitude);
        assert!(d <= 3.0);
        assert_eq!(hit.distance, d);
    }
    assert_eq!(hits[0].distance, 0.0);
}

#[tokio::test]
async fn nearby_uses_default_radius_when_omitted() {
    let h = harness().await;
    report(&h, "Far drain issue", "water", 18.5611, 73.8502).await;

    let default = h.core.nearby.find_nearby(NearbyQuery::at(PUNE.0, PUNE.1)).await.unwrap();
    assert!(default.is_empty());

    let wide = h
        .core
        .nearby
        .find_nearby(NearbyQuery::at(PUNE.0, PUNE.1).radius(5.0))
        .await
        .unwrap();
    assert_eq!(wide.len(), 1);
}

#[tokio::test]
async fn nearby_applies_category_and_status_filters() {
    let h = harness().await;
    let road = report(&h, "Pothole near stop", "roads", 18.5300, 73.8502).await;
    let lamp = report(&h, "Dark streetlamp", "lighting", 18.5211, 73.8700).await;
    h.core.moderation.set_status(lamp, IssueStatus::Resolved).await.unwrap();

    let roads = h
        .core
        .nearby
        .find_nearby(NearbyQuery {
            category: Some(Category::Roads),
            ..NearbyQuery::at(PUNE.0, PUNE.1)
        })
        .await
        .unwrap();
    assert_eq!(nearby_ids(&roads), vec![road]);

    let resolved = h
        .core
        .nearby
        .find_nearby(NearbyQuery {
            status: Some(IssueStatus::Resolved),
            ..NearbyQuery::at(PUNE.0, PUNE.1)
        })
        .await
        .unwrap();
    assert_eq!(nearby_ids(&resolved), vec![lamp]);
}

#[tokio::test]
async fn nearby_rejects_radius_outside_policy() {
    let h = harness().await;
    for radius in [0.0, -1.0, 5.01] {
        let err = h
            .core
            .nearby
            .find_nearby(NearbyQuery::at(PUNE.0, PUNE.1).radius(radius))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "radius");
    }
}

#[tokio::test]
async fn nearby_with_no_matches_is_empty_not_error() {
    let h = harness().await;
    let hits = h.core.nearby.find_nearby(NearbyQuery::at(0.0, 0.0)).await.unwrap();
    assert!(hits.is_empty());
}

// =========================================================================
// Moderation
// =========================================================================

#[tokio::test]
async fn three_flags_hide_issue_and_unflag_restores_it() {
    let h = harness().await;
    for n in 1..42 {
        report(&h, &format!("Filler report {n}"), "roads", 0.0, 0.0).await;
    }
    let issue = report(&h, "Suspicious listing", "safety", 18.5300, 73.8502).await;
    assert_eq!(issue, 42);

    let mut receipts = Vec::new();
    for (name, reason) in [("u1", "spam"), ("u2", "duplicate"), ("u3", "offensive")] {
        let uid = user(&h, name).await;
        receipts.push(
            h.core
                .moderation
                .flag(issue, uid, Some(reason.to_string()))
                .await
                .unwrap(),
        );
    }

    assert_eq!(receipts[1].visibility, Visibility::Visible);
    assert!(!receipts[1].newly_hidden);
    assert_eq!(receipts[2].flag_count, 3);
    assert_eq!(receipts[2].visibility, Visibility::Hidden);
    assert!(receipts[2].newly_hidden);

    let hits = h.core.nearby.find_nearby(NearbyQuery::at(PUNE.0, PUNE.1)).await.unwrap();
    assert!(!nearby_ids(&hits).contains(&issue));

    let hidden = h.core.reports.get_issue(issue).await.unwrap();
    assert!(hidden.is_flagged);

    let flagged = h.core.moderation.flagged_issues().await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, issue);

    let reset = h.core.moderation.unflag(issue).await.unwrap();
    assert_eq!(reset.cleared_flags, 3);

    let restored = h.core.reports.get_issue(issue).await.unwrap();
    assert_eq!(restored.flag_count, 0);
    assert!(!restored.is_flagged);
    let hits = h.core.nearby.find_nearby(NearbyQuery::at(PUNE.0, PUNE.1)).await.unwrap();
    assert!(nearby_ids(&hits).contains(&issue));
}

#[tokio::test]
async fn same_user_flagging_twice_counts_once() {
    let h = harness().await;
    let issue = report(&h, "Blocked footpath", "obstructions", PUNE.0, PUNE.1).await;
    let uid = user(&h, "repeat").await;

    h.core.moderation.flag(issue, uid, None).await.unwrap();
    let err = h.core.moderation.flag(issue, uid, None).await.unwrap_err();

    assert!(matches!(err, CivicError::AlreadyFlagged { .. }));
    assert_eq!(h.core.reports.get_issue(issue).await.unwrap().flag_count, 1);
}

#[tokio::test]
async fn previous_flagger_may_flag_again_after_reset() {
    let h = harness().await;
    let issue = report(&h, "Blocked footpath", "obstructions", PUNE.0, PUNE.1).await;
    let uid = user(&h, "again").await;

    h.core.moderation.flag(issue, uid, None).await.unwrap();
    h.core.moderation.unflag(issue).await.unwrap();
    let receipt = h.core.moderation.flag(issue, uid, None).await.unwrap();
    assert_eq!(receipt.flag_count, 1);
}

#[tokio::test]
async fn hidden_issue_keeps_accumulating_flags() {
    let h = harness().await;
    let issue = report(&h, "Spam listing here", "safety", PUNE.0, PUNE.1).await;
    for n in 0..4 {
        let uid = user(&h, &format!("f{n}")).await;
        h.core.moderation.flag(issue, uid, None).await.unwrap();
    }
    let view = h.core.reports.get_issue(issue).await.unwrap();
    assert_eq!(view.flag_count, 4);
    assert!(view.is_flagged);
}

#[tokio::test]
async fn flags_on_issue_hidden_by_moderator_are_not_new_transitions() {
    let h = harness().await;
    let issue = report(&h, "Duplicate listing", "safety", PUNE.0, PUNE.1).await;
    h.store.set_flagged(issue, true).await.unwrap();

    for n in 0..3 {
        let uid = user(&h, &format!("m{n}")).await;
        let receipt = h.core.moderation.flag(issue, uid, None).await.unwrap();
        assert_eq!(receipt.flag_count, n + 1);
        assert_eq!(receipt.visibility, Visibility::Hidden);
        assert!(!receipt.newly_hidden, "flag {} reported a transition", n + 1);
    }
}

#[tokio::test]
async fn reporter_may_flag_own_issue() {
    let h = harness().await;
    let reporter = user(&h, "owner").await;
    let issue = h
        .core
        .reports
        .create_issue(submission("Own pothole report", "roads", PUNE.0, PUNE.1), vec![], Some(reporter))
        .await
        .unwrap()
        .issue_id;

    assert!(h.core.moderation.flag(issue, reporter, None).await.is_ok());
}

#[tokio::test]
async fn flagging_or_unflagging_missing_issue_is_not_found() {
    let h = harness().await;
    let uid = user(&h, "nobody").await;
    assert!(matches!(
        h.core.moderation.flag(999, uid, None).await.unwrap_err(),
        CivicError::NotFound(999)
    ));
    assert!(matches!(
        h.core.moderation.unflag(999).await.unwrap_err(),
        CivicError::NotFound(999)
    ));
}

#[tokio::test]
async fn overlong_flag_reason_is_rejected() {
    let h = harness().await;
    let issue = report(&h, "Blocked footpath", "obstructions", PUNE.0, PUNE.1).await;
    let uid = user(&h, "verbose").await;

    let err = h
        .core
        .moderation
        .flag(issue, uid, Some("x".repeat(201)))
        .await
        .unwrap_err();
    assert_eq!(err.field_errors()[0].field, "reason");
    assert_eq!(h.core.reports.get_issue(issue).await.unwrap().flag_count, 0);
}

// =========================================================================
// Reporting
// =========================================================================

#[tokio::test]
async fn short_title_persists_nothing() {
    let h = harness().await;
    let err = h
        .core
        .reports
        .create_issue(
            submission("Hole", "roads", PUNE.0, PUNE.1),
            vec![ImageUpload {
                file_name: "a.png".into(),
                content_type: Some("image/png".into()),
                bytes: vec![1, 2, 3],
            }],
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.field_errors()[0].field, "title");
    assert_eq!(h.store.count_issues().await.unwrap(), 0);
    let leftover = std::fs::read_dir(h._uploads.path())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn image_errors_are_reported_alongside_field_errors() {
    let h = harness().await;
    let err = h
        .core
        .reports
        .create_issue(
            submission("Hole", "rivers", PUNE.0, PUNE.1),
            vec![ImageUpload {
                file_name: "notes.txt".into(),
                content_type: Some("text/plain".into()),
                bytes: vec![1],
            }],
            None,
        )
        .await
        .unwrap_err();

    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["title", "category", "images"]);
}

#[tokio::test]
async fn created_issue_resolves_reporter_and_images() {
    let h = harness().await;
    let reporter = user(&h, "asha").await;

    let created = h
        .core
        .reports
        .create_issue(
            submission("Overflowing drain", "water", PUNE.0, PUNE.1),
            vec![
                ImageUpload {
                    file_name: "drain.jpg".into(),
                    content_type: Some("image/jpeg".into()),
                    bytes: vec![0xff, 0xd8],
                },
                ImageUpload {
                    file_name: "street.png".into(),
                    content_type: Some("image/png".into()),
                    bytes: vec![0x89, 0x50],
                },
            ],
            Some(reporter),
        )
        .await
        .unwrap();
    assert_eq!(created.image_count, 2);
    assert_eq!(created.failed_images, 0);

    let view = h.core.reports.get_issue(created.issue_id).await.unwrap();
    assert_eq!(view.reporter, "asha");
    assert_eq!(view.status, IssueStatus::Reported);
    assert_eq!(view.images.len(), 2);
    assert!(view.images[0].starts_with("/uploads/issues/"));
    assert!(view.images[0].ends_with(".jpg"));
    assert!(view.images[1].ends_with(".png"));
}

#[tokio::test]
async fn anonymous_issue_hides_reporter() {
    let h = harness().await;
    let reporter = user(&h, "quiet").await;
    let mut anon = submission("Broken bench", "obstructions", PUNE.0, PUNE.1);
    anon.is_anonymous = Some("true".into());

    let created = h.core.reports.create_issue(anon, vec![], Some(reporter)).await.unwrap();
    let stored = h.store.get_by_id(created.issue_id).await.unwrap();
    assert_eq!(stored.reporter_id, None);

    let view = h.core.reports.get_issue(created.issue_id).await.unwrap();
    assert_eq!(view.reporter, "Anonymous User");
}

#[tokio::test]
async fn get_missing_issue_is_not_found() {
    let h = harness().await;
    assert!(matches!(
        h.core.reports.get_issue(7).await.unwrap_err(),
        CivicError::NotFound(7)
    ));
}

// =========================================================================
// Analytics
// =========================================================================

#[tokio::test]
async fn analytics_counts_everything_with_zero_fill() {
    let h = harness().await;
    user(&h, "a").await;
    user(&h, "b").await;
    report(&h, "Pothole near stop", "roads", PUNE.0, PUNE.1).await;
    let lamp = report(&h, "Dark streetlamp", "lighting", PUNE.0, PUNE.1).await;
    h.core.moderation.set_status(lamp, IssueStatus::InProgress).await.unwrap();

    let report = h.core.analytics.compute().await.unwrap();
    assert_eq!(report.total_users, 2);
    assert_eq!(report.total_issues, 2);
    assert_eq!(report.by_category.len(), Category::ALL.len());
    assert_eq!(report.by_category[0].count, 1);
    assert_eq!(report.by_category[2].count, 0);
    let statuses: Vec<i64> = report.by_status.iter().map(|s| s.count).collect();
    assert_eq!(statuses, vec![1, 1, 0]);
}

#[tokio::test]
async fn ban_and_unban_user() {
    let h = harness().await;
    let uid = user(&h, "troll").await;

    h.core.moderation.set_user_banned(uid, true).await.unwrap();
    assert!(h.store.find_user(uid).await.unwrap().unwrap().is_banned);
    h.core.moderation.set_user_banned(uid, false).await.unwrap();
    assert!(!h.store.find_user(uid).await.unwrap().unwrap().is_banned);

    assert!(matches!(
        h.core.moderation.set_user_banned(404, true).await.unwrap_err(),
        CivicError::UserNotFound(404)
    ));
}
