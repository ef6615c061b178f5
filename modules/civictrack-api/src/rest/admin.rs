//! Moderator endpoints. Every handler takes [`AdminUser`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use civictrack_common::{coerce_bool, parse_status, CivicError, FieldErrors, IssueId, UserId};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct StatusBody {
    status: String,
}

/// `banned` may be a JSON boolean or the strings `"true"` / `"false"`.
#[derive(Deserialize)]
pub struct BanBody {
    banned: Value,
}

/// GET /api/admin/flags/issues
pub async fn flagged_issues(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    let issues = state.core.moderation.flagged_issues().await?;
    Ok(Json(json!({ "flaggedIssues": issues })))
}

/// POST /api/admin/flags/issues/{id}/unflag
pub async fn unflag_issue(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<IssueId>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state.core.moderation.unflag(id).await?;
    Ok(Json(json!({
        "message": "Issue unflagged and counters reset",
        "issueId": receipt.issue_id,
        "clearedFlags": receipt.cleared_flags,
    })))
}

/// POST /api/admin/issues/{id}/status `{"status": "in_progress"}`
pub async fn set_issue_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<IssueId>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = FieldErrors::new();
    let status = parse_status("status", body.status.trim(), &mut errors);
    let status = errors
        .finish(status)?
        .ok_or_else(|| CivicError::invalid("status", "is required"))?;

    state.core.moderation.set_status(id, status).await?;
    Ok(Json(json!({ "message": "Issue status updated", "status": status })))
}

/// POST /api/admin/users/{id}/ban `{"banned": true}`
pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<UserId>,
    Json(body): Json<BanBody>,
) -> Result<Json<Value>, ApiError> {
    let banned = match &body.banned {
        Value::Bool(b) => Some(*b),
        Value::String(s) => coerce_bool(s),
        _ => None,
    }
    .ok_or_else(|| CivicError::invalid("banned", "must be boolean"))?;

    state.core.moderation.set_user_banned(id, banned).await?;
    let message = if banned { "User banned" } else { "User unbanned" };
    Ok(Json(json!({ "message": message })))
}

/// GET /api/admin/analytics
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    let report = state.core.analytics.compute().await?;
    Ok(Json(json!({ "analytics": report })))
}
