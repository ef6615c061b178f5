use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use civictrack_common::{IssueId, IssueSubmission};
use civictrack_engine::{CreatedIssue, FlagReceipt, ImageUpload, NearbyIssue, NearbyQuery};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

// --- Request shapes ---

/// Raw query string. Everything arrives as text so that bad numbers come
/// back as field errors.
#[derive(Deserialize)]
pub struct NearbyParams {
    lat: Option<String>,
    lng: Option<String>,
    radius: Option<String>,
    category: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct FlagBody {
    reason: Option<String>,
}

// --- Response shapes ---

#[derive(Serialize)]
pub struct CreateIssueResponse {
    message: &'static str,
    #[serde(flatten)]
    created: CreatedIssue,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    issues: Vec<NearbyIssue>,
    total: usize,
}

#[derive(Serialize)]
pub struct FlagResponse {
    message: &'static str,
    #[serde(flatten)]
    receipt: FlagReceipt,
}

// --- Handlers ---

/// POST /api/issues: multipart form with text fields and up to five `images`.
pub async fn create_issue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateIssueResponse>), ApiError> {
    let mut submission = IssueSubmission::default();
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "images" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {e}")))?;
            images.push(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field '{name}': {e}")))?;
        match name.as_str() {
            "title" => submission.title = value,
            "description" => submission.description = value,
            "category" => submission.category = value,
            "latitude" => submission.latitude = value,
            "longitude" => submission.longitude = value,
            "address" => submission.address = Some(value),
            "is_anonymous" => submission.is_anonymous = Some(value),
            _ => {}
        }
    }

    let created = state
        .core
        .reports
        .create_issue(submission, images, Some(user.id))
        .await?;

    let message = if created.failed_images == 0 {
        "Issue created successfully"
    } else {
        "Issue created but some images failed to upload"
    };

    Ok((StatusCode::CREATED, Json(CreateIssueResponse { message, created })))
}

/// GET /api/issues/nearby?lat=&lng=&radius=&category=&status=
pub async fn nearby_issues(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let query = NearbyQuery::parse(
        params.lat.as_deref(),
        params.lng.as_deref(),
        params.radius.as_deref(),
        params.category.as_deref(),
        params.status.as_deref(),
    )?;

    let issues = state.core.nearby.find_nearby(query).await?;
    let total = issues.len();
    Ok(Json(NearbyResponse { issues, total }))
}

/// GET /api/issues/{id}. Hidden issues are still returned.
pub async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<IssueId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let issue = state.core.reports.get_issue(id).await?;
    Ok(Json(json!({ "issue": issue })))
}

/// POST /api/issues/{id}/flag with an optional `{"reason": "..."}` body.
pub async fn flag_issue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<IssueId>,
    body: Bytes,
) -> Result<Json<FlagResponse>, ApiError> {
    let body: FlagBody = if body.iter().all(u8::is_ascii_whitespace) {
        FlagBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    let receipt = state.core.moderation.flag(id, user.id, body.reason).await?;
    Ok(Json(FlagResponse {
        message: "Issue flagged successfully",
        receipt,
    }))
}
