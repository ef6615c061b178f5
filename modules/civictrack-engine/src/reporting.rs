//! Issue creation and lookup.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use civictrack_common::{
    CivicError, CivicResult, FieldError, FieldErrors, IssueId, IssueSubmission, UserId,
};
use civictrack_store::IssueStore;

use crate::blob::{new_blob_key, BlobStore};
use crate::view::IssueView;

/// Maximum size of one image (5MB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const MAX_IMAGES_PER_ISSUE: usize = 5;

pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &["jpeg", "jpg", "png", "gif"];

/// One uploaded image as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIssue {
    pub issue_id: IssueId,
    /// Images stored and attached.
    pub image_count: usize,
    /// Images that were accepted but could not be stored.
    pub failed_images: usize,
}

pub struct Reporting {
    store: Arc<dyn IssueStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Reporting {
    pub fn new(store: Arc<dyn IssueStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Validate, persist the issue, then store each image. A failing image is
    /// logged and counted; it never undoes the issue.
    pub async fn create_issue(
        &self,
        submission: IssueSubmission,
        images: Vec<ImageUpload>,
        reporter_id: Option<UserId>,
    ) -> CivicResult<CreatedIssue> {
        let (image_errors, extensions) = check_images(&images);

        let new_issue = match submission.validate(reporter_id) {
            Ok(issue) if image_errors.is_empty() => issue,
            Ok(_) => return Err(CivicError::Validation(image_errors)),
            Err(CivicError::Validation(mut errors)) => {
                errors.extend(image_errors);
                return Err(CivicError::Validation(errors));
            }
            Err(other) => return Err(other),
        };

        let issue_id = self.store.create_issue(&new_issue).await?;

        let mut image_count = 0;
        let mut failed_images = 0;
        for (image, ext) in images.iter().zip(extensions) {
            match self.attach_image(issue_id, image, &ext).await {
                Ok(()) => image_count += 1,
                Err(e) => {
                    failed_images += 1;
                    warn!(issue_id, file = %image.file_name, error = %e, "Failed to store issue image");
                }
            }
        }

        info!(
            issue_id,
            category = %new_issue.category,
            anonymous = new_issue.is_anonymous,
            image_count,
            failed_images,
            "Issue created"
        );

        Ok(CreatedIssue {
            issue_id,
            image_count,
            failed_images,
        })
    }

    async fn attach_image(&self, issue_id: IssueId, image: &ImageUpload, ext: &str) -> anyhow::Result<()> {
        let key = new_blob_key(ext);
        self.blobs.put(&key, &image.bytes).await?;
        self.store.add_image(issue_id, &key).await?;
        Ok(())
    }

    /// Any issue by id, hidden ones included.
    pub async fn get_issue(&self, id: IssueId) -> CivicResult<IssueView> {
        let issue = self.store.get_by_id(id).await?;
        Ok(IssueView::new(issue, self.blobs.as_ref()))
    }
}

/// Check count, size and format of every image. Returns the field errors and,
/// per image, the normalized extension used for its blob key.
pub fn check_images(images: &[ImageUpload]) -> (Vec<FieldError>, Vec<String>) {
    let mut errors = FieldErrors::new();
    let mut extensions = Vec::with_capacity(images.len());

    if images.len() > MAX_IMAGES_PER_ISSUE {
        errors.push("images", format!("at most {MAX_IMAGES_PER_ISSUE} images are allowed"));
    }

    for image in images {
        if image.bytes.len() > MAX_IMAGE_BYTES {
            errors.push(
                "images",
                format!("'{}' exceeds the {}MB limit", image.file_name, MAX_IMAGE_BYTES / 1024 / 1024),
            );
        }

        let ext = Path::new(&image.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let mime_ok = image
            .content_type
            .as_deref()
            .and_then(|ct| ct.strip_prefix("image/"))
            .is_some_and(|sub| SUPPORTED_IMAGE_FORMATS.contains(&sub.to_lowercase().as_str()));

        if !SUPPORTED_IMAGE_FORMATS.contains(&ext.as_str()) || !mime_ok {
            errors.push(
                "images",
                format!(
                    "'{}' is not a supported image ({})",
                    image.file_name,
                    SUPPORTED_IMAGE_FORMATS.join(", ")
                ),
            );
        }
        extensions.push(ext);
    }

    (errors.into_vec(), extensions)
}
