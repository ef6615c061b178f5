//! Field-level validation for inbound requests.
//!
//! Every check appends to a [`FieldErrors`] list instead of failing on the
//! first problem, so callers get the full list of offending fields at once.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{CivicError, CivicResult};
use crate::types::{Category, IssueStatus, NewIssue, UserId};

pub const TITLE_CHARS: RangeInclusive<usize> = 5..=100;
pub const DESCRIPTION_CHARS: RangeInclusive<usize> = 10..=500;
pub const MAX_FLAG_REASON_CHARS: usize = 200;
pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Accumulates field errors across a whole request.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when nothing was recorded, otherwise a validation error.
    pub fn finish<T>(self, value: T) -> CivicResult<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(CivicError::Validation(self.0))
        }
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

/// Boundary coercion for form/query booleans. Only the exact strings
/// `"true"` and `"false"` are accepted.
pub fn coerce_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub fn parse_f64_field(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            errors.push(field, "must be a number");
            None
        }
    }
}

pub fn check_latitude(field: &str, lat: f64, errors: &mut FieldErrors) {
    if !LATITUDE_RANGE.contains(&lat) {
        errors.push(field, "must be between -90 and 90");
    }
}

pub fn check_longitude(field: &str, lng: f64, errors: &mut FieldErrors) {
    if !LONGITUDE_RANGE.contains(&lng) {
        errors.push(field, "must be between -180 and 180");
    }
}

/// Radius must lie in `(0, max_km]`.
pub fn check_radius(field: &str, radius_km: f64, max_km: f64, errors: &mut FieldErrors) {
    if !(radius_km > 0.0 && radius_km <= max_km) {
        errors.push(field, format!("must be greater than 0 and at most {max_km} km"));
    }
}

pub fn check_char_len(field: &str, value: &str, bounds: RangeInclusive<usize>, errors: &mut FieldErrors) {
    let len = value.chars().count();
    if !bounds.contains(&len) {
        errors.push(
            field,
            format!("must be {}-{} characters", bounds.start(), bounds.end()),
        );
    }
}

pub fn parse_category(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<Category> {
    match raw.parse::<Category>() {
        Ok(c) => Some(c),
        Err(_) => {
            errors.push(field, format!("must be one of {}", join_all(Category::ALL.map(|c| c.as_str()))));
            None
        }
    }
}

pub fn parse_status(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<IssueStatus> {
    match raw.parse::<IssueStatus>() {
        Ok(s) => Some(s),
        Err(_) => {
            errors.push(field, format!("must be one of {}", join_all(IssueStatus::ALL.map(|s| s.as_str()))));
            None
        }
    }
}

fn join_all<const N: usize>(values: [&str; N]) -> String {
    values.join(", ")
}

/// Trimmed flag reason, `None` when absent or blank.
pub fn validate_flag_reason(reason: Option<String>) -> CivicResult<Option<String>> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let mut errors = FieldErrors::new();
    if let Some(r) = &reason {
        if r.chars().count() > MAX_FLAG_REASON_CHARS {
            errors.push("reason", format!("must be at most {MAX_FLAG_REASON_CHARS} characters"));
        }
    }
    errors.finish(reason)
}

/// An issue report as received from a form, before any checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueSubmission {
    pub title: String,
    pub description: String,
    pub category: String,
    pub latitude: String,
    pub longitude: String,
    pub address: Option<String>,
    /// Raw `"true"` / `"false"`; absent means not anonymous.
    pub is_anonymous: Option<String>,
}

impl IssueSubmission {
    /// Check every field and build the persistable issue. Anonymous reports
    /// drop `reporter_id`.
    pub fn validate(self, reporter_id: Option<UserId>) -> CivicResult<NewIssue> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim().to_string();
        check_char_len("title", &title, TITLE_CHARS, &mut errors);

        let description = self.description.trim().to_string();
        check_char_len("description", &description, DESCRIPTION_CHARS, &mut errors);

        let category = parse_category("category", self.category.trim(), &mut errors);

        let latitude = parse_f64_field("latitude", &self.latitude, &mut errors);
        if let Some(lat) = latitude {
            check_latitude("latitude", lat, &mut errors);
        }
        let longitude = parse_f64_field("longitude", &self.longitude, &mut errors);
        if let Some(lng) = longitude {
            check_longitude("longitude", lng, &mut errors);
        }

        let is_anonymous = match self.is_anonymous.as_deref() {
            None => false,
            Some(raw) => coerce_bool(raw).unwrap_or_else(|| {
                errors.push("is_anonymous", "must be 'true' or 'false'");
                false
            }),
        };

        let address = self
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        match (category, latitude, longitude) {
            (Some(category), Some(latitude), Some(longitude)) if errors.is_empty() => Ok(NewIssue {
                title,
                description,
                category,
                latitude,
                longitude,
                address,
                reporter_id: if is_anonymous { None } else { reporter_id },
                is_anonymous,
            }),
            _ => Err(CivicError::Validation(errors.into_vec())),
        }
    }
}
