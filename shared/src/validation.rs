//! Field validation for everything the client sends.
//!
//! A draft is free text; only [`ReportDraft::validate`] can produce a
//! [`ReportSubmission`], so the API client never sees an unchecked report.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::{
    IncidentStatus, IncidentType, LoginCredentials, MediaUpload, Registration, Report, ReportFilter,
};
use crate::{
    AppError, AppResult, ErrorKind, ADDRESS_MAX_CHARS, DESCRIPTION_MIN_CHARS, FULL_NAME_MAX_CHARS,
    FULL_NAME_MIN_CHARS, MAX_PER_PAGE, PASSWORD_MIN_CHARS, STATUS_COMMENT_MAX_CHARS,
    TITLE_MAX_CHARS, TITLE_MIN_CHARS, USERNAME_MAX_CHARS, USERNAME_MIN_CHARS,
};
use secrecy::ExposeSecret;

// --- Coordinate: validated, NaN-safe ---

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl CoordinateError {
    const fn field(&self) -> &'static str {
        match self {
            Self::LatitudeOutOfRange(_) | Self::NonFinite => "latitude",
            Self::LongitudeOutOfRange(_) => "longitude",
        }
    }
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        let field = e.field();
        AppError::new(ErrorKind::Validation, e.to_string()).with_field(field, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    #[serde(rename = "latitude")]
    lat: f64,
    #[serde(rename = "longitude")]
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(self) -> f64 {
        self.lon
    }

    #[must_use]
    pub const fn as_tuple(self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Six decimal places, roughly 10 cm.
    #[must_use]
    pub fn display(self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lon)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = CoordinateError;

    fn try_from((lat, lon): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lon)
    }
}

// --- Field errors ---

/// Per-field messages accumulated during one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> AppResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self.into())
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        let message = if errors.0.len() == 1 {
            errors
                .0
                .values()
                .next()
                .and_then(|messages| messages.first())
                .cloned()
                .unwrap_or_else(|| "Please correct the highlighted field.".to_string())
        } else {
            "Please correct the highlighted fields.".to_string()
        };
        let mut error = AppError::new(ErrorKind::Validation, message);
        error.fields = errors.0;
        error
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn check_title(title: &str, errors: &mut FieldErrors) {
    let len = char_len(title);
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        errors.push(
            "title",
            format!("Title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters."),
        );
    }
}

fn check_description(description: &str, errors: &mut FieldErrors) {
    if char_len(description) < DESCRIPTION_MIN_CHARS {
        errors.push(
            "description",
            format!("Description must be at least {DESCRIPTION_MIN_CHARS} characters."),
        );
    }
}

fn check_address(address: &str, errors: &mut FieldErrors) {
    if char_len(address) > ADDRESS_MAX_CHARS {
        errors.push(
            "address",
            format!("Address must be at most {ADDRESS_MAX_CHARS} characters."),
        );
    }
}

fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// --- Report draft ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Title,
    Description,
    IncidentType,
    Latitude,
    Longitude,
    Address,
}

impl DraftField {
    pub const ALL: [Self; 6] = [
        Self::Title,
        Self::Description,
        Self::IncidentType,
        Self::Latitude,
        Self::Longitude,
        Self::Address,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::IncidentType => "incident_type",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Address => "address",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    const fn max_chars(self) -> Option<usize> {
        match self {
            Self::Title => Some(TITLE_MAX_CHARS),
            Self::Address => Some(ADDRESS_MAX_CHARS),
            _ => None,
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The editable, unvalidated state of a report form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub latitude: String,
    pub longitude: String,
    pub address: String,
}

impl ReportDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_report(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            description: report.description.clone(),
            incident_type: report.incident_type.as_str().to_string(),
            latitude: report.latitude.map(|v| v.to_string()).unwrap_or_default(),
            longitude: report.longitude.map(|v| v.to_string()).unwrap_or_default(),
            address: report.address.clone().unwrap_or_default(),
        }
    }

    /// Stores `value` as typed. Capped fields keep their first N characters.
    pub fn set(&mut self, field: DraftField, value: &str) {
        let value = match field.max_chars() {
            Some(max) => truncate_chars(value, max),
            None => value.to_string(),
        };
        match field {
            DraftField::Title => self.title = value,
            DraftField::Description => self.description = value,
            DraftField::IncidentType => self.incident_type = value,
            DraftField::Latitude => self.latitude = value,
            DraftField::Longitude => self.longitude = value,
            DraftField::Address => self.address = value,
        }
    }

    #[must_use]
    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Title => &self.title,
            DraftField::Description => &self.description,
            DraftField::IncidentType => &self.incident_type,
            DraftField::Latitude => &self.latitude,
            DraftField::Longitude => &self.longitude,
            DraftField::Address => &self.address,
        }
    }

    pub fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.latitude = coordinate.lat().to_string();
        self.longitude = coordinate.lon().to_string();
    }

    pub fn validate(&self) -> AppResult<ReportSubmission> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        check_title(title, &mut errors);

        let description = self.description.trim();
        check_description(description, &mut errors);

        let incident_type = if self.incident_type.trim().is_empty() {
            errors.push("incident_type", "Incident type is required.");
            None
        } else {
            let parsed = IncidentType::parse(&self.incident_type);
            if parsed.is_none() {
                errors.push("incident_type", "Select a valid incident type.");
            }
            parsed
        };

        let lat = parse_axis(&self.latitude, "latitude", "Latitude", 90.0, &mut errors);
        let lon = parse_axis(&self.longitude, "longitude", "Longitude", 180.0, &mut errors);

        check_address(self.address.trim(), &mut errors);

        if !errors.is_empty() {
            return Err(errors.into());
        }

        match (incident_type, lat, lon) {
            (Some(incident_type), Some(lat), Some(lon)) => Ok(ReportSubmission {
                title: title.to_string(),
                description: description.to_string(),
                incident_type,
                coordinate: Coordinate::new(lat, lon)?,
                address: normalize_address(&self.address),
            }),
            _ => Err(AppError::new(
                ErrorKind::Validation,
                "Please correct the highlighted fields.",
            )),
        }
    }
}

fn parse_axis(
    raw: &str,
    field: &str,
    label: &str,
    bound: f64,
    errors: &mut FieldErrors,
) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(field, "Location is required. Use your current location or enter coordinates.");
        return None;
    }
    let Ok(value) = raw.parse::<f64>() else {
        errors.push(field, format!("{label} must be a number."));
        return None;
    };
    if !value.is_finite() {
        errors.push(field, format!("{label} must be a number."));
        return None;
    }
    if !(-bound..=bound).contains(&value) {
        errors.push(field, format!("{label} must be between -{bound} and {bound}."));
        return None;
    }
    Some(value)
}

/// A report that passed validation. Serializes to the create body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSubmission {
    title: String,
    description: String,
    incident_type: IncidentType,
    #[serde(flatten)]
    coordinate: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

impl ReportSubmission {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn incident_type(&self) -> IncidentType {
        self.incident_type
    }

    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

/// Partial update. `address: Some(None)` clears the stored address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub incident_type: Option<IncidentType>,
    pub coordinate: Option<Coordinate>,
    pub address: Option<Option<String>>,
}

#[derive(Serialize)]
pub(crate) struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    incident_type: Option<IncidentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<Option<&'a str>>,
}

impl ReportPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.incident_type.is_none()
            && self.coordinate.is_none()
            && self.address.is_none()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn incident_type(mut self, incident_type: IncidentType) -> Self {
        self.incident_type = Some(incident_type);
        self
    }

    #[must_use]
    pub fn coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    #[must_use]
    pub fn address(mut self, address: Option<String>) -> Self {
        self.address = Some(address);
        self
    }

    /// Trims text fields in place and checks the ones present.
    pub fn validate(&mut self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::new(ErrorKind::Validation, "Nothing to update."));
        }

        let mut errors = FieldErrors::new();
        if let Some(title) = &mut self.title {
            *title = title.trim().to_string();
            check_title(title, &mut errors);
        }
        if let Some(description) = &mut self.description {
            *description = description.trim().to_string();
            check_description(description, &mut errors);
        }
        if let Some(address) = &mut self.address {
            if let Some(text) = address.as_deref() {
                check_address(text.trim(), &mut errors);
                *address = normalize_address(text);
            }
        }
        errors.into_result(())
    }

    pub(crate) fn body(&self) -> PatchBody<'_> {
        PatchBody {
            title: self.title.as_deref(),
            description: self.description.as_deref(),
            incident_type: self.incident_type,
            latitude: self.coordinate.map(Coordinate::lat),
            longitude: self.coordinate.map(Coordinate::lon),
            address: self.address.as_ref().map(Option::as_deref),
        }
    }
}

impl From<ReportSubmission> for ReportPatch {
    fn from(s: ReportSubmission) -> Self {
        Self {
            title: Some(s.title),
            description: Some(s.description),
            incident_type: Some(s.incident_type),
            coordinate: Some(s.coordinate),
            address: Some(s.address),
        }
    }
}

// --- Credentials, status, media, filters ---

/// `local@domain` with a dot somewhere in the domain.
#[must_use]
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_login(credentials: &LoginCredentials) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if credentials.email.trim().is_empty() {
        errors.push("email", "Email is required.");
    } else if !is_plausible_email(&credentials.email) {
        errors.push("email", "Enter a valid email address.");
    }
    if credentials.password.expose_secret().is_empty() {
        errors.push("password", "Password is required.");
    }
    errors.into_result(())
}

pub fn validate_registration(registration: &Registration) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if !is_plausible_email(&registration.email) {
        errors.push("email", "Enter a valid email address.");
    }

    let username_len = char_len(registration.username.trim());
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&username_len) {
        errors.push(
            "username",
            format!(
                "Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters."
            ),
        );
    }

    if char_len(registration.password.expose_secret()) < PASSWORD_MIN_CHARS {
        errors.push(
            "password",
            format!("Password must be at least {PASSWORD_MIN_CHARS} characters."),
        );
    }

    let full_name_len = char_len(registration.full_name.trim());
    if !(FULL_NAME_MIN_CHARS..=FULL_NAME_MAX_CHARS).contains(&full_name_len) {
        errors.push(
            "full_name",
            format!(
                "Full name must be between {FULL_NAME_MIN_CHARS} and {FULL_NAME_MAX_CHARS} characters."
            ),
        );
    }

    errors.into_result(())
}

/// Returns the trimmed comment, `None` when blank.
pub fn validate_status_change(
    status: IncidentStatus,
    comment: Option<&str>,
) -> AppResult<Option<String>> {
    let mut errors = FieldErrors::new();
    if !status.is_requestable() {
        errors.push("status", "Select a valid status.");
    }
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    if let Some(text) = comment {
        if char_len(text) > STATUS_COMMENT_MAX_CHARS {
            errors.push(
                "comment",
                format!("Comment must be at most {STATUS_COMMENT_MAX_CHARS} characters."),
            );
        }
    }
    errors.into_result(comment.map(str::to_string))
}

pub fn validate_upload(upload: &MediaUpload, max_bytes: usize) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if upload.bytes.is_empty() {
        errors.push("file", "File is empty.");
    } else if upload.bytes.len() > max_bytes {
        errors.push(
            "file",
            format!("File is larger than the {} MB limit.", max_bytes / (1024 * 1024)),
        );
    }

    match upload.extension() {
        Some(ext) if upload.kind.allowed_extensions().contains(&ext.as_str()) => {}
        _ => errors.push(
            "file",
            format!(
                "Unsupported {} type. Allowed: {}.",
                upload.kind.as_str(),
                upload.kind.allowed_extensions().join(", ")
            ),
        ),
    }

    errors.into_result(())
}

pub fn validate_filter(filter: &ReportFilter) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if filter.page == Some(0) {
        errors.push("page", "Page must be at least 1.");
    }
    if let Some(per_page) = filter.per_page {
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            errors.push("per_page", format!("Page size must be between 1 and {MAX_PER_PAGE}."));
        }
    }
    if filter.status.is_some_and(|s| !s.is_requestable()) {
        errors.push("status", "Select a valid status.");
    }
    errors.into_result(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaKind;
    use proptest::prelude::*;

    fn valid_draft() -> ReportDraft {
        ReportDraft {
            title: "Road crash".into(),
            description: "Two vehicles collided near the roundabout".into(),
            incident_type: "accident".into(),
            latitude: "-1.2921".into(),
            longitude: "36.8219".into(),
            address: String::new(),
        }
    }

    fn field_errors(result: AppResult<ReportSubmission>) -> Vec<String> {
        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Validation);
        error.fields.keys().cloned().collect()
    }

    #[test]
    fn test_valid_draft() {
        let submission = valid_draft().validate().unwrap();
        assert_eq!(submission.incident_type(), IncidentType::Accident);
        assert_eq!(submission.coordinate().as_tuple(), (-1.2921, 36.8219));
        assert_eq!(submission.address(), None);
    }

    #[test]
    fn test_title_boundary() {
        let mut draft = valid_draft();
        draft.title = "abcd".into();
        assert_eq!(field_errors(draft.validate()), vec!["title"]);
        draft.title = "abcde".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_title_is_trimmed_before_check() {
        let mut draft = valid_draft();
        draft.title = "  abcd   ".into();
        assert_eq!(field_errors(draft.validate()), vec!["title"]);
        draft.title = "  abcde ".into();
        assert_eq!(draft.validate().unwrap().title(), "abcde");
    }

    #[test]
    fn test_description_boundary() {
        let mut draft = valid_draft();
        draft.description = "a".repeat(19);
        assert_eq!(field_errors(draft.validate()), vec!["description"]);
        draft.description = "a".repeat(20);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_latitude_boundary() {
        let mut draft = valid_draft();
        draft.latitude = "91".into();
        assert_eq!(field_errors(draft.validate()), vec!["latitude"]);
        draft.latitude = "90".into();
        assert!(draft.validate().is_ok());
        draft.latitude = "-90".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_longitude_boundary() {
        let mut draft = valid_draft();
        draft.longitude = "180.0001".into();
        assert_eq!(field_errors(draft.validate()), vec!["longitude"]);
        draft.longitude = "180".into();
        assert!(draft.validate().is_ok());
        draft.longitude = "-180".into();
        assert!(draft.validate().is_ok());
        draft.longitude = "-181".into();
        assert_eq!(field_errors(draft.validate()), vec!["longitude"]);
    }

    #[test]
    fn test_missing_location_is_reported() {
        let mut draft = valid_draft();
        draft.latitude.clear();
        draft.longitude = "NaN".into();
        assert_eq!(field_errors(draft.validate()), vec!["latitude", "longitude"]);
    }

    #[test]
    fn test_all_errors_enumerated() {
        let error = ReportDraft::new().validate().unwrap_err();
        let fields: Vec<_> = error.fields.keys().map(String::as_str).collect();
        assert_eq!(
            fields,
            vec!["description", "incident_type", "latitude", "longitude", "title"]
        );
        assert_eq!(error.message, "Please correct the highlighted fields.");
    }

    #[test]
    fn test_unknown_incident_type_rejected() {
        let mut draft = valid_draft();
        draft.incident_type = "meteor".into();
        assert_eq!(field_errors(draft.validate()), vec!["incident_type"]);
    }

    #[test]
    fn test_set_caps_title_and_address() {
        let mut draft = ReportDraft::new();
        draft.set(DraftField::Title, &"x".repeat(250));
        draft.set(DraftField::Address, &"y".repeat(300));
        draft.set(DraftField::Description, &"z".repeat(5000));
        assert_eq!(draft.title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(draft.address.chars().count(), ADDRESS_MAX_CHARS);
        assert_eq!(draft.description.len(), 5000);
    }

    #[test]
    fn test_submission_body() {
        let mut draft = valid_draft();
        draft.address = "  Kenyatta Ave  ".into();
        let body = serde_json::to_value(draft.validate().unwrap()).unwrap();
        assert_eq!(body["incident_type"], "accident");
        assert_eq!(body["latitude"], -1.2921);
        assert_eq!(body["longitude"], 36.8219);
        assert_eq!(body["address"], "Kenyatta Ave");
    }

    #[test]
    fn test_patch_body_omits_absent_fields() {
        let mut patch = ReportPatch::default().title("  New title ").address(None);
        patch.validate().unwrap();
        let body = serde_json::to_value(patch.body()).unwrap();
        assert_eq!(body, serde_json::json!({"title": "New title", "address": null}));
    }

    #[test]
    fn test_empty_patch_rejected() {
        assert!(ReportPatch::default().validate().is_err());
    }

    #[test]
    fn test_login_validation() {
        assert!(validate_login(&LoginCredentials::new("a@b.co", "x")).is_ok());
        let error = validate_login(&LoginCredentials::new("", "")).unwrap_err();
        assert!(error.fields.contains_key("email"));
        assert!(error.fields.contains_key("password"));
    }

    #[test]
    fn test_registration_validation() {
        let ok = Registration::new("jane", "jane@example.com", "password1", "Jane Doe");
        assert!(validate_registration(&ok).is_ok());

        let bad = Registration::new("jo", "jane.example.com", "short", "J");
        let error = validate_registration(&bad).unwrap_err();
        let fields: Vec<_> = error.fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["email", "full_name", "password", "username"]);
    }

    #[test]
    fn test_status_change_validation() {
        assert_eq!(
            validate_status_change(IncidentStatus::Resolved, Some("  ")).unwrap(),
            None
        );
        assert!(validate_status_change(IncidentStatus::Unknown, None).is_err());
        assert!(validate_status_change(IncidentStatus::Rejected, Some(&"c".repeat(501))).is_err());
        assert!(validate_status_change(IncidentStatus::Rejected, Some(&"c".repeat(500))).is_ok());
    }

    #[test]
    fn test_upload_validation() {
        let ok = MediaUpload::new("scene.png", "image/png", MediaKind::Image, vec![0u8; 10]);
        assert!(validate_upload(&ok, 1024).is_ok());

        let wrong_kind = MediaUpload::new("scene.png", "image/png", MediaKind::Video, vec![0u8; 10]);
        assert!(validate_upload(&wrong_kind, 1024).is_err());

        let too_big = MediaUpload::new("clip.mp4", "video/mp4", MediaKind::Video, vec![0u8; 2048]);
        assert!(validate_upload(&too_big, 1024).is_err());

        let empty = MediaUpload::new("clip.mp4", "video/mp4", MediaKind::Video, Vec::new());
        assert!(validate_upload(&empty, 1024).is_err());
    }

    #[test]
    fn test_filter_validation() {
        assert!(validate_filter(&ReportFilter::default().page(1, 100)).is_ok());
        assert!(validate_filter(&ReportFilter::default().page(0, 10)).is_err());
        assert!(validate_filter(&ReportFilter::default().page(1, 101)).is_err());
    }

    #[test]
    fn test_coordinate_error_maps_to_field() {
        let error: AppError = Coordinate::new(0.0, 200.0).unwrap_err().into();
        assert!(error.fields.contains_key("longitude"));
    }

    proptest! {
        #[test]
        fn prop_coordinate_range(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert!(Coordinate::new(lat, lon).is_ok());
        }

        #[test]
        fn prop_latitude_out_of_range(lat in 90.0001f64..1.0e6, lon in -180.0f64..=180.0) {
            prop_assert!(Coordinate::new(lat, lon).is_err());
            prop_assert!(Coordinate::new(-lat, lon).is_err());
        }

        #[test]
        fn prop_draft_coordinate_roundtrip(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let mut draft = ReportDraft {
                title: "Flooded road".into(),
                description: "Water is over the bridge deck now".into(),
                incident_type: "natural_disaster".into(),
                ..ReportDraft::default()
            };
            let coordinate = Coordinate::new(lat, lon).unwrap();
            draft.set_coordinate(coordinate);
            let submission = draft.validate().unwrap();
            prop_assert_eq!(submission.coordinate(), coordinate);
        }
    }
}
