//! Shared client core for the Ajali incident-reporting app.
//!
//! The core owns the report lifecycle, field validation, session state and
//! the REST client contract. Shells provide the external capabilities
//! (HTTP transport, token store, geolocation) and render the view-state
//! that the controllers publish.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod detail;
pub mod form;
pub mod model;
pub mod session;
pub mod stats;
pub mod telemetry;
pub mod validation;
mod wire;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use api::{ApiClient, Endpoints};
pub use app::App;
pub use capabilities::Capabilities;
pub use config::ClientConfig;
pub use detail::{DeleteConfirmation, DeleteOutcome, DetailState, ReportDetailController, ReportView};
pub use form::{FormMode, FormPhase, FormState, ReportFormController};
pub use model::{
    AggregateStats, IncidentStatus, IncidentType, LoginCredentials, MediaId, MediaItem, MediaKind,
    MediaUpload, Pagination, Registration, Report, ReportFilter, ReportId, ReportPage, Role,
    SeverityTier, StatusChange, User, UserId,
};
pub use session::{Session, SessionContext, SessionState};
pub use stats::{StatsAggregator, StatsScope, StatsView};
pub use validation::{Coordinate, CoordinateError, DraftField, FieldErrors, ReportDraft, ReportPatch, ReportSubmission};

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MIN_CHARS: usize = 20;
pub const ADDRESS_MAX_CHARS: usize = 255;
pub const STATUS_COMMENT_MAX_CHARS: usize = 500;
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 80;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const FULL_NAME_MIN_CHARS: usize = 2;
pub const FULL_NAME_MAX_CHARS: usize = 120;
pub const MAX_PER_PAGE: u32 = 100;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub const UNKNOWN_REPORTER: &str = "Unknown";
pub const ADDRESS_NOT_PROVIDED: &str = "Address not provided";
pub const UNKNOWN_TIMESTAMP: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    Location,
    InvalidState,
    Configuration,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Location => "LOCATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Whether retrying the same call unchanged can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Location | Self::Unknown)
    }
}

/// The single error shape every core operation surfaces.
///
/// `fields` carries per-field validation messages keyed by wire field
/// name; it is empty for every kind other than `Validation`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub http_status: Option<u16>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            http_status: None,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields.entry(field.into()).or_default().push(message.into());
        self
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Configuration => {
                "The app is misconfigured. Please contact support.".into()
            }
            ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
            ErrorKind::Authentication
            | ErrorKind::Validation
            | ErrorKind::Conflict
            | ErrorKind::Location
            | ErrorKind::InvalidState => self.message.clone(),
        }
    }

    /// Classifies a non-2xx backend response.
    ///
    /// The backend answers errors as `{"error": .., "message": ..,
    /// "messages": {field: [..]}}`; any of the keys may be missing.
    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Network,
            409 => ErrorKind::Conflict,
            _ => ErrorKind::Unknown,
        };

        let parsed = serde_json::from_slice::<ApiErrorResponse>(body).unwrap_or_default();
        let (message, internal) = match (parsed.error, parsed.message) {
            (Some(error), detail) => (error, detail),
            (None, Some(message)) => (message, None),
            (None, None) => (format!("HTTP error: {status}"), None),
        };

        let mut error = Self::new(kind, message).with_status(status);
        error.internal_message = internal;
        if let Some(messages) = parsed.messages {
            error.fields = flatten_field_messages(messages);
        }
        error
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Default, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    messages: Option<serde_json::Value>,
}

fn flatten_field_messages(messages: serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();
    match messages {
        serde_json::Value::Object(map) => {
            for (field, value) in map {
                let entry: &mut Vec<String> = fields.entry(field).or_default();
                match value {
                    serde_json::Value::String(s) => entry.push(s),
                    serde_json::Value::Array(items) => {
                        entry.extend(items.into_iter().map(|item| match item {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        }));
                    }
                    other => entry.push(other.to_string()),
                }
            }
        }
        serde_json::Value::Null => {}
        other => {
            fields.insert("_schema".to_string(), vec![other.to_string()]);
        }
    }
    fields
}

/// Serializable projection of an [`AppError`] for the rendering layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
            fields: e.fields.clone(),
        }
    }
}

/// Absolute timestamp in the `Jan 5, 2024, 3:04 PM` style, rendered in UTC.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %-I:%M %p").to_string()
}

#[must_use]
pub fn format_optional_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| UNKNOWN_TIMESTAMP.to_string(), format_timestamp)
}

#[must_use]
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_secs = now.signed_duration_since(then).num_seconds();

    if diff_secs < 0 {
        return if diff_secs > -60 {
            "Just now".into()
        } else {
            "Upcoming".into()
        };
    }

    if diff_secs < 5 {
        return "Just now".into();
    }
    if diff_secs < 60 {
        return format!("{diff_secs}s ago");
    }

    let diff_mins = diff_secs / 60;
    if diff_mins < 60 {
        return format!("{diff_mins}m ago");
    }

    let diff_hours = diff_mins / 60;
    if diff_hours < 24 {
        return format!("{diff_hours}h ago");
    }

    let diff_days = diff_hours / 24;
    if diff_days < 7 {
        return format!("{diff_days}d ago");
    }
    if diff_days < 30 {
        return format!("{}w ago", diff_days / 7);
    }
    if diff_days < 365 {
        return format!("{}mo ago", diff_days / 30);
    }

    format!("{}y ago", diff_days / 365)
}
