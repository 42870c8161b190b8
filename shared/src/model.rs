use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::validation::Coordinate;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

typed_id!(ReportId);
typed_id!(UserId);
typed_id!(MediaId);
typed_id!(StatusChangeId);

// --- Vocabulary ---

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Accident,
    Fire,
    Medical,
    Crime,
    NaturalDisaster,
    #[default]
    #[serde(other)]
    Other,
}

impl IncidentType {
    pub const ALL: [Self; 6] = [
        Self::Accident,
        Self::Fire,
        Self::Medical,
        Self::Crime,
        Self::NaturalDisaster,
        Self::Other,
    ];

    /// Strict parse of a wire value; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "accident" => Some(Self::Accident),
            "fire" => Some(Self::Fire),
            "medical" | "medical_emergency" => Some(Self::Medical),
            "crime" => Some(Self::Crime),
            "natural_disaster" => Some(Self::NaturalDisaster),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Lenient decode used on responses: unrecognized values become `Other`.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Other)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accident => "accident",
            Self::Fire => "fire",
            Self::Medical => "medical",
            Self::Crime => "crime",
            Self::NaturalDisaster => "natural_disaster",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Accident => "Accident",
            Self::Fire => "Fire",
            Self::Medical => "Medical Emergency",
            Self::Crime => "Crime",
            Self::NaturalDisaster => "Natural Disaster",
            Self::Other => "Other",
        }
    }

    /// Label for a raw wire string, total over all inputs.
    #[must_use]
    pub fn label_for(s: &str) -> &'static str {
        Self::from_wire(s).label()
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Badge styling tier for a status. Inert data for the rendering layer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Info,
    Warning,
    Success,
    Danger,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    #[default]
    Pending,
    #[serde(alias = "in_review", alias = "under_review")]
    UnderInvestigation,
    Resolved,
    Rejected,
    /// A status this client does not know. Displayed, never sent.
    #[serde(other)]
    Unknown,
}

impl IncidentStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::UnderInvestigation,
        Self::Resolved,
        Self::Rejected,
    ];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Some(Self::Pending),
            "under_investigation" | "in_review" | "under_review" | "investigating" => {
                Some(Self::UnderInvestigation)
            }
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderInvestigation => "under_investigation",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::UnderInvestigation => "Under Investigation",
            Self::Resolved => "Resolved",
            Self::Rejected => "Rejected",
            Self::Unknown => "Unknown",
        }
    }

    #[must_use]
    pub const fn tier(self) -> SeverityTier {
        match self {
            Self::Pending => SeverityTier::Warning,
            Self::UnderInvestigation | Self::Unknown => SeverityTier::Info,
            Self::Resolved => SeverityTier::Success,
            Self::Rejected => SeverityTier::Danger,
        }
    }

    #[must_use]
    pub fn label_for(s: &str) -> &'static str {
        Self::from_wire(s).label()
    }

    /// Only known statuses may be requested from the backend.
    #[must_use]
    pub const fn is_requestable(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

// --- Entities ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(self.full_name.as_deref(), Some(self.username.as_str()))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Full name, else username, else "Unknown". Blank values are skipped.
#[must_use]
pub fn display_name<'a>(full_name: Option<&'a str>, username: Option<&'a str>) -> &'a str {
    [full_name, username]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(crate::UNKNOWN_REPORTER)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Image => &["png", "jpg", "jpeg", "gif", "webp"],
            Self::Video => &["mp4", "mov", "avi", "webm"],
        }
    }

    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Some(Self::Image),
            "video" | "videos" => Some(Self::Video),
            _ => None,
        }
    }

    /// Best guess from a MIME type such as `image/png`.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top = content_type.split('/').next()?.trim();
        Self::from_wire(top)
    }
}

/// An attachment as stored by the backend. `content_ref` is the server
/// path of the binary, never the bytes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MediaItem {
    pub id: MediaId,
    pub report_id: Option<ReportId>,
    pub filename: String,
    pub content_ref: String,
    pub kind: MediaKind,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A file the user picked for upload.
#[derive(Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub bytes: Bytes,
}

impl MediaUpload {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        kind: MediaKind,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            kind,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

impl fmt::Debug for MediaUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUpload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Canonical report shape. Location fields are flat regardless of how
/// the backend nested them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub status: IncidentStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub reporter_id: Option<UserId>,
    pub reporter: Option<User>,
    pub media: Vec<MediaItem>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Validated location, `None` when either axis is missing or invalid.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_location_complete(&self) -> bool {
        self.coordinate().is_some()
    }

    #[must_use]
    pub fn reporter_display_name(&self) -> &str {
        match &self.reporter {
            Some(user) => user.display_name(),
            None => crate::UNKNOWN_REPORTER,
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.reporter_id.as_ref() == Some(user)
            || self.reporter.as_ref().is_some_and(|r| &r.id == user)
    }

    pub fn images(&self) -> impl Iterator<Item = &MediaItem> {
        self.media.iter().filter(|m| m.kind == MediaKind::Image)
    }

    pub fn videos(&self) -> impl Iterator<Item = &MediaItem> {
        self.media.iter().filter(|m| m.kind == MediaKind::Video)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusChange {
    pub id: StatusChangeId,
    pub old_status: Option<IncidentStatus>,
    pub new_status: IncidentStatus,
    pub comment: Option<String>,
    pub changed_at: Option<DateTime<Utc>>,
    pub changed_by: Option<User>,
}

/// Normalized counts shared by the per-user and system-wide stats.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total: u64,
    pub pending: u64,
    pub under_investigation: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub total_users: Option<u64>,
    pub by_type: BTreeMap<IncidentType, u64>,
}

impl AggregateStats {
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count_for(&self, status: IncidentStatus) -> u64 {
        match status {
            IncidentStatus::Pending => self.pending,
            IncidentStatus::UnderInvestigation => self.under_investigation,
            IncidentStatus::Resolved => self.resolved,
            IncidentStatus::Rejected => self.rejected,
            IncidentStatus::Unknown => 0,
        }
    }

    #[must_use]
    pub fn count_for_type(&self, incident_type: IncidentType) -> u64 {
        self.by_type.get(&incident_type).copied().unwrap_or(0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<IncidentStatus>,
    pub incident_type: Option<IncidentType>,
    pub user_id: Option<UserId>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ReportFilter {
    #[must_use]
    pub fn with_status(mut self, status: IncidentStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_type(mut self, incident_type: IncidentType) -> Self {
        self.incident_type = Some(incident_type);
        self
    }

    #[must_use]
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    /// Query pairs in a stable order; absent fields are omitted.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(incident_type) = self.incident_type {
            pairs.push(("incident_type", incident_type.as_str().to_string()));
        }
        if let Some(user_id) = &self.user_id {
            pairs.push(("user_id", user_id.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        pairs
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub pagination: Option<Pagination>,
}

// --- Credentials ---

pub struct LoginCredentials {
    pub email: String,
    pub password: SecretString,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub full_name: String,
    pub phone_number: Option<String>,
}

impl Registration {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: SecretString::new(password.into()),
            full_name: full_name.into(),
            phone_number: None,
        }
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .field("phone_present", &self.phone_number.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn report() -> Report {
        Report {
            id: ReportId::new("1"),
            title: "Crash".into(),
            description: "Two cars collided at the junction".into(),
            incident_type: IncidentType::Accident,
            status: IncidentStatus::Pending,
            latitude: Some(-1.28),
            longitude: Some(36.82),
            address: None,
            reporter_id: None,
            reporter: None,
            media: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(IncidentType::Medical.label(), "Medical Emergency");
        assert_eq!(IncidentType::NaturalDisaster.label(), "Natural Disaster");
        assert_eq!(IncidentType::label_for("volcano"), "Other");
        assert_eq!(IncidentType::label_for(""), "Other");
    }

    #[test]
    fn test_status_aliases() {
        assert_eq!(IncidentStatus::parse("in_review"), Some(IncidentStatus::UnderInvestigation));
        assert_eq!(IncidentStatus::parse("Under Review"), Some(IncidentStatus::UnderInvestigation));
        assert_eq!(IncidentStatus::from_wire("archived"), IncidentStatus::Unknown);
        assert!(!IncidentStatus::Unknown.is_requestable());
    }

    #[test]
    fn test_status_tiers() {
        assert_eq!(IncidentStatus::Pending.tier(), SeverityTier::Warning);
        assert_eq!(IncidentStatus::UnderInvestigation.tier(), SeverityTier::Info);
        assert_eq!(IncidentStatus::Resolved.tier(), SeverityTier::Success);
        assert_eq!(IncidentStatus::Rejected.tier(), SeverityTier::Danger);
    }

    #[test]
    fn test_serde_fallbacks() {
        let t: IncidentType = serde_json::from_str("\"meteor\"").unwrap();
        assert_eq!(t, IncidentType::Other);
        let s: IncidentStatus = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(s, IncidentStatus::UnderInvestigation);
        let s: IncidentStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(s, IncidentStatus::Unknown);
        let r: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(r, Role::User);
    }

    #[test]
    fn test_role_wire_format() {
        let admin: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(admin, Role::Admin);
        let unknown: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(unknown, Role::User);
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");

        let user: User = serde_json::from_value(serde_json::json!({
            "id": "9",
            "username": "wanjiku",
            "role": "dispatcher"
        }))
        .unwrap();
        assert!(!user.is_admin());
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name(Some("Jane Doe"), Some("jane")), "Jane Doe");
        assert_eq!(display_name(Some("  "), Some("jane")), "jane");
        assert_eq!(display_name(None, None), "Unknown");
        assert_eq!(report().reporter_display_name(), "Unknown");
    }

    #[test]
    fn test_location_completeness() {
        let mut r = report();
        assert!(r.is_location_complete());
        r.longitude = None;
        assert!(!r.is_location_complete());
        r.longitude = Some(200.0);
        assert!(!r.is_location_complete());
    }

    #[test]
    fn test_filter_query_pairs() {
        let filter = ReportFilter::default()
            .with_status(IncidentStatus::UnderInvestigation)
            .with_type(IncidentType::Fire)
            .page(2, 50);
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("status", "under_investigation".to_string()),
                ("incident_type", "fire".to_string()),
                ("page", "2".to_string()),
                ("per_page", "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_upload_extension() {
        let upload = MediaUpload::new("Photo.JPG", "image/jpeg", MediaKind::Image, vec![1u8]);
        assert_eq!(upload.extension().as_deref(), Some("jpg"));
        let upload = MediaUpload::new("noext", "image/jpeg", MediaKind::Image, vec![1u8]);
        assert_eq!(upload.extension(), None);
        assert!(!format!("{upload:?}").contains("[1]"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = LoginCredentials::new("a@b.co", "hunter22");
        assert!(!format!("{creds:?}").contains("hunter22"));
    }

    proptest! {
        #[test]
        fn prop_type_label_total(s in ".*") {
            prop_assert!(!IncidentType::label_for(&s).is_empty());
        }

        #[test]
        fn prop_status_label_total(s in ".*") {
            prop_assert!(!IncidentStatus::label_for(&s).is_empty());
        }
    }
}
