//! Backend response shapes and their normalization into the domain model.
//!
//! The backend is loose about shape: ids arrive as numbers or strings,
//! location may be flat or nested under `location`, media may be a list
//! or grouped by kind, and timestamps may lack an offset. Everything is
//! folded into one canonical shape here so nothing past the API client
//! sees the drift.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::model::{
    AggregateStats, IncidentStatus, IncidentType, MediaId, MediaItem, MediaKind, Pagination,
    Report, ReportId, ReportPage, Role, StatusChange, StatusChangeId, User, UserId,
};
use crate::{AppError, AppResult, ErrorKind};

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        AppError::new(ErrorKind::Unknown, "Unexpected response from server")
            .with_internal(format!("failed to parse JSON: {e}"))
    })
}

/// ISO-8601 with or without offset. Naive values are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse_timestamp)
}

/// An id the backend may send as a number, an integral float or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawId")]
pub(crate) struct IdValue(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Past 2^53 a float no longer names a single integer.
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

impl TryFrom<RawId> for IdValue {
    type Error = String;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        match raw {
            RawId::Int(n) => Ok(Self(n.to_string())),
            RawId::Float(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT_FLOAT_ID => {
                Ok(Self(format!("{n:.0}")))
            }
            RawId::Float(n) => Err(format!("id {n} is not an integer")),
            RawId::Text(s) => Ok(Self(s)),
        }
    }
}

impl IdValue {
    fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Num(f64),
    Text(String),
}

impl NumberLike {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|v| v.is_finite())
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// --- Users ---

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    id: IdValue,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl RawUser {
    fn normalize(self) -> User {
        User {
            id: UserId(self.id.into_string()),
            username: self.username.unwrap_or_default(),
            email: non_blank(self.email),
            full_name: non_blank(self.full_name),
            phone_number: non_blank(self.phone_number),
            role: self.role.as_deref().map_or(Role::User, Role::from_wire),
            created_at: timestamp(self.created_at.as_deref()),
        }
    }
}

// --- Reports ---

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    latitude: Option<NumberLike>,
    #[serde(default)]
    longitude: Option<NumberLike>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMediaItem {
    id: IdValue,
    #[serde(default)]
    report_id: Option<IdValue>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    created_at: Option<String>,
}

impl RawMediaItem {
    fn normalize(self, group: Option<MediaKind>, parent: Option<&ReportId>) -> MediaItem {
        let kind = self
            .media_type
            .as_deref()
            .and_then(MediaKind::from_wire)
            .or_else(|| self.mime_type.as_deref().and_then(MediaKind::from_content_type))
            .or(group)
            .unwrap_or(MediaKind::Image);
        let filename = self.filename.unwrap_or_default();
        MediaItem {
            id: MediaId(self.id.into_string()),
            report_id: self
                .report_id
                .map(|id| ReportId(id.into_string()))
                .or_else(|| parent.cloned()),
            content_ref: self.file_path.unwrap_or_else(|| filename.clone()),
            filename,
            kind,
            content_type: non_blank(self.mime_type),
            size_bytes: self.file_size,
            created_at: timestamp(self.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMedia {
    List(Vec<RawMediaItem>),
    Grouped {
        #[serde(default)]
        images: Vec<RawMediaItem>,
        #[serde(default)]
        videos: Vec<RawMediaItem>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReport {
    id: IdValue,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    incident_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    latitude: Option<NumberLike>,
    #[serde(default)]
    longitude: Option<NumberLike>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    user_id: Option<IdValue>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    media: Option<RawMedia>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl RawReport {
    /// Flat location fields win over the nested `location` object. A blank
    /// flat address does not shadow a nested one.
    pub(crate) fn normalize(self) -> Report {
        let id = ReportId(self.id.into_string());
        let nested = self.location.unwrap_or_default();

        let latitude = self
            .latitude
            .as_ref()
            .and_then(NumberLike::as_f64)
            .or_else(|| nested.latitude.as_ref().and_then(NumberLike::as_f64));
        let longitude = self
            .longitude
            .as_ref()
            .and_then(NumberLike::as_f64)
            .or_else(|| nested.longitude.as_ref().and_then(NumberLike::as_f64));
        let address = non_blank(self.address).or_else(|| non_blank(nested.address));

        let reporter = self.user.map(RawUser::normalize);
        let reporter_id = self
            .user_id
            .map(|id| UserId(id.into_string()))
            .or_else(|| reporter.as_ref().map(|u| u.id.clone()));

        let media = match self.media {
            None => Vec::new(),
            Some(RawMedia::List(items)) => items
                .into_iter()
                .map(|m| m.normalize(None, Some(&id)))
                .collect(),
            Some(RawMedia::Grouped { images, videos }) => images
                .into_iter()
                .map(|m| m.normalize(Some(MediaKind::Image), Some(&id)))
                .chain(
                    videos
                        .into_iter()
                        .map(|m| m.normalize(Some(MediaKind::Video), Some(&id))),
                )
                .collect(),
        };

        Report {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            incident_type: self
                .incident_type
                .as_deref()
                .map_or(IncidentType::Other, IncidentType::from_wire),
            status: self
                .status
                .as_deref()
                .map_or(IncidentStatus::Pending, IncidentStatus::from_wire),
            latitude,
            longitude,
            address,
            reporter_id,
            reporter,
            media,
            created_at: timestamp(self.created_at.as_deref()),
            updated_at: timestamp(self.updated_at.as_deref()),
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportEnvelope {
    Wrapped { report: RawReport },
    Bare(RawReport),
}

pub(crate) fn decode_report(body: &[u8]) -> AppResult<Report> {
    let report = match decode::<ReportEnvelope>(body)? {
        ReportEnvelope::Wrapped { report } | ReportEnvelope::Bare(report) => report,
    };
    Ok(report.normalize())
}

#[derive(Debug, Deserialize)]
struct RawPagination {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    pages: Option<u32>,
    #[serde(default)]
    has_next: Option<bool>,
    #[serde(default)]
    has_prev: Option<bool>,
}

impl RawPagination {
    fn normalize(self) -> Pagination {
        let page = self.page.unwrap_or(1);
        let pages = self.pages.unwrap_or(0);
        Pagination {
            page,
            per_page: self.per_page.unwrap_or(0),
            total: self.total.unwrap_or(0),
            pages,
            has_next: self.has_next.unwrap_or(page < pages),
            has_prev: self.has_prev.unwrap_or(page > 1),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportListEnvelope {
    Paged {
        reports: Vec<RawReport>,
        #[serde(default)]
        pagination: Option<RawPagination>,
    },
    Bare(Vec<RawReport>),
}

pub(crate) fn decode_report_page(body: &[u8]) -> AppResult<ReportPage> {
    let (reports, pagination) = match decode::<ReportListEnvelope>(body)? {
        ReportListEnvelope::Paged {
            reports,
            pagination,
        } => (reports, pagination.map(RawPagination::normalize)),
        ReportListEnvelope::Bare(reports) => (reports, None),
    };
    Ok(ReportPage {
        reports: reports.into_iter().map(RawReport::normalize).collect(),
        pagination,
    })
}

// --- Media ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MediaEnvelope {
    Wrapped { media: RawMediaItem },
    Bare(RawMediaItem),
}

pub(crate) fn decode_media(body: &[u8], report_id: &ReportId) -> AppResult<MediaItem> {
    let item = match decode::<MediaEnvelope>(body)? {
        MediaEnvelope::Wrapped { media } | MediaEnvelope::Bare(media) => media,
    };
    Ok(item.normalize(None, Some(report_id)))
}

// --- Auth ---

#[derive(Debug, Deserialize)]
struct RawAuth {
    access_token: String,
    #[serde(default)]
    user_id: Option<IdValue>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
}

/// Returns the access token and the signed-in user.
pub(crate) fn decode_auth(body: &[u8]) -> AppResult<(String, User)> {
    let raw: RawAuth = decode(body)?;
    if raw.access_token.trim().is_empty() {
        return Err(AppError::new(ErrorKind::Unknown, "Unexpected response from server")
            .with_internal("auth response carried an empty access_token"));
    }

    let top_role = raw.role.as_deref().map(Role::from_wire);
    let user = match (raw.user, raw.user_id) {
        (Some(user), _) => {
            let user_role_missing = user.role.is_none();
            let mut user = user.normalize();
            if user_role_missing {
                if let Some(role) = top_role {
                    user.role = role;
                }
            }
            user
        }
        (None, Some(id)) => User {
            id: UserId(id.into_string()),
            username: String::new(),
            email: None,
            full_name: None,
            phone_number: None,
            role: top_role.unwrap_or_default(),
            created_at: None,
        },
        (None, None) => {
            return Err(AppError::new(ErrorKind::Unknown, "Unexpected response from server")
                .with_internal("auth response carried no user"));
        }
    };
    Ok((raw.access_token, user))
}

// --- Status history ---

#[derive(Debug, Deserialize)]
struct RawStatusChange {
    id: IdValue,
    #[serde(default)]
    old_status: Option<String>,
    new_status: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    changed_at: Option<String>,
    #[serde(default)]
    changed_by: Option<RawUser>,
}

impl RawStatusChange {
    fn normalize(self) -> StatusChange {
        StatusChange {
            id: StatusChangeId(self.id.into_string()),
            old_status: non_blank(self.old_status).map(|s| IncidentStatus::from_wire(&s)),
            new_status: IncidentStatus::from_wire(&self.new_status),
            comment: non_blank(self.comment),
            changed_at: timestamp(self.changed_at.as_deref()),
            changed_by: self.changed_by.map(RawUser::normalize),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryEnvelope {
    Wrapped { history: Vec<RawStatusChange> },
    Bare(Vec<RawStatusChange>),
}

/// Entries keep the order the server sent them in.
pub(crate) fn decode_history(body: &[u8]) -> AppResult<Vec<StatusChange>> {
    let entries = match decode::<HistoryEnvelope>(body)? {
        HistoryEnvelope::Wrapped { history } | HistoryEnvelope::Bare(history) => history,
    };
    Ok(entries.into_iter().map(RawStatusChange::normalize).collect())
}

#[derive(Debug, Deserialize)]
struct RawStatusUpdate {
    report: RawReport,
    #[serde(default)]
    status_change: Option<RawStatusChange>,
}

pub(crate) fn decode_status_update(body: &[u8]) -> AppResult<(Report, Option<StatusChange>)> {
    let raw: RawStatusUpdate = decode(body)?;
    Ok((
        raw.report.normalize(),
        raw.status_change.map(RawStatusChange::normalize),
    ))
}

// --- Stats ---

#[derive(Debug, Default, Deserialize)]
struct RawSystemStats {
    #[serde(default)]
    total_users: Option<u64>,
    #[serde(default)]
    total_reports: Option<u64>,
    #[serde(default)]
    reports_by_status: BTreeMap<String, u64>,
    #[serde(default)]
    reports_by_type: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUserStats {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    pending: Option<u64>,
    #[serde(default, alias = "in_review", alias = "under_review")]
    under_investigation: Option<u64>,
    #[serde(default)]
    resolved: Option<u64>,
    #[serde(default)]
    rejected: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsEnvelope {
    System { statistics: RawSystemStats },
    User(RawUserStats),
}

/// Accepts either stats shape. Missing counts are zero.
pub(crate) fn decode_stats(body: &[u8]) -> AppResult<AggregateStats> {
    Ok(match decode::<StatsEnvelope>(body)? {
        StatsEnvelope::User(raw) => AggregateStats {
            total: raw.total.unwrap_or(0),
            pending: raw.pending.unwrap_or(0),
            under_investigation: raw.under_investigation.unwrap_or(0),
            resolved: raw.resolved.unwrap_or(0),
            rejected: raw.rejected.unwrap_or(0),
            total_users: None,
            by_type: BTreeMap::new(),
        },
        StatsEnvelope::System { statistics } => {
            let mut stats = AggregateStats {
                total_users: Some(statistics.total_users.unwrap_or(0)),
                ..AggregateStats::default()
            };
            // "in_review" and "under_investigation" share a bucket; counts saturate.
            for (status, &count) in &statistics.reports_by_status {
                let bucket = match IncidentStatus::from_wire(status) {
                    IncidentStatus::Pending => &mut stats.pending,
                    IncidentStatus::UnderInvestigation => &mut stats.under_investigation,
                    IncidentStatus::Resolved => &mut stats.resolved,
                    IncidentStatus::Rejected => &mut stats.rejected,
                    IncidentStatus::Unknown => continue,
                };
                *bucket = bucket.saturating_add(count);
            }
            for (incident_type, &count) in &statistics.reports_by_type {
                let bucket = stats
                    .by_type
                    .entry(IncidentType::from_wire(incident_type))
                    .or_insert(0);
                *bucket = bucket.saturating_add(count);
            }
            stats.total = statistics.total_reports.unwrap_or_else(|| {
                statistics
                    .reports_by_status
                    .values()
                    .copied()
                    .fold(0, u64::saturating_add)
            });
            stats
        }
    })
}

// --- Health ---

#[derive(Debug, Deserialize)]
struct RawHealth {
    #[serde(default)]
    status: Option<String>,
}

pub(crate) fn decode_health(body: &[u8]) -> AppResult<String> {
    let raw: RawHealth = decode(body)?;
    Ok(raw.status.unwrap_or_else(|| "unknown".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn report(value: &serde_json::Value) -> Report {
        decode_report(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_nested_location_is_flattened() {
        let r = report(&json!({
            "report": {
                "id": 7,
                "title": "Fire at market",
                "description": "Stalls burning near the north gate",
                "incident_type": "fire",
                "status": "pending",
                "location": {"latitude": -1.5, "longitude": 36.9, "address": "Gikomba"}
            }
        }));
        assert_eq!(r.id.as_str(), "7");
        assert_eq!(r.latitude, Some(-1.5));
        assert_eq!(r.longitude, Some(36.9));
        assert_eq!(r.address.as_deref(), Some("Gikomba"));
    }

    #[test]
    fn test_flat_fields_win_over_nested() {
        let r = report(&json!({
            "id": "abc",
            "latitude": 10.0,
            "longitude": "20.5",
            "address": "Flat street",
            "location": {"latitude": -1.0, "longitude": -2.0, "address": "Nested road"}
        }));
        assert_eq!(r.latitude, Some(10.0));
        assert_eq!(r.longitude, Some(20.5));
        assert_eq!(r.address.as_deref(), Some("Flat street"));
    }

    #[test]
    fn test_blank_flat_address_falls_back_to_nested() {
        let r = report(&json!({
            "id": 1,
            "address": "",
            "location": {"address": "Nested road"}
        }));
        assert_eq!(r.address.as_deref(), Some("Nested road"));
        assert!(!r.is_location_complete());
    }

    #[test]
    fn test_integral_float_ids() {
        let r = report(&json!({
            "id": 7.0,
            "user_id": 12.0,
            "media": [{"id": 3.0, "report_id": 7, "media_type": "image"}]
        }));
        assert_eq!(r.id.as_str(), "7");
        assert_eq!(r.reporter_id.as_ref().map(UserId::as_str), Some("12"));
        assert_eq!(r.media[0].id.as_str(), "3");

        let fractional = decode_report(json!({"id": 7.5}).to_string().as_bytes()).unwrap_err();
        assert_eq!(fractional.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_unknown_vocabulary_falls_back() {
        let r = report(&json!({"id": 1, "incident_type": "meteor", "status": "archived"}));
        assert_eq!(r.incident_type, IncidentType::Other);
        assert_eq!(r.status, IncidentStatus::Unknown);
    }

    #[test]
    fn test_grouped_media() {
        let r = report(&json!({
            "id": 3,
            "user": {"id": 9, "username": "amina", "full_name": "Amina W", "role": "user"},
            "media": {
                "images": [{"id": 1, "filename": "a.png", "file_path": "uploads/a.png", "media_type": "image", "mime_type": "image/png", "file_size": 12}],
                "videos": [{"id": 2, "filename": "b.mp4", "file_path": "uploads/b.mp4", "mime_type": "video/mp4"}]
            }
        }));
        assert_eq!(r.media.len(), 2);
        assert_eq!(r.images().count(), 1);
        assert_eq!(r.videos().count(), 1);
        assert_eq!(r.media[0].content_ref, "uploads/a.png");
        assert_eq!(r.media[1].report_id.as_ref().map(ReportId::as_str), Some("3"));
        assert_eq!(r.reporter_id.as_ref().map(UserId::as_str), Some("9"));
        assert_eq!(r.reporter_display_name(), "Amina W");
    }

    #[test]
    fn test_media_list() {
        let r = report(&json!({
            "id": 3,
            "media": [{"id": "m1", "filename": "clip.webm", "media_type": "video"}]
        }));
        assert_eq!(r.media[0].kind, MediaKind::Video);
        assert_eq!(r.media[0].content_ref, "clip.webm");
    }

    #[test]
    fn test_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T11:30:00+03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_report_page() {
        let body = json!({
            "reports": [{"id": 1}, {"id": 2}],
            "pagination": {"page": 1, "per_page": 20, "total": 2, "pages": 1, "has_next": false, "has_prev": false}
        });
        let page = decode_report_page(body.to_string().as_bytes()).unwrap();
        assert_eq!(page.reports.len(), 2);
        assert_eq!(page.pagination.unwrap().total, 2);

        let bare = decode_report_page(b"[{\"id\": 5}]").unwrap();
        assert_eq!(bare.reports[0].id.as_str(), "5");
        assert!(bare.pagination.is_none());
    }

    #[test]
    fn test_auth_response() {
        let body = json!({
            "message": "Login successful",
            "access_token": "tok",
            "user_id": 4,
            "role": "admin",
            "user": {"id": 4, "username": "root", "email": "root@example.com"}
        });
        let (token, user) = decode_auth(body.to_string().as_bytes()).unwrap();
        assert_eq!(token, "tok");
        assert_eq!(user.id.as_str(), "4");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_auth_response_without_user_is_error() {
        let error = decode_auth(br#"{"access_token":"tok"}"#).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_history_keeps_server_order() {
        let body = json!({
            "report_id": "1",
            "history": [
                {"id": 2, "old_status": "under_investigation", "new_status": "resolved", "changed_at": "2024-01-02T00:00:00"},
                {"id": 1, "old_status": "pending", "new_status": "under_investigation", "comment": "Team dispatched", "changed_by": {"id": 1, "username": "admin"}}
            ]
        });
        let history = decode_history(body.to_string().as_bytes()).unwrap();
        assert_eq!(history[0].new_status, IncidentStatus::Resolved);
        assert_eq!(history[1].old_status, Some(IncidentStatus::Pending));
        assert_eq!(history[1].comment.as_deref(), Some("Team dispatched"));
    }

    #[test]
    fn test_user_stats() {
        let stats = decode_stats(br#"{"total": 5, "pending": 2, "resolved": 1, "rejected": 1}"#).unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.under_investigation, 0);
        assert_eq!(stats.total_users, None);
    }

    #[test]
    fn test_system_stats() {
        let body = json!({
            "statistics": {
                "total_users": 12,
                "total_reports": 9,
                "reports_by_status": {"pending": 4, "under_investigation": 3, "resolved": 2},
                "reports_by_type": {"fire": 5, "flood": 1, "other": 3}
            }
        });
        let stats = decode_stats(body.to_string().as_bytes()).unwrap();
        assert_eq!(stats.total, 9);
        assert_eq!(stats.total_users, Some(12));
        assert_eq!(stats.under_investigation, 3);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.count_for_type(IncidentType::Fire), 5);
        assert_eq!(stats.count_for_type(IncidentType::Other), 4);
    }

    #[test]
    fn test_system_stats_saturate_on_huge_counts() {
        let body = json!({
            "statistics": {
                "reports_by_status": {
                    "under_investigation": u64::MAX,
                    "in_review": 1,
                    "pending": u64::MAX - 1
                },
                "reports_by_type": {"flood": u64::MAX, "other": 7}
            }
        });
        let stats = decode_stats(body.to_string().as_bytes()).unwrap();
        assert_eq!(stats.under_investigation, u64::MAX);
        assert_eq!(stats.pending, u64::MAX - 1);
        assert_eq!(stats.total, u64::MAX);
        assert_eq!(stats.count_for_type(IncidentType::Other), u64::MAX);
    }

    #[test]
    fn test_garbage_is_unknown_error() {
        let error = decode_report(b"not json").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.internal_message.is_some());
    }
}
