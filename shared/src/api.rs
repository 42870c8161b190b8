//! Typed client for the backend REST API.
//!
//! Every operation validates its input locally first, so a request the
//! backend would certainly reject is never sent. Responses are normalized
//! through `wire` before they leave this module.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::capabilities::{
    HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm,
};
use crate::config::{ClientConfig, ConfigError};
use crate::model::{
    AggregateStats, IncidentStatus, LoginCredentials, MediaId, MediaItem, MediaUpload,
    Registration, Report, ReportFilter, ReportId, ReportPage, StatusChange, UserId,
};
use crate::session::{Session, SessionContext};
use crate::validation::{
    validate_filter, validate_login, validate_registration, validate_status_change,
    validate_upload, ReportPatch, ReportSubmission,
};
use crate::{wire, AppError, AppResult, ErrorKind};

/// Resolves endpoint paths against the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.api.base_url()?))
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Appends path segments, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::new(ErrorKind::Configuration, "The server address is invalid")
                    .with_internal(format!("{} cannot be a base URL", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn url_with_query(&self, segments: &[&str], pairs: &[(&str, String)]) -> AppResult<Url> {
        let mut url = self.url(segments)?;
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

pub struct ApiClient {
    http: Arc<dyn HttpTransport>,
    session: Arc<SessionContext>,
    endpoints: Endpoints,
    timeout: Duration,
    max_upload_bytes: usize,
}

impl ApiClient {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        session: Arc<SessionContext>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            http,
            session,
            endpoints,
            timeout: crate::DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: crate::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        http: Arc<dyn HttpTransport>,
        session: Arc<SessionContext>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(http, session, Endpoints::from_config(config)?)
            .with_timeout(config.api.request_timeout())
            .with_max_upload_bytes(config.uploads.max_bytes))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn request(&self, method: HttpMethod, url: Url) -> AppResult<HttpRequest> {
        Ok(HttpRequest::new(method, url)?.with_timeout(self.timeout)?)
    }

    fn require_admin(&self) -> AppResult<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Only administrators can perform this action.",
            ))
        }
    }

    /// Attaches the bearer token, bounds the exchange and classifies the
    /// outcome. A 401 ends the session before the error is returned.
    async fn send(&self, request: HttpRequest) -> AppResult<HttpResponse> {
        let token: Option<SecretString> = self.session.bearer_token();
        let request = match &token {
            Some(token) => request.with_bearer(token)?,
            None => request,
        };

        let method = request.method();
        let path = request.url().path().to_string();
        let request_id = request.request_id().to_string();
        debug!(%method, %path, %request_id, "sending request");

        let response = match tokio::time::timeout(self.timeout, self.http.execute(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(%method, %path, %request_id, error = %e, "transport failure");
                return Err(e.into());
            }
            Err(_) => {
                warn!(%method, %path, %request_id, "request timed out");
                return Err(HttpError::timeout(self.timeout).into());
            }
        };

        let status = response.status();
        if response.is_success() {
            debug!(%method, %path, %request_id, status, "request succeeded");
            return Ok(response);
        }

        let error = AppError::from_http_status(status, response.body());
        let content_type = response.header("Content-Type").unwrap_or("none");
        debug!(
            %method,
            %path,
            %request_id,
            status,
            content_type,
            code = error.code(),
            "request failed"
        );
        if error.is(ErrorKind::Authentication) {
            self.session.auth_failure_for(token.as_ref()).await;
        }
        Err(error)
    }

    async fn get(&self, url: Url) -> AppResult<HttpResponse> {
        self.send(self.request(HttpMethod::Get, url)?).await
    }

    async fn send_json<T: serde::Serialize + Sync>(
        &self,
        method: HttpMethod,
        url: Url,
        body: &T,
    ) -> AppResult<HttpResponse> {
        self.send(self.request(method, url)?.with_json(body)?).await
    }

    // --- Auth ---

    #[instrument(skip_all, fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> AppResult<Session> {
        validate_registration(registration)?;

        let mut body = serde_json::json!({
            "username": registration.username.trim(),
            "email": registration.email.trim(),
            "password": registration.password.expose_secret(),
            "full_name": registration.full_name.trim(),
        });
        if let Some(phone) = registration.phone_number.as_deref().map(str::trim) {
            if !phone.is_empty() {
                body["phone_number"] = serde_json::Value::from(phone);
            }
        }

        let url = self.endpoints.url(&["auth", "register"])?;
        let response = self.send_json(HttpMethod::Post, url, &body).await?;
        self.establish(response.body()).await
    }

    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &LoginCredentials) -> AppResult<Session> {
        validate_login(credentials)?;

        let body = serde_json::json!({
            "email": credentials.email.trim(),
            "password": credentials.password.expose_secret(),
        });
        let url = self.endpoints.url(&["auth", "login"])?;
        let response = self.send_json(HttpMethod::Post, url, &body).await?;
        self.establish(response.body()).await
    }

    async fn establish(&self, body: &[u8]) -> AppResult<Session> {
        let (token, user) = wire::decode_auth(body)?;
        let session = Session::new(user, SecretString::new(token));
        self.session.sign_in(session.clone()).await;
        Ok(session)
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    // --- Reports ---

    #[instrument(skip_all)]
    pub async fn list_reports(&self, filter: &ReportFilter) -> AppResult<ReportPage> {
        validate_filter(filter)?;
        let url = self
            .endpoints
            .url_with_query(&["reports"], &filter.query_pairs())?;
        wire::decode_report_page(self.get(url).await?.body())
    }

    /// Every user's reports. Admin only.
    #[instrument(skip_all)]
    pub async fn list_all_reports(&self, filter: &ReportFilter) -> AppResult<ReportPage> {
        self.require_admin()?;
        validate_filter(filter)?;
        let url = self
            .endpoints
            .url_with_query(&["admin", "reports"], &filter.query_pairs())?;
        wire::decode_report_page(self.get(url).await?.body())
    }

    #[instrument(skip_all, fields(report_id = %id))]
    pub async fn get_report(&self, id: &ReportId) -> AppResult<Report> {
        let url = self.endpoints.url(&["reports", id.as_str()])?;
        wire::decode_report(self.get(url).await?.body())
    }

    #[instrument(skip_all)]
    pub async fn create_report(&self, submission: &ReportSubmission) -> AppResult<Report> {
        let url = self.endpoints.url(&["reports"])?;
        let response = self.send_json(HttpMethod::Post, url, submission).await?;
        let report = wire::decode_report(response.body())?;
        debug!(report_id = %report.id, "report created");
        Ok(report)
    }

    #[instrument(skip_all, fields(report_id = %id))]
    pub async fn update_report(&self, id: &ReportId, mut patch: ReportPatch) -> AppResult<Report> {
        patch.validate()?;
        let url = self.endpoints.url(&["reports", id.as_str()])?;
        let response = self.send_json(HttpMethod::Put, url, &patch.body()).await?;
        wire::decode_report(response.body())
    }

    #[instrument(skip_all, fields(report_id = %id))]
    pub async fn delete_report(&self, id: &ReportId) -> AppResult<()> {
        let url = self.endpoints.url(&["reports", id.as_str()])?;
        self.send(self.request(HttpMethod::Delete, url)?).await?;
        Ok(())
    }

    // --- Media ---

    #[instrument(skip_all, fields(report_id = %report_id, filename = %upload.filename))]
    pub async fn upload_media(
        &self,
        report_id: &ReportId,
        upload: &MediaUpload,
    ) -> AppResult<MediaItem> {
        validate_upload(upload, self.max_upload_bytes)?;

        let form = MultipartForm::new()
            .file(
                "file",
                upload.filename.as_str(),
                upload.content_type.as_str(),
                upload.bytes.clone(),
            )
            .text("media_type", upload.kind.as_str());
        let url = self.endpoints.url(&["reports", report_id.as_str(), "media"])?;
        let request = self.request(HttpMethod::Post, url)?.with_multipart(form)?;
        let response = self.send(request).await?;
        wire::decode_media(response.body(), report_id)
    }

    #[instrument(skip_all, fields(report_id = %report_id, media_id = %media_id))]
    pub async fn delete_media(&self, report_id: &ReportId, media_id: &MediaId) -> AppResult<()> {
        let url = self
            .endpoints
            .url(&["reports", report_id.as_str(), "media", media_id.as_str()])?;
        self.send(self.request(HttpMethod::Delete, url)?).await?;
        Ok(())
    }

    // --- Admin ---

    /// Requests a transition. The returned report is authoritative.
    #[instrument(skip_all, fields(report_id = %report_id, status = status.as_str()))]
    pub async fn update_status(
        &self,
        report_id: &ReportId,
        status: IncidentStatus,
        note: Option<&str>,
    ) -> AppResult<Report> {
        self.require_admin()?;
        let comment = validate_status_change(status, note)?;

        let body = serde_json::json!({ "status": status, "comment": comment });
        let url = self
            .endpoints
            .url(&["admin", "reports", report_id.as_str(), "status"])?;
        let response = self.send_json(HttpMethod::Patch, url, &body).await?;
        let (report, change) = wire::decode_status_update(response.body())?;
        if let Some(change) = change {
            debug!(
                change_id = %change.id,
                from = change.old_status.map_or("none", IncidentStatus::as_str),
                to = change.new_status.as_str(),
                "status changed"
            );
        }
        Ok(report)
    }

    /// Newest first, as the server orders it.
    #[instrument(skip_all, fields(report_id = %report_id))]
    pub async fn get_status_history(&self, report_id: &ReportId) -> AppResult<Vec<StatusChange>> {
        self.require_admin()?;
        let url = self
            .endpoints
            .url(&["admin", "reports", report_id.as_str(), "history"])?;
        wire::decode_history(self.get(url).await?.body())
    }

    #[instrument(skip_all)]
    pub async fn get_admin_stats(&self) -> AppResult<AggregateStats> {
        self.require_admin()?;
        let url = self.endpoints.url(&["admin", "stats"])?;
        wire::decode_stats(self.get(url).await?.body())
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn get_user_stats(&self, user_id: &UserId) -> AppResult<AggregateStats> {
        let url = self
            .endpoints
            .url(&["reports", "stats", user_id.as_str()])?;
        wire::decode_stats(self.get(url).await?.body())
    }

    pub async fn health(&self) -> AppResult<String> {
        let url = self.endpoints.url(&["health"])?;
        wire::decode_health(self.get(url).await?.body())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.endpoints.base().as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
