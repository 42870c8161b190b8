//! Application root: owns the session and the API client and hands out
//! controllers that share them.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::capabilities::Capabilities;
use crate::config::{ClientConfig, ConfigError};
use crate::detail::ReportDetailController;
use crate::form::ReportFormController;
use crate::model::ReportId;
use crate::session::{SessionContext, SessionState};
use crate::stats::{StatsAggregator, StatsScope};

pub struct App {
    config: ClientConfig,
    capabilities: Capabilities,
    session: Arc<SessionContext>,
    api: Arc<ApiClient>,
}

impl App {
    pub fn new(config: ClientConfig, capabilities: Capabilities) -> Result<Self, ConfigError> {
        let session = Arc::new(SessionContext::new(capabilities.tokens.clone()));
        let api = Arc::new(ApiClient::from_config(
            &config,
            capabilities.http.clone(),
            session.clone(),
        )?);
        Ok(Self {
            config,
            capabilities,
            session,
            api,
        })
    }

    /// Production wiring: reqwest transport, file-backed session when
    /// `session.token_path` is set, no geolocation until the shell
    /// supplies one through [`App::new`].
    #[cfg(feature = "reqwest-transport")]
    pub fn with_default_capabilities(config: ClientConfig) -> crate::AppResult<Self> {
        use crate::capabilities::{
            FileTokenStore, MemoryTokenStore, NoGeolocation, ReqwestTransport, TokenStore,
        };

        let tokens: Arc<dyn TokenStore> = match &config.session.token_path {
            Some(path) => Arc::new(FileTokenStore::new(path.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let capabilities = Capabilities::new(
            Arc::new(ReqwestTransport::new()?),
            tokens,
            Arc::new(NoGeolocation),
        );
        Ok(Self::new(config, capabilities)?)
    }

    /// Start-up: adopts a persisted session, if any.
    pub async fn start(&self) -> SessionState {
        let state = self.session.restore().await;
        info!(
            base_url = %self.api.endpoints().base(),
            authenticated = state.is_authenticated(),
            "client started"
        );
        state
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    #[must_use]
    pub const fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub fn new_report_form(&self) -> ReportFormController {
        ReportFormController::new_report(
            self.api.clone(),
            self.capabilities.geolocation.clone(),
            self.config.geolocation.timeout(),
        )
    }

    /// Call `load` on the result before presenting it.
    #[must_use]
    pub fn edit_report_form(&self, id: ReportId) -> ReportFormController {
        ReportFormController::edit_report(
            self.api.clone(),
            self.capabilities.geolocation.clone(),
            self.config.geolocation.timeout(),
            id,
        )
    }

    #[must_use]
    pub fn report_detail(&self) -> ReportDetailController {
        ReportDetailController::new(self.api.clone())
    }

    #[must_use]
    pub fn stats(&self, scope: StatsScope) -> StatsAggregator {
        StatsAggregator::new(self.api.clone(), scope)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("base_url", &self.config.api.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
