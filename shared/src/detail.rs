//! Report detail controller and the derived data a detail view renders.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::model::{Report, ReportId, SeverityTier, User};
use crate::{
    format_optional_timestamp, format_time_ago, AppError, AppResult, ErrorKind,
    ADDRESS_NOT_PROVIDED, UNKNOWN_TIMESTAMP,
};

/// A report plus everything the view derives from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    pub report: Report,
    pub type_label: &'static str,
    pub status_label: &'static str,
    pub status_tier: SeverityTier,
    pub reporter: String,
    pub created_at: String,
    pub created_ago: String,
    pub updated_at: String,
    pub address: String,
    /// `lat, lon` to six decimals, `None` without a complete location.
    pub coordinates: Option<String>,
    pub image_count: usize,
    pub video_count: usize,
    /// The viewer reported this incident or is an admin.
    pub can_modify: bool,
}

impl ReportView {
    #[must_use]
    pub fn build(report: Report, viewer: Option<&User>, now: DateTime<Utc>) -> Self {
        let can_modify = viewer.is_some_and(|u| u.is_admin() || report.is_owned_by(&u.id));
        let address = report
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(ADDRESS_NOT_PROVIDED)
            .to_string();

        Self {
            type_label: report.incident_type.label(),
            status_label: report.status.label(),
            status_tier: report.status.tier(),
            reporter: report.reporter_display_name().to_string(),
            created_at: format_optional_timestamp(report.created_at),
            created_ago: report.created_at.map_or_else(
                || UNKNOWN_TIMESTAMP.to_string(),
                |at| format_time_ago(at, now),
            ),
            updated_at: format_optional_timestamp(report.updated_at),
            address,
            coordinates: report.coordinate().map(|c| c.display()),
            image_count: report.images().count(),
            video_count: report.videos().count(),
            can_modify,
            report,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteConfirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The backend confirmed the deletion; the view should navigate away.
    Deleted,
    /// Nothing was sent.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailState {
    #[default]
    Idle,
    Loading {
        id: ReportId,
    },
    Loaded(Box<ReportView>),
    NotFound {
        id: ReportId,
    },
    Failed {
        id: ReportId,
        error: AppError,
    },
    /// A refresh failed; the report loaded earlier stays on screen.
    RefreshFailed {
        view: Box<ReportView>,
        error: AppError,
    },
    Deleting(Box<ReportView>),
    Deleted {
        id: ReportId,
    },
}

impl DetailState {
    #[must_use]
    pub fn view(&self) -> Option<&ReportView> {
        match self {
            Self::Loaded(view) | Self::Deleting(view) | Self::RefreshFailed { view, .. } => {
                Some(view)
            }
            _ => None,
        }
    }

    /// The report on screen that a reload of `id` may fall back to.
    fn shown(&self, id: &ReportId) -> Option<&ReportView> {
        match self {
            Self::Loaded(view) | Self::RefreshFailed { view, .. } if view.report.id == *id => {
                Some(view)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn report_id(&self) -> Option<&ReportId> {
        match self {
            Self::Idle => None,
            Self::Loading { id }
            | Self::NotFound { id }
            | Self::Deleted { id }
            | Self::Failed { id, .. } => Some(id),
            Self::Loaded(view) | Self::Deleting(view) | Self::RefreshFailed { view, .. } => {
                Some(&view.report.id)
            }
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

pub struct ReportDetailController {
    api: Arc<ApiClient>,
    state: watch::Sender<DetailState>,
    /// Sequence number of the most recently started load.
    latest: AtomicU64,
    active: AtomicBool,
    deleting: AtomicBool,
}

impl ReportDetailController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(DetailState::Idle);
        Self {
            api,
            state,
            latest: AtomicU64::new(0),
            active: AtomicBool::new(true),
            deleting: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn state(&self) -> DetailState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fetches `id` into the view. When loads overlap, only the one started
    /// last is applied, whatever order the responses arrive in. Reloading
    /// the report already on screen keeps it there while the request runs,
    /// and after a failure other than not-found.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &ReportId) -> AppResult<()> {
        let seq = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let shown = self.state.borrow().shown(id).cloned();
        if self.is_active() && shown.is_none() {
            self.state
                .send_replace(DetailState::Loading { id: id.clone() });
        }

        let result = self.api.get_report(id).await;

        if !self.is_active() || self.latest.load(Ordering::Acquire) != seq {
            debug!(report_id = %id, seq, "discarding stale report response");
            return result.map(|_| ());
        }

        match result {
            Ok(report) => {
                let viewer = self.api.session().current_user();
                let view = ReportView::build(report, viewer.as_ref(), Utc::now());
                self.state.send_replace(DetailState::Loaded(Box::new(view)));
                Ok(())
            }
            Err(e) if e.is(ErrorKind::NotFound) => {
                debug!(report_id = %id, "report not found");
                self.state
                    .send_replace(DetailState::NotFound { id: id.clone() });
                Err(e)
            }
            Err(e) => {
                warn!(report_id = %id, code = e.code(), "failed to load report");
                self.state.send_replace(match shown {
                    Some(view) => DetailState::RefreshFailed {
                        view: Box::new(view),
                        error: e.clone(),
                    },
                    None => DetailState::Failed {
                        id: id.clone(),
                        error: e.clone(),
                    },
                });
                Err(e)
            }
        }
    }

    /// Loads the report currently on screen again.
    pub async fn refresh(&self) -> AppResult<()> {
        let id = self
            .state
            .borrow()
            .report_id()
            .cloned()
            .ok_or_else(|| AppError::invalid_state("No report is selected."))?;
        self.load(&id).await
    }

    /// Deletes the loaded report once the caller has confirmed. The view
    /// only moves to `Deleted` after the backend agrees; on failure the
    /// report stays on screen.
    #[instrument(skip(self))]
    pub async fn delete(&self, confirmation: DeleteConfirmation) -> AppResult<DeleteOutcome> {
        if confirmation == DeleteConfirmation::Declined {
            return Ok(DeleteOutcome::Cancelled);
        }

        let view = match &*self.state.borrow() {
            DetailState::Loaded(view) | DetailState::RefreshFailed { view, .. } => view.clone(),
            DetailState::Deleting(_) => {
                return Err(AppError::invalid_state("The report is already being deleted."));
            }
            _ => return Err(AppError::invalid_state("No report is loaded.")),
        };
        if !view.can_modify {
            return Err(AppError::forbidden(
                "You can only delete reports you submitted.",
            ));
        }
        if self
            .deleting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::invalid_state("The report is already being deleted."));
        }
        let _guard = DeleteGuard(&self.deleting);

        let id = view.report.id.clone();
        // A delete supersedes any load still in flight.
        self.latest.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(DetailState::Deleting(view.clone()));

        let result = self.api.delete_report(&id).await;

        if !self.is_active() {
            return result.map(|()| DeleteOutcome::Deleted);
        }

        match result {
            Ok(()) => {
                info!(report_id = %id, "report deleted");
                self.state.send_replace(DetailState::Deleted { id });
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                warn!(report_id = %id, code = e.code(), "delete failed");
                if e.is(ErrorKind::NotFound) {
                    self.state.send_replace(DetailState::NotFound { id });
                } else {
                    self.state.send_replace(DetailState::Loaded(view));
                }
                Err(e)
            }
        }
    }

    /// The view went away; pending responses will not touch the state.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ReportDetailController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportDetailController")
            .field("state", &*self.state.borrow())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

struct DeleteGuard<'a>(&'a AtomicBool);

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
