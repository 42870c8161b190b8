//! Report form controller.
//!
//! Owns the working draft for both the create and the edit flow. Keystrokes
//! go through `set_field` untouched apart from length caps; validation runs
//! once, at `submit`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::capabilities::{GeolocationError, GeolocationProvider};
use crate::model::{Report, ReportId};
use crate::validation::{Coordinate, DraftField, ReportDraft};
use crate::{AppError, AppResult, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(ReportId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPhase {
    /// Waiting for the report being edited.
    Loading,
    /// The report being edited could not be fetched. Submitting is blocked.
    LoadFailed(AppError),
    Editing,
    Submitted(Box<Report>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub mode: FormMode,
    pub phase: FormPhase,
    pub draft: ReportDraft,
    pub locating: bool,
    pub submitting: bool,
    /// Last recoverable failure: validation, location or a rejected submit.
    pub error: Option<AppError>,
    /// Set when `use_current_location` filled the coordinates.
    pub located: Option<Coordinate>,
}

impl FormState {
    fn new(mode: FormMode, phase: FormPhase) -> Self {
        Self {
            mode,
            phase,
            draft: ReportDraft::new(),
            locating: false,
            submitting: false,
            error: None,
            located: None,
        }
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.phase == FormPhase::Editing && !self.submitting
    }

    #[must_use]
    pub const fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit(_))
    }

    /// Messages for one field from the last validation failure.
    #[must_use]
    pub fn field_errors(&self, field: DraftField) -> &[String] {
        self.error
            .as_ref()
            .and_then(|e| e.fields.get(field.as_str()))
            .map_or(&[], Vec::as_slice)
    }
}

pub struct ReportFormController {
    api: Arc<ApiClient>,
    geolocation: Arc<dyn GeolocationProvider>,
    geolocation_timeout: Duration,
    state: watch::Sender<FormState>,
    /// Cleared by `deactivate`; results arriving afterwards are dropped.
    active: AtomicBool,
    load_seq: AtomicU64,
    /// Set once `load` has filled the draft from the server.
    loaded: AtomicBool,
    locating: AtomicBool,
    submitting: AtomicBool,
}

impl ReportFormController {
    fn with_state(
        api: Arc<ApiClient>,
        geolocation: Arc<dyn GeolocationProvider>,
        geolocation_timeout: Duration,
        initial: FormState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            api,
            geolocation,
            geolocation_timeout,
            state,
            active: AtomicBool::new(true),
            load_seq: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
            locating: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
        }
    }

    /// A blank draft that submits through `create_report`.
    pub fn new_report(
        api: Arc<ApiClient>,
        geolocation: Arc<dyn GeolocationProvider>,
        geolocation_timeout: Duration,
    ) -> Self {
        Self::with_state(
            api,
            geolocation,
            geolocation_timeout,
            FormState::new(FormMode::Create, FormPhase::Editing),
        )
    }

    /// Edit flow. The draft stays blank and submission is blocked until
    /// `load` has fetched the existing report.
    pub fn edit_report(
        api: Arc<ApiClient>,
        geolocation: Arc<dyn GeolocationProvider>,
        geolocation_timeout: Duration,
        id: ReportId,
    ) -> Self {
        Self::with_state(
            api,
            geolocation,
            geolocation_timeout,
            FormState::new(FormMode::Edit(id), FormPhase::Loading),
        )
    }

    #[must_use]
    pub fn state(&self) -> FormState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FormState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fetches the report being edited into the draft. A no-op for the
    /// create flow. May be called again after a failure. A failed reload
    /// keeps the draft already loaded and reports the error in `error`.
    #[instrument(skip(self))]
    pub async fn load(&self) -> AppResult<()> {
        let FormMode::Edit(id) = self.state.borrow().mode.clone() else {
            return Ok(());
        };

        let seq = self.load_seq.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.send_modify(|s| {
            s.phase = FormPhase::Loading;
            s.error = None;
        });

        let result = self.api.get_report(&id).await;

        if !self.is_active() || self.load_seq.load(Ordering::Acquire) != seq {
            debug!(report_id = %id, "discarding stale report load");
            return result.map(|_| ());
        }

        match result {
            Ok(report) => {
                self.loaded.store(true, Ordering::Release);
                self.state.send_modify(|s| {
                    s.draft = ReportDraft::from_report(&report);
                    s.phase = FormPhase::Editing;
                });
                Ok(())
            }
            Err(e) => {
                warn!(report_id = %id, code = e.code(), "failed to load report for editing");
                let reloading = self.loaded.load(Ordering::Acquire);
                self.state.send_modify(|s| {
                    if reloading {
                        s.phase = FormPhase::Editing;
                        s.error = Some(e.clone());
                    } else {
                        s.draft = ReportDraft::new();
                        s.phase = FormPhase::LoadFailed(e.clone());
                    }
                });
                Err(e)
            }
        }
    }

    pub fn set_field(&self, field: DraftField, value: &str) {
        self.state.send_modify(|s| {
            s.draft.set(field, value);
            if field == DraftField::Latitude || field == DraftField::Longitude {
                s.located = None;
            }
            clear_field_error(&mut s.error, field);
        });
    }

    /// `set_field` for shells that address fields by wire name.
    pub fn set_field_by_name(&self, name: &str, value: &str) -> AppResult<()> {
        let field = DraftField::parse(name).ok_or_else(|| {
            AppError::new(ErrorKind::Validation, format!("Unknown field: {name}"))
        })?;
        self.set_field(field, value);
        Ok(())
    }

    /// Fills latitude/longitude from the device. Bounded by the configured
    /// geolocation timeout; on failure the draft is left untouched.
    #[instrument(skip(self))]
    pub async fn use_current_location(&self) -> AppResult<Coordinate> {
        if self
            .locating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::invalid_state("Already fetching your location."));
        }
        let _guard = FlagGuard {
            flag: &self.locating,
            controller: self,
            clear: |s| s.locating = false,
        };
        self.state.send_modify(|s| {
            s.locating = true;
            s.error = None;
        });

        let result =
            match tokio::time::timeout(self.geolocation_timeout, self.geolocation.current_position())
                .await
            {
                Ok(Ok(reading)) => reading.coordinate(),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(GeolocationError::timed_out(self.geolocation_timeout)),
            };

        if !self.is_active() {
            debug!("form deactivated while locating");
            return Err(AppError::invalid_state("The form is no longer active."));
        }

        match result {
            Ok(coordinate) => {
                debug!(location = %coordinate.display(), "location acquired");
                self.state.send_modify(|s| {
                    s.draft.set_coordinate(coordinate);
                    s.located = Some(coordinate);
                    s.error = None;
                });
                Ok(coordinate)
            }
            Err(e) => {
                warn!(error = %e, "could not get current location");
                let error = AppError::from(e);
                self.state.send_modify(|s| s.error = Some(error.clone()));
                Err(error)
            }
        }
    }

    /// Validates the draft and persists it. Invalid drafts never reach the
    /// network; a failed request leaves the draft as it was.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> AppResult<Report> {
        let (mode, draft) = {
            let state = self.state.borrow();
            match &state.phase {
                FormPhase::Editing => {}
                FormPhase::Loading => {
                    return Err(AppError::invalid_state("The report is still loading."));
                }
                FormPhase::LoadFailed(_) => {
                    return Err(AppError::invalid_state(
                        "The report could not be loaded, so it cannot be saved.",
                    ));
                }
                FormPhase::Submitted(_) => {
                    return Err(AppError::invalid_state("This report was already saved."));
                }
            }
            (state.mode.clone(), state.draft.clone())
        };

        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::invalid_state(
                "A submission is already in progress.",
            ));
        }
        let _guard = FlagGuard {
            flag: &self.submitting,
            controller: self,
            clear: |s| s.submitting = false,
        };

        let submission = match draft.validate() {
            Ok(submission) => submission,
            Err(e) => {
                debug!(fields = ?e.fields.keys().collect::<Vec<_>>(), "draft rejected");
                self.state.send_modify(|s| s.error = Some(e.clone()));
                return Err(e);
            }
        };

        self.state.send_modify(|s| {
            s.submitting = true;
            s.error = None;
        });

        let result = match &mode {
            FormMode::Create => self.api.create_report(&submission).await,
            FormMode::Edit(id) => self.api.update_report(id, submission.into()).await,
        };

        if !self.is_active() {
            debug!("form deactivated while submitting");
            return result;
        }

        match result {
            Ok(report) => {
                info!(report_id = %report.id, edit = matches!(mode, FormMode::Edit(_)), "report saved");
                self.state.send_modify(|s| {
                    s.phase = FormPhase::Submitted(Box::new(report.clone()));
                    s.error = None;
                });
                Ok(report)
            }
            Err(e) => {
                warn!(code = e.code(), "report submission failed");
                self.state.send_modify(|s| s.error = Some(e.clone()));
                Err(e)
            }
        }
    }

    /// The view went away: results of anything still in flight are dropped.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.state.send_if_modified(|s| {
            let busy = s.locating || s.submitting;
            s.locating = false;
            s.submitting = false;
            busy
        });
    }
}

impl std::fmt::Debug for ReportFormController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportFormController")
            .field("state", &*self.state.borrow())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Releases an in-progress flag when the operation ends or its future is
/// dropped.
struct FlagGuard<'a> {
    flag: &'a AtomicBool,
    controller: &'a ReportFormController,
    clear: fn(&mut FormState),
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        if self.controller.is_active() {
            let clear = self.clear;
            self.controller.state.send_modify(clear);
        }
    }
}

fn clear_field_error(error: &mut Option<AppError>, field: DraftField) {
    let Some(e) = error else {
        return;
    };
    if e.kind != ErrorKind::Validation {
        return;
    }
    e.fields.remove(field.as_str());
    if e.fields.is_empty() {
        *error = None;
    }
}
