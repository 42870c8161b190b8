//! Stats aggregator.
//!
//! Counts are supplementary: they start at zero and a failed fetch never
//! surfaces as an error, it only leaves the last good numbers in place.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::ApiClient;
use crate::model::{AggregateStats, UserId};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    User(UserId),
    /// Whoever is signed in when the fetch starts.
    CurrentUser,
    /// System-wide counts. Admin only.
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub stats: AggregateStats,
    /// At least one fetch has succeeded.
    pub loaded: bool,
    pub refreshing: bool,
}

pub struct StatsAggregator {
    api: Arc<ApiClient>,
    scope: StatsScope,
    state: watch::Sender<StatsView>,
    latest: AtomicU64,
    active: AtomicBool,
}

impl StatsAggregator {
    pub fn new(api: Arc<ApiClient>, scope: StatsScope) -> Self {
        let (state, _) = watch::channel(StatsView::default());
        Self {
            api,
            scope,
            state,
            latest: AtomicU64::new(0),
            active: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &StatsScope {
        &self.scope
    }

    #[must_use]
    pub fn state(&self) -> StatsView {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn stats(&self) -> AggregateStats {
        self.state.borrow().stats.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatsView> {
        self.state.subscribe()
    }

    /// Fetches fresh counts and returns whatever is now displayed.
    #[instrument(skip(self), fields(scope = ?self.scope))]
    pub async fn refresh(&self) -> AggregateStats {
        let seq = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.publish(|view| view.refreshing = true);

        let result = self.fetch().await;

        if !self.active.load(Ordering::Acquire) || self.latest.load(Ordering::Acquire) != seq {
            debug!(seq, "discarding stale stats response");
            return self.stats();
        }

        match result {
            Ok(stats) => {
                debug!(total = stats.total, "stats refreshed");
                self.state.send_replace(StatsView {
                    stats,
                    loaded: true,
                    refreshing: false,
                });
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "stats unavailable, keeping previous counts");
                self.publish(|view| view.refreshing = false);
            }
        }
        self.stats()
    }

    async fn fetch(&self) -> AppResult<AggregateStats> {
        match &self.scope {
            StatsScope::User(id) => self.api.get_user_stats(id).await,
            StatsScope::CurrentUser => {
                let id = self
                    .api
                    .session()
                    .current_user_id()
                    .ok_or_else(|| AppError::invalid_state("Not signed in."))?;
                self.api.get_user_stats(&id).await
            }
            StatsScope::System => self.api.get_admin_stats().await,
        }
    }

    fn publish(&self, change: impl FnOnce(&mut StatsView)) {
        if self.active.load(Ordering::Acquire) {
            self.state.send_modify(change);
        }
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("scope", &self.scope)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
