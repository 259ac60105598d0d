pub mod errors;
pub mod models;
pub mod repositories;
pub mod services;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use errors::CoreError;
use models::{
    chart::{ChartDataResult, ChartUpdate},
    chart_config::{CategoryScope, DynamicChartConfig},
    field::{DataField, DataSource},
    settings::EngineSettings,
};
use repositories::registry::RepositoryRegistry;
use services::{
    chart_service::ChartService,
    field_catalog::FieldCatalog,
    recompute_service::{ComputeTicket, RecomputeTracker},
};

/// Main entry point for the statistics engine.
/// Holds the chart definitions of a dashboard and everything needed to
/// compute them.
///
/// Safe to share behind an `Arc`: charts compute independently and every
/// computation works on its own fetched snapshot.
#[must_use]
pub struct StatsDashboard {
    charts: RwLock<BTreeMap<Uuid, DynamicChartConfig>>,
    registry: RepositoryRegistry,
    chart_service: ChartService,
    tracker: RecomputeTracker,
    settings: EngineSettings,
}

impl std::fmt::Debug for StatsDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsDashboard")
            .field("charts", &self.charts.read().len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl StatsDashboard {
    /// Create an empty dashboard over the given repositories.
    pub fn new(registry: RepositoryRegistry, settings: EngineSettings) -> Self {
        Self {
            charts: RwLock::new(BTreeMap::new()),
            chart_service: ChartService::new(&settings),
            tracker: RecomputeTracker::new(settings.debounce()),
            registry,
            settings,
        }
    }

    /// Get current settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ── Field Catalog ───────────────────────────────────────────────

    /// Fields the chart builder may offer for a data source.
    #[must_use]
    pub fn available_fields(data_source: DataSource) -> Vec<DataField> {
        FieldCatalog::global().fields_for(data_source)
    }

    /// Check a configuration without storing or computing it.
    pub fn validate_chart(&self, config: &DynamicChartConfig) -> Result<(), CoreError> {
        self.chart_service.prepare(config, Utc::now()).map(|_| ())
    }

    // ── Chart Management ────────────────────────────────────────────

    /// Add a chart and return its id. Invalid configs are accepted here
    /// and reported when the chart is computed.
    pub fn add_chart(&self, config: DynamicChartConfig) -> Uuid {
        let id = Uuid::new_v4();
        self.charts.write().insert(id, config);
        id
    }

    /// Replace a chart's config. Any computation still running for the
    /// old config will be discarded.
    pub fn update_chart(&self, chart_id: Uuid, config: DynamicChartConfig) -> Result<(), CoreError> {
        let mut charts = self.charts.write();
        let slot = charts
            .get_mut(&chart_id)
            .ok_or(CoreError::ChartNotFound(chart_id))?;
        *slot = config;
        self.tracker.invalidate(chart_id);
        Ok(())
    }

    /// Remove a chart. Any computation still running for it will be discarded.
    pub fn remove_chart(&self, chart_id: Uuid) -> Result<DynamicChartConfig, CoreError> {
        let removed = self
            .charts
            .write()
            .remove(&chart_id)
            .ok_or(CoreError::ChartNotFound(chart_id))?;
        self.tracker.forget(chart_id);
        Ok(removed)
    }

    /// Get a copy of a chart's config.
    #[must_use]
    pub fn get_chart(&self, chart_id: Uuid) -> Option<DynamicChartConfig> {
        self.charts.read().get(&chart_id).cloned()
    }

    /// All chart ids, in a stable order.
    #[must_use]
    pub fn chart_ids(&self) -> Vec<Uuid> {
        self.charts.read().keys().copied().collect()
    }

    /// Ids of the charts computed from `data_source`.
    #[must_use]
    pub fn charts_for_source(&self, data_source: DataSource) -> Vec<Uuid> {
        self.charts
            .read()
            .iter()
            .filter(|(_, config)| config.data_source == data_source)
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn chart_count(&self) -> usize {
        self.charts.read().len()
    }

    // ── Computation ─────────────────────────────────────────────────

    /// Compute one chart now.
    ///
    /// `Ok(None)` means a newer request, an edit or a deletion superseded
    /// this computation and its result was discarded.
    pub async fn compute_chart(
        &self,
        chart_id: Uuid,
        scope: CategoryScope,
    ) -> Result<Option<ChartDataResult>, CoreError> {
        self.compute_chart_at(chart_id, scope, Utc::now()).await
    }

    /// Compute one chart against an explicit `now`.
    pub async fn compute_chart_at(
        &self,
        chart_id: Uuid,
        scope: CategoryScope,
        now: DateTime<Utc>,
    ) -> Result<Option<ChartDataResult>, CoreError> {
        let ticket = {
            let charts = self.charts.read();
            if !charts.contains_key(&chart_id) {
                return Err(CoreError::ChartNotFound(chart_id));
            }
            self.tracker.begin(chart_id)
        };
        self.run(ticket, scope, now).await
    }

    /// Debounced variant of [`compute_chart`](Self::compute_chart) for
    /// rapid successive edits: only the last request of a burst computes,
    /// earlier ones return `Ok(None)`.
    pub async fn request_recompute(
        &self,
        chart_id: Uuid,
        scope: CategoryScope,
    ) -> Result<Option<ChartDataResult>, CoreError> {
        if !self.charts.read().contains_key(&chart_id) {
            return Err(CoreError::ChartNotFound(chart_id));
        }
        match self.tracker.debounced(chart_id).await {
            Some(ticket) => self.run(ticket, scope, Utc::now()).await,
            None => Ok(None),
        }
    }

    /// Recompute every chart fed by `data_source`, in chart id order.
    /// Superseded computations are left out.
    pub async fn refresh_source(
        &self,
        data_source: DataSource,
        scope: CategoryScope,
    ) -> Vec<ChartUpdate> {
        let now = Utc::now();
        let mut updates = Vec::new();
        for chart_id in self.charts_for_source(data_source) {
            let ticket = self.tracker.begin(chart_id);
            match self.run(ticket, scope, now).await {
                Ok(None) => {}
                Ok(Some(result)) => updates.push(ChartUpdate {
                    chart_id,
                    result: Ok(result),
                }),
                Err(e) => updates.push(ChartUpdate {
                    chart_id,
                    result: Err(e),
                }),
            }
        }
        updates
    }

    /// Listen for repository change notifications and recompute affected
    /// charts, forwarding results to `updates`.
    ///
    /// Bursts of changes are coalesced over the debounce period. Each
    /// listener stops when its repository's channel closes or `updates`
    /// is dropped.
    pub fn spawn_change_listener(
        self: &Arc<Self>,
        scope: CategoryScope,
        updates: mpsc::UnboundedSender<ChartUpdate>,
    ) -> Vec<JoinHandle<()>> {
        self.registry
            .subscribe_all()
            .into_iter()
            .map(|receiver| {
                let dashboard = Arc::clone(self);
                let updates = updates.clone();
                tokio::spawn(async move {
                    dashboard.listen(receiver, scope, updates).await;
                })
            })
            .collect()
    }

    async fn listen(
        &self,
        mut receiver: broadcast::Receiver<repositories::traits::DataChanged>,
        scope: CategoryScope,
        updates: mpsc::UnboundedSender<ChartUpdate>,
    ) {
        loop {
            let data_source = match receiver.recv().await {
                Ok(changed) => changed.data_source,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "change notifications lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            tokio::time::sleep(self.settings.debounce()).await;
            while receiver.try_recv().is_ok() {}

            debug!(%data_source, "records changed, recomputing charts");
            for update in self.refresh_source(data_source, scope).await {
                if updates.send(update).is_err() {
                    return;
                }
            }
        }
    }

    async fn run(
        &self,
        ticket: ComputeTicket,
        scope: CategoryScope,
        now: DateTime<Utc>,
    ) -> Result<Option<ChartDataResult>, CoreError> {
        let Some(config) = self.get_chart(ticket.chart_id) else {
            // Removed after the ticket was taken
            self.tracker.forget(ticket.chart_id);
            return Ok(None);
        };
        let result = self
            .chart_service
            .compute(&self.registry, &config, scope, now)
            .await;
        match self.tracker.accept(&ticket, result) {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }
}
