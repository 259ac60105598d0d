use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::chart::ChartDataResult;
use crate::models::chart_config::{
    CategoryScope, ChartSort, DynamicChartConfig, Grouping, SortDirection, SortField, TimeRange,
};
use crate::models::field::DataType;
use crate::models::record::Record;
use crate::models::settings::EngineSettings;
use crate::repositories::registry::RepositoryRegistry;
use crate::services::aggregation_service::AggregationService;
use crate::services::compatibility::CompatibilityMatrix;
use crate::services::field_catalog::{FieldAccessor, FieldCatalog};
use crate::services::grouping_service::{
    align_to_buckets, BucketDensity, GroupingPlan, GroupingService,
};
use crate::services::time_range::{ResolvedTimeRange, TimeRangeResolver};

/// A configuration that passed validation, with its fields resolved.
#[derive(Debug, Clone, Copy)]
pub struct PreparedChart {
    pub x_axis: FieldAccessor,
    pub y_axis: Option<FieldAccessor>,
    /// Field the time range filters on
    pub time_key: FieldAccessor,
    pub range: ResolvedTimeRange,
}

/// Turns a chart configuration into a renderable dataset.
///
/// The core computes all the numbers, the frontend only renders.
/// Each computation:
/// 1. Resolves the X/Y fields in the field catalog
/// 2. Validates the combination against the compatibility matrix
/// 3. Fetches records from the owning repository (bounded by a timeout)
/// 4. Applies the category scope
/// 5. Keeps records inside the resolved time range
/// 6. Groups, then aggregates each bucket
/// 7. Sorts the buckets
///
/// Steps 1-2 run before any fetch, so a broken config never touches a
/// repository.
pub struct ChartService {
    settings: EngineSettings,
    grouping_service: GroupingService,
    aggregation_service: AggregationService,
}

impl ChartService {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            settings: settings.clone(),
            grouping_service: GroupingService::new(settings),
            aggregation_service: AggregationService::new(),
        }
    }

    /// Resolve and validate a configuration without fetching anything.
    pub fn prepare(
        &self,
        config: &DynamicChartConfig,
        now: DateTime<Utc>,
    ) -> Result<PreparedChart, CoreError> {
        let catalog = FieldCatalog::global();
        let source = config.data_source;

        let x_axis = catalog.accessor(source, &config.x_axis_field)?;
        let y_axis = config
            .y_axis_field
            .as_deref()
            .map(|id| catalog.accessor(source, id))
            .transpose()?;

        CompatibilityMatrix::validate(config, x_axis.field(), y_axis.as_ref().map(|a| a.field()))?;

        let mut range = TimeRangeResolver::resolve(&config.time_range, now)?;
        if let Grouping::ByDate { interval } = config.grouping {
            // Custom bounds are taken verbatim; relative ones end on whole buckets
            if !range.is_unbounded() && !matches!(config.time_range, TimeRange::Custom { .. }) {
                range = align_to_buckets(range, interval);
            }
            if CompatibilityMatrix::date_bucket_density(config.chart_type) == BucketDensity::Dense {
                self.grouping_service.check_dense_range(interval, &range)?;
            }
        }

        let time_key = if x_axis.field().data_type == DataType::Date {
            x_axis
        } else {
            catalog.accessor(source, FieldCatalog::timestamp_field(source))?
        };

        Ok(PreparedChart {
            x_axis,
            y_axis,
            time_key,
            range,
        })
    }

    /// Compute a chart, fetching its records from `registry`.
    ///
    /// `now` is captured once by the caller and used for every relative
    /// time computation in this run.
    pub async fn compute(
        &self,
        registry: &RepositoryRegistry,
        config: &DynamicChartConfig,
        scope: CategoryScope,
        now: DateTime<Utc>,
    ) -> Result<ChartDataResult, CoreError> {
        let prepared = self.prepare(config, now)?;
        let records = self.fetch_records(registry, config, &prepared).await?;
        self.build(config, &prepared, scope, &records)
    }

    /// Compute a chart from an already fetched snapshot.
    ///
    /// Pure and synchronous: the same inputs always give the same result.
    pub fn compute_from_records(
        &self,
        config: &DynamicChartConfig,
        scope: CategoryScope,
        now: DateTime<Utc>,
        records: &[Record],
    ) -> Result<ChartDataResult, CoreError> {
        let prepared = self.prepare(config, now)?;
        self.build(config, &prepared, scope, records)
    }

    async fn fetch_records(
        &self,
        registry: &RepositoryRegistry,
        config: &DynamicChartConfig,
        prepared: &PreparedChart,
    ) -> Result<Vec<Record>, CoreError> {
        let source = config.data_source;
        let repository = registry.get_repository_for(source).ok_or_else(|| {
            CoreError::DataSourceUnavailable {
                data_source: source,
                reason: "no repository registered".to_string(),
            }
        })?;

        let hint = (!prepared.range.is_unbounded()).then_some(prepared.range);
        let timeout = self.settings.fetch_timeout();

        match tokio::time::timeout(timeout, repository.fetch(hint)).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(e)) => {
                warn!(repository = repository.name(), %source, error = %e, "record fetch failed");
                Err(match e {
                    CoreError::DataSourceUnavailable { .. } => e,
                    other => CoreError::DataSourceUnavailable {
                        data_source: source,
                        reason: other.to_string(),
                    },
                })
            }
            Err(_) => {
                warn!(repository = repository.name(), %source, ?timeout, "record fetch timed out");
                Err(CoreError::DataSourceUnavailable {
                    data_source: source,
                    reason: format!("timed out after {} ms", timeout.as_millis()),
                })
            }
        }
    }

    /// Steps 4-8 over a fetched snapshot.
    fn build(
        &self,
        config: &DynamicChartConfig,
        prepared: &PreparedChart,
        scope: CategoryScope,
        records: &[Record],
    ) -> Result<ChartDataResult, CoreError> {
        let range = prepared.range;

        // Scope first, then time. Records of another source never match.
        let mut visible: Vec<(Option<DateTime<Utc>>, &Record)> = records
            .iter()
            .filter(|r| r.data_source() == config.data_source)
            .filter(|r| scope.admits(r.category_id()))
            .map(|r| (prepared.time_key.extract(r).and_then(|v| v.as_date()), r))
            .filter(|(at, _)| range.is_unbounded() || at.is_some_and(|t| range.contains(t)))
            .collect();

        // Natural bucket order is chronological; undated records go last.
        visible.sort_by_key(|(at, _)| (at.is_none(), *at));
        let ordered: Vec<&Record> = visible.into_iter().map(|(_, r)| r).collect();

        let plan = GroupingPlan {
            grouping: config.grouping,
            density: CompatibilityMatrix::date_bucket_density(config.chart_type),
            category_order: CompatibilityMatrix::category_order(config.chart_type),
            range,
            title: &config.title,
        };
        let buckets = self
            .grouping_service
            .group(&ordered, &prepared.x_axis, &plan)?;

        let mut points: Vec<(String, f64)> = buckets
            .into_iter()
            .map(|bucket| {
                let value = self.aggregation_service.aggregate(
                    &bucket.records,
                    prepared.y_axis.as_ref(),
                    config.y_axis_aggregation,
                );
                (bucket.label, value)
            })
            .collect();

        sort_points(&mut points, config.sort);

        debug!(
            source = %config.data_source,
            chart_type = %config.chart_type,
            records = ordered.len(),
            buckets = points.len(),
            "chart computed"
        );
        Ok(ChartDataResult::from_points(points))
    }
}

/// Stable sort, so equal keys keep their natural order.
fn sort_points(points: &mut [(String, f64)], sort: ChartSort) {
    let descending = sort.direction == SortDirection::Descending;
    match sort.field {
        SortField::Natural => {
            if descending {
                points.reverse();
            }
        }
        SortField::Label => points.sort_by(|a, b| {
            let ord = a.0.cmp(&b.0);
            if descending { ord.reverse() } else { ord }
        }),
        SortField::Value => points.sort_by(|a, b| {
            let ord = a.1.total_cmp(&b.1);
            if descending { ord.reverse() } else { ord }
        }),
    }
}
