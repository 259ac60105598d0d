// ═══════════════════════════════════════════════════════════════════
// Service & Integration Tests: ChartService, repositories,
// StatsDashboard facade
// ═══════════════════════════════════════════════════════════════════

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{mpsc, Notify, Semaphore};
use uuid::Uuid;

use productivity_stats_core::errors::CoreError;
use productivity_stats_core::models::chart_config::{
    AggregationFunction, CategoryScope, ChartSort, ChartType, DateInterval, DynamicChartConfig,
    Grouping, SortDirection, SortField, TimeRange,
};
use productivity_stats_core::models::field::DataSource;
use productivity_stats_core::models::record::{Category, Record, Task, XpSource, XpTransaction};
use productivity_stats_core::models::settings::EngineSettings;
use productivity_stats_core::repositories::memory::InMemoryRepository;
use productivity_stats_core::repositories::registry::RepositoryRegistry;
use productivity_stats_core::repositories::traits::RecordRepository;
use productivity_stats_core::services::chart_service::ChartService;
use productivity_stats_core::services::time_range::ResolvedTimeRange;
use productivity_stats_core::StatsDashboard;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn xp(amount: f64, source: XpSource, timestamp: DateTime<Utc>) -> Record {
    XpTransaction::new(amount, source, timestamp).into()
}

fn xp_by_source() -> DynamicChartConfig {
    DynamicChartConfig::new("XP by source", ChartType::BarChart, DataSource::XpTransactions, "source")
        .with_y_axis("amount", AggregationFunction::Sum)
        .grouped_by(Grouping::ByCategory)
}

fn memory_registry(source: DataSource, records: Vec<Record>) -> RepositoryRegistry {
    RepositoryRegistry::new().with(Box::new(InMemoryRepository::with_records(source, records)))
}

// ═══════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════

/// Counts fetches.
struct CountingRepository {
    data_source: DataSource,
    records: Vec<Record>,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordRepository for CountingRepository {
    fn name(&self) -> &str {
        "Counting"
    }

    fn data_source(&self) -> DataSource {
        self.data_source
    }

    async fn fetch(&self, _hint: Option<ResolvedTimeRange>) -> Result<Vec<Record>, CoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

struct FailingRepository;

#[async_trait]
impl RecordRepository for FailingRepository {
    fn name(&self) -> &str {
        "Failing"
    }

    fn data_source(&self) -> DataSource {
        DataSource::Tasks
    }

    async fn fetch(&self, _hint: Option<ResolvedTimeRange>) -> Result<Vec<Record>, CoreError> {
        Err(CoreError::Deserialization("corrupt row".into()))
    }
}

struct SlowRepository;

#[async_trait]
impl RecordRepository for SlowRepository {
    fn name(&self) -> &str {
        "Slow"
    }

    fn data_source(&self) -> DataSource {
        DataSource::XpTransactions
    }

    async fn fetch(&self, _hint: Option<ResolvedTimeRange>) -> Result<Vec<Record>, CoreError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

/// Signals when a fetch starts, then blocks until the test opens the gate.
struct GatedRepository {
    records: Vec<Record>,
    started: Arc<Notify>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl RecordRepository for GatedRepository {
    fn name(&self) -> &str {
        "Gated"
    }

    fn data_source(&self) -> DataSource {
        DataSource::XpTransactions
    }

    async fn fetch(&self, _hint: Option<ResolvedTimeRange>) -> Result<Vec<Record>, CoreError> {
        self.started.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| CoreError::DataSourceUnavailable {
                data_source: DataSource::XpTransactions,
                reason: e.to_string(),
            })?;
        Ok(self.records.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════
// ChartService: acceptance scenarios
// ═══════════════════════════════════════════════════════════════════

mod chart_service {
    use super::*;

    #[tokio::test]
    async fn completed_tasks_per_day_over_last_week() {
        let now = at(2025, 3, 8, 0);
        let created = at(2025, 2, 1, 0);
        let records: Vec<Record> = vec![
            Task::new("a", created).completed_at(at(2025, 3, 2, 9)).into(),
            Task::new("b", created).completed_at(at(2025, 3, 2, 12)).into(),
            Task::new("c", created).completed_at(at(2025, 3, 2, 18)).into(),
            Task::new("d", created).completed_at(at(2025, 3, 5, 7)).into(),
            // Still open: no completion date, dropped by the bounded range
            Task::new("e", created).into(),
            // Completed before the window
            Task::new("f", created).completed_at(at(2025, 2, 20, 0)).into(),
        ];
        let registry = memory_registry(DataSource::Tasks, records);
        let config = DynamicChartConfig::new(
            "Completed tasks",
            ChartType::BarChart,
            DataSource::Tasks,
            "completion_date",
        )
        .grouped_by(Grouping::ByDate {
            interval: DateInterval::Day,
        })
        .over(TimeRange::Last7Days);

        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &config, CategoryScope::All, now)
            .await
            .unwrap();

        assert_eq!(result.len(), 7);
        assert_eq!(result.labels()[0], "2025-03-01");
        assert_eq!(result.labels()[6], "2025-03-07");
        assert_eq!(result.values(), [0.0, 3.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn last_week_off_midnight_keeps_seven_whole_days() {
        let now = at(2025, 3, 8, 12);
        let created = at(2025, 2, 1, 0);
        let records: Vec<Record> = vec![
            // Within 7x24h of now, but its day is not whole in the window
            Task::new("a", created).completed_at(at(2025, 3, 1, 18)).into(),
            Task::new("b", created).completed_at(at(2025, 3, 3, 9)).into(),
            Task::new("c", created).completed_at(at(2025, 3, 3, 10)).into(),
            Task::new("d", created).completed_at(at(2025, 3, 3, 11)).into(),
            Task::new("e", created).completed_at(at(2025, 3, 6, 7)).into(),
            Task::new("f", created).completed_at(at(2025, 3, 8, 9)).into(),
        ];
        let config = DynamicChartConfig::new(
            "Completed tasks",
            ChartType::BarChart,
            DataSource::Tasks,
            "completion_date",
        )
        .grouped_by(Grouping::ByDate {
            interval: DateInterval::Day,
        })
        .over(TimeRange::Last7Days);

        let result = ChartService::new(&EngineSettings::default())
            .compute_from_records(&config, CategoryScope::All, now, &records)
            .unwrap();

        assert_eq!(
            result.labels(),
            [
                "2025-03-02",
                "2025-03-03",
                "2025-03-04",
                "2025-03-05",
                "2025-03-06",
                "2025-03-07",
                "2025-03-08"
            ]
        );
        assert_eq!(result.values(), [0.0, 3.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn empty_source_gives_zero_for_every_day_in_range() {
        let registry = memory_registry(DataSource::Tasks, Vec::new());
        let config = DynamicChartConfig::new(
            "Completed tasks",
            ChartType::BarChart,
            DataSource::Tasks,
            "completion_date",
        )
        .grouped_by(Grouping::ByDate {
            interval: DateInterval::Day,
        })
        .over(TimeRange::Last7Days);

        let result = ChartService::new(&EngineSettings::default())
            .compute(&registry, &config, CategoryScope::All, at(2025, 3, 8, 15))
            .await
            .unwrap();

        assert_eq!(result.len(), 7);
        assert_eq!(result.labels()[0], "2025-03-02");
        assert_eq!(result.labels()[6], "2025-03-08");
        assert_eq!(result.values(), [0.0; 7]);
    }

    #[test]
    fn undated_bucket_trails_date_labels() {
        let created = at(2025, 1, 1, 0);
        let records: Vec<Record> = vec![
            Task::new("open", created).into(),
            Task::new("late", created).completed_at(at(2025, 1, 5, 0)).into(),
            Task::new("early", created).completed_at(at(2025, 1, 2, 0)).into(),
        ];
        let config = DynamicChartConfig::new("Done", ChartType::PieChart, DataSource::Tasks, "completion_date")
            .grouped_by(Grouping::ByDate {
                interval: DateInterval::Day,
            });
        let result = ChartService::new(&EngineSettings::default())
            .compute_from_records(&config, CategoryScope::All, at(2025, 2, 1, 0), &records)
            .unwrap();

        assert_eq!(result.labels(), ["2025-01-02", "2025-01-05", "Unspecified"]);
        assert_eq!(result.values(), [1.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn xp_summed_by_source_in_first_appearance_order() {
        let registry = memory_registry(
            DataSource::XpTransactions,
            vec![
                xp(10.0, XpSource::Task, at(2025, 1, 1, 0)),
                xp(5.0, XpSource::Task, at(2025, 1, 2, 0)),
                xp(20.0, XpSource::Calendar, at(2025, 1, 3, 0)),
            ],
        );
        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &xp_by_source(), CategoryScope::All, at(2025, 2, 1, 0))
            .await
            .unwrap();

        assert_eq!(result.labels(), ["TASK", "CALENDAR"]);
        assert_eq!(result.values(), [15.0, 20.0]);
    }

    #[tokio::test]
    async fn invalid_config_never_fetches() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let registry = RepositoryRegistry::new().with(Box::new(CountingRepository {
            data_source: DataSource::Tasks,
            records: vec![Task::new("a", at(2025, 1, 1, 0)).into()],
            fetches: Arc::clone(&fetches),
        }));
        let config = DynamicChartConfig::new("Bad", ChartType::Table, DataSource::Tasks, "priority")
            .with_y_axis("title", AggregationFunction::Average);

        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &config, CategoryScope::All, at(2025, 1, 2, 0))
            .await;

        assert!(matches!(result, Err(CoreError::ConfigValidation(_))));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_config_fetches_once() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let registry = RepositoryRegistry::new().with(Box::new(CountingRepository {
            data_source: DataSource::Tasks,
            records: vec![Task::new("a", at(2025, 1, 1, 0)).into()],
            fetches: Arc::clone(&fetches),
        }));
        let config = DynamicChartConfig::new("By priority", ChartType::PieChart, DataSource::Tasks, "priority")
            .grouped_by(Grouping::ByCategory);

        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &config, CategoryScope::All, at(2025, 1, 2, 0))
            .await
            .unwrap();

        assert_eq!(result.labels(), ["MEDIUM"]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_field_is_reported() {
        let registry = memory_registry(DataSource::Tasks, Vec::new());
        let config = DynamicChartConfig::new("x", ChartType::BarChart, DataSource::Tasks, "mood");
        let service = ChartService::new(&EngineSettings::default());
        let err = service
            .compute(&registry, &config, CategoryScope::All, at(2025, 1, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingField { .. }));
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn scatter_with_text_axis_is_rejected() {
        let registry = memory_registry(DataSource::Tasks, Vec::new());
        let config = DynamicChartConfig::new("x", ChartType::ScatterPlot, DataSource::Tasks, "title")
            .with_y_axis("xp_reward", AggregationFunction::Sum);
        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &config, CategoryScope::All, at(2025, 1, 1, 0))
            .await;
        assert!(matches!(result, Err(CoreError::ConfigValidation(_))));
    }

    #[tokio::test]
    async fn empty_dataset_gives_empty_result() {
        let registry = memory_registry(DataSource::XpTransactions, Vec::new());
        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &xp_by_source(), CategoryScope::All, at(2025, 1, 1, 0))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.labels().is_empty());
        assert!(result.values().is_empty());
    }

    #[tokio::test]
    async fn records_of_other_sources_are_ignored() {
        let registry = memory_registry(
            DataSource::XpTransactions,
            vec![
                xp(10.0, XpSource::Task, at(2025, 1, 1, 0)),
                Task::new("stray", at(2025, 1, 1, 0)).into(),
            ],
        );
        let service = ChartService::new(&EngineSettings::default());
        let result = service
            .compute(&registry, &xp_by_source(), CategoryScope::All, at(2025, 2, 1, 0))
            .await
            .unwrap();
        assert_eq!(result.labels(), ["TASK"]);
        assert_eq!(result.values(), [10.0]);
    }

    #[test]
    fn category_scope_filters_records() {
        let work = Uuid::new_v4();
        let mut in_work = XpTransaction::new(10.0, XpSource::Task, at(2025, 1, 1, 0));
        in_work.category_id = Some(work);
        let records = vec![
            in_work.into(),
            xp(7.0, XpSource::Task, at(2025, 1, 2, 0)),
            xp(3.0, XpSource::Bonus, at(2025, 1, 3, 0)),
        ];
        let service = ChartService::new(&EngineSettings::default());
        let now = at(2025, 2, 1, 0);

        let all = service
            .compute_from_records(&xp_by_source(), CategoryScope::All, now, &records)
            .unwrap();
        assert_eq!(all.values(), [17.0, 3.0]);

        let scoped = service
            .compute_from_records(&xp_by_source(), CategoryScope::Only(work), now, &records)
            .unwrap();
        assert_eq!(scoped.labels(), ["TASK"]);
        assert_eq!(scoped.values(), [10.0]);
    }

    #[test]
    fn category_records_are_scoped_by_their_own_id() {
        let created = at(2025, 1, 1, 0);
        let health = Category::new("Health", created);
        let health_id = health.id;
        let records: Vec<Record> = vec![health.into(), Category::new("Work", created).into()];
        let config = DynamicChartConfig::new("Categories", ChartType::Table, DataSource::Categories, "name")
            .grouped_by(Grouping::ByCategory);

        let result = ChartService::new(&EngineSettings::default())
            .compute_from_records(&config, CategoryScope::Only(health_id), at(2025, 2, 1, 0), &records)
            .unwrap();
        assert_eq!(result.labels(), ["Health"]);
    }

    #[test]
    fn sorting_by_value_and_label() {
        let records = vec![
            xp(5.0, XpSource::Task, at(2025, 1, 1, 0)),
            xp(20.0, XpSource::Calendar, at(2025, 1, 2, 0)),
            xp(1.0, XpSource::Bonus, at(2025, 1, 3, 0)),
        ];
        let service = ChartService::new(&EngineSettings::default());
        let now = at(2025, 2, 1, 0);

        let by_value = xp_by_source().sorted_by(ChartSort::new(SortField::Value, SortDirection::Descending));
        let result = service
            .compute_from_records(&by_value, CategoryScope::All, now, &records)
            .unwrap();
        assert_eq!(result.labels(), ["CALENDAR", "TASK", "BONUS"]);
        assert_eq!(result.values(), [20.0, 5.0, 1.0]);

        let by_label = xp_by_source().sorted_by(ChartSort::new(SortField::Label, SortDirection::Ascending));
        let result = service
            .compute_from_records(&by_label, CategoryScope::All, now, &records)
            .unwrap();
        assert_eq!(result.labels(), ["BONUS", "CALENDAR", "TASK"]);

        let reversed = xp_by_source().sorted_by(ChartSort::new(SortField::Natural, SortDirection::Descending));
        let result = service
            .compute_from_records(&reversed, CategoryScope::All, now, &records)
            .unwrap();
        assert_eq!(result.labels(), ["BONUS", "CALENDAR", "TASK"]);
    }

    #[test]
    fn date_labels_are_chronological_regardless_of_input_order() {
        let records = vec![
            xp(1.0, XpSource::Task, at(2025, 3, 1, 0)),
            xp(2.0, XpSource::Task, at(2025, 1, 1, 0)),
            xp(3.0, XpSource::Task, at(2025, 2, 1, 0)),
        ];
        let config = DynamicChartConfig::new("Monthly", ChartType::PieChart, DataSource::XpTransactions, "timestamp")
            .with_y_axis("amount", AggregationFunction::Sum)
            .grouped_by(Grouping::ByDate {
                interval: DateInterval::Month,
            });
        let result = ChartService::new(&EngineSettings::default())
            .compute_from_records(&config, CategoryScope::All, at(2025, 4, 1, 0), &records)
            .unwrap();
        assert_eq!(result.labels(), ["2025-01", "2025-02", "2025-03"]);
        assert_eq!(result.values(), [2.0, 3.0, 1.0]);
    }

    #[test]
    fn first_and_last_follow_time_order() {
        let records = vec![
            xp(3.0, XpSource::Task, at(2025, 1, 3, 0)),
            xp(1.0, XpSource::Task, at(2025, 1, 1, 0)),
            xp(2.0, XpSource::Task, at(2025, 1, 2, 0)),
        ];
        let service = ChartService::new(&EngineSettings::default());
        let now = at(2025, 2, 1, 0);
        let first = xp_by_source().with_aggregation(AggregationFunction::First);
        let last = xp_by_source().with_aggregation(AggregationFunction::Last);
        assert_eq!(
            service.compute_from_records(&first, CategoryScope::All, now, &records).unwrap().values(),
            [1.0]
        );
        assert_eq!(
            service.compute_from_records(&last, CategoryScope::All, now, &records).unwrap().values(),
            [3.0]
        );
    }

    #[test]
    fn bounded_range_filters_on_timestamp_field() {
        let records = vec![
            xp(10.0, XpSource::Task, at(2025, 1, 1, 0)),
            xp(5.0, XpSource::Task, at(2025, 3, 5, 0)),
        ];
        let config = xp_by_source().over(TimeRange::Last30Days);
        let result = ChartService::new(&EngineSettings::default())
            .compute_from_records(&config, CategoryScope::All, at(2025, 3, 10, 0), &records)
            .unwrap();
        assert_eq!(result.values(), [5.0]);
    }

    #[test]
    fn same_inputs_give_identical_results() {
        let records: Vec<Record> = (0..50)
            .map(|i| xp(f64::from(i) * 0.1, XpSource::Task, at(2025, 1, 1 + (i % 28) as u32, 0)))
            .collect();
        let config = DynamicChartConfig::new("Avg", ChartType::LineChart, DataSource::XpTransactions, "timestamp")
            .with_y_axis("amount", AggregationFunction::Average)
            .grouped_by(Grouping::ByDate {
                interval: DateInterval::Week,
            });
        let service = ChartService::new(&EngineSettings::default());
        let now = at(2025, 2, 1, 0);
        let a = service.compute_from_records(&config, CategoryScope::All, now, &records).unwrap();
        let b = service.compute_from_records(&config, CategoryScope::All, now, &records).unwrap();
        assert_eq!(a.labels(), b.labels());
        let bits = |r: &productivity_stats_core::models::chart::ChartDataResult| {
            r.values().iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        };
        assert_eq!(bits(&a), bits(&b));
    }
}

// ═══════════════════════════════════════════════════════════════════
// ChartService: repository failures
// ═══════════════════════════════════════════════════════════════════

mod repository_failures {
    use super::*;

    #[tokio::test]
    async fn missing_repository_is_unavailable() {
        let service = ChartService::new(&EngineSettings::default());
        let err = service
            .compute(&RepositoryRegistry::new(), &xp_by_source(), CategoryScope::All, at(2025, 1, 1, 0))
            .await
            .unwrap_err();
        match err {
            CoreError::DataSourceUnavailable { data_source, .. } => {
                assert_eq!(data_source, DataSource::XpTransactions);
            }
            other => panic!("Expected DataSourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_repository_is_unavailable() {
        init_tracing();
        let registry = RepositoryRegistry::new().with(Box::new(FailingRepository));
        let config = DynamicChartConfig::new("x", ChartType::PieChart, DataSource::Tasks, "status")
            .grouped_by(Grouping::ByCategory);
        let err = ChartService::new(&EngineSettings::default())
            .compute(&registry, &config, CategoryScope::All, at(2025, 1, 1, 0))
            .await
            .unwrap_err();
        match err {
            CoreError::DataSourceUnavailable { reason, .. } => assert!(reason.contains("corrupt row")),
            other => panic!("Expected DataSourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_repository_times_out() {
        init_tracing();
        let settings = EngineSettings {
            fetch_timeout_ms: 100,
            ..EngineSettings::default()
        };
        let registry = RepositoryRegistry::new().with(Box::new(SlowRepository));
        let err = ChartService::new(&settings)
            .compute(&registry, &xp_by_source(), CategoryScope::All, at(2025, 1, 1, 0))
            .await
            .unwrap_err();
        match err {
            CoreError::DataSourceUnavailable { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("Expected DataSourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_registered_repository_wins() {
        let registry = RepositoryRegistry::new()
            .with(Box::new(InMemoryRepository::with_records(
                DataSource::XpTransactions,
                vec![xp(1.0, XpSource::Task, at(2025, 1, 1, 0))],
            )))
            .with(Box::new(SlowRepository));
        let repository = registry.get_repository_for(DataSource::XpTransactions).unwrap();
        assert_eq!(repository.name(), "InMemory");
        assert!(registry.get_repository_for(DataSource::Tasks).is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// StatsDashboard facade
// ═══════════════════════════════════════════════════════════════════

mod dashboard {
    use super::*;

    fn dashboard_with(records: Vec<Record>) -> StatsDashboard {
        StatsDashboard::new(
            memory_registry(DataSource::XpTransactions, records),
            EngineSettings::default(),
        )
    }

    #[tokio::test]
    async fn add_get_update_remove() {
        let dashboard = dashboard_with(Vec::new());
        let id = dashboard.add_chart(xp_by_source());
        assert_eq!(dashboard.chart_count(), 1);
        assert_eq!(dashboard.chart_ids(), vec![id]);
        assert_eq!(dashboard.get_chart(id).unwrap().title, "XP by source");

        let renamed = DynamicChartConfig {
            title: "Renamed".into(),
            ..xp_by_source()
        };
        dashboard.update_chart(id, renamed).unwrap();
        assert_eq!(dashboard.get_chart(id).unwrap().title, "Renamed");

        let removed = dashboard.remove_chart(id).unwrap();
        assert_eq!(removed.title, "Renamed");
        assert_eq!(dashboard.chart_count(), 0);
        assert!(dashboard.get_chart(id).is_none());
    }

    #[tokio::test]
    async fn unknown_chart_is_reported() {
        let dashboard = dashboard_with(Vec::new());
        let id = Uuid::new_v4();
        assert!(matches!(
            dashboard.update_chart(id, xp_by_source()),
            Err(CoreError::ChartNotFound(_))
        ));
        assert!(matches!(dashboard.remove_chart(id), Err(CoreError::ChartNotFound(_))));
        assert!(matches!(
            dashboard.compute_chart(id, CategoryScope::All).await,
            Err(CoreError::ChartNotFound(_))
        ));
    }

    #[tokio::test]
    async fn compute_chart_returns_result() {
        let dashboard = dashboard_with(vec![
            xp(10.0, XpSource::Task, at(2025, 1, 1, 0)),
            xp(5.0, XpSource::Streak, at(2025, 1, 2, 0)),
        ]);
        let id = dashboard.add_chart(xp_by_source());
        let result = dashboard
            .compute_chart(id, CategoryScope::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.labels(), ["TASK", "STREAK"]);
        assert_eq!(result.values(), [10.0, 5.0]);
    }

    #[tokio::test]
    async fn invalid_chart_is_stored_but_fails_to_compute() {
        let dashboard = dashboard_with(Vec::new());
        let bad = DynamicChartConfig::new("Bad", ChartType::ScatterPlot, DataSource::XpTransactions, "source");
        assert!(dashboard.validate_chart(&bad).is_err());
        let id = dashboard.add_chart(bad);
        let err = dashboard.compute_chart(id, CategoryScope::All).await.unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn charts_for_source_filters() {
        let dashboard = dashboard_with(Vec::new());
        let xp_chart = dashboard.add_chart(xp_by_source());
        dashboard.add_chart(DynamicChartConfig::new("Tasks", ChartType::PieChart, DataSource::Tasks, "status"));
        assert_eq!(dashboard.charts_for_source(DataSource::XpTransactions), vec![xp_chart]);
        assert!(dashboard.charts_for_source(DataSource::CalendarEvents).is_empty());
    }

    #[test]
    fn available_fields_lists_catalog() {
        let fields = StatsDashboard::available_fields(DataSource::CalendarEvents);
        assert!(fields.iter().any(|f| f.id == "duration_minutes"));
    }

    fn gated_dashboard() -> (Arc<StatsDashboard>, Uuid, Arc<Notify>, Arc<Semaphore>) {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Semaphore::new(0));
        let registry = RepositoryRegistry::new().with(Box::new(GatedRepository {
            records: vec![xp(10.0, XpSource::Task, at(2025, 1, 1, 0))],
            started: Arc::clone(&started),
            gate: Arc::clone(&gate),
        }));
        let dashboard = Arc::new(StatsDashboard::new(registry, EngineSettings::default()));
        let id = dashboard.add_chart(xp_by_source());
        (dashboard, id, started, gate)
    }

    #[tokio::test]
    async fn edit_during_fetch_discards_result() {
        init_tracing();
        let (dashboard, id, started, gate) = gated_dashboard();
        let running = tokio::spawn({
            let dashboard = Arc::clone(&dashboard);
            async move { dashboard.compute_chart(id, CategoryScope::All).await }
        });

        started.notified().await;
        dashboard.update_chart(id, xp_by_source().with_aggregation(AggregationFunction::Max)).unwrap();
        gate.add_permits(1);

        let outcome = running.await.unwrap().unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn delete_during_fetch_discards_result() {
        let (dashboard, id, started, gate) = gated_dashboard();
        let running = tokio::spawn({
            let dashboard = Arc::clone(&dashboard);
            async move { dashboard.compute_chart(id, CategoryScope::All).await }
        });

        started.notified().await;
        dashboard.remove_chart(id).unwrap();
        gate.add_permits(1);

        let outcome = running.await.unwrap().unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn undisturbed_fetch_applies_result() {
        let (dashboard, id, _started, gate) = gated_dashboard();
        gate.add_permits(1);
        let outcome = dashboard.compute_chart(id, CategoryScope::All).await.unwrap();
        assert_eq!(outcome.unwrap().values(), [10.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_requests_only_compute_the_last() {
        let dashboard = dashboard_with(vec![xp(10.0, XpSource::Task, at(2025, 1, 1, 0))]);
        let id = dashboard.add_chart(xp_by_source());

        let (first, second) = tokio::join!(
            dashboard.request_recompute(id, CategoryScope::All),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                dashboard.request_recompute(id, CategoryScope::All).await
            }
        );

        assert!(first.unwrap().is_none());
        assert_eq!(second.unwrap().unwrap().values(), [10.0]);
    }

    #[tokio::test]
    async fn refresh_source_recomputes_matching_charts() {
        let dashboard = dashboard_with(vec![xp(10.0, XpSource::Task, at(2025, 1, 1, 0))]);
        let xp_chart = dashboard.add_chart(xp_by_source());
        dashboard.add_chart(DynamicChartConfig::new("Tasks", ChartType::PieChart, DataSource::Tasks, "status"));

        let updates = dashboard
            .refresh_source(DataSource::XpTransactions, CategoryScope::All)
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].chart_id, xp_chart);
        assert_eq!(updates[0].result.as_ref().unwrap().values(), [10.0]);
    }

    #[tokio::test]
    async fn change_notification_triggers_recompute() {
        init_tracing();
        let repository = Arc::new(InMemoryRepository::new(DataSource::XpTransactions));
        let registry = RepositoryRegistry::new().with(Box::new(Arc::clone(&repository)));
        let settings = EngineSettings {
            debounce_ms: 10,
            ..EngineSettings::default()
        };
        let dashboard = Arc::new(StatsDashboard::new(registry, settings));
        let id = dashboard.add_chart(xp_by_source());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles = dashboard.spawn_change_listener(CategoryScope::All, tx);
        assert_eq!(handles.len(), 1);

        repository.push(XpTransaction::new(42.0, XpSource::Bonus, at(2025, 1, 1, 0)));

        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no update within timeout")
            .expect("listener closed");
        assert_eq!(update.chart_id, id);
        let result = update.result.unwrap();
        assert_eq!(result.labels(), ["BONUS"]);
        assert_eq!(result.values(), [42.0]);
    }
}
