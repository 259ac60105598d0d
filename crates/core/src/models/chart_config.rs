use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

use super::field::DataSource;

/// Kind of chart the user wants drawn.
///
/// Only affects validation and the suggested default aggregation,
/// never how values are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChartType {
    BarChart,
    LineChart,
    PieChart,
    Table,
    ScatterPlot,
    AreaChart,
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartType::BarChart => write!(f, "BAR_CHART"),
            ChartType::LineChart => write!(f, "LINE_CHART"),
            ChartType::PieChart => write!(f, "PIE_CHART"),
            ChartType::Table => write!(f, "TABLE"),
            ChartType::ScatterPlot => write!(f, "SCATTER_PLOT"),
            ChartType::AreaChart => write!(f, "AREA_CHART"),
        }
    }
}

/// Which axis a field is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    X,
    Y,
}

impl std::fmt::Display for AxisRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisRole::X => write!(f, "X"),
            AxisRole::Y => write!(f, "Y"),
        }
    }
}

/// Reduction applied to the records of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationFunction {
    Count,
    Sum,
    Average,
    Min,
    Max,
    First,
    Last,
}

impl AggregationFunction {
    pub const ALL: [AggregationFunction; 7] = [
        AggregationFunction::Count,
        AggregationFunction::Sum,
        AggregationFunction::Average,
        AggregationFunction::Min,
        AggregationFunction::Max,
        AggregationFunction::First,
        AggregationFunction::Last,
    ];

    /// COUNT is the only aggregation that does not read a Y value.
    #[must_use]
    pub fn needs_value(&self) -> bool {
        !matches!(self, AggregationFunction::Count)
    }
}

impl std::fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationFunction::Count => write!(f, "COUNT"),
            AggregationFunction::Sum => write!(f, "SUM"),
            AggregationFunction::Average => write!(f, "AVERAGE"),
            AggregationFunction::Min => write!(f, "MIN"),
            AggregationFunction::Max => write!(f, "MAX"),
            AggregationFunction::First => write!(f, "FIRST"),
            AggregationFunction::Last => write!(f, "LAST"),
        }
    }
}

/// Granularity of date buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateInterval {
    Day,
    /// ISO week, starting Monday
    Week,
    Month,
    Year,
}

/// How records are partitioned into buckets. Grouping always keys on
/// the X axis field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grouping {
    /// One bucket holding every record
    #[default]
    None,
    /// One bucket per literal value of the X field
    ByCategory,
    /// One bucket per date interval of the X field
    ByDate { interval: DateInterval },
}

/// Time window a chart looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeRange {
    #[serde(rename = "LAST_7_DAYS")]
    Last7Days,
    #[serde(rename = "LAST_30_DAYS")]
    Last30Days,
    #[serde(rename = "LAST_3_MONTHS")]
    Last3Months,
    #[serde(rename = "LAST_6_MONTHS")]
    Last6Months,
    LastYear,
    #[serde(rename = "LAST_2_YEARS")]
    Last2Years,
    #[serde(rename = "LAST_3_YEARS")]
    Last3Years,
    #[default]
    AllTime,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// What buckets are ordered by after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortField {
    /// Keep the order the grouping produced
    #[default]
    Natural,
    Label,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChartSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl ChartSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Optional narrowing of visible records to one category.
///
/// Supplied per computation by the caller, never stored in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryScope {
    #[default]
    All,
    Only(Uuid),
}

impl CategoryScope {
    #[must_use]
    pub fn admits(&self, category_id: Option<Uuid>) -> bool {
        match self {
            CategoryScope::All => true,
            CategoryScope::Only(id) => category_id == Some(*id),
        }
    }
}

/// A user-authored chart definition.
///
/// The engine only ever reads it; edits come from the builder UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicChartConfig {
    pub title: String,
    pub chart_type: ChartType,
    pub data_source: DataSource,

    /// Field id in the catalog of `data_source`; also the grouping key
    pub x_axis_field: String,

    /// Field id whose values are aggregated; `None` for plain counts
    #[serde(default)]
    pub y_axis_field: Option<String>,

    pub y_axis_aggregation: AggregationFunction,

    #[serde(default)]
    pub grouping: Grouping,

    #[serde(default)]
    pub time_range: TimeRange,

    #[serde(default)]
    pub sort: ChartSort,

    // Display flags, not used in computation
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub show_axis_labels: bool,
}

fn default_true() -> bool {
    true
}

impl DynamicChartConfig {
    /// A counting chart over all time with no grouping.
    pub fn new(
        title: impl Into<String>,
        chart_type: ChartType,
        data_source: DataSource,
        x_axis_field: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            chart_type,
            data_source,
            x_axis_field: x_axis_field.into(),
            y_axis_field: None,
            y_axis_aggregation: AggregationFunction::Count,
            grouping: Grouping::None,
            time_range: TimeRange::AllTime,
            sort: ChartSort::default(),
            show_legend: true,
            show_axis_labels: true,
        }
    }

    #[must_use]
    pub fn with_y_axis(mut self, field: impl Into<String>, aggregation: AggregationFunction) -> Self {
        self.y_axis_field = Some(field.into());
        self.y_axis_aggregation = aggregation;
        self
    }

    #[must_use]
    pub fn with_aggregation(mut self, aggregation: AggregationFunction) -> Self {
        self.y_axis_aggregation = aggregation;
        self
    }

    #[must_use]
    pub fn grouped_by(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    #[must_use]
    pub fn over(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, sort: ChartSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
