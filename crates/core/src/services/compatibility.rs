use crate::errors::CoreError;
use crate::models::chart_config::{AggregationFunction, AxisRole, ChartType, DynamicChartConfig, Grouping};
use crate::models::field::{DataField, DataType};
use crate::services::grouping_service::{BucketDensity, CategoryOrder};

const CATEGORICAL_OR_DATE: &[DataType] = &[
    DataType::String,
    DataType::Enum,
    DataType::Boolean,
    DataType::Date,
];
const ORDERED: &[DataType] = &[DataType::Date, DataType::Number, DataType::Enum];
const NUMERIC: &[DataType] = &[DataType::Number];
const ANY: &[DataType] = &[
    DataType::Number,
    DataType::String,
    DataType::Date,
    DataType::Enum,
    DataType::Boolean,
];

/// What one axis of a chart type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRule {
    pub accepts: &'static [DataType],
    pub required: bool,
}

/// Pure rules deciding which chart configurations are legal.
///
/// No side effects, no I/O. Evaluated once per configuration before any
/// record is fetched.
pub struct CompatibilityMatrix;

impl CompatibilityMatrix {
    /// The axis rule of every chart type. Adding a chart type fails to
    /// compile until it is given rules here.
    pub fn axis_rule(chart_type: ChartType, role: AxisRole) -> AxisRule {
        match (chart_type, role) {
            (ChartType::BarChart | ChartType::PieChart, AxisRole::X) => AxisRule {
                accepts: CATEGORICAL_OR_DATE,
                required: true,
            },
            (ChartType::LineChart | ChartType::AreaChart, AxisRole::X) => AxisRule {
                accepts: ORDERED,
                required: true,
            },
            (ChartType::ScatterPlot, AxisRole::X) => AxisRule {
                accepts: NUMERIC,
                required: true,
            },
            (ChartType::Table, AxisRole::X) => AxisRule {
                accepts: ANY,
                required: true,
            },
            (ChartType::ScatterPlot, AxisRole::Y) => AxisRule {
                accepts: NUMERIC,
                required: true,
            },
            (
                ChartType::BarChart
                | ChartType::PieChart
                | ChartType::LineChart
                | ChartType::AreaChart,
                AxisRole::Y,
            ) => AxisRule {
                accepts: NUMERIC,
                required: false,
            },
            (ChartType::Table, AxisRole::Y) => AxisRule {
                accepts: ANY,
                required: false,
            },
        }
    }

    pub fn is_valid_axis_field(chart_type: ChartType, role: AxisRole, field: &DataField) -> bool {
        Self::axis_rule(chart_type, role)
            .accepts
            .contains(&field.data_type)
    }

    /// Aggregations legal for a Y field. Without a Y field only COUNT applies.
    pub fn available_aggregations(field: Option<&DataField>) -> Vec<AggregationFunction> {
        match field.map(|f| f.data_type) {
            Some(DataType::Number) => AggregationFunction::ALL.to_vec(),
            Some(_) => vec![
                AggregationFunction::Count,
                AggregationFunction::First,
                AggregationFunction::Last,
            ],
            None => vec![AggregationFunction::Count],
        }
    }

    /// Default aggregation offered by the builder for a chart type.
    pub fn suggested_aggregation(
        chart_type: ChartType,
        y_field: Option<&DataField>,
    ) -> AggregationFunction {
        let numeric = y_field.is_some_and(|f| f.data_type == DataType::Number);
        if !numeric {
            return AggregationFunction::Count;
        }
        match chart_type {
            ChartType::BarChart | ChartType::PieChart | ChartType::AreaChart | ChartType::Table => {
                AggregationFunction::Sum
            }
            ChartType::LineChart | ChartType::ScatterPlot => AggregationFunction::Average,
        }
    }

    /// Whether empty date buckets are materialized for this chart type.
    pub fn date_bucket_density(chart_type: ChartType) -> BucketDensity {
        match chart_type {
            ChartType::BarChart | ChartType::LineChart | ChartType::AreaChart => BucketDensity::Dense,
            ChartType::PieChart | ChartType::Table | ChartType::ScatterPlot => BucketDensity::Sparse,
        }
    }

    /// Tables list categories alphabetically, charts keep first appearance.
    pub fn category_order(chart_type: ChartType) -> CategoryOrder {
        match chart_type {
            ChartType::Table => CategoryOrder::Alphabetical,
            ChartType::BarChart
            | ChartType::LineChart
            | ChartType::PieChart
            | ChartType::ScatterPlot
            | ChartType::AreaChart => CategoryOrder::FirstAppearance,
        }
    }

    /// Check a configuration against its resolved fields.
    pub fn validate(
        config: &DynamicChartConfig,
        x_field: &DataField,
        y_field: Option<&DataField>,
    ) -> Result<(), CoreError> {
        let chart_type = config.chart_type;

        if !Self::is_valid_axis_field(chart_type, AxisRole::X, x_field) {
            return Err(CoreError::ConfigValidation(format!(
                "{chart_type} does not accept {} field '{}' on the X axis",
                x_field.data_type, x_field.id
            )));
        }

        match y_field {
            Some(y) if !Self::is_valid_axis_field(chart_type, AxisRole::Y, y) => {
                return Err(CoreError::ConfigValidation(format!(
                    "{chart_type} does not accept {} field '{}' on the Y axis",
                    y.data_type, y.id
                )));
            }
            None if Self::axis_rule(chart_type, AxisRole::Y).required => {
                return Err(CoreError::ConfigValidation(format!(
                    "{chart_type} requires a Y axis field"
                )));
            }
            _ => {}
        }

        let aggregation = config.y_axis_aggregation;
        if !Self::available_aggregations(y_field).contains(&aggregation) {
            return Err(CoreError::ConfigValidation(match y_field {
                Some(y) => format!(
                    "{aggregation} is not available for {} field '{}'",
                    y.data_type, y.id
                ),
                None => format!("{aggregation} requires a Y axis field"),
            }));
        }

        match config.grouping {
            Grouping::ByDate { .. } if x_field.data_type != DataType::Date => {
                Err(CoreError::ConfigValidation(format!(
                    "date grouping requires a DATE field on the X axis, '{}' is {}",
                    x_field.id, x_field.data_type
                )))
            }
            Grouping::ByCategory if x_field.data_type == DataType::Date => {
                Err(CoreError::ConfigValidation(format!(
                    "'{}' is a DATE field, group it by date instead",
                    x_field.id
                )))
            }
            _ => Ok(()),
        }
    }
}
