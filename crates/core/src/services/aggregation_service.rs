use crate::models::chart_config::AggregationFunction;
use crate::models::record::Record;
use crate::services::field_catalog::FieldAccessor;

/// Reduces one bucket of records to a single number.
///
/// Contract for empty input: every function yields `0.0`. That holds for
/// an empty bucket and for a bucket whose Y values are all null, so the
/// render layer never sees NaN, infinities or a "no value" marker.
///
/// Values are folded in bucket order, so the same bucket always yields
/// the bit-identical result.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `records` with `function` over the `value` field.
    ///
    /// COUNT counts records and ignores `value` entirely. Every other
    /// function skips records whose value is null or non-numeric.
    pub fn aggregate(
        &self,
        records: &[&Record],
        value: Option<&FieldAccessor>,
        function: AggregationFunction,
    ) -> f64 {
        let Some(accessor) = value else {
            return match function {
                AggregationFunction::Count => records.len() as f64,
                _ => 0.0,
            };
        };
        let mut numbers = records
            .iter()
            .filter_map(|r| accessor.extract(r).and_then(|v| v.as_number()));

        match function {
            AggregationFunction::Count => records.len() as f64,
            AggregationFunction::Sum => numbers.sum::<f64>(),
            AggregationFunction::Average => {
                let (sum, count) = numbers.fold((0.0, 0usize), |(s, c), n| (s + n, c + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            }
            AggregationFunction::Min => numbers.reduce(f64::min).unwrap_or(0.0),
            AggregationFunction::Max => numbers.reduce(f64::max).unwrap_or(0.0),
            AggregationFunction::First => numbers.next().unwrap_or(0.0),
            AggregationFunction::Last => numbers.last().unwrap_or(0.0),
        }
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}
