use serde::Serialize;
use uuid::Uuid;

use crate::errors::CoreError;

/// The engine's only output: parallel label and value sequences.
///
/// The core computes all the numbers, the render layer decides how to
/// draw them. Fields are private so `labels.len() == values.len()` holds
/// for every value ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ChartDataResult {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl ChartDataResult {
    /// A result with zero buckets; the UI shows its empty state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(label, value)` pairs, keeping their order.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let (labels, values) = points.into_iter().unzip();
        Self { labels, values }
    }

    /// Bucket labels in display order.
    ///
    /// For date grouping the labels are bucket starts in chronological
    /// order, except that records without a date are collected in one
    /// trailing bucket labelled with `EngineSettings::unspecified_label`.
    /// That bucket only occurs over ALL_TIME, since bounded ranges drop
    /// undated records.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate `(label, value)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// A freshly computed chart, delivered by the change listener.
#[derive(Debug)]
pub struct ChartUpdate {
    pub chart_id: Uuid,
    pub result: Result<ChartDataResult, CoreError>,
}
