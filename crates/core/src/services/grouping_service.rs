use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

use crate::errors::CoreError;
use crate::models::chart_config::{DateInterval, Grouping};
use crate::models::record::Record;
use crate::models::settings::EngineSettings;
use crate::services::field_catalog::FieldAccessor;
use crate::services::time_range::ResolvedTimeRange;

/// Whether date intervals without records still produce a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketDensity {
    /// Every interval in range gets a bucket, empty ones included
    Dense,
    /// Only intervals holding at least one record
    Sparse,
}

/// Order of category buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryOrder {
    /// In the order each value is first seen
    FirstAppearance,
    /// By label text; the unspecified bucket goes last
    Alphabetical,
}

/// Records sharing one grouping key, in their input order.
#[derive(Debug, Clone)]
pub struct Bucket<'a> {
    pub label: String,
    pub records: Vec<&'a Record>,
}

impl<'a> Bucket<'a> {
    fn new(label: String) -> Self {
        Self {
            label,
            records: Vec::new(),
        }
    }
}

/// How a single grouping run should behave.
#[derive(Debug, Clone, Copy)]
pub struct GroupingPlan<'t> {
    pub grouping: Grouping,
    pub density: BucketDensity,
    pub category_order: CategoryOrder,
    pub range: ResolvedTimeRange,
    pub title: &'t str,
}

/// Partitions a time-filtered record set into ordered buckets.
pub struct GroupingService {
    unspecified_label: String,
    total_label: String,
    max_buckets: usize,
}

impl GroupingService {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            unspecified_label: settings.unspecified_label.clone(),
            total_label: settings.total_label.clone(),
            max_buckets: settings.max_buckets,
        }
    }

    /// Group `records` (already in chronological order) by the X field.
    pub fn group<'a>(
        &self,
        records: &[&'a Record],
        key: &FieldAccessor,
        plan: &GroupingPlan<'_>,
    ) -> Result<Vec<Bucket<'a>>, CoreError> {
        match plan.grouping {
            Grouping::None => Ok(self.group_none(records, plan.title)),
            Grouping::ByCategory => Ok(self.group_by_category(records, key, plan.category_order)),
            Grouping::ByDate { interval } => {
                self.group_by_date(records, key, interval, plan.density, &plan.range)
            }
        }
    }

    /// A single bucket, or none at all when there is nothing to show.
    fn group_none<'a>(&self, records: &[&'a Record], title: &str) -> Vec<Bucket<'a>> {
        if records.is_empty() {
            return Vec::new();
        }
        let label = if title.trim().is_empty() {
            self.total_label.clone()
        } else {
            title.trim().to_string()
        };
        vec![Bucket {
            label,
            records: records.to_vec(),
        }]
    }

    fn group_by_category<'a>(
        &self,
        records: &[&'a Record],
        key: &FieldAccessor,
        order: CategoryOrder,
    ) -> Vec<Bucket<'a>> {
        // `None` is the unspecified bucket
        let mut keys: Vec<Option<String>> = Vec::new();
        let mut buckets: Vec<Bucket<'a>> = Vec::new();
        let mut positions: HashMap<Option<String>, usize> = HashMap::new();

        for record in records {
            let value = key.extract(record).map(|v| v.to_label());
            let idx = match positions.get(&value) {
                Some(&idx) => idx,
                None => {
                    let label = value
                        .clone()
                        .unwrap_or_else(|| self.unspecified_label.clone());
                    positions.insert(value.clone(), buckets.len());
                    keys.push(value);
                    buckets.push(Bucket::new(label));
                    buckets.len() - 1
                }
            };
            buckets[idx].records.push(record);
        }

        if order == CategoryOrder::Alphabetical {
            let mut keyed: Vec<(Option<String>, Bucket<'a>)> = keys.into_iter().zip(buckets).collect();
            keyed.sort_by(|(a, _), (b, _)| match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
            buckets = keyed.into_iter().map(|(_, bucket)| bucket).collect();
        }
        buckets
    }

    fn group_by_date<'a>(
        &self,
        records: &[&'a Record],
        key: &FieldAccessor,
        interval: DateInterval,
        density: BucketDensity,
        range: &ResolvedTimeRange,
    ) -> Result<Vec<Bucket<'a>>, CoreError> {
        let mut by_start: BTreeMap<NaiveDate, Vec<&'a Record>> = BTreeMap::new();
        let mut undated: Vec<&'a Record> = Vec::new();

        for record in records {
            match key.extract(record).and_then(|v| v.as_date()) {
                Some(instant) => by_start
                    .entry(bucket_start(instant, interval))
                    .or_default()
                    .push(record),
                None => undated.push(record),
            }
        }

        if density == BucketDensity::Dense {
            for start in self.dense_starts(&by_start, interval, range)? {
                by_start.entry(start).or_default();
            }
        }

        let mut buckets: Vec<Bucket<'a>> = by_start
            .into_iter()
            .map(|(start, records)| Bucket {
                label: bucket_label(start, interval),
                records,
            })
            .collect();

        if !undated.is_empty() {
            buckets.push(Bucket {
                label: self.unspecified_label.clone(),
                records: undated,
            });
        }
        Ok(buckets)
    }

    /// Fail early when a bounded dense range alone exceeds the bucket cap.
    pub fn check_dense_range(
        &self,
        interval: DateInterval,
        range: &ResolvedTimeRange,
    ) -> Result<(), CoreError> {
        if range.is_unbounded() {
            return Ok(());
        }
        self.dense_starts(&BTreeMap::new(), interval, range).map(|_| ())
    }

    /// Interval starts a dense chart must show.
    ///
    /// Bounded ranges cover every interval starting before `range.end`,
    /// beginning with the one containing `range.start`. Unbounded ranges
    /// span the observed keys.
    fn dense_starts(
        &self,
        observed: &BTreeMap<NaiveDate, Vec<&Record>>,
        interval: DateInterval,
        range: &ResolvedTimeRange,
    ) -> Result<Vec<NaiveDate>, CoreError> {
        let (first, stop) = if range.is_unbounded() {
            match (observed.keys().next(), observed.keys().next_back()) {
                (Some(&first), Some(&last)) => (first, Bound::Through(last)),
                _ => return Ok(Vec::new()),
            }
        } else {
            (
                bucket_start(range.start, interval),
                Bound::Before(range.end),
            )
        };

        let mut starts = Vec::new();
        let mut current = Some(first);
        while let Some(start) = current {
            if !stop.admits(start) {
                break;
            }
            if starts.len() >= self.max_buckets {
                return Err(CoreError::ConfigValidation(format!(
                    "date grouping would produce more than {} buckets, pick a wider interval or a shorter range",
                    self.max_buckets
                )));
            }
            starts.push(start);
            current = next_bucket_start(start, interval);
        }
        Ok(starts)
    }
}

enum Bound {
    Through(NaiveDate),
    Before(DateTime<Utc>),
}

impl Bound {
    fn admits(&self, start: NaiveDate) -> bool {
        match self {
            Bound::Through(last) => start <= *last,
            Bound::Before(end) => start_instant(start) < *end,
        }
    }
}

/// Start of the interval containing `instant` (UTC).
pub fn bucket_start(instant: DateTime<Utc>, interval: DateInterval) -> NaiveDate {
    let day = instant.date_naive();
    match interval {
        DateInterval::Day => day,
        DateInterval::Week => day
            .checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
            .unwrap_or(day),
        DateInterval::Month => day.with_day(1).unwrap_or(day),
        DateInterval::Year => day.with_ordinal(1).unwrap_or(day),
    }
}

/// Snap a relative range onto whole buckets.
///
/// The start moves forward to the next bucket boundary unless it already
/// sits on one, so the first bucket is never partially filtered. The last
/// bucket is the one containing `range.end`. When the interval is coarser
/// than the range, the window is that last bucket.
pub fn align_to_buckets(range: ResolvedTimeRange, interval: DateInterval) -> ResolvedTimeRange {
    let first = bucket_start(range.start, interval);
    let mut start = start_instant(first);
    if start < range.start {
        start = next_bucket_start(first, interval)
            .map(start_instant)
            .unwrap_or(range.start);
    }
    let current = start_instant(bucket_start(range.end, interval));
    ResolvedTimeRange {
        start: start.min(current),
        end: range.end,
    }
}

fn next_bucket_start(start: NaiveDate, interval: DateInterval) -> Option<NaiveDate> {
    match interval {
        DateInterval::Day => start.checked_add_days(Days::new(1)),
        DateInterval::Week => start.checked_add_days(Days::new(7)),
        DateInterval::Month => start.checked_add_months(Months::new(1)),
        DateInterval::Year => start.checked_add_months(Months::new(12)),
    }
}

fn start_instant(start: NaiveDate) -> DateTime<Utc> {
    start.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Labels sort the same way their buckets do: "2025-01-15", "2025-01", "2025".
/// Week labels carry the Monday the week starts on.
pub fn bucket_label(start: NaiveDate, interval: DateInterval) -> String {
    match interval {
        DateInterval::Day | DateInterval::Week => start.format("%Y-%m-%d").to_string(),
        DateInterval::Month => start.format("%Y-%m").to_string(),
        DateInterval::Year => start.format("%Y").to_string(),
    }
}
