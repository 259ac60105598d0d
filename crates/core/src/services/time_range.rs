use chrono::{DateTime, Duration, Months, Utc};

use crate::errors::CoreError;
use crate::models::chart_config::TimeRange;

/// Concrete, inclusive window produced from a [`TimeRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedTimeRange {
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// `true` for ALL_TIME: the window does not narrow anything.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start == DateTime::<Utc>::MIN_UTC && self.end == DateTime::<Utc>::MAX_UTC
    }
}

/// How far back a relative range reaches.
enum Lookback {
    Days(i64),
    Months(u32),
}

/// Turns relative/absolute range selectors into concrete instants.
///
/// `now` is captured once by the caller per computation and passed in,
/// so a single run never observes two different clocks.
pub struct TimeRangeResolver;

impl TimeRangeResolver {
    pub fn resolve(range: &TimeRange, now: DateTime<Utc>) -> Result<ResolvedTimeRange, CoreError> {
        let lookback = match range {
            TimeRange::Custom { start, end } => {
                Self::validate(range)?;
                return Ok(ResolvedTimeRange {
                    start: *start,
                    end: *end,
                });
            }
            TimeRange::AllTime => {
                return Ok(ResolvedTimeRange {
                    start: DateTime::<Utc>::MIN_UTC,
                    end: DateTime::<Utc>::MAX_UTC,
                });
            }
            TimeRange::Last7Days => Lookback::Days(7),
            TimeRange::Last30Days => Lookback::Days(30),
            TimeRange::Last3Months => Lookback::Months(3),
            TimeRange::Last6Months => Lookback::Months(6),
            TimeRange::LastYear => Lookback::Months(12),
            TimeRange::Last2Years => Lookback::Months(24),
            TimeRange::Last3Years => Lookback::Months(36),
        };

        // Calendar months, not fixed day counts: Mar 31 minus one month is
        // Feb 28/29. Underflow clamps to the earliest representable instant.
        let start = match lookback {
            Lookback::Days(days) => now.checked_sub_signed(Duration::days(days)),
            Lookback::Months(months) => now.checked_sub_months(Months::new(months)),
        }
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(ResolvedTimeRange { start, end: now })
    }

    /// Reject ranges that can never match anything.
    pub fn validate(range: &TimeRange) -> Result<(), CoreError> {
        if let TimeRange::Custom { start, end } = range {
            if end < start {
                return Err(CoreError::ConfigValidation(format!(
                    "custom range ends ({end}) before it starts ({start})"
                )));
            }
        }
        Ok(())
    }
}
