use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Proof that a computation was started, used to decide whether its
/// result may still be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeTicket {
    pub chart_id: Uuid,
    generation: u64,
}

#[derive(Default)]
struct Generations {
    next: u64,
    latest: HashMap<Uuid, u64>,
}

/// Tracks the latest requested computation per chart.
///
/// Every request, config edit or deletion bumps the chart's generation.
/// A computation only applies its result if its ticket still carries the
/// latest generation; otherwise the result is dropped. Generations come
/// from one process-wide counter, so a ticket never becomes current again.
pub struct RecomputeTracker {
    generations: Mutex<Generations>,
    debounce: Duration,
}

impl RecomputeTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            generations: Mutex::new(Generations::default()),
            debounce,
        }
    }

    /// Start a computation, superseding any in flight for the same chart.
    pub fn begin(&self, chart_id: Uuid) -> ComputeTicket {
        let mut state = self.generations.lock();
        state.next += 1;
        let generation = state.next;
        state.latest.insert(chart_id, generation);
        ComputeTicket {
            chart_id,
            generation,
        }
    }

    /// The chart's config changed: results computed so far are stale.
    pub fn invalidate(&self, chart_id: Uuid) {
        self.begin(chart_id);
    }

    /// The chart was deleted: nothing for it may be applied anymore.
    pub fn forget(&self, chart_id: Uuid) {
        self.generations.lock().latest.remove(&chart_id);
    }

    #[must_use]
    pub fn is_current(&self, ticket: &ComputeTicket) -> bool {
        self.generations.lock().latest.get(&ticket.chart_id) == Some(&ticket.generation)
    }

    /// Whether any generation is recorded for the chart.
    #[must_use]
    pub fn is_tracking(&self, chart_id: Uuid) -> bool {
        self.generations.lock().latest.contains_key(&chart_id)
    }

    /// Hand back `value` only if `ticket` is still the latest.
    pub fn accept<T>(&self, ticket: &ComputeTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!(chart_id = %ticket.chart_id, "discarding stale chart computation");
            None
        }
    }

    /// Request a computation and wait out the debounce period.
    ///
    /// Returns `None` when a newer request arrived in the meantime; only the
    /// last of a burst of requests proceeds.
    pub async fn debounced(&self, chart_id: Uuid) -> Option<ComputeTicket> {
        let ticket = self.begin(chart_id);
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if self.is_current(&ticket) {
            Some(ticket)
        } else {
            debug!(%chart_id, "recompute request superseded");
            None
        }
    }
}
