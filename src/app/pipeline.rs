//! Shared pipeline runner used by both CLI and TUI front-ends.
//!
//! Results are memoized for a bounded interval so repeated UI interactions do
//! not re-read sources. Invalidation drops the memo and forces the next run to
//! refetch every source, bypassing the on-disk staleness window too.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::data::cache::Fetch;
use crate::domain::Reconciled;
use crate::recon::Engine;

/// Time-bounded memo of the last reconciliation.
pub struct ModelMemo<F> {
    engine: Engine<F>,
    ttl: Duration,
    entry: Option<(Instant, Arc<Reconciled>)>,
    force_next: bool,
}

impl<F: Fetch> ModelMemo<F> {
    pub fn new(engine: Engine<F>, ttl: Duration) -> Self {
        Self {
            engine,
            ttl,
            entry: None,
            force_next: false,
        }
    }

    /// Return the memoized result, recomputing when absent, expired, or invalidated.
    pub fn get(&mut self) -> Arc<Reconciled> {
        self.get_at(Instant::now())
    }

    fn get_at(&mut self, now: Instant) -> Arc<Reconciled> {
        if let Some((computed_at, value)) = &self.entry {
            if now.saturating_duration_since(*computed_at) < self.ttl {
                debug!("model memo hit");
                return Arc::clone(value);
            }
        }

        let force = std::mem::take(&mut self.force_next);
        let value = Arc::new(self.engine.reconcile(force));
        self.entry = Some((now, Arc::clone(&value)));
        value
    }

    /// Drop the memo and force a refetch of every source on the next `get`.
    pub fn invalidate(&mut self) {
        debug!("model memo invalidated");
        self.entry = None;
        self.force_next = true;
    }

    /// Age of the memoized result, if any.
    pub fn age(&self) -> Option<Duration> {
        self.entry.as_ref().map(|(at, _)| at.elapsed())
    }
}
