//! 🧮 Run counters: two numbers that tell the whole story of a run.
//!
//! Owned by exactly one pipeline run, created fresh at INIT, handed by `&mut` to whoever
//! needs to bump them. No statics. No globals. No "who reset that?" at 3am.

use serde::Serialize;

/// 🧮 Mutable per-run tallies. Single writer, single reader, no locks required.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunCounters {
    /// 📬 items acknowledged by the transport, sentinel included while the run is live
    sent: usize,
    /// 💀 fetch failures, read failures, delivery failures: all in one bucket
    errors: usize,
    /// 🏁 whether the end-of-stream sentinel made it out inside an acknowledged batch
    sentinel_delivered: bool,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delivered(&mut self, items: usize) {
        self.sent += items;
    }

    pub(crate) fn record_sentinel_delivered(&mut self) {
        self.sentinel_delivered = true;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    /// 📸 Freeze the counters into the externally visible result.
    ///
    /// The sentinel rode along as one delivered item so it could trigger the final send;
    /// it is taken back out here so `sent_count` only counts real lines.
    pub fn snapshot(&self) -> RunResult {
        let sentinel = usize::from(self.sentinel_delivered);
        RunResult {
            error_count: self.errors,
            sent_count: self.sent.saturating_sub(sentinel),
        }
    }
}

/// 🏁 The only thing a caller ever learns about a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub error_count: usize,
    pub sent_count: usize,
}

impl RunResult {
    pub fn new(error_count: usize, sent_count: usize) -> Self {
        Self {
            error_count,
            sent_count,
        }
    }
}
