//! 🧺 Batch accumulation: lines pile up here until there are enough to bother the sink.

/// 🏁 Appended to the final batch so the receiver knows the object is done.
pub const EOF_SENTINEL: &str = "EOF";

const INITIAL_CAPACITY_CAP: usize = 1024;

/// 🧺 The lines of the current, not-yet-delivered batch, in file order.
///
/// Cleared only after the dispatcher reports an acknowledged delivery. A failed delivery
/// leaves everything in place, and newer lines keep piling on top.
#[derive(Debug)]
pub(crate) struct BatchAccumulator {
    lines: Vec<String>,
    dump_threshold: usize,
    holds_sentinel: bool,
}

impl BatchAccumulator {
    pub(crate) fn new(dump_threshold: usize) -> Self {
        Self {
            // -- the threshold is user-supplied, so grow on demand instead of reserving it all
            lines: Vec::with_capacity(dump_threshold.min(INITIAL_CAPACITY_CAP)),
            dump_threshold: dump_threshold.max(1),
            holds_sentinel: false,
        }
    }

    /// 📥 Append a line. Returns `true` when the batch has reached the dump threshold.
    pub(crate) fn push(&mut self, line: String) -> bool {
        self.lines.push(line);
        self.is_full()
    }

    /// 🏁 Append the end-of-stream marker. Happens once, at FLUSHING.
    pub(crate) fn push_sentinel(&mut self) {
        self.lines.push(EOF_SENTINEL.to_string());
        self.holds_sentinel = true;
    }

    pub(crate) fn is_full(&self) -> bool {
        self.lines.len() >= self.dump_threshold
    }

    pub(crate) fn holds_sentinel(&self) -> bool {
        self.holds_sentinel
    }

    pub(crate) fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    /// 🔗 All lines glued together, no separators beyond what the lines already carry.
    pub(crate) fn payload(&self) -> String {
        self.lines.concat()
    }

    /// 🧹 Truncate to empty, keeping the allocation around for the next batch.
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
        self.holds_sentinel = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_threshold_trips_on_the_dth_line() {
        let mut batch = BatchAccumulator::new(3);
        assert!(!batch.push("a\n".into()));
        assert!(!batch.push("b\n".into()));
        assert!(batch.push("c\n".into()));
        // -- past the threshold is still full (stale batch after a failed delivery)
        assert!(batch.push("d\n".into()));
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn the_one_where_the_payload_is_a_plain_concatenation() {
        let mut batch = BatchAccumulator::new(10);
        batch.push("this is the first line\n".into());
        batch.push_sentinel();
        assert_eq!(batch.payload(), "this is the first line\nEOF");
        assert!(batch.holds_sentinel());
    }

    #[test]
    fn the_one_where_clear_keeps_the_capacity_but_drops_the_lines() {
        let mut batch = BatchAccumulator::new(4);
        for line in ["a", "b", "c", "d"] {
            batch.push(line.to_string());
        }
        let capacity_before = batch.lines.capacity();
        batch.clear();
        assert!(batch.lines().is_empty());
        assert!(!batch.holds_sentinel());
        assert_eq!(batch.lines.capacity(), capacity_before);
    }

    #[test]
    fn the_one_where_an_absurd_threshold_does_not_reserve_the_universe() {
        let mut batch = BatchAccumulator::new(usize::MAX);
        assert!(!batch.push("still here\n".into()));
        assert_eq!(batch.len(), 1);
        assert!(batch.lines.capacity() <= INITIAL_CAPACITY_CAP);
    }

    #[test]
    fn the_one_where_a_zero_threshold_behaves_like_one() {
        let mut batch = BatchAccumulator::new(0);
        assert!(batch.push("only\n".into()));
    }
}
