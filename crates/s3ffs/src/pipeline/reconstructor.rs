//! 🧵 Line reconstruction: stitching lines back together after chunking cut them in half.
//!
//! A byte-range fetch has no idea where lines end. Chunk 0 happily stops in the middle of
//! "this is the sev", and chunk 1 begins with "enth line\n". The `LineReconstructor` keeps
//! that dangling fragment in a carry buffer and glues it onto the first line of the next
//! chunk, so downstream sees the same lines a single pass over the whole object would.
//!
//! 🧠 Knowledge graph:
//! - One `LineReconstructor` per run. It owns the carry buffer (raw bytes, so a UTF-8
//!   sequence split across a chunk boundary reassembles correctly).
//! - One `ChunkLines` per chunk. Pull-based: the driver calls `next_line()` until `None`.
//! - Scanning uses `fill_buf` + `memchr`, the same trick `read_until` does under the hood,
//!   but with our own error policy: read errors are counted and skipped, up to a cap.

use memchr::memchr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{trace, warn};

use crate::backends::ChunkReader;
use crate::pipeline::counters::RunCounters;

const LINE_TERMINATOR: u8 = b'\n';

/// 🧵 Owns the cross-chunk carry buffer for one run.
#[derive(Debug)]
pub(crate) struct LineReconstructor {
    carry: Vec<u8>,
    max_consecutive_read_errors: u32,
}

impl LineReconstructor {
    pub(crate) fn new(max_consecutive_read_errors: u32) -> Self {
        Self {
            carry: Vec::new(),
            // -- zero would mean "give up before the first error", which is one error too few
            max_consecutive_read_errors: max_consecutive_read_errors.max(1),
        }
    }

    /// 📖 Start reading one chunk. The returned reader borrows the carry buffer.
    pub(crate) fn chunk(&mut self, reader: ChunkReader) -> ChunkLines<'_> {
        ChunkLines {
            carry: &mut self.carry,
            reader: BufReader::new(reader),
            line: Vec::new(),
            consecutive_errors: 0,
            max_consecutive_errors: self.max_consecutive_read_errors,
            exhausted: false,
        }
    }

    /// 🏁 Hand over whatever unterminated tail is left after the final chunk.
    pub(crate) fn take_carry(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            Some(decode_line(std::mem::take(&mut self.carry)))
        }
    }
}

/// 📄 Lines of a single chunk, pulled one at a time.
pub(crate) struct ChunkLines<'a> {
    carry: &'a mut Vec<u8>,
    reader: BufReader<ChunkReader>,
    line: Vec<u8>,
    consecutive_errors: u32,
    max_consecutive_errors: u32,
    exhausted: bool,
}

impl ChunkLines<'_> {
    /// 🎣 Next complete (terminator-included) line, with any carried fragment prepended.
    ///
    /// Returns `None` once the chunk is exhausted; an unterminated tail is folded into the
    /// carry buffer at that point instead of being emitted. Read errors bump the run's error
    /// counter and reading resumes; after `max_consecutive_errors` in a row the chunk is
    /// abandoned, keeping already-read bytes in the carry.
    pub(crate) async fn next_line(&mut self, counters: &mut RunCounters) -> Option<String> {
        if self.exhausted {
            return None;
        }

        loop {
            let (consumed, terminated) = match self.reader.fill_buf().await {
                Ok([]) => {
                    // 🏁 clean end of this chunk's bytes
                    self.finish();
                    return None;
                }
                Ok(available) => match memchr(LINE_TERMINATOR, available) {
                    Some(at) => {
                        self.line.extend_from_slice(&available[..=at]);
                        (at + 1, true)
                    }
                    None => {
                        self.line.extend_from_slice(available);
                        (available.len(), false)
                    }
                },
                Err(err) => {
                    counters.record_error();
                    self.consecutive_errors += 1;
                    warn!(
                        "⚠️ failed to read data ({} in a row): {}",
                        self.consecutive_errors, err
                    );
                    if self.consecutive_errors >= self.max_consecutive_errors {
                        warn!(
                            "💀 giving up on the rest of this chunk after {} consecutive read errors",
                            self.consecutive_errors
                        );
                        self.finish();
                        return None;
                    }
                    continue;
                }
            };

            self.reader.consume(consumed);
            self.consecutive_errors = 0;

            if terminated {
                let mut the_whole_line = std::mem::take(self.carry);
                if !the_whole_line.is_empty() {
                    trace!(
                        "🧵 stitched {} carried bytes onto the first line of this chunk",
                        the_whole_line.len()
                    );
                }
                the_whole_line.append(&mut self.line);
                return Some(decode_line(the_whole_line));
            }
        }
    }

    /// 🧺 Fold the unterminated remainder into the carry buffer and stop.
    fn finish(&mut self) {
        self.carry.append(&mut self.line);
        self.exhausted = true;
    }
}

fn decode_line(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(err) => {
            warn!("⚠️ line is not valid UTF-8, replacing the offending bytes: {}", err.utf8_error());
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}
