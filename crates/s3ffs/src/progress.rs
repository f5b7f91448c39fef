//! 📊 progress.rs: "Are we there yet?" Every pipeline, every time, forever.
//!
//! One bar per object, advanced once per consumed chunk, with a running line count in the
//! message. Off by default; `pipeline.show_progress = true` turns it on.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.

use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string().into_bytes();
    let groups: Vec<&str> = digits
        .rchunks(3)
        .rev()
        .filter_map(|group| std::str::from_utf8(group).ok())
        .collect();
    groups.join(",")
}

/// 📊 Bytes fetched and lines reconstructed so far for one object.
pub(crate) struct ProgressMetrics {
    object_name: String,
    bytes_fetched: u64,
    lines_reconstructed: u64,
    bar: ProgressBar,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("object_name", &self.object_name)
            .field("bytes_fetched", &self.bytes_fetched)
            .field("lines_reconstructed", &self.lines_reconstructed)
            .finish_non_exhaustive()
    }
}

impl ProgressMetrics {
    pub(crate) fn new(object_name: String, object_len: u64) -> Self {
        let bar = ProgressBar::new(object_len);
        // 🎨 a bad template is a cosmetic problem, so fall back instead of failing the run
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] {bytes}/{total_bytes} {binary_bytes_per_sec} eta {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_message(format!("🪣 {object_name}"));

        Self {
            object_name,
            bytes_fetched: 0,
            lines_reconstructed: 0,
            bar,
        }
    }

    /// 🔄 Account for one consumed chunk.
    pub(crate) fn chunk_done(&mut self, chunk_bytes: u64, chunk_lines: u64) {
        self.bytes_fetched += chunk_bytes;
        self.lines_reconstructed += chunk_lines;
        self.bar.set_position(self.bytes_fetched);
        self.bar.set_message(format!(
            "🪣 {} | {} lines",
            self.object_name,
            format_number(self.lines_reconstructed)
        ));
    }

    pub(crate) fn finish(&self) {
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_chunks_add_up() {
        let mut progress = ProgressMetrics::new("newbucket/t.txt".into(), 300);
        progress.chunk_done(100, 4);
        progress.chunk_done(100, 5);
        assert_eq!(progress.bytes_fetched, 200);
        assert_eq!(progress.lines_reconstructed, 9);
        progress.finish();
    }
}
