//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for decoding dumps and fetching records
#[derive(Debug)]
pub struct ProgressReporter {
    pub decode_pb: Option<ProgressBar>,
    pub fetch_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            decode_pb: None,
            fetch_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            decode_pb: None,
            fetch_pb: None,
            show_progress: false,
        }
    }

    pub fn start_decode(&mut self, message: &str) {
        if self.show_progress {
            self.decode_pb = Some(create_spinner(message));
        }
    }

    pub fn finish_decode(&mut self, message: &str) {
        if let Some(pb) = self.decode_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Start a fetch bar for one table
    pub fn start_fetch(&mut self, table: &str, total: u64) {
        self.finish_fetch("");
        if self.show_progress {
            self.fetch_pb = Some(create_progress_bar(total, table));
        }
    }

    pub fn inc_fetch(&self) {
        if let Some(pb) = &self.fetch_pb {
            pb.inc(1);
        }
    }

    pub fn finish_fetch(&mut self, message: &str) {
        if let Some(pb) = self.fetch_pb.take() {
            if message.is_empty() {
                pb.finish_and_clear();
            } else {
                pb.finish_with_message(message.to_string());
            }
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Ensure all progress bars are cleaned up silently
        if let Some(pb) = self.decode_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.fetch_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({per_sec}) {eta} {msg}",
            )
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
