use std::time::{Duration, Instant};

/// Wall-clock training progress.
#[derive(Debug)]
pub struct Progress {
    epochs: usize,
    start: Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            epochs: 0,
            start: Instant::now(),
        }
    }
    /// Number of training iterations completed.
    pub fn epoch(&self) -> usize {
        self.epochs
    }
    /// Wall-clock duration since training started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
    pub fn tick(&mut self) {
        self.epochs += 1;
    }
    /// Formats stats as aligned columns with throughput calculation.
    pub fn format(&self) -> String {
        let rate = self.epochs as f64 / self.elapsed().as_secs_f64().max(1e-9);
        format!(
            "{:<16}{:<20}",
            format!("epoch {}", self.epochs),
            format!("it/sec {:.1}", rate),
        )
    }
    pub fn summary(&self) -> String {
        format!("training stopped\n{}", self.format())
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
