//! Derives percent, throughput, and ETA from raw engine telemetry.

/// Derived progress values for one telemetry tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Completion percentage in `0.0..=100.0`; never decreases within a session.
    pub percent: f64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: u64,
    /// Total bytes; zero while metadata is unknown.
    pub total_bytes: u64,
    /// Current throughput.
    pub bytes_per_second: u64,
    /// Seconds remaining; `None` while throughput is zero.
    pub eta_seconds: Option<f64>,
}

impl ProgressSample {
    /// Whether this is the terminal sample of a session.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.eta_seconds == Some(0.0) && (self.percent - 100.0).abs() < f64::EPSILON
    }
}

/// Per-session tracker; stops producing samples after the terminal one.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_percent: f64,
    last: Option<ProgressSample>,
    finished: bool,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    numerator as f64 / denominator as f64
}

impl ProgressTracker {
    /// Fresh tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sample has been emitted.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Most recent sample, if any.
    #[must_use]
    pub const fn last(&self) -> Option<ProgressSample> {
        self.last
    }

    /// Fold one telemetry tick into a sample.
    ///
    /// Returns `None` once the tracker has finished. Reaching the total
    /// produces the terminal sample (100 %, ETA 0) and finishes the tracker.
    pub fn on_telemetry(
        &mut self,
        downloaded_bytes: u64,
        total_bytes: u64,
        bytes_per_second: u64,
    ) -> Option<ProgressSample> {
        if self.finished {
            return None;
        }
        if total_bytes > 0 && downloaded_bytes >= total_bytes {
            return self.finish(total_bytes, bytes_per_second);
        }

        let raw = if total_bytes > 0 {
            ratio(downloaded_bytes, total_bytes) * 100.0
        } else {
            0.0
        };
        let percent = raw.clamp(0.0, 100.0).max(self.last_percent);
        let eta_seconds = (bytes_per_second > 0)
            .then(|| ratio(total_bytes.saturating_sub(downloaded_bytes), bytes_per_second));

        self.last_percent = percent;
        let sample = ProgressSample {
            percent,
            downloaded_bytes,
            total_bytes,
            bytes_per_second,
            eta_seconds,
        };
        self.last = Some(sample);
        Some(sample)
    }

    /// Emit the terminal sample for a `done` event.
    pub fn complete(&mut self) -> Option<ProgressSample> {
        if self.finished {
            return None;
        }
        let (total, rate) = self
            .last
            .map_or((0, 0), |sample| (sample.total_bytes, sample.bytes_per_second));
        self.finish(total, rate)
    }

    fn finish(&mut self, total_bytes: u64, bytes_per_second: u64) -> Option<ProgressSample> {
        self.finished = true;
        self.last_percent = 100.0;
        let sample = ProgressSample {
            percent: 100.0,
            downloaded_bytes: total_bytes,
            total_bytes,
            bytes_per_second,
            eta_seconds: Some(0.0),
        };
        self.last = Some(sample);
        Some(sample)
    }
}
