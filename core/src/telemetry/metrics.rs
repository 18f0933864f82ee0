use serde::Serialize;
use std::sync::Mutex;

/// Process-wide relay counters.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_received: usize,
    pub points_stored: usize,
    pub parse_failures: usize,
    pub unknown_messages: usize,
    pub observers_dropped: usize,
    pub clears: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_frame(&self, stored: usize) {
        self.update(|m| {
            m.frames_received += 1;
            m.points_stored += stored;
        });
    }

    pub fn record_parse_failure(&self) {
        self.update(|m| m.parse_failures += 1);
    }

    pub fn record_unknown(&self) {
        self.update(|m| m.unknown_messages += 1);
    }

    pub fn record_dropped_observer(&self) {
        self.update(|m| m.observers_dropped += 1);
    }

    pub fn record_clear(&self) {
        self.update(|m| m.clears += 1);
    }

    pub fn record_error(&self) {
        self.update(|m| m.errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
