//! Telemetry ingestion and the ammonia anomaly detector.
//!
//! The detector is a counter-shaped state machine over the reading stream:
//! a violating reading extends the streak, any non-violating or missing
//! reading clears it outright, and crossing the alert threshold resets the
//! streak in the same atomic step that raises the alert. Ingestion succeeds
//! once the reading is recorded; alert delivery happens off-path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::notify::{AlertNotifier, AmmoniaAlert};
use crate::storage::{SensorReading, SharedStore};

/// Readings strictly above this ppm count toward the streak.
pub const AMMONIA_THRESHOLD_PPM: f64 = 6.0;
/// Consecutive violations required before an alert fires.
pub const ALERT_COUNT_THRESHOLD: u32 = 4;

/// Process-wide streak of consecutive high readings.
pub struct AnomalyDetector {
    consecutive_high: AtomicU32,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        AnomalyDetector { consecutive_high: AtomicU32::new(0) }
    }

    /// Fold one reading into the streak. Returns true when this reading
    /// crosses the alert threshold; the counter is already reset by then,
    /// so concurrent ingests cannot double-fire one streak.
    pub fn observe(&self, ammonia_ppm: Option<f64>) -> bool {
        match ammonia_ppm {
            Some(ppm) if ppm > AMMONIA_THRESHOLD_PPM => {
                let prev = self
                    .consecutive_high
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        if n + 1 >= ALERT_COUNT_THRESHOLD { Some(0) } else { Some(n + 1) }
                    })
                    .unwrap_or(0);
                prev + 1 >= ALERT_COUNT_THRESHOLD
            }
            _ => {
                // A single good (or absent) reading clears the whole streak.
                self.consecutive_high.store(0, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn current_streak(&self) -> u32 {
        self.consecutive_high.load(Ordering::SeqCst)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Record one reading and, when the streak crosses the threshold, dispatch
/// an alert fire-and-forget. Notifier failure is logged, never raised: data
/// durability is decoupled from notification reliability.
pub fn ingest(
    store: &SharedStore,
    detector: &AnomalyDetector,
    notifier: &Arc<dyn AlertNotifier>,
    reading: SensorReading,
) {
    store.0.write().push_reading(reading.clone());

    if detector.observe(reading.ammonia_ppm) {
        if let Some(ppm) = reading.ammonia_ppm {
            let alert = AmmoniaAlert {
                ammonia_ppm: ppm,
                temperature: reading.temperature,
                humidity: reading.humidity,
                timestamp: reading.timestamp,
            };
            let notifier = notifier.clone();
            tokio::spawn(async move {
                match notifier.send_alert(&alert).await {
                    Ok(()) => info!(ammonia_ppm = alert.ammonia_ppm, "ammonia alert dispatched"),
                    Err(e) => warn!("ammonia alert dispatch failed: {e:#}"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_good_reading_clears_the_streak() {
        let det = AnomalyDetector::new();
        for expected in [1, 2, 3] {
            assert!(!det.observe(Some(7.0)));
            assert_eq!(det.current_streak(), expected);
        }
        // Threshold is exclusive: exactly 6.0 does not violate.
        assert!(!det.observe(Some(6.0)));
        assert_eq!(det.current_streak(), 0);
    }

    #[test]
    fn alert_fires_on_fourth_violation_and_resets() {
        let det = AnomalyDetector::new();
        assert!(!det.observe(Some(7.0)));
        assert!(!det.observe(Some(8.5)));
        assert!(!det.observe(Some(9.0)));
        assert!(det.observe(Some(7.2)));
        assert_eq!(det.current_streak(), 0);
        // The next streak starts from scratch.
        assert!(!det.observe(Some(7.0)));
        assert_eq!(det.current_streak(), 1);
    }

    #[test]
    fn missing_ammonia_counts_as_non_violating() {
        let det = AnomalyDetector::new();
        det.observe(Some(7.0));
        det.observe(Some(7.0));
        assert!(!det.observe(None));
        assert_eq!(det.current_streak(), 0);
    }
}
