//! Spectral isolation model
//!
//! The spectral variant depends on a model that is loaded asynchronously and
//! may never become available. [`SpectralModelSlot`] records the outcome of
//! that load exactly once; [`FaultLog`] collects per-buffer runtime faults
//! from the render thread and reports them from the control domain.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::dsp::signal::vocal_spectral;
use crate::error::ProcessingError;

// ============================================================================
// Model Trait
// ============================================================================

/// A vocal estimator working on whole buffers
///
/// Called from the render thread: implementations must be bounded in time
/// and must not block. Returning an error makes the caller fall back to the
/// basic algorithm for that buffer only.
pub trait SpectralModel: Send + Sync {
    fn name(&self) -> &str;

    /// Write one vocal sample per input frame into `out`.
    ///
    /// `left`, `right` and `out` have the same length.
    fn isolate(
        &self,
        left: &[f32],
        right: &[f32],
        out: &mut [f32],
    ) -> Result<(), ProcessingError>;
}

/// Built-in reference model: weighted difference plus a trace of the average
#[derive(Debug, Clone, Copy, Default)]
pub struct MidSideModel;

impl SpectralModel for MidSideModel {
    fn name(&self) -> &str {
        "mid-side"
    }

    fn isolate(
        &self,
        left: &[f32],
        right: &[f32],
        out: &mut [f32],
    ) -> Result<(), ProcessingError> {
        for ((o, &l), &r) in out.iter_mut().zip(left).zip(right) {
            *o = vocal_spectral(l, r).left;
        }
        Ok(())
    }
}

// ============================================================================
// Model Slot
// ============================================================================

enum SlotState {
    Ready(Arc<dyn SpectralModel>),
    Unavailable(String),
}

/// Write-once holder for the outcome of the spectral model load
#[derive(Default)]
pub struct SpectralModelSlot {
    state: OnceLock<SlotState>,
}

impl SpectralModelSlot {
    /// A slot whose load has not completed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already holds a model
    pub fn ready(model: Arc<dyn SpectralModel>) -> Self {
        let slot = Self::new();
        slot.resolve(Ok(model));
        slot
    }

    /// A slot whose load already failed
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let slot = Self::new();
        slot.resolve(Err(ProcessingError::SpectralUnavailable {
            reason: reason.into(),
        }));
        slot
    }

    /// Record the load outcome. Only the first call has any effect;
    /// returns whether this call settled the slot.
    pub fn resolve(&self, outcome: Result<Arc<dyn SpectralModel>, ProcessingError>) -> bool {
        let state = match outcome {
            Ok(model) => SlotState::Ready(model),
            Err(e) => SlotState::Unavailable(e.to_string()),
        };
        let settled = self.state.set(state).is_ok();
        if settled {
            match self.state.get() {
                Some(SlotState::Ready(model)) => {
                    info!(model = model.name(), "spectral model loaded")
                }
                Some(SlotState::Unavailable(reason)) => {
                    warn!(%reason, "spectral model unavailable")
                }
                None => {}
            }
        }
        settled
    }

    /// Run an asynchronous load, bounded by `timeout`, and record the outcome.
    ///
    /// A timeout counts as unavailability for the rest of the session.
    pub async fn load_with<F>(&self, timeout: Duration, load: F) -> bool
    where
        F: Future<Output = Result<Arc<dyn SpectralModel>, ProcessingError>>,
    {
        let outcome = match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(ProcessingError::SpectralUnavailable {
                reason: format!("load timed out after {} ms", timeout.as_millis()),
            }),
        };
        self.resolve(outcome);
        self.is_available()
    }

    pub fn is_settled(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state.get(), Some(SlotState::Ready(_)))
    }

    pub fn model(&self) -> Option<Arc<dyn SpectralModel>> {
        match self.state.get() {
            Some(SlotState::Ready(model)) => Some(model.clone()),
            _ => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self.state.get() {
            Some(SlotState::Unavailable(reason)) => Some(reason.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for SpectralModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.get() {
            None => "pending".to_string(),
            Some(SlotState::Ready(model)) => format!("ready({})", model.name()),
            Some(SlotState::Unavailable(reason)) => format!("unavailable({reason})"),
        };
        f.debug_struct("SpectralModelSlot")
            .field("state", &state)
            .finish()
    }
}

// ============================================================================
// Fault Log
// ============================================================================

/// Throttled reporting of per-buffer spectral faults.
///
/// `record` is the only method the render thread calls and touches nothing
/// but atomics. `flush` runs in the control domain.
#[derive(Debug)]
pub struct FaultLog {
    pending: AtomicU64,
    total: AtomicU64,
    interval: Duration,
    last_report: Mutex<Option<Instant>>,
}

impl FaultLog {
    pub fn new(interval: Duration) -> Self {
        Self {
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
            interval,
            last_report: Mutex::new(None),
        }
    }

    #[inline]
    pub fn record(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Log accumulated faults unless a report went out within the interval.
    ///
    /// Returns the number of faults reported by this call.
    pub fn flush(&self) -> u64 {
        if self.pending() == 0 {
            return 0;
        }
        let mut last = self
            .last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if matches!(*last, Some(at) if now.duration_since(at) < self.interval) {
            return 0;
        }
        let count = self.pending.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn!(
                faults = count,
                total = self.total(),
                "spectral isolation faulted; affected buffers used basic isolation"
            );
            *last = Some(now);
        }
        count
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_FAULT_LOG_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mid_side_model_matches_reference() {
        let left = [0.6, 1.0, 0.0];
        let right = [0.4, -1.0, 0.0];
        let mut out = [9.0; 3];

        MidSideModel.isolate(&left, &right, &mut out).unwrap();

        assert_relative_eq!(out[0], 0.55, epsilon = 1e-6);
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn test_slot_first_outcome_wins() {
        let slot = SpectralModelSlot::new();
        assert!(!slot.is_settled());
        assert!(!slot.is_available());

        assert!(slot.resolve(Err(ProcessingError::SpectralUnavailable {
            reason: "no wasm".to_string()
        })));
        assert!(!slot.resolve(Ok(Arc::new(MidSideModel))));

        assert!(!slot.is_available());
        assert!(slot.model().is_none());
        assert!(slot.unavailable_reason().unwrap().contains("no wasm"));
    }

    #[tokio::test]
    async fn test_load_with_success() {
        let slot = SpectralModelSlot::new();
        let available = slot
            .load_with(Duration::from_secs(1), async {
                Ok(Arc::new(MidSideModel) as Arc<dyn SpectralModel>)
            })
            .await;

        assert!(available);
        assert_eq!(slot.model().unwrap().name(), "mid-side");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_with_timeout_marks_unavailable() {
        let slot = SpectralModelSlot::new();
        let available = slot
            .load_with(Duration::from_millis(50), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Arc::new(MidSideModel) as Arc<dyn SpectralModel>)
            })
            .await;

        assert!(!available);
        assert!(slot.is_settled());
        assert!(slot.unavailable_reason().unwrap().contains("timed out"));
    }

    #[test]
    fn test_fault_log_throttles() {
        let log = FaultLog::new(Duration::from_secs(3600));
        assert_eq!(log.flush(), 0);

        log.record();
        log.record();
        assert_eq!(log.flush(), 2);

        // Within the interval nothing is reported, but nothing is lost
        log.record();
        assert_eq!(log.flush(), 0);
        assert_eq!(log.pending(), 1);
        assert_eq!(log.total(), 3);
    }

    #[test]
    fn test_fault_log_zero_interval_reports_every_flush() {
        let log = FaultLog::new(Duration::ZERO);
        log.record();
        assert_eq!(log.flush(), 1);
        log.record();
        assert_eq!(log.flush(), 1);
    }
}
