//! Attachment scanner
//!
//! Subtree change notifications arrive in bursts. Each one cancels the
//! pending rescan and arms a new one, so a burst collapses into a single
//! pass over the document once it has been quiet for the debounce window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::registry::MediaBindingRegistry;
use crate::config::AudioConfiguration;
use crate::error::AttachError;
use crate::platform::Document;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Debouncer
// ============================================================================

/// Cancel-and-rearm timer for a single deferred task
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    /// Tasks run immediately for lack of a runtime
    undebounced: AtomicU64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
            undebounced: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `task` once the window elapses without another call.
    ///
    /// Outside a tokio runtime there is no timer to arm and the task runs
    /// immediately. Returns whether the task was deferred.
    pub fn schedule<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            let runs = self.undebounced.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(runs, "no tokio runtime, running task without debounce");
            self.cancel();
            task();
            return false;
        };

        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let window = self.window;
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(window).await;
            task();
        }));
        true
    }

    /// Drop the pending task, if any
    pub fn cancel(&self) {
        if let Some(previous) = lock(&self.pending).take() {
            previous.abort();
        }
    }

    /// How many tasks ran immediately because no runtime was available
    pub fn undebounced_runs(&self) -> u64 {
        self.undebounced.load(Ordering::Relaxed)
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Outcome counts of one pass over the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub candidates: usize,
    pub attached: usize,
    /// Muted or silent, may attach on a later pass
    pub skipped: usize,
    pub refused: usize,
    pub failed: usize,
    pub pruned: usize,
}

pub struct AttachmentScanner {
    document: Arc<dyn Document>,
    registry: Arc<MediaBindingRegistry>,
    config: AudioConfiguration,
    debouncer: Debouncer,
    scans: AtomicU64,
}

impl AttachmentScanner {
    pub fn new(
        document: Arc<dyn Document>,
        registry: Arc<MediaBindingRegistry>,
        config: AudioConfiguration,
        debounce: Duration,
    ) -> Self {
        Self {
            document,
            registry,
            config,
            debouncer: Debouncer::new(debounce),
            scans: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<MediaBindingRegistry> {
        &self.registry
    }

    pub fn configuration(&self) -> &AudioConfiguration {
        &self.config
    }

    /// Completed passes since creation
    pub fn scans_completed(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn is_rescan_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Subtree change notification: (re)arm the debounced rescan
    pub fn on_subtree_changed(self: &Arc<Self>) {
        let scanner = Arc::downgrade(self);
        let deferred = self.debouncer.schedule(move || {
            if let Some(scanner) = scanner.upgrade() {
                scanner.scan_now();
            }
        });
        if deferred {
            debug!(window_ms = self.debouncer.window().as_millis() as u64, "rescan scheduled");
        }
    }

    /// Drop any pending rescan
    pub fn cancel_pending(&self) {
        self.debouncer.cancel();
    }

    /// Attach every unbound, connected media element in the document
    pub fn scan_now(&self) -> ScanReport {
        let mut report = ScanReport {
            pruned: self.registry.prune(),
            ..ScanReport::default()
        };

        for element in self.document.media_elements() {
            let id = element.id();
            if !element.is_connected() || self.registry.is_bound(id) || self.registry.is_refused(id)
            {
                continue;
            }
            report.candidates += 1;

            match self.registry.attach(&element, &self.config) {
                Ok(_) => report.attached += 1,
                Err(AttachError::SourceMutedOrSilent { .. }) => report.skipped += 1,
                Err(AttachError::AlreadyBound(_)) => {}
                Err(AttachError::SourceAlreadyCaptured { .. })
                | Err(AttachError::HeldByClosedContext { .. }) => report.refused += 1,
                Err(_) => report.failed += 1,
            }
        }

        // Control-domain housekeeping rides along with each pass
        self.registry.lifecycle().watch_suspension();
        self.registry.builder().strategy().flush_faults();

        self.scans.fetch_add(1, Ordering::SeqCst);
        if report.attached > 0 || report.refused > 0 || report.failed > 0 {
            info!(
                attached = report.attached,
                skipped = report.skipped,
                refused = report.refused,
                failed = report.failed,
                bound = self.registry.len(),
                "scan complete"
            );
        } else {
            debug!(?report, "scan complete");
        }
        report
    }
}

impl std::fmt::Debug for AttachmentScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentScanner")
            .field("config", &self.config)
            .field("scans", &self.scans_completed())
            .field("rescan_pending", &self.is_rescan_pending())
            .finish()
    }
}
