//! Patch session
//!
//! Wires the pieces together for one settings snapshot: a lifecycle manager
//! for the shared context, a registry that builds graphs from a single
//! isolation strategy, and a scanner fed by document notifications. A
//! settings change means shutting the session down and starting another.

use std::sync::Arc;

use tracing::info;

use crate::config::{AudioConfiguration, EngineOptions, ExtensionSettings};
use crate::engine::{GraphBuilder, InteractionKind, LifecycleManager, ResumeOutcome};
use crate::error::ConfigError;
use crate::isolation::{FaultLog, SpectralModelSlot, VocalIsolationStrategy};
use crate::media::{AttachmentScanner, MediaBindingRegistry, ScanReport};
use crate::platform::{AudioBackend, Document};

struct ActiveSession {
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<MediaBindingRegistry>,
    scanner: Arc<AttachmentScanner>,
}

pub struct PatchSession {
    active: Option<ActiveSession>,
    initial_scan: ScanReport,
}

impl PatchSession {
    /// Start patching `document`.
    ///
    /// With `enabled` off this returns an inert session that ignores every
    /// notification. Otherwise the document is scanned once right away.
    ///
    /// # Arguments
    /// * `settings` - Stored settings document
    /// * `options` - Engine tuning
    /// * `backend` - Factory for the shared rendering context
    /// * `document` - Source of media elements
    /// * `spectral_slot` - Outcome of the spectral model load, possibly still pending
    ///
    /// # Errors
    /// * `ConfigError` - If the settings name an unknown mode or variant
    pub fn start(
        settings: &ExtensionSettings,
        options: &EngineOptions,
        backend: Arc<dyn AudioBackend>,
        document: Arc<dyn Document>,
        spectral_slot: Arc<SpectralModelSlot>,
    ) -> Result<Self, ConfigError> {
        if !settings.enabled {
            info!("stereo patching disabled");
            return Ok(Self {
                active: None,
                initial_scan: ScanReport::default(),
            });
        }

        let config = settings.audio_configuration()?;
        let strategy = Arc::new(VocalIsolationStrategy::new(
            spectral_slot,
            Arc::new(FaultLog::new(options.fault_log_interval())),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(backend));
        let registry = Arc::new(MediaBindingRegistry::new(
            lifecycle.clone(),
            GraphBuilder::new(strategy),
        ));
        let scanner = Arc::new(AttachmentScanner::new(
            document,
            registry.clone(),
            config,
            options.debounce_window(),
        ));

        info!(
            mode = %config.mode,
            vocal_isolation = config.vocal_isolation_enabled,
            variant = %config.vocal_isolation_variant,
            "starting patch session"
        );
        let initial_scan = scanner.scan_now();

        Ok(Self {
            active: Some(ActiveSession {
                lifecycle,
                registry,
                scanner,
            }),
            initial_scan,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn configuration(&self) -> Option<&AudioConfiguration> {
        self.active.as_ref().map(|a| a.scanner.configuration())
    }

    /// Report of the scan run by `start`
    pub fn initial_scan(&self) -> ScanReport {
        self.initial_scan
    }

    pub fn registry(&self) -> Option<&Arc<MediaBindingRegistry>> {
        self.active.as_ref().map(|a| &a.registry)
    }

    pub fn lifecycle(&self) -> Option<&Arc<LifecycleManager>> {
        self.active.as_ref().map(|a| &a.lifecycle)
    }

    pub fn scanner(&self) -> Option<&Arc<AttachmentScanner>> {
        self.active.as_ref().map(|a| &a.scanner)
    }

    /// Document subtree changed
    pub fn on_subtree_changed(&self) {
        if let Some(active) = &self.active {
            active.scanner.on_subtree_changed();
        }
    }

    /// User interaction on the page
    pub fn on_user_interaction(&self, kind: InteractionKind) -> ResumeOutcome {
        match &self.active {
            Some(active) => active.lifecycle.handle_interaction(kind),
            None => ResumeOutcome::Ignored,
        }
    }

    /// Immediate pass over the document, bypassing the debounce
    pub fn scan_now(&self) -> ScanReport {
        self.active
            .as_ref()
            .map(|a| a.scanner.scan_now())
            .unwrap_or_default()
    }

    /// Release bindings whose element left the document or whose context closed
    pub fn prune(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.registry.prune())
    }

    /// Restore every element and close the shared context
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.scanner.cancel_pending();
            let released = active.registry.detach_all();
            active.lifecycle.close();
            info!(released, "patch session shut down");
        }
    }
}

impl Drop for PatchSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchSession")
            .field("active", &self.is_active())
            .field("configuration", &self.configuration())
            .field("bound", &self.registry().map_or(0, |r| r.len()))
            .finish()
    }
}
