//! Vocal isolation strategy selection
//!
//! Two fallback layers, kept separate:
//! - permanent: the spectral model is unavailable for the session, so the
//!   spectral variant resolves to enhanced when the graph is built;
//! - transient: the model fails on one buffer, so that buffer alone is
//!   processed with the basic algorithm (see [`IsolationStage`]).
//!
//! [`IsolationStage`]: super::IsolationStage

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::warn;

use super::spectral::{FaultLog, SpectralModel, SpectralModelSlot};
use crate::config::VocalIsolationVariant;

/// Variant a spectral request falls back to when the model is unavailable
pub const SPECTRAL_FALLBACK: VocalIsolationVariant = VocalIsolationVariant::Enhanced;

/// Pure selection rule: which variant actually runs
pub fn select(variant: VocalIsolationVariant, spectral_available: bool) -> VocalIsolationVariant {
    match variant {
        VocalIsolationVariant::Spectral if !spectral_available => SPECTRAL_FALLBACK,
        other => other,
    }
}

/// Concrete algorithm for an isolation stage
#[derive(Clone)]
pub enum IsolationAlgorithm {
    Basic,
    Enhanced,
    Spectral(Arc<dyn SpectralModel>),
}

impl IsolationAlgorithm {
    pub fn variant(&self) -> VocalIsolationVariant {
        match self {
            IsolationAlgorithm::Basic => VocalIsolationVariant::Basic,
            IsolationAlgorithm::Enhanced => VocalIsolationVariant::Enhanced,
            IsolationAlgorithm::Spectral(_) => VocalIsolationVariant::Spectral,
        }
    }
}

impl fmt::Debug for IsolationAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationAlgorithm::Basic => write!(f, "Basic"),
            IsolationAlgorithm::Enhanced => write!(f, "Enhanced"),
            IsolationAlgorithm::Spectral(model) => write!(f, "Spectral({})", model.name()),
        }
    }
}

/// Session-wide isolation strategy
///
/// Owns the handle to the spectral model slot and the fault log shared by
/// every isolation stage it hands out. The slot is read once, on the first
/// resolution; that outcome holds for every graph the strategy builds after.
pub struct VocalIsolationStrategy {
    slot: Arc<SpectralModelSlot>,
    faults: Arc<FaultLog>,
    latched: OnceLock<Option<Arc<dyn SpectralModel>>>,
    downgrade_logged: AtomicBool,
}

impl VocalIsolationStrategy {
    pub fn new(slot: Arc<SpectralModelSlot>, faults: Arc<FaultLog>) -> Self {
        Self {
            slot,
            faults,
            latched: OnceLock::new(),
            downgrade_logged: AtomicBool::new(false),
        }
    }

    /// Strategy without a spectral model; spectral requests always downgrade
    pub fn without_spectral() -> Self {
        Self::new(
            Arc::new(SpectralModelSlot::unavailable("no spectral model configured")),
            Arc::new(FaultLog::default()),
        )
    }

    pub fn slot(&self) -> &Arc<SpectralModelSlot> {
        &self.slot
    }

    pub fn faults(&self) -> &Arc<FaultLog> {
        &self.faults
    }

    /// Select against the latched availability of the spectral model.
    ///
    /// A load still pending at the first call counts as unavailable, and a
    /// model that settles later is not picked up by this strategy.
    pub fn resolve(&self, variant: VocalIsolationVariant) -> IsolationAlgorithm {
        let model = self.latched.get_or_init(|| self.slot.model()).clone();
        self.choose(variant, model)
    }

    /// Whether the latched outcome has the spectral model, if latched yet
    pub fn latched_availability(&self) -> Option<bool> {
        self.latched.get().map(Option::is_some)
    }

    /// Select against an explicit availability flag.
    ///
    /// The spectral model is only reached when `available` is true.
    pub fn select(&self, variant: VocalIsolationVariant, available: bool) -> IsolationAlgorithm {
        let model = if available { self.slot.model() } else { None };
        self.choose(variant, model)
    }

    fn choose(
        &self,
        variant: VocalIsolationVariant,
        model: Option<Arc<dyn SpectralModel>>,
    ) -> IsolationAlgorithm {
        let effective = select(variant, model.is_some());

        if effective != variant && !self.downgrade_logged.swap(true, Ordering::Relaxed) {
            warn!(
                requested = %variant,
                using = %effective,
                reason = self.slot.unavailable_reason().unwrap_or("model not loaded"),
                "spectral isolation unavailable, downgrading for this session"
            );
        }

        match (effective, model) {
            (VocalIsolationVariant::Spectral, Some(model)) => IsolationAlgorithm::Spectral(model),
            (VocalIsolationVariant::Basic, _) => IsolationAlgorithm::Basic,
            _ => IsolationAlgorithm::Enhanced,
        }
    }

    /// Report accumulated runtime faults (control domain)
    pub fn flush_faults(&self) -> u64 {
        self.faults.flush()
    }
}

impl fmt::Debug for VocalIsolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VocalIsolationStrategy")
            .field("slot", &self.slot)
            .field("faults", &self.faults)
            .field("latched_availability", &self.latched_availability())
            .finish()
    }
}
