//! Media binding registry
//!
//! Enforces at most one binding per element. An attach either produces a
//! fully patched binding (graph connected, volume intercepted) or leaves the
//! element exactly as it found it.
//!
//! A platform capture is permanent: once an element's audio is routed into
//! a context, it stays tied to that context even after the binding is
//! released. Elements whose context closed are therefore refused from then on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::binding::MediaBinding;
use super::volume::InterceptedVolume;
use crate::config::AudioConfiguration;
use crate::dsp::GainControl;
use crate::engine::{GraphBuilder, LifecycleManager};
use crate::error::{AttachError, BindingStatus, CaptureError, LifecycleError};
use crate::platform::{ElementId, MediaElement};

/// Connect attempts per attach; a second one covers a context closed mid-attach
const CONNECT_ATTEMPTS: usize = 2;

/// Why an element is no longer attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// Another audio graph owned the element when we tried to capture it
    CapturedElsewhere,
    /// Our own capture outlived its context
    HeldByClosedContext,
}

impl RefusalReason {
    fn error(self, element: ElementId) -> AttachError {
        match self {
            RefusalReason::CapturedElsewhere => AttachError::SourceAlreadyCaptured { element },
            RefusalReason::HeldByClosedContext => AttachError::HeldByClosedContext { element },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MediaBindingRegistry {
    lifecycle: Arc<LifecycleManager>,
    builder: GraphBuilder,
    bindings: Mutex<HashMap<ElementId, MediaBinding>>,
    /// Elements that cannot be captured; skipped until cleared
    refused: Mutex<HashMap<ElementId, RefusalReason>>,
}

impl MediaBindingRegistry {
    pub fn new(lifecycle: Arc<LifecycleManager>, builder: GraphBuilder) -> Self {
        Self {
            lifecycle,
            builder,
            bindings: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashMap::new()),
        }
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Capture `element` and route it through a graph for `config`.
    ///
    /// Returns the new binding's status. An element that is already bound
    /// yields `AttachError::AlreadyBound` with the existing status and is
    /// otherwise untouched. A binding whose context has closed is released
    /// and the element refused with `AttachError::HeldByClosedContext`.
    pub fn attach(
        &self,
        element: &Arc<dyn MediaElement>,
        config: &AudioConfiguration,
    ) -> Result<BindingStatus, AttachError> {
        let id = element.id();
        let mut bindings = lock(&self.bindings);

        if let Some(existing) = bindings.get(&id) {
            if !existing.context().is_closed() {
                debug!(element = %id, "already bound");
                return Err(AttachError::AlreadyBound(existing.status()));
            }
            bindings.remove(&id);
            self.refuse_closed(id);
            return Err(AttachError::HeldByClosedContext { element: id });
        }

        if let Some(reason) = lock(&self.refused).get(&id).copied() {
            debug!(element = %id, ?reason, "skipping element refused earlier");
            return Err(reason.error(id));
        }

        if element.is_muted() || element.volume() <= 0.0 {
            debug!(element = %id, "skipping muted or silent element");
            return Err(AttachError::SourceMutedOrSilent { element: id });
        }

        let channels = element.channel_count();
        if !matches!(channels, 1 | 2) {
            warn!(element = %id, channels, "unsupported channel layout, leaving element unpatched");
            return Err(AttachError::UnsupportedChannelLayout {
                element: id,
                channels,
            });
        }

        let original_accessor = element.volume_accessor();
        let gain = GainControl::shared(original_accessor.get());

        let mut attempt = 0;
        let handle = loop {
            attempt += 1;
            let handle = self.lifecycle.acquire().map_err(|e| {
                warn!(element = %id, error = %e, "no rendering context");
                AttachError::from(e)
            })?;

            let graph = self
                .builder
                .build(config, gain.clone(), handle.sample_rate());
            let topology = graph.topology();

            match handle.context().connect(element.as_ref(), graph) {
                Ok(()) => {
                    debug!(element = %id, ?topology, "graph connected");
                    break handle;
                }
                Err(CaptureError::AlreadyCaptured) => {
                    warn!(element = %id, "element already captured by another audio graph");
                    lock(&self.refused).insert(id, RefusalReason::CapturedElsewhere);
                    return Err(AttachError::SourceAlreadyCaptured { element: id });
                }
                Err(CaptureError::ContextClosed) if attempt < CONNECT_ATTEMPTS => {
                    debug!(element = %id, "context closed during attach, retrying");
                }
                Err(CaptureError::ContextClosed) => {
                    warn!(element = %id, "context closed during attach");
                    return Err(AttachError::Lifecycle(LifecycleError::ContextCreationFailed {
                        reason: "rendering context closed during attach".to_string(),
                    }));
                }
            }
        };

        element.install_volume_accessor(Arc::new(InterceptedVolume::new(
            original_accessor.clone(),
            gain.clone(),
        )));

        let binding = MediaBinding::new(element, handle.downgrade(), gain, original_accessor);
        let status = binding.status();
        info!(
            element = %id,
            binding = %binding.id(),
            mode = %config.mode,
            isolation = config.vocal_isolation_enabled,
            generation = status.context_generation,
            "patched media element"
        );
        bindings.insert(id, binding);
        Ok(status)
    }

    pub fn is_bound(&self, element: ElementId) -> bool {
        lock(&self.bindings).contains_key(&element)
    }

    pub fn status(&self, element: ElementId) -> Option<BindingStatus> {
        lock(&self.bindings).get(&element).map(|b| b.status())
    }

    /// Gain control of a bound element
    pub fn gain(&self, element: ElementId) -> Option<Arc<GainControl>> {
        lock(&self.bindings).get(&element).map(|b| b.gain().clone())
    }

    pub fn bound_elements(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = lock(&self.bindings).keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        lock(&self.bindings).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.bindings).is_empty()
    }

    pub fn is_refused(&self, element: ElementId) -> bool {
        lock(&self.refused).contains_key(&element)
    }

    pub fn refusal(&self, element: ElementId) -> Option<RefusalReason> {
        lock(&self.refused).get(&element).copied()
    }

    /// Allow a refused element to be tried again
    pub fn clear_refusal(&self, element: ElementId) -> bool {
        lock(&self.refused).remove(&element).is_some()
    }

    fn refuse_closed(&self, element: ElementId) {
        warn!(
            element = %element,
            "element stays captured by a closed rendering context, it will not be patched again"
        );
        lock(&self.refused).insert(element, RefusalReason::HeldByClosedContext);
    }

    /// Release bindings whose element left the document or whose context
    /// closed. Returns how many were released.
    pub fn prune(&self) -> usize {
        let mut bindings = lock(&self.bindings);
        let stale: Vec<ElementId> = bindings
            .iter()
            .filter(|(_, binding)| binding.is_stale())
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            if let Some(binding) = bindings.remove(id) {
                if binding.context().is_closed() {
                    self.refuse_closed(*id);
                }
            }
        }
        let pruned = stale.len();
        if pruned > 0 {
            debug!(pruned, remaining = bindings.len(), "pruned stale bindings");
        }
        pruned
    }

    /// Release every binding, restoring original volume accessors
    pub fn detach_all(&self) -> usize {
        let released: Vec<MediaBinding> = lock(&self.bindings).drain().map(|(_, b)| b).collect();
        let count = released.len();
        drop(released);
        count
    }
}

impl std::fmt::Debug for MediaBindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBindingRegistry")
            .field("bindings", &self.bound_elements())
            .field("refused", &lock(&self.refused).len())
            .finish()
    }
}
