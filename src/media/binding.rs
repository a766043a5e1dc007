//! Media binding
//!
//! One binding per captured element. The binding owns the element's gain
//! control and remembers the accessor it replaced; dropping it puts the
//! original accessor back and disconnects the element's graph.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::dsp::GainControl;
use crate::engine::WeakContextHandle;
use crate::error::BindingStatus;
use crate::platform::{ElementId, MediaElement, VolumeProperty};

/// Unique identifier for a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub Uuid);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct MediaBinding {
    id: BindingId,
    element: ElementId,
    source: Weak<dyn MediaElement>,
    original_volume: f32,
    context: WeakContextHandle,
    gain: Arc<GainControl>,
    original_accessor: Arc<dyn VolumeProperty>,
}

impl MediaBinding {
    /// Record a completed attach.
    ///
    /// # Arguments
    /// * `source` - The captured element
    /// * `context` - Context the element's graph was connected to
    /// * `gain` - Gain control shared with the element's graph
    /// * `original_accessor` - Accessor that was in place before interception
    pub(crate) fn new(
        source: &Arc<dyn MediaElement>,
        context: WeakContextHandle,
        gain: Arc<GainControl>,
        original_accessor: Arc<dyn VolumeProperty>,
    ) -> Self {
        Self {
            id: BindingId::new(),
            element: source.id(),
            source: Arc::downgrade(source),
            original_volume: original_accessor.get(),
            context,
            gain,
            original_accessor,
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// The element still plays through our graph: it is in the document
    /// and its context is open
    pub fn is_patched(&self) -> bool {
        !self.is_stale()
    }

    /// Volume the element had when it was captured
    pub fn original_volume(&self) -> f32 {
        self.original_volume
    }

    pub fn gain(&self) -> &Arc<GainControl> {
        &self.gain
    }

    pub fn context(&self) -> &WeakContextHandle {
        &self.context
    }

    pub fn status(&self) -> BindingStatus {
        BindingStatus {
            element: self.element,
            patched: self.is_patched(),
            context_generation: self.context.generation(),
        }
    }

    /// The element is gone from the document or its context has closed
    pub fn is_stale(&self) -> bool {
        let detached = self
            .source
            .upgrade()
            .map_or(true, |source| !source.is_connected());
        detached || self.context.is_closed()
    }
}

impl Drop for MediaBinding {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.install_volume_accessor(self.original_accessor.clone());
        }
        if let Some(context) = self.context.upgrade() {
            context.context().disconnect(self.element);
        }
        debug!(element = %self.element, binding = %self.id, "released binding");
    }
}

impl fmt::Debug for MediaBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBinding")
            .field("id", &self.id)
            .field("element", &self.element)
            .field("patched", &self.is_patched())
            .field("original_volume", &self.original_volume)
            .field("context", &self.context)
            .field("gain", &self.gain.get())
            .finish()
    }
}
