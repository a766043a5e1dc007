//! Mock platform implementation
//!
//! An in-process stand-in for a browser audio stack. Contexts keep their
//! connected graphs in a map and render buffers on demand, so the full
//! attach → render → teardown path can be exercised without a device.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AudioBackend, ContextState, Document, ElementId, MediaElement, RenderingContext,
    VolumeProperty,
};
use crate::engine::{RenderGraph, StereoBuffer};
use crate::error::{CaptureError, LifecycleError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Media Elements
// ============================================================================

/// The element's own volume storage (what the platform setter writes)
#[derive(Debug)]
pub struct NativeVolume {
    value: Mutex<f32>,
}

impl NativeVolume {
    pub fn new(value: f32) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }
}

impl VolumeProperty for NativeVolume {
    fn get(&self) -> f32 {
        *lock(&self.value)
    }

    fn set(&self, value: f32) {
        *lock(&self.value) = value.clamp(0.0, 1.0);
    }
}

/// Scriptable media element
pub struct MockMediaElement {
    id: ElementId,
    muted: AtomicBool,
    connected: AtomicBool,
    channels: u16,
    native: Arc<NativeVolume>,
    accessor: Mutex<Arc<dyn VolumeProperty>>,
}

impl MockMediaElement {
    /// Stereo element at full volume
    pub fn new(id: u64) -> Self {
        Self::with_channels(id, 2)
    }

    pub fn with_channels(id: u64, channels: u16) -> Self {
        let native = Arc::new(NativeVolume::new(1.0));
        Self {
            id: ElementId(id),
            muted: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            channels,
            accessor: Mutex::new(native.clone()),
            native,
        }
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    /// Value held by the platform, bypassing any installed accessor
    pub fn native_volume(&self) -> f32 {
        self.native.get()
    }

    /// Whether the current accessor is the element's own
    pub fn has_native_accessor(&self) -> bool {
        let current = Arc::as_ptr(&*lock(&self.accessor)) as *const ();
        current == Arc::as_ptr(&self.native) as *const ()
    }

    pub(crate) fn detach_from_document(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl MediaElement for MockMediaElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn volume_accessor(&self) -> Arc<dyn VolumeProperty> {
        lock(&self.accessor).clone()
    }

    fn install_volume_accessor(&self, accessor: Arc<dyn VolumeProperty>) {
        *lock(&self.accessor) = accessor;
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Default)]
pub struct MockDocument {
    elements: Mutex<Vec<Arc<MockMediaElement>>>,
}

impl MockDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, element: Arc<MockMediaElement>) {
        lock(&self.elements).push(element);
    }

    /// Remove an element from the tree; held references see it disconnected
    pub fn remove(&self, id: ElementId) {
        let mut elements = lock(&self.elements);
        if let Some(pos) = elements.iter().position(|e| e.id() == id) {
            let element = elements.remove(pos);
            element.detach_from_document();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.elements).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.elements).is_empty()
    }
}

impl Document for MockDocument {
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>> {
        lock(&self.elements)
            .iter()
            .map(|e| e.clone() as Arc<dyn MediaElement>)
            .collect()
    }
}

// ============================================================================
// Rendering Contexts
// ============================================================================

/// Capture bookkeeping shared by every context of one backend
#[derive(Default)]
struct CaptureTable {
    captured: Mutex<HashSet<ElementId>>,
}

pub struct MockContext {
    serial: u64,
    sample_rate: u32,
    state: Mutex<ContextState>,
    graphs: Mutex<HashMap<ElementId, RenderGraph>>,
    captures: Arc<CaptureTable>,
    failing_resumes: Arc<AtomicUsize>,
    resume_calls: AtomicUsize,
}

impl MockContext {
    /// Creation order of this context within its backend (1-based)
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Simulate the platform suspending the context (tab hidden, policy)
    pub fn suspend(&self) {
        let mut state = lock(&self.state);
        if *state == ContextState::Running {
            *state = ContextState::Suspended;
        }
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    pub fn connected_elements(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = lock(&self.graphs).keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn topology_of(&self, element: ElementId) -> Option<Vec<crate::engine::StageKind>> {
        lock(&self.graphs).get(&element).map(|g| g.topology())
    }

    /// Run one callback's worth of audio through an element's graph.
    ///
    /// Returns false (leaving the buffers untouched) when the context is
    /// not running or the element has no graph.
    pub fn render(&self, element: ElementId, left: &mut [f32], right: &mut [f32]) -> bool {
        if *lock(&self.state) != ContextState::Running {
            return false;
        }
        match lock(&self.graphs).get_mut(&element) {
            Some(graph) => {
                graph.render(left, right);
                true
            }
            None => false,
        }
    }

    /// Render a whole buffer, returning the processed copy
    pub fn process(&self, element: ElementId, input: &StereoBuffer) -> Option<StereoBuffer> {
        let mut output = input.clone();
        let (left, right) = output.channels_mut();
        if self.render(element, left, right) {
            Some(output)
        } else {
            None
        }
    }
}

impl RenderingContext for MockContext {
    fn state(&self) -> ContextState {
        *lock(&self.state)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if *state == ContextState::Closed {
            return Err(LifecycleError::ResumeFailed {
                reason: "context is closed".to_string(),
            });
        }
        let pending = self.failing_resumes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_resumes.store(pending - 1, Ordering::SeqCst);
            return Err(LifecycleError::ResumeFailed {
                reason: "not allowed to start".to_string(),
            });
        }
        *state = ContextState::Running;
        Ok(())
    }

    fn close(&self) {
        *lock(&self.state) = ContextState::Closed;
        lock(&self.graphs).clear();
    }

    fn connect(&self, element: &dyn MediaElement, graph: RenderGraph) -> Result<(), CaptureError> {
        if *lock(&self.state) == ContextState::Closed {
            return Err(CaptureError::ContextClosed);
        }
        if !lock(&self.captures.captured).insert(element.id()) {
            return Err(CaptureError::AlreadyCaptured);
        }
        lock(&self.graphs).insert(element.id(), graph);
        Ok(())
    }

    fn disconnect(&self, element: ElementId) {
        lock(&self.graphs).remove(&element);
    }
}

// ============================================================================
// Backend
// ============================================================================

pub struct MockBackend {
    sample_rate: u32,
    start_suspended: AtomicBool,
    fail_creation: AtomicBool,
    failing_resumes: Arc<AtomicUsize>,
    created: AtomicU64,
    captures: Arc<CaptureTable>,
    contexts: Mutex<Vec<Arc<MockContext>>>,
}

impl MockBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            start_suspended: AtomicBool::new(false),
            fail_creation: AtomicBool::new(false),
            failing_resumes: Arc::new(AtomicUsize::new(0)),
            created: AtomicU64::new(0),
            captures: Arc::new(CaptureTable::default()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// New contexts start suspended, as under an autoplay policy
    pub fn set_start_suspended(&self, suspended: bool) {
        self.start_suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn set_fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` resume calls fail, across all contexts
    pub fn fail_next_resumes(&self, count: usize) {
        self.failing_resumes.store(count, Ordering::SeqCst);
    }

    /// Pretend some other graph already captured this element
    pub fn capture_elsewhere(&self, element: ElementId) {
        lock(&self.captures.captured).insert(element);
    }

    pub fn contexts_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn latest_context(&self) -> Option<Arc<MockContext>> {
        lock(&self.contexts).last().cloned()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(48000)
    }
}

impl AudioBackend for MockBackend {
    fn create_context(&self) -> Result<Arc<dyn RenderingContext>, LifecycleError> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(LifecycleError::ContextCreationFailed {
                reason: "audio output unavailable".to_string(),
            });
        }
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let state = if self.start_suspended.load(Ordering::SeqCst) {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        let context = Arc::new(MockContext {
            serial,
            sample_rate: self.sample_rate,
            state: Mutex::new(state),
            graphs: Mutex::new(HashMap::new()),
            captures: self.captures.clone(),
            failing_resumes: self.failing_resumes.clone(),
            resume_calls: AtomicUsize::new(0),
        });
        lock(&self.contexts).push(context.clone());
        Ok(context)
    }
}
