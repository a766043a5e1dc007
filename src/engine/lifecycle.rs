//! Rendering context lifecycle
//!
//! One rendering context is shared by every binding. The manager creates it
//! lazily, recreates it after it has been closed, and resumes it on the
//! first qualifying user gesture after a suspension.
//!
//! ```text
//! Uninitialized -> Active <-> Suspended
//!                    |           |
//!                    +-> Closed <+      (next acquire starts over)
//! ```
//!
//! All transitions are serialized behind one lock. The render thread never
//! touches the manager.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LifecycleError;
use crate::platform::{AudioBackend, ContextState, RenderingContext};

// ============================================================================
// States and Events
// ============================================================================

/// Lifecycle state as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Active,
    Suspended,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "Uninitialized"),
            LifecycleState::Active => write!(f, "Active"),
            LifecycleState::Suspended => write!(f, "Suspended"),
            LifecycleState::Closed => write!(f, "Closed"),
        }
    }
}

impl From<ContextState> for LifecycleState {
    fn from(state: ContextState) -> Self {
        match state {
            ContextState::Running => LifecycleState::Active,
            ContextState::Suspended => LifecycleState::Suspended,
            ContextState::Closed => LifecycleState::Closed,
        }
    }
}

/// User interaction events forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    PointerDown,
    KeyDown,
    TouchStart,
    PointerMove,
    Scroll,
}

impl InteractionKind {
    /// Whether the platform treats this event as a user activation
    pub fn qualifies(&self) -> bool {
        matches!(
            self,
            InteractionKind::PointerDown | InteractionKind::KeyDown | InteractionKind::TouchStart
        )
    }
}

/// What a forwarded interaction did
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// No resume listener was pending, or the event does not qualify
    Ignored,
    Resumed,
    /// Resume failed; the listener is armed again for the next gesture
    Failed(LifecycleError),
}

// ============================================================================
// Context Handles
// ============================================================================

/// Strong handle to the shared context, tagged with its generation
#[derive(Clone)]
pub struct RenderingContextHandle {
    context: Arc<dyn RenderingContext>,
    generation: u64,
}

impl RenderingContextHandle {
    pub fn context(&self) -> &Arc<dyn RenderingContext> {
        &self.context
    }

    /// Incremented each time the manager creates a context
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> LifecycleState {
        self.context.state().into()
    }

    pub fn sample_rate(&self) -> u32 {
        self.context.sample_rate()
    }

    pub fn downgrade(&self) -> WeakContextHandle {
        WeakContextHandle {
            context: Arc::downgrade(&self.context),
            generation: self.generation,
        }
    }
}

impl fmt::Debug for RenderingContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderingContextHandle")
            .field("generation", &self.generation)
            .field("state", &self.context.state())
            .finish()
    }
}

/// Non-owning handle held by bindings
#[derive(Clone)]
pub struct WeakContextHandle {
    context: Weak<dyn RenderingContext>,
    generation: u64,
}

impl WeakContextHandle {
    pub fn upgrade(&self) -> Option<RenderingContextHandle> {
        self.context.upgrade().map(|context| RenderingContextHandle {
            context,
            generation: self.generation,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the context is closed or dropped
    pub fn is_closed(&self) -> bool {
        self.upgrade()
            .map_or(true, |h| h.state() == LifecycleState::Closed)
    }
}

impl fmt::Debug for WeakContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContextHandle")
            .field("generation", &self.generation)
            .finish()
    }
}

// ============================================================================
// Lifecycle Manager
// ============================================================================

#[derive(Default)]
struct LifecycleInner {
    current: Option<RenderingContextHandle>,
    generation: u64,
    /// The single-shot resume listener is attached
    resume_pending: bool,
}

impl LifecycleInner {
    fn state(&self) -> LifecycleState {
        self.current
            .as_ref()
            .map_or(LifecycleState::Uninitialized, |h| h.state())
    }

    /// Attach the resume listener if the context is suspended and none is pending
    fn arm_if_suspended(&mut self) -> bool {
        if self.state() == LifecycleState::Suspended && !self.resume_pending {
            self.resume_pending = true;
            debug!(generation = self.generation, "rendering context suspended, waiting for a user gesture");
            true
        } else {
            false
        }
    }
}

/// Owner of the shared rendering context
pub struct LifecycleManager {
    backend: Arc<dyn AudioBackend>,
    inner: Mutex<LifecycleInner>,
}

impl LifecycleManager {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(LifecycleInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current context, creating one if there is none or the last was closed
    pub fn acquire(&self) -> Result<RenderingContextHandle, LifecycleError> {
        let mut inner = self.lock();

        if let Some(handle) = &inner.current {
            if handle.state() != LifecycleState::Closed {
                let handle = handle.clone();
                inner.arm_if_suspended();
                return Ok(handle);
            }
        }

        let context = self.backend.create_context()?;
        inner.generation += 1;
        inner.resume_pending = false;
        let handle = RenderingContextHandle {
            context,
            generation: inner.generation,
        };
        info!(
            generation = handle.generation,
            sample_rate = handle.sample_rate(),
            state = %handle.state(),
            "created rendering context"
        );
        inner.current = Some(handle.clone());
        inner.arm_if_suspended();
        Ok(handle)
    }

    /// Current context without creating one
    pub fn current(&self) -> Option<RenderingContextHandle> {
        self.lock().current.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_resume_pending(&self) -> bool {
        self.lock().resume_pending
    }

    /// Re-check the platform state and arm the resume listener if the
    /// context has been suspended since the last check.
    ///
    /// Returns whether a listener was attached by this call.
    pub fn watch_suspension(&self) -> bool {
        self.lock().arm_if_suspended()
    }

    /// Forward a user interaction event.
    ///
    /// The pending listener detaches on the first qualifying event. A failed
    /// resume is logged and the listener is re-attached so the next gesture
    /// retries.
    pub fn handle_interaction(&self, kind: InteractionKind) -> ResumeOutcome {
        if !kind.qualifies() {
            return ResumeOutcome::Ignored;
        }

        let mut inner = self.lock();
        if !inner.resume_pending {
            return ResumeOutcome::Ignored;
        }
        inner.resume_pending = false;

        let Some(handle) = inner.current.clone() else {
            return ResumeOutcome::Ignored;
        };
        if handle.state() != LifecycleState::Suspended {
            return ResumeOutcome::Ignored;
        }

        match handle.context().resume() {
            Ok(()) => {
                info!(generation = handle.generation(), ?kind, "rendering context resumed");
                ResumeOutcome::Resumed
            }
            Err(e) => {
                warn!(generation = handle.generation(), error = %e, "resume failed, will retry on next interaction");
                inner.resume_pending = true;
                ResumeOutcome::Failed(e)
            }
        }
    }

    /// Close the shared context. Terminal for that context; the next
    /// `acquire` creates a fresh one.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.resume_pending = false;
        if let Some(handle) = &inner.current {
            if handle.state() != LifecycleState::Closed {
                handle.context().close();
                info!(generation = handle.generation(), "closed rendering context");
            }
        }
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LifecycleManager")
            .field("state", &inner.state())
            .field("generation", &inner.generation)
            .field("resume_pending", &inner.resume_pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockBackend;

    fn manager(backend: &Arc<MockBackend>) -> LifecycleManager {
        LifecycleManager::new(backend.clone())
    }

    #[test]
    fn test_lazy_creation() {
        let backend = Arc::new(MockBackend::default());
        let manager = manager(&backend);
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
        assert_eq!(backend.contexts_created(), 0);

        let first = manager.acquire().unwrap();
        let second = manager.acquire().unwrap();

        assert_eq!(backend.contexts_created(), 1);
        assert_eq!(first.generation(), second.generation());
        assert_eq!(manager.state(), LifecycleState::Active);
    }

    #[test]
    fn test_closed_context_is_recreated() {
        let backend = Arc::new(MockBackend::default());
        let manager = manager(&backend);
        let first = manager.acquire().unwrap();
        let weak = first.downgrade();

        manager.close();
        assert_eq!(manager.state(), LifecycleState::Closed);
        assert!(weak.is_closed());

        let second = manager.acquire().unwrap();
        assert_eq!(backend.contexts_created(), 2);
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(manager.state(), LifecycleState::Active);
    }

    #[test]
    fn test_suspended_context_resumes_on_gesture() {
        let backend = Arc::new(MockBackend::default());
        backend.set_start_suspended(true);
        let manager = manager(&backend);

        manager.acquire().unwrap();
        assert_eq!(manager.state(), LifecycleState::Suspended);
        assert!(manager.is_resume_pending());

        assert_eq!(
            manager.handle_interaction(InteractionKind::PointerMove),
            ResumeOutcome::Ignored
        );
        assert_eq!(
            manager.handle_interaction(InteractionKind::KeyDown),
            ResumeOutcome::Resumed
        );
        assert_eq!(manager.state(), LifecycleState::Active);
        assert!(!manager.is_resume_pending());

        // Listener detached: later gestures do nothing
        assert_eq!(
            manager.handle_interaction(InteractionKind::PointerDown),
            ResumeOutcome::Ignored
        );
        assert_eq!(backend.latest_context().unwrap().resume_calls(), 1);
    }

    #[test]
    fn test_failed_resume_retries_on_next_gesture() {
        let backend = Arc::new(MockBackend::default());
        backend.set_start_suspended(true);
        backend.fail_next_resumes(1);
        let manager = manager(&backend);
        manager.acquire().unwrap();

        let outcome = manager.handle_interaction(InteractionKind::TouchStart);
        assert!(matches!(outcome, ResumeOutcome::Failed(LifecycleError::ResumeFailed { .. })));
        assert!(manager.is_resume_pending());
        assert_eq!(manager.state(), LifecycleState::Suspended);

        assert_eq!(
            manager.handle_interaction(InteractionKind::PointerDown),
            ResumeOutcome::Resumed
        );
    }

    #[test]
    fn test_listener_attached_once_per_suspension() {
        let backend = Arc::new(MockBackend::default());
        let manager = manager(&backend);
        manager.acquire().unwrap();
        assert!(!manager.watch_suspension());

        let context = backend.latest_context().unwrap();
        context.suspend();
        assert!(manager.watch_suspension());
        // Already pending: no second listener
        assert!(!manager.watch_suspension());
        manager.acquire().unwrap();
        assert!(manager.is_resume_pending());

        assert_eq!(
            manager.handle_interaction(InteractionKind::PointerDown),
            ResumeOutcome::Resumed
        );
        assert_eq!(context.resume_calls(), 1);

        // A later re-suspension attaches a fresh listener
        context.suspend();
        assert!(manager.watch_suspension());
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let backend = Arc::new(MockBackend::default());
        backend.set_fail_creation(true);
        let manager = manager(&backend);

        assert!(matches!(
            manager.acquire(),
            Err(LifecycleError::ContextCreationFailed { .. })
        ));
        assert_eq!(manager.state(), LifecycleState::Uninitialized);

        backend.set_fail_creation(false);
        assert!(manager.acquire().is_ok());
    }
}
