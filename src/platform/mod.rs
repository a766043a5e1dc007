//! Host platform boundary
//!
//! The engine never talks to a browser or an audio driver directly. Hosts
//! implement these traits; [`mock`] provides an in-process implementation
//! used by the tests and the offline tooling.

pub mod mock;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::RenderGraph;
use crate::error::{CaptureError, LifecycleError};

pub use mock::{MockBackend, MockContext, MockDocument, MockMediaElement};

/// Stable identity of a media element for the lifetime of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// The getter/setter pair behind a media element's `volume` property
pub trait VolumeProperty: Send + Sync {
    fn get(&self) -> f32;
    fn set(&self, value: f32);
}

/// An audio or video element exposed by the document
pub trait MediaElement: Send + Sync {
    fn id(&self) -> ElementId;

    fn is_muted(&self) -> bool;

    /// Channel count of the decoded media stream
    fn channel_count(&self) -> u16;

    /// False once the element has been removed from the document
    fn is_connected(&self) -> bool;

    /// Accessor pair currently backing `volume`
    fn volume_accessor(&self) -> Arc<dyn VolumeProperty>;

    /// Replace the accessor pair backing `volume`
    fn install_volume_accessor(&self, accessor: Arc<dyn VolumeProperty>);

    /// Read `volume` the way page script would
    fn volume(&self) -> f32 {
        self.volume_accessor().get()
    }

    /// Write `volume` the way page script would
    fn set_volume(&self, value: f32) {
        self.volume_accessor().set(value)
    }
}

/// Source of media-capable elements
pub trait Document: Send + Sync {
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>>;
}

/// Platform-reported state of a rendering context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Suspended => write!(f, "suspended"),
            ContextState::Running => write!(f, "running"),
            ContextState::Closed => write!(f, "closed"),
        }
    }
}

/// A platform audio rendering context
///
/// `connect` creates the capture node for an element and routes it through
/// the graph to the output device. The platform then drives
/// [`RenderGraph::render`] from its real-time thread.
pub trait RenderingContext: Send + Sync {
    fn state(&self) -> ContextState;

    fn sample_rate(&self) -> u32;

    fn resume(&self) -> std::result::Result<(), LifecycleError>;

    fn close(&self);

    fn connect(
        &self,
        element: &dyn MediaElement,
        graph: RenderGraph,
    ) -> std::result::Result<(), CaptureError>;

    fn disconnect(&self, element: ElementId);
}

/// Factory for rendering contexts
pub trait AudioBackend: Send + Sync {
    fn create_context(&self) -> std::result::Result<Arc<dyn RenderingContext>, LifecycleError>;
}
