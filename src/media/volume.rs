//! Volume interception
//!
//! The installed accessor wraps the element's original getter/setter pair.
//! Reads go straight to the original. Writes go to the original first, and
//! the value the platform actually stored is then pushed into the binding's
//! gain stage, so page script and the rendered level never disagree.

use std::fmt;
use std::sync::Arc;

use crate::dsp::GainControl;
use crate::platform::VolumeProperty;

pub struct InterceptedVolume {
    original: Arc<dyn VolumeProperty>,
    gain: Arc<GainControl>,
}

impl InterceptedVolume {
    pub fn new(original: Arc<dyn VolumeProperty>, gain: Arc<GainControl>) -> Self {
        Self { original, gain }
    }

    /// The accessor pair this one decorates
    pub fn original(&self) -> &Arc<dyn VolumeProperty> {
        &self.original
    }
}

impl VolumeProperty for InterceptedVolume {
    fn get(&self) -> f32 {
        self.original.get()
    }

    fn set(&self, value: f32) {
        self.original.set(value);
        // Platform may clamp or reject; mirror what it kept
        self.gain.set(self.original.get());
    }
}

impl fmt::Debug for InterceptedVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptedVolume")
            .field("volume", &self.original.get())
            .field("gain", &self.gain.get())
            .finish()
    }
}
