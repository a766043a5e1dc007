//! Error handling for Stereofix
//!
//! Every failure in this crate degrades to a passthrough or a simpler
//! algorithm; nothing here is meant to terminate the embedding process.

use thiserror::Error;

use crate::platform::ElementId;

/// Result type alias for Stereofix operations
pub type Result<T> = std::result::Result<T, StereofixError>;

/// Snapshot of an existing binding, returned when an attach is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingStatus {
    pub element: ElementId,
    pub patched: bool,
    pub context_generation: u64,
}

// ============================================================================
// Attach Errors
// ============================================================================

/// Reasons an attach call did not produce a new binding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttachError {
    #[error("element {} is already bound", .0.element)]
    AlreadyBound(BindingStatus),

    #[error("element {element} is already captured by another audio graph")]
    SourceAlreadyCaptured { element: ElementId },

    #[error("element {element} is still held by a closed rendering context")]
    HeldByClosedContext { element: ElementId },

    #[error("element {element} is muted or at zero volume")]
    SourceMutedOrSilent { element: ElementId },

    #[error("element {element} has {channels} channels (only mono and stereo are supported)")]
    UnsupportedChannelLayout { element: ElementId, channels: u16 },

    #[error("no rendering context: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl AttachError {
    /// Expected outcomes that callers treat as no-ops, not failures
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            AttachError::AlreadyBound(_) | AttachError::SourceMutedOrSilent { .. }
        )
    }

    /// Whether a later scan may succeed without anything else changing
    pub fn is_retryable(&self) -> bool {
        match self {
            AttachError::SourceMutedOrSilent { .. } => true,
            AttachError::Lifecycle(_) => true,
            AttachError::AlreadyBound(_)
            | AttachError::SourceAlreadyCaptured { .. }
            | AttachError::HeldByClosedContext { .. }
            | AttachError::UnsupportedChannelLayout { .. } => false,
        }
    }
}

/// Refusal reported by the platform when it cannot build a capture node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("element is already connected to a capture node")]
    AlreadyCaptured,

    #[error("rendering context is closed")]
    ContextClosed,
}

// ============================================================================
// Processing Errors
// ============================================================================

/// Errors raised by the spectral isolation path
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("spectral model unavailable: {reason}")]
    SpectralUnavailable { reason: String },

    #[error("spectral model fault: {reason}")]
    SpectralRuntimeFault { reason: String },
}

// ============================================================================
// Lifecycle Errors
// ============================================================================

/// Errors from the shared rendering context
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("failed to create rendering context: {reason}")]
    ContextCreationFailed { reason: String },

    #[error("failed to resume rendering context: {reason}")]
    ResumeFailed { reason: String },
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown stereo mode: {0}")]
    UnknownMode(String),

    #[error("unknown vocal isolation variant: {0}")]
    UnknownVariant(String),
}

// ============================================================================
// Crate Error
// ============================================================================

/// Main error type for Stereofix operations
#[derive(Error, Debug)]
pub enum StereofixError {
    #[error(transparent)]
    Attach(#[from] AttachError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported channel count: {channels} (only mono and stereo are supported)")]
    UnsupportedChannels { channels: u16 },

    #[error("unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StereofixError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StereofixError::Attach(AttachError::AlreadyBound(_)) => "ALREADY_BOUND",
            StereofixError::Attach(AttachError::SourceAlreadyCaptured { .. }) => {
                "SOURCE_ALREADY_CAPTURED"
            }
            StereofixError::Attach(AttachError::HeldByClosedContext { .. }) => {
                "HELD_BY_CLOSED_CONTEXT"
            }
            StereofixError::Attach(AttachError::SourceMutedOrSilent { .. }) => {
                "SOURCE_MUTED_OR_SILENT"
            }
            StereofixError::Attach(AttachError::UnsupportedChannelLayout { .. }) => {
                "UNSUPPORTED_CHANNEL_LAYOUT"
            }
            StereofixError::Attach(AttachError::Lifecycle(_)) => "NO_RENDERING_CONTEXT",
            StereofixError::Capture(_) => "CAPTURE_REFUSED",
            StereofixError::Processing(ProcessingError::SpectralUnavailable { .. }) => {
                "SPECTRAL_UNAVAILABLE"
            }
            StereofixError::Processing(ProcessingError::SpectralRuntimeFault { .. }) => {
                "SPECTRAL_RUNTIME_FAULT"
            }
            StereofixError::Lifecycle(LifecycleError::ContextCreationFailed { .. }) => {
                "CONTEXT_CREATION_FAILED"
            }
            StereofixError::Lifecycle(LifecycleError::ResumeFailed { .. }) => "RESUME_FAILED",
            StereofixError::Config(_) => "CONFIG_ERROR",
            StereofixError::UnsupportedChannels { .. } => "UNSUPPORTED_CHANNELS",
            StereofixError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            StereofixError::Wav(_) => "WAV_ERROR",
            StereofixError::Io(_) => "IO_ERROR",
            StereofixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            StereofixError::Attach(e) => e.is_retryable(),
            StereofixError::Processing(_) => true,
            StereofixError::Lifecycle(LifecycleError::ResumeFailed { .. }) => true,
            _ => false,
        }
    }
}
