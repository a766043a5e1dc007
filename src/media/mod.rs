//! Media Binding Module
//!
//! Everything that touches media elements:
//! - Bindings and the registry enforcing one per element
//! - Volume interception
//! - Debounced discovery of new elements

pub mod binding;
pub mod registry;
pub mod scanner;
pub mod volume;

pub use binding::{BindingId, MediaBinding};
pub use registry::{MediaBindingRegistry, RefusalReason};
pub use scanner::{AttachmentScanner, Debouncer, ScanReport};
pub use volume::InterceptedVolume;
