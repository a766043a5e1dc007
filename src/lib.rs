//! Stereofix - Media Audio Interception
//!
//! Re-renders the audio of page media elements before it reaches the output
//! device, either collapsing stereo to one channel (left, right or average)
//! or isolating vocals with one of three side-channel algorithms.
//!
//! # Architecture
//!
//! Data flows from discovery to output:
//! - [`media::AttachmentScanner`] finds unbound media elements
//! - [`media::MediaBindingRegistry`] captures each element exactly once
//! - [`engine::LifecycleManager`] supplies the shared rendering context
//! - [`engine::GraphBuilder`] wires the isolation and mix stages
//!
//! The host is abstracted behind the traits in [`platform`]; the render
//! callback only ever runs [`engine::RenderGraph::render`].

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod isolation;
pub mod media;
pub mod platform;
pub mod session;

pub use config::{AudioConfiguration, EngineOptions, ExtensionSettings, StereoMode, VocalIsolationVariant};
pub use error::{AttachError, Result, StereofixError};
pub use session::PatchSession;
