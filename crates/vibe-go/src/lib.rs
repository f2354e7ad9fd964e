//! Desktop host for the vibe-go output pipeline: configuration, a synthetic
//! emulation core, a virtual panel and the audio output queue.

pub mod audio;
pub mod audio_queue;
pub mod config;
pub mod demo;
pub mod error;
pub mod panel;

pub use error::HostError;
