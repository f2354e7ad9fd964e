//! Audio/video output pipeline of a handheld emulator.
//!
//! The producer runs the emulation core and hands finished frames and sample
//! buffers to two consumer threads through depth-one mailboxes. The display
//! consumer redraws only the rows that changed, merged into few rectangles,
//! and pushes them to the panel over a [`bus::DisplayBus`].

/// Video slots and PCM sample buffers.
pub mod buffers;

/// Display bus driver interface and per-dispatch bus ownership.
pub mod bus;

/// Pipeline geometry, audio and pacing configuration.
pub mod config;

/// Display and audio consumer loops.
pub mod consumer;

/// Two-pass rectangle transfer to the panel.
pub mod dispatch;

/// Boundary to the emulated machine.
pub mod emulation;

pub mod error;

/// Blended 3:5 upscale of the native LCD.
pub mod expand;

/// Frame buffers and pixel formats.
pub mod frame;

/// Single-slot handoff channel.
pub mod mailbox;

/// Tolerant merging of adjacent changed rows.
pub mod merge;

/// Frame budgets, cycle counters and frame-rate reports.
pub mod pacing;

pub mod pipeline;

/// Frame loop and publish cadence.
pub mod producer;

/// Fixed-point source to panel coordinate mapping.
pub mod scale;

/// Changed-span detection between frames.
pub mod scanline;

pub mod settings;

pub use bus::{DisplayBus, TransferMode};
pub use config::{AudioConfig, PipelineConfig, VideoConfig};
pub use consumer::AudioSink;
pub use emulation::{CoreOutput, EmulationCore};
pub use error::{AudioError, BusError, DispatchError, PipelineError, ScanError};
pub use frame::{Frame, Pixel, PixelFormat};
pub use pipeline::{Pipeline, PipelineEvent};
pub use scanline::{DiffOptions, Scanline};
pub use settings::Settings;
