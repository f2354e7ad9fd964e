use thiserror::Error;

/// Errors reported by the scanline diff engine.
///
/// All of these are caller bugs (mismatched buffers or palettes); the engine
/// rejects them up front instead of indexing out of range mid-frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("frame geometry mismatch: {current_w}x{current_h} vs {previous_w}x{previous_h}")]
    GeometryMismatch {
        current_w: usize,
        current_h: usize,
        previous_w: usize,
        previous_h: usize,
    },

    #[error("palette has {len} entries, masked indices need {needed}")]
    PaletteTooShort { needed: usize, len: usize },

    #[error("diff holds {len} rows, frame has {height}")]
    DiffTooShort { len: usize, height: usize },

    #[error("interlace field must be 0 or 1, got {0}")]
    InvalidField(usize),
}

/// Errors a display bus driver may surface from a transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("rectangle {w}x{h} at ({x},{y}) does not fit the panel")]
    OutOfBounds { x: u32, y: u32, w: u32, h: u32 },

    #[error("line data without an open rectangle")]
    NoRectangle,

    #[error("bus transfer failed: {0}")]
    Transfer(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("display bus lock poisoned")]
    Poisoned,

    #[error("expanded output needs a {expected_w}x{expected_h} frame, got {w}x{h}")]
    UnsupportedGeometry {
        w: usize,
        h: usize,
        expected_w: usize,
        expected_h: usize,
    },
}

/// Failure reported by an audio sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("audio sink failed: {0}")]
pub struct AudioError(pub String);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to allocate {what} ({bytes} bytes)")]
    Alloc { what: &'static str, bytes: usize },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("{consumer} consumer received the fatal sentinel")]
    FatalToken { consumer: &'static str },

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error("{consumer} consumer thread panicked")]
    ConsumerPanicked { consumer: &'static str },

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
