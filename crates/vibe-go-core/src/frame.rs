use crate::error::PipelineError;

/// Native LCD resolution of the handheld being emulated.
pub const GB_WIDTH: usize = 160;
pub const GB_HEIGHT: usize = 144;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel, resolved through a palette.
    Indexed8,
    /// Direct 16-bit 5-6-5 colour.
    Rgb565,
}

/// Storage type of a frame buffer element.
pub trait Pixel: Copy + Default + Eq + Send + Sync + 'static {
    const FORMAT: PixelFormat;

    fn bits(self) -> u16;

    /// Truncating conversion back from [`Pixel::bits`].
    fn from_bits(bits: u16) -> Self;
}

impl Pixel for u8 {
    const FORMAT: PixelFormat = PixelFormat::Indexed8;

    #[inline]
    fn bits(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_bits(bits: u16) -> Self {
        bits as u8
    }
}

impl Pixel for u16 {
    const FORMAT: PixelFormat = PixelFormat::Rgb565;

    #[inline]
    fn bits(self) -> u16 {
        self
    }

    #[inline]
    fn from_bits(bits: u16) -> Self {
        bits
    }
}

/// Rectangular pixel buffer addressed by `stride`.
///
/// Only the first `width` elements of each row are visible; the padding up to
/// `stride` is never diffed or transferred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame<P> {
    width: usize,
    height: usize,
    stride: usize,
    pixels: Box<[P]>,
}

impl<P: Pixel> Frame<P> {
    pub fn new(width: usize, height: usize) -> Result<Self, PipelineError> {
        Self::with_stride(width, height, width)
    }

    pub fn with_stride(width: usize, height: usize, stride: usize) -> Result<Self, PipelineError> {
        let stride = stride.max(width);
        let len = stride.saturating_mul(height);
        let bytes = len.saturating_mul(std::mem::size_of::<P>());

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| PipelineError::Alloc {
                what: "frame buffer",
                bytes,
            })?;
        pixels.resize(len, P::default());

        Ok(Self {
            width,
            height,
            stride,
            pixels: pixels.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        P::FORMAT
    }

    pub fn same_geometry(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.stride == other.stride
    }

    /// Visible part of row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[P] {
        let start = y * self.stride;
        &self.pixels[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [P] {
        let start = y * self.stride;
        &mut self.pixels[start..start + self.width]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> P {
        self.pixels[y * self.stride + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: P) {
        self.pixels[y * self.stride + x] = value;
    }

    pub fn fill(&mut self, value: P) {
        self.pixels.fill(value);
    }

    /// Raw storage including stride padding.
    pub fn as_slice(&self) -> &[P] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [P] {
        &mut self.pixels
    }
}

/// Allocate a zeroed palette of `len` entries, reporting failure instead of
/// aborting.
pub fn alloc_palette(len: usize) -> Result<Vec<u16>, PipelineError> {
    let mut palette = Vec::new();
    palette
        .try_reserve_exact(len)
        .map_err(|_| PipelineError::Alloc {
            what: "palette",
            bytes: len * 2,
        })?;
    palette.resize(len, 0);
    Ok(palette)
}
