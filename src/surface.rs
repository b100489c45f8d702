//! Drawable surfaces.
//!
//! A surface is anything that can lay itself out at a forced size and draw
//! the result as RGB pixels. Each surface becomes exactly one page.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::path::Path;

/// Errors that can occur while preparing or rendering a surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Failed to load image {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    #[error("Invalid surface dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Surface drew {actual_width}x{actual_height} pixels, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Render error: {0}")]
    Render(String),
}

/// Something that can be rendered onto a page.
pub trait Surface {
    /// Lays the surface out at exactly `width` x `height` pixels and draws it.
    ///
    /// The sizing is forced: the returned image must have exactly the
    /// requested dimensions regardless of the surface's intrinsic size.
    fn render(&self, width: u32, height: u32) -> Result<RgbImage, SurfaceError>;

    /// Short human-readable label used in log output.
    fn label(&self) -> String {
        "surface".to_string()
    }
}

/// Stretches `source` to exactly the requested size.
fn stretch(source: &RgbImage, width: u32, height: u32) -> RgbImage {
    if source.width() == width && source.height() == height {
        return source.clone();
    }
    imageops::resize(source, width, height, FilterType::Triangle)
}

/// A surface backed by a decoded image.
#[derive(Debug, Clone)]
pub struct ImageSurface {
    image: RgbImage,
    label: String,
}

impl ImageSurface {
    /// Wraps an already decoded image.
    pub fn new(image: RgbImage) -> Self {
        ImageSurface {
            image,
            label: "image".to_string(),
        }
    }

    /// Decodes an image file (PNG, JPEG, ...) into a surface.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SurfaceError> {
        let path = path.as_ref();
        let image = ::image::open(path)
            .map_err(|e| SurfaceError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        Ok(ImageSurface {
            image,
            label: path.display().to_string(),
        })
    }

    /// Intrinsic size of the underlying image.
    pub fn intrinsic_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl Surface for ImageSurface {
    fn render(&self, width: u32, height: u32) -> Result<RgbImage, SurfaceError> {
        Ok(stretch(&self.image, width, height))
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

/// A surface painted in a single colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillSurface {
    color: [u8; 3],
}

impl FillSurface {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        FillSurface { color: [r, g, b] }
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }
}

impl Surface for FillSurface {
    fn render(&self, width: u32, height: u32) -> Result<RgbImage, SurfaceError> {
        Ok(RgbImage::from_pixel(width, height, Rgb(self.color)))
    }

    fn label(&self) -> String {
        let [r, g, b] = self.color;
        format!("fill #{r:02x}{g:02x}{b:02x}")
    }
}

/// A surface made from packed RGB8 pixels of a fixed size.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelSurface {
    /// Creates a new PixelSurface, checking that the buffer holds
    /// `width * height` RGB pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidDimensions { width, height });
        }

        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(SurfaceError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(PixelSurface {
            width,
            height,
            pixels,
        })
    }

    /// Returns the number of pixels in the surface.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl Surface for PixelSurface {
    fn render(&self, width: u32, height: u32) -> Result<RgbImage, SurfaceError> {
        let image = RgbImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            SurfaceError::InvalidDimensions {
                width: self.width,
                height: self.height,
            },
        )?;
        Ok(stretch(&image, width, height))
    }

    fn label(&self) -> String {
        format!("pixels {}x{}", self.width, self.height)
    }
}
