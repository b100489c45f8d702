//! Page rendering and PDF assembly.
//!
//! This module lays every surface out at a forced page size, rasterizes it
//! into one page each, and serializes the pages into a PDF document.

use crate::surface::{Surface, SurfaceError};
use printpdf::*;
use std::any::Any;
use std::fs;
use std::io::{self, BufWriter};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// DPI used when no custom value is given. At 72 DPI one pixel maps to one
/// PDF point, so a page is exactly `width` x `height` points.
pub const DEFAULT_DPI: f32 = 72.0;

/// Errors that can occur during PDF assembly.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("No pages provided")]
    NoPages,

    #[error("Invalid page dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to render page {page}: {source}")]
    Render {
        page: u32,
        #[source]
        source: SurfaceError,
    },

    #[error("Surface for page {page} panicked: {message}")]
    SurfacePanicked { page: u32, message: String },

    #[error("PDF creation error: {0}")]
    PdfCreation(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Requested page size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        PageSize { width, height }
    }
}

/// One rasterized page. `index` is 1-based and follows input order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: ::image::RgbImage,
}

/// An in-memory multi-page document, ready to be serialized.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    title: String,
    dpi: f32,
    pages: Vec<RenderedPage>,
}

/// Lays out surfaces and collects them into an [`AssembledDocument`].
pub struct DocumentAssembler {
    dpi: f32,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        DocumentAssembler { dpi: DEFAULT_DPI }
    }
}

impl DocumentAssembler {
    /// Creates a new DocumentAssembler with the default DPI.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new DocumentAssembler with a custom DPI.
    pub fn with_dpi(dpi: f32) -> Self {
        DocumentAssembler { dpi }
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Renders each surface onto its own page of exactly `size` pixels.
    ///
    /// Pages are produced in input order. A surface that panics is reported
    /// as [`PdfError::SurfacePanicked`] instead of unwinding further.
    pub fn assemble(
        &self,
        title: &str,
        surfaces: &[&dyn Surface],
        size: PageSize,
    ) -> Result<AssembledDocument, PdfError> {
        if surfaces.is_empty() {
            return Err(PdfError::NoPages);
        }

        if size.width == 0 || size.height == 0 {
            return Err(PdfError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }

        let mut pages = Vec::with_capacity(surfaces.len());
        for (idx, surface) in surfaces.iter().enumerate() {
            let index = idx as u32 + 1;
            log::debug!(
                "Rendering page {index} from {} at {}x{}",
                surface.label(),
                size.width,
                size.height
            );
            pages.push(Self::render_page(index, *surface, size)?);
        }

        Ok(AssembledDocument {
            title: title.to_string(),
            dpi: self.dpi,
            pages,
        })
    }

    fn render_page(index: u32, surface: &dyn Surface, size: PageSize) -> Result<RenderedPage, PdfError> {
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| surface.render(size.width, size.height)))
            .map_err(|payload| PdfError::SurfacePanicked {
                page: index,
                message: panic_message(&*payload),
            })?
            .map_err(|source| PdfError::Render {
                page: index,
                source,
            })?;

        if rendered.dimensions() != (size.width, size.height) {
            return Err(PdfError::Render {
                page: index,
                source: SurfaceError::SizeMismatch {
                    width: size.width,
                    height: size.height,
                    actual_width: rendered.width(),
                    actual_height: rendered.height(),
                },
            });
        }

        Ok(RenderedPage {
            index,
            width: size.width,
            height: size.height,
            pixels: rendered,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl AssembledDocument {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Converts pixels to PDF dimensions in points (1/72 inch).
    fn pixels_to_points(&self, pixels: u32) -> f32 {
        (pixels as f32 / self.dpi) * 72.0
    }

    /// Converts points to millimeters.
    fn points_to_mm(points: f32) -> f32 {
        points * 0.352778
    }

    fn page_mm(&self, page: &RenderedPage) -> (Mm, Mm) {
        (
            Mm(Self::points_to_mm(self.pixels_to_points(page.width))),
            Mm(Self::points_to_mm(self.pixels_to_points(page.height))),
        )
    }

    /// Serializes the document into PDF bytes.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, PdfError> {
        let (first_page, rest) = self.pages.split_first().ok_or(PdfError::NoPages)?;

        let (width, height) = self.page_mm(first_page);
        let (doc, page_idx, layer_idx) = PdfDocument::new(&self.title, width, height, "Layer 1");
        self.add_page_image(&doc, page_idx, layer_idx, first_page);

        for page in rest {
            let (width, height) = self.page_mm(page);
            let (page_idx, layer_idx) = doc.add_page(width, height, "Layer 1");
            self.add_page_image(&doc, page_idx, layer_idx, page);
        }

        let mut buf = Vec::new();
        doc.save(&mut BufWriter::new(&mut buf))
            .map_err(|e| PdfError::PdfCreation(e.to_string()))?;

        Ok(buf)
    }

    /// Serializes the document and writes it to `path`, creating the parent
    /// directory and replacing any existing file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), PdfError> {
        let path = path.as_ref();
        let bytes = self.to_pdf_bytes()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;

        log::debug!("Wrote {} page(s) to {}", self.pages.len(), path.display());
        Ok(())
    }

    /// Draws the page pixels so that they fill the whole page.
    fn add_page_image(
        &self,
        doc: &PdfDocumentReference,
        page_idx: PdfPageIndex,
        layer_idx: PdfLayerIndex,
        page: &RenderedPage,
    ) {
        let image = Image::from_dynamic_image(&::image::DynamicImage::ImageRgb8(page.pixels.clone()));
        let current_layer = doc.get_page(page_idx).get_layer(layer_idx);

        // Placing the image at the document DPI makes it exactly page-sized.
        image.add_to_layer(
            current_layer,
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(0.0)),
                dpi: Some(self.dpi),
                ..Default::default()
            },
        );
    }
}
