//! surfacepdf
//!
//! This library renders drawable surfaces into a multi-page PDF, copies the
//! result to user-visible storage, and hands it to the host's viewer or share
//! handler.

pub mod assembler;
pub mod config;
pub mod converter;
pub mod presenter;
pub mod storage;
pub mod surface;

/// MIME type of every document this crate produces.
pub const PDF_MIME_TYPE: &str = "application/pdf";

pub use assembler::{AssembledDocument, DocumentAssembler, PageSize, PdfError, RenderedPage};
pub use config::{Config, ConfigError, DisplayMetrics};
pub use converter::{CreateError, PdfCreator, PdfOutcome, PdfRequest};
pub use presenter::{ContentProvider, ContentRef, Disposition, IntentHandler, PresentError, SystemHandler};
pub use storage::{DirectStorage, DirectoryIndex, PersistError, ScopedStorage, StorageKind, StorageStrategy};
pub use surface::{FillSurface, ImageSurface, PixelSurface, Surface, SurfaceError};
