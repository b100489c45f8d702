//! The public entry point: surfaces in, PDF file out.

use std::path::PathBuf;

use crate::assembler::{DocumentAssembler, PageSize, PdfError};
use crate::config::{Config, ConfigError};
use crate::presenter::{ContentProvider, Disposition, IntentHandler, Presenter, SystemHandler};
use crate::storage::{self, PersistError, StorageKind, StorageStrategy};
use crate::surface::Surface;

/// Message reported with every successful result.
pub const SUCCESS_MESSAGE: &str = "Successfully generated PDF.";

/// Errors that end a PDF creation request without a file.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("No valid views to generate PDF.")]
    NoValidSurfaces,

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Error creating PDF: {0}")]
    Pdf(#[from] PdfError),

    #[error("Error saving file: {0}")]
    Persist(#[from] PersistError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// One PDF creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfRequest {
    /// Base name; `.pdf` is appended.
    pub file_name: String,
    /// Copy the document to public storage.
    pub download: bool,
    pub show: bool,
    pub share: bool,
    /// Page width in pixels; the display width when absent.
    pub width: Option<u32>,
    /// Page height in pixels; the display height when absent.
    pub height: Option<u32>,
}

impl PdfRequest {
    pub fn new(file_name: impl Into<String>) -> Self {
        PdfRequest {
            file_name: file_name.into(),
            download: false,
            show: false,
            share: false,
            width: None,
            height: None,
        }
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    pub fn share(mut self, share: bool) -> Self {
        self.share = share;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Name of the produced file: `<file_name>.pdf`.
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.file_name)
    }

    pub fn disposition(&self) -> Disposition {
        Disposition::from_flags(self.show, self.share)
    }
}

/// The result of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOutcome {
    /// The final document: the stored copy when persisted, else the cache copy.
    pub file: PathBuf,
    pub page_count: usize,
    pub persisted: bool,
    pub message: String,
    /// Set when the view or share step could not be completed.
    pub notice: Option<String>,
}

/// Renders surfaces to PDF and optionally saves, shows or shares the result.
pub struct PdfCreator {
    config: Config,
    assembler: DocumentAssembler,
    storage: Box<dyn StorageStrategy>,
    presenter: Presenter,
}

impl PdfCreator {
    /// Creates a PdfCreator using the host's storage and handlers.
    pub fn new(config: Config) -> Result<Self, CreateError> {
        let storage = storage::select(&config);
        let handler = Box::new(SystemHandler::new(config.share_command.clone()));
        Self::with_parts(config, storage, handler)
    }

    /// Creates a PdfCreator from explicit storage and handler implementations.
    pub fn with_parts(
        config: Config,
        storage: Box<dyn StorageStrategy>,
        handler: Box<dyn IntentHandler>,
    ) -> Result<Self, CreateError> {
        config.validate()?;

        let provider = ContentProvider::new(config.authority.clone())
            .with_root("cache", config.cache_dir.clone())
            .with_root("public", config.public_dir.clone());

        log::debug!(
            "Using {:?} storage for platform version {}",
            storage.kind(),
            config.platform_version
        );

        Ok(PdfCreator {
            assembler: DocumentAssembler::with_dpi(config.dpi),
            presenter: Presenter::new(provider, handler),
            storage,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.kind()
    }

    /// Renders every present surface onto its own page, in order.
    ///
    /// Absent entries are discarded. When none remain the request fails with
    /// [`CreateError::NoValidSurfaces`] and nothing is written. A persistence
    /// failure fails the whole request; the cache copy is then neither shown
    /// nor shared.
    pub fn create_pdf_from_surfaces(
        &self,
        surfaces: &[Option<&dyn Surface>],
        request: &PdfRequest,
    ) -> Result<PdfOutcome, CreateError> {
        let result = self.create(surfaces, request);
        if let Err(err) = &result {
            log::error!("{err}");
        }
        result
    }

    fn create(
        &self,
        surfaces: &[Option<&dyn Surface>],
        request: &PdfRequest,
    ) -> Result<PdfOutcome, CreateError> {
        validate_file_name(&request.file_name)?;

        let present: Vec<&dyn Surface> = surfaces.iter().flatten().copied().collect();
        if present.is_empty() {
            return Err(CreateError::NoValidSurfaces);
        }
        if present.len() < surfaces.len() {
            log::debug!("Discarded {} absent surface(s)", surfaces.len() - present.len());
        }

        let size = PageSize::new(
            request.width.unwrap_or(self.config.display.width_px),
            request.height.unwrap_or(self.config.display.height_px),
        );
        let pdf_file_name = request.pdf_file_name();

        let document = self.assembler.assemble(&request.file_name, &present, size)?;
        let cache_file = self.config.cache_dir.join(&pdf_file_name);
        document.write_to(&cache_file)?;
        log::info!(
            "Generated {} page(s) at {}x{} into {}",
            document.page_count(),
            size.width,
            size.height,
            cache_file.display()
        );

        let (file, persisted) = if request.download {
            (self.storage.persist(&cache_file, &pdf_file_name)?, true)
        } else {
            (cache_file, false)
        };

        let notice = self.presenter.present(request.disposition(), &file);

        Ok(PdfOutcome {
            file,
            page_count: document.page_count(),
            persisted,
            message: SUCCESS_MESSAGE.to_string(),
            notice,
        })
    }
}

fn validate_file_name(name: &str) -> Result<(), CreateError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || name.contains(['/', '\\']) {
        return Err(CreateError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
