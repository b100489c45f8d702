//! surfacepdf CLI
//!
//! Treats image files as surfaces, renders them into one PDF page each, and
//! optionally saves, shows or shares the result.

use clap::Parser;
use std::path::PathBuf;
use surfacepdf::{Config, ConfigError, DisplayMetrics, ImageSurface, PdfCreator, PdfRequest, Surface};

/// Version from which saving needs no storage permission.
const PERMISSIONLESS_STORAGE_VERSION: u32 = 30;

/// surfacepdf - Render images into a multi-page PDF
#[derive(Parser, Debug)]
#[command(name = "surfacepdf")]
#[command(version, about, long_about = None)]
struct Args {
    /// Image files to render, one page each, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Base name of the PDF (".pdf" is appended); defaults to the first input's name
    #[arg(short = 'o', long)]
    output_name: Option<String>,

    /// Save a copy to public storage
    #[arg(long)]
    save: bool,

    /// Open the PDF in the default viewer
    #[arg(long)]
    show: bool,

    /// Offer the PDF to the share command (takes precedence over --show)
    #[arg(long)]
    share: bool,

    /// Page width in pixels (defaults to the display width)
    #[arg(long)]
    width: Option<u32>,

    /// Page height in pixels (defaults to the display height)
    #[arg(long)]
    height: Option<u32>,

    /// Resolution used to map pixels to PDF points
    #[arg(long, default_value_t = surfacepdf::assembler::DEFAULT_DPI)]
    dpi: f32,

    /// Display size used when no page size is given, as WIDTHxHEIGHT
    #[arg(long)]
    display: Option<String>,

    /// Directory where the PDF is first written
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Root of the public storage area
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Folder below Download/ that receives saved PDFs
    #[arg(long)]
    folder: Option<String>,

    /// Host platform version; 29 and above use scoped storage
    #[arg(long)]
    platform_version: Option<u32>,

    /// Authority used in content URIs
    #[arg(long)]
    authority: Option<String>,

    /// Program (with arguments) that receives PDFs to share
    #[arg(long)]
    share_command: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl TryFrom<&Args> for Config {
    type Error = ConfigError;

    /// Flags take precedence over `SURFACEPDF_*` variables.
    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut config = Config::from_env()?;

        if let Some(ref display) = args.display {
            config.display = display.parse::<DisplayMetrics>()?;
        }
        if let Some(ref dir) = args.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(ref dir) = args.public_dir {
            config.public_dir = dir.clone();
        }
        if let Some(ref folder) = args.folder {
            config.folder_name = folder.clone();
        }
        if let Some(version) = args.platform_version {
            config.platform_version = version;
        }
        if let Some(ref authority) = args.authority {
            config.authority = authority.clone();
        }
        if let Some(ref command) = args.share_command {
            config.share_command = Some(command.clone());
        }
        config.dpi = args.dpi;

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = match Config::try_from(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if args.save && !request_storage_access(&config) {
        eprintln!("Storage Permission Denied");
        std::process::exit(1);
    }

    let creator = match PdfCreator::new(config) {
        Ok(creator) => creator,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let surfaces = load_surfaces(&args.inputs);
    let refs: Vec<Option<&dyn Surface>> = surfaces
        .iter()
        .map(|s| s.as_ref().map(|s| s as &dyn Surface))
        .collect();

    let request = PdfRequest {
        file_name: args
            .output_name
            .clone()
            .unwrap_or_else(|| default_output_name(&args.inputs)),
        download: args.save,
        show: args.show,
        share: args.share,
        width: args.width,
        height: args.height,
    };

    println!("Rendering {} input(s) into {}", args.inputs.len(), request.pdf_file_name());

    match creator.create_pdf_from_surfaces(&refs, &request) {
        Ok(outcome) => {
            println!("✓ {}", outcome.message);
            println!("  Pages: {}", outcome.page_count);
            println!("  File: {}", outcome.file.display());
            if let Some(notice) = outcome.notice {
                eprintln!("Notice: {}", notice);
            }
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

/// Opens every input; missing or undecodable files become absent surfaces.
fn load_surfaces(inputs: &[PathBuf]) -> Vec<Option<ImageSurface>> {
    inputs
        .iter()
        .map(|path| {
            if !path.exists() {
                log::warn!("Skipping missing input: {}", path.display());
                return None;
            }
            match ImageSurface::open(path) {
                Ok(surface) => Some(surface),
                Err(e) => {
                    log::warn!("Skipping input: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Older platforms need a writable public directory before saving; newer
/// ones register files through the index and are always allowed.
fn request_storage_access(config: &Config) -> bool {
    if config.platform_version >= PERMISSIONLESS_STORAGE_VERSION {
        return true;
    }

    match std::fs::metadata(&config.public_dir) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}

fn default_output_name(inputs: &[PathBuf]) -> String {
    inputs
        .first()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}
