//! Example demonstrating the full surfacepdf workflow.
//!
//! This example shows how to:
//! 1. Build a few surfaces in memory
//! 2. Render them into a PDF with PdfCreator
//! 3. Save a copy to public storage
//!
//! Run with: cargo run --example full_workflow

use surfacepdf::{Config, FillSurface, PdfCreator, PdfRequest, PixelSurface, Surface};

fn checkerboard(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            if (x + y) % 2 == 0 {
                pixels.extend_from_slice(&[0, 0, 0]);
            } else {
                pixels.extend_from_slice(&[255, 255, 255]);
            }
        }
    }
    pixels
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("surfacepdf - Full Workflow Example");
    println!("==================================\n");

    let work_dir = std::env::temp_dir().join("surfacepdf-example");
    let config = Config::default()
        .with_cache_dir(work_dir.join("cache"))
        .with_public_dir(work_dir.join("public"))
        .with_display(600, 800);

    println!("Step 1: Creating surfaces...");
    let cover: &dyn Surface = &FillSurface::new(30, 60, 120);
    let board: &dyn Surface = &PixelSurface::new(8, 8, checkerboard(8))?;
    let blank: &dyn Surface = &FillSurface::white();
    let surfaces = [Some(cover), None, Some(board), Some(blank)];
    println!("  {} entries, {} present\n", surfaces.len(), surfaces.iter().flatten().count());

    println!("Step 2: Rendering and saving...");
    let creator = PdfCreator::new(config)?;
    let request = PdfRequest::new("example").download(true);
    let outcome = creator.create_pdf_from_surfaces(&surfaces, &request)?;
    println!("  {} ({} pages)\n", outcome.message, outcome.page_count);

    println!("✓ Workflow completed successfully!");
    println!("\nYou can view the generated PDF at: {}", outcome.file.display());

    Ok(())
}
