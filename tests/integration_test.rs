//! Integration tests for the full surfaces-to-PDF workflow.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use surfacepdf::presenter::ContentRef;
use surfacepdf::storage::{self, DirectoryIndex};
use surfacepdf::{
    Config, CreateError, FillSurface, IntentHandler, PdfCreator, PdfRequest, PixelSurface,
    PresentError, StorageKind, Surface,
};
use tempfile::TempDir;

/// Records every handler call instead of launching anything.
#[derive(Default, Clone)]
struct RecordingHandler {
    calls: Rc<RefCell<Vec<String>>>,
}

impl IntentHandler for RecordingHandler {
    fn view(&self, content: &ContentRef) -> Result<(), PresentError> {
        self.calls.borrow_mut().push(format!("view {}", content.uri));
        Ok(())
    }

    fn share(&self, content: &ContentRef, _chooser_title: &str) -> Result<(), PresentError> {
        self.calls.borrow_mut().push(format!("share {}", content.uri));
        Ok(())
    }
}

struct Fixture {
    cache: TempDir,
    public: TempDir,
    handler: RecordingHandler,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            cache: TempDir::new().unwrap(),
            public: TempDir::new().unwrap(),
            handler: RecordingHandler::default(),
        }
    }

    fn config(&self, platform_version: u32) -> Config {
        Config::default()
            .with_cache_dir(self.cache.path())
            .with_public_dir(self.public.path())
            .with_platform_version(platform_version)
            .with_display(40, 60)
    }

    fn creator(&self, platform_version: u32) -> PdfCreator {
        let config = self.config(platform_version);
        let storage = storage::select(&config);
        PdfCreator::with_parts(config, storage, Box::new(self.handler.clone())).unwrap()
    }

    fn calls(&self) -> Vec<String> {
        self.handler.calls.borrow().clone()
    }
}

/// Loads a PDF and returns the (width, height) of every page's MediaBox.
fn page_sizes(path: &Path) -> Vec<(f32, f32)> {
    let doc = lopdf::Document::load(path).expect("Failed to load PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (
                media_box[2].as_float().unwrap(),
                media_box[3].as_float().unwrap(),
            )
        })
        .collect()
}

/// Loads a PDF and returns the first pixel of every page's image, in page order.
fn page_colors(path: &Path) -> Vec<[u8; 3]> {
    let doc = lopdf::Document::load(path).expect("Failed to load PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            let images = doc.get_page_images(*id).unwrap();
            assert_eq!(images.len(), 1);
            let stream = doc.get_object(images[0].id).unwrap().as_stream().unwrap();
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            [data[0], data[1], data[2]]
        })
        .collect()
}

#[test]
fn test_page_count_matches_present_surfaces() {
    let fixture = Fixture::new();
    let creator = fixture.creator(29);

    let red: &dyn Surface = &FillSurface::new(255, 0, 0);
    let green: &dyn Surface = &FillSurface::new(0, 255, 0);
    let blue: &dyn Surface = &PixelSurface::new(1, 1, vec![0, 0, 255]).unwrap();

    let outcome = creator
        .create_pdf_from_surfaces(
            &[None, Some(red), Some(green), None, Some(blue)],
            &PdfRequest::new("three"),
        )
        .expect("Failed to create PDF");

    assert_eq!(outcome.page_count, 3);
    assert_eq!(outcome.file, fixture.cache.path().join("three.pdf"));

    let bytes = fs::read(&outcome.file).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(page_sizes(&outcome.file).len(), 3);
    assert_eq!(
        page_colors(&outcome.file),
        vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]
    );
}

#[test]
fn test_pages_have_requested_size() {
    let fixture = Fixture::new();
    let creator = fixture.creator(29);
    let white: &dyn Surface = &FillSurface::white();

    let outcome = creator
        .create_pdf_from_surfaces(&[Some(white), Some(white)], &PdfRequest::new("sized").size(200, 100))
        .unwrap();

    for (width, height) in page_sizes(&outcome.file) {
        assert!((width - 200.0).abs() < 0.5, "width was {width}");
        assert!((height - 100.0).abs() < 0.5, "height was {height}");
    }
}

#[test]
fn test_display_size_is_default_page_size() {
    let fixture = Fixture::new();
    let creator = fixture.creator(29);
    let white: &dyn Surface = &FillSurface::white();

    let outcome = creator
        .create_pdf_from_surfaces(&[Some(white)], &PdfRequest::new("display"))
        .unwrap();

    let sizes = page_sizes(&outcome.file);
    assert_eq!(sizes.len(), 1);
    assert!((sizes[0].0 - 40.0).abs() < 0.5);
    assert!((sizes[0].1 - 60.0).abs() < 0.5);
}

#[test]
fn test_empty_input_writes_nothing() {
    let fixture = Fixture::new();
    let creator = fixture.creator(29);

    let empty: Vec<Option<&dyn Surface>> = Vec::new();
    let absent: Vec<Option<&dyn Surface>> = vec![None, None, None];

    for surfaces in [empty, absent] {
        let result = creator.create_pdf_from_surfaces(
            &surfaces,
            &PdfRequest::new("nothing").download(true).show(true),
        );
        assert!(matches!(result, Err(CreateError::NoValidSurfaces)));
    }

    assert_eq!(fs::read_dir(fixture.cache.path()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(fixture.public.path()).unwrap().count(), 0);
    assert!(fixture.calls().is_empty());
}

#[test]
fn test_scoped_save_keeps_display_name() {
    let fixture = Fixture::new();
    let creator = fixture.creator(33);
    assert_eq!(creator.storage_kind(), StorageKind::Scoped);
    let red: &dyn Surface = &FillSurface::new(255, 0, 0);

    let first = creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("resume").download(true))
        .unwrap();
    let second = creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("resume").download(true))
        .unwrap();

    assert!(first.persisted && second.persisted);
    assert_ne!(first.file, second.file);
    assert!(first.file.exists() && second.file.exists());

    let entries = DirectoryIndex::new(fixture.public.path()).visible().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.display_name == "resume.pdf"));
    assert!(entries.iter().all(|e| e.relative_path == "Download/My-Resume"));
}

#[test]
fn test_direct_save_overwrites() {
    let fixture = Fixture::new();
    let creator = fixture.creator(28);
    assert_eq!(creator.storage_kind(), StorageKind::Direct);

    let red: &dyn Surface = &FillSurface::new(255, 0, 0);
    let first = creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("resume").download(true))
        .unwrap();
    let second = creator
        .create_pdf_from_surfaces(&[Some(red), Some(red)], &PdfRequest::new("resume").download(true))
        .unwrap();

    let expected = fixture
        .public
        .path()
        .join("Download")
        .join("My-Resume")
        .join("resume.pdf");
    assert_eq!(first.file, expected);
    assert_eq!(second.file, expected);
    assert_eq!(page_sizes(&expected).len(), 2);
}

#[test]
fn test_direct_save_from_cache_inside_target_folder() {
    let fixture = Fixture::new();
    let target_dir = fixture.public.path().join("Download").join("My-Resume");
    let config = fixture.config(28).with_cache_dir(&target_dir);
    let storage = storage::select(&config);
    let creator =
        PdfCreator::with_parts(config, storage, Box::new(fixture.handler.clone())).unwrap();
    let red: &dyn Surface = &FillSurface::new(255, 0, 0);
    let blue: &dyn Surface = &FillSurface::new(0, 0, 255);

    let outcome = creator
        .create_pdf_from_surfaces(&[Some(red), Some(blue)], &PdfRequest::new("cv").download(true))
        .unwrap();

    assert!(outcome.persisted);
    assert_eq!(outcome.file, target_dir.join("cv.pdf"));
    assert!(fs::metadata(&outcome.file).unwrap().len() > 0);
    assert_eq!(page_colors(&outcome.file), vec![[255, 0, 0], [0, 0, 255]]);
    assert_eq!(fs::read_dir(&target_dir).unwrap().count(), 1);
}

#[test]
fn test_folder_creation_failure_is_reported() {
    for version in [28, 29] {
        let fixture = Fixture::new();
        fs::write(fixture.public.path().join("Download"), b"not a folder").unwrap();
        let creator = fixture.creator(version);
        let red: &dyn Surface = &FillSurface::new(255, 0, 0);

        let result = creator.create_pdf_from_surfaces(
            &[Some(red)],
            &PdfRequest::new("resume").download(true).share(true),
        );

        match result {
            Err(err @ CreateError::Persist(_)) => {
                assert!(err.to_string().starts_with("Error saving file"));
            }
            other => panic!("expected a persistence failure, got {other:?}"),
        }
        // The unpersisted cache copy is not handed on.
        assert!(fixture.calls().is_empty());
    }
}

#[test]
fn test_share_and_show_triggers_only_share() {
    let fixture = Fixture::new();
    let creator = fixture.creator(29);
    let red: &dyn Surface = &FillSurface::new(255, 0, 0);

    let outcome = creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("both").show(true).share(true))
        .unwrap();

    assert_eq!(outcome.notice, None);
    assert_eq!(
        fixture.calls(),
        vec!["share content://surfacepdf.fileprovider/cache/both.pdf".to_string()]
    );
}

#[test]
fn test_show_persisted_file_uses_public_root() {
    let fixture = Fixture::new();
    let creator = fixture.creator(28);
    let red: &dyn Surface = &FillSurface::new(255, 0, 0);

    creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("cv").download(true).show(true))
        .unwrap();

    assert_eq!(
        fixture.calls(),
        vec!["view content://surfacepdf.fileprovider/public/Download/My-Resume/cv.pdf".to_string()]
    );
}

#[test]
fn test_missing_share_target_is_a_notice() {
    let fixture = Fixture::new();
    let config = fixture.config(29);
    let storage = storage::select(&config);
    let creator = PdfCreator::with_parts(
        config,
        storage,
        Box::new(surfacepdf::SystemHandler::new(None)),
    )
    .unwrap();
    let red: &dyn Surface = &FillSurface::new(255, 0, 0);

    let outcome = creator
        .create_pdf_from_surfaces(&[Some(red)], &PdfRequest::new("shared").share(true))
        .unwrap();

    assert!(outcome.file.exists());
    assert_eq!(outcome.notice.as_deref(), Some("No apps found to share the PDF."));
}
