use clap::Parser;
use image::{Rgb, RgbImage};
use picsort::Category;
use picsort::admission::CancelToken;
use picsort::cli::{Args, CliOutcome, SortError, run_cli};
use picsort::dispatcher::RunReport;
use picsort::relocator::HISTORY_FILE;
/// Integration tests for picsort
///
/// These tests build small image trees on disk and run the complete
/// command, checking where every file ends up.
///
/// Test categories:
/// 1. Basic sorting workflows
/// 2. Duplicates and fingerprints
/// 3. Invalid images
/// 4. Dry-run mode and separate destinations
/// 5. Undo
/// 6. Configuration and edge cases
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture holding a source tree and a config file outside it, so a
/// user's own configuration never leaks into a test run.
struct TestFixture {
    temp_dir: TempDir,
    config_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let fixture = TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            config_dir: TempDir::new().expect("Failed to create config directory"),
        };
        fixture.write_config("");
        fixture
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("picsort.toml")
    }

    fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).expect("Failed to write config");
    }

    /// Write a solid-colour PNG at `rel_path`, creating parent directories.
    fn create_image(&self, rel_path: &str, size: (u32, u32), color: [u8; 3]) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        RgbImage::from_pixel(size.0, size.1, Rgb(color))
            .save(&path)
            .expect("Failed to write image");
    }

    /// Write a PNG with a horizontal gradient, so two sizes of it differ.
    fn create_gradient(&self, rel_path: &str, size: (u32, u32)) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        RgbImage::from_fn(size.0, size.1, |x, y| {
            Rgb([(x * 255 / size.0) as u8, (y * 255 / size.1) as u8, 128])
        })
        .save(&path)
        .expect("Failed to write image");
    }

    fn create_file(&self, rel_path: &str, content: &[u8]) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to create file");
    }

    fn copy(&self, from: &str, to: &str) {
        let to_path = self.path().join(to);
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::copy(self.path().join(from), to_path).expect("Failed to copy file");
    }

    fn args(&self, extra: &[&str]) -> Args {
        self.args_with_destination(None, extra)
    }

    fn args_with_destination(&self, destination: Option<&Path>, extra: &[&str]) -> Args {
        let mut argv: Vec<OsString> = vec!["picsort".into(), self.path().into()];
        if let Some(destination) = destination {
            argv.push(destination.into());
        }
        argv.push("--config".into());
        argv.push(self.config_path().into());
        argv.push("--quiet".into());
        argv.extend(extra.iter().map(OsString::from));
        Args::parse_from(argv)
    }

    fn sort(&self, extra: &[&str]) -> RunReport {
        match run_cli(&self.args(extra), CancelToken::new()) {
            Ok(CliOutcome::Sorted(report)) => report,
            other => panic!("Expected a sorting run, got {:?}", other),
        }
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// All files below the fixture, relative to it, without the history log.
    fn list_files_recursive(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(self.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() != HISTORY_FILE)
            .filter_map(|e| e.path().strip_prefix(self.path()).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        files
    }

    fn files_under(&self, root: &str) -> Vec<PathBuf> {
        self.list_files_recursive()
            .into_iter()
            .filter(|p| p.starts_with(root))
            .collect()
    }
}

const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

// ============================================================================
// Test Suite 1: Basic Sorting
// ============================================================================

#[test]
fn test_sort_empty_directory() {
    let fixture = TestFixture::new();

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 0);
    assert!(report.is_complete_success());
    fixture.assert_file_not_exists(HISTORY_FILE);
}

#[test]
fn test_sort_single_valid_image() {
    let fixture = TestFixture::new();
    fixture.create_image("photo.png", (200, 200), RED);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::Valid), 1);
    fixture.assert_file_exists("valid_images/photo.png");
    fixture.assert_file_not_exists("photo.png");
    fixture.assert_file_exists(HISTORY_FILE);
}

#[test]
fn test_sort_mixed_tree() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (200, 200), RED);
    fixture.copy("a.png", "sub/b.png");
    fixture.create_image("thumb_c.png", (300, 300), BLUE);
    fixture.create_file("d.bin", b"not an image");

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 3);
    assert_eq!(report.count(Category::Valid), 1);
    assert_eq!(report.count(Category::Duplicate), 1);
    assert_eq!(report.count(Category::ThumbnailByName), 1);
    assert!(report.is_complete_success());

    fixture.assert_file_exists("invalid_images/thumb_c.png");
    fixture.assert_file_exists("d.bin");

    let valid = fixture.files_under("valid_images");
    let duplicate = fixture.files_under("duplicate_images");
    assert_eq!(valid.len(), 1);
    assert_eq!(duplicate.len(), 1);

    // Either copy may win, but together they keep both relative paths.
    let mut placed: Vec<PathBuf> = valid
        .iter()
        .chain(duplicate.iter())
        .map(|p| p.iter().skip(1).collect())
        .collect();
    placed.sort();
    assert_eq!(placed, vec![PathBuf::from("a.png"), PathBuf::from("sub/b.png")]);
}

#[test]
fn test_sort_preserves_relative_paths() {
    let fixture = TestFixture::new();
    fixture.create_image("2023/summer/beach.png", (256, 256), RED);
    fixture.create_image("2024/winter/snow.png", (256, 256), BLUE);

    fixture.sort(&[]);

    fixture.assert_file_exists("valid_images/2023/summer/beach.png");
    fixture.assert_file_exists("valid_images/2024/winter/snow.png");
}

#[test]
fn test_every_image_lands_in_exactly_one_root() {
    let fixture = TestFixture::new();
    for i in 0..40u32 {
        let shade = (i * 6) as u8;
        fixture.create_image(&format!("batch/img_{:02}.png", i), (150, 150), [shade, 0, 0]);
    }
    fixture.create_image("batch/copy.png", (150, 150), [0, 0, 0]);

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 41);
    assert_eq!(report.operations.len(), 41);
    assert_eq!(report.count(Category::Valid), 40);
    assert_eq!(report.count(Category::Duplicate), 1);
    assert_eq!(report.unique_images, 40);
    assert!(report.peak_in_flight <= 16);
    assert_eq!(fixture.files_under("batch").len(), 0);
    assert_eq!(fixture.list_files_recursive().len(), 41);
}

// ============================================================================
// Test Suite 2: Duplicates and Fingerprints
// ============================================================================

#[test]
fn test_same_content_in_different_formats_is_duplicate() {
    let fixture = TestFixture::new();
    fixture.create_image("original.png", (200, 160), BLUE);
    fixture.create_image("export.bmp", (200, 160), BLUE);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::Valid), 1);
    assert_eq!(report.count(Category::Duplicate), 1);
}

#[test]
fn test_same_picture_at_different_sizes_is_not_duplicate() {
    let fixture = TestFixture::new();
    fixture.create_gradient("large.png", (400, 300));
    fixture.create_gradient("medium.png", (200, 150));

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::Valid), 2);
    assert_eq!(report.count(Category::Duplicate), 0);
    fixture.assert_file_exists("valid_images/large.png");
    fixture.assert_file_exists("valid_images/medium.png");
}

#[test]
fn test_triplicate_keeps_one_canonical() {
    let fixture = TestFixture::new();
    fixture.create_gradient("one.png", (300, 200));
    fixture.copy("one.png", "two.png");
    fixture.copy("one.png", "nested/three.png");

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::Valid), 1);
    assert_eq!(report.count(Category::Duplicate), 2);
    assert_eq!(fixture.files_under("valid_images").len(), 1);
    assert_eq!(fixture.files_under("duplicate_images").len(), 2);
}

// ============================================================================
// Test Suite 3: Invalid Images
// ============================================================================

#[test]
fn test_small_image_is_thumbnail() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (64, 64), RED);
    fixture.create_image("banner.png", (600, 40), RED);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::ThumbnailBySize), 1);
    assert_eq!(report.count(Category::Valid), 1);
    fixture.assert_file_exists("invalid_images/a.png");
    fixture.assert_file_exists("valid_images/banner.png");
}

#[test]
fn test_keyword_matches_case_insensitively() {
    let fixture = TestFixture::new();
    fixture.create_image("IMG_Thumbnail_01.png", (400, 400), RED);
    fixture.create_image("logo_ICON.png", (400, 400), BLUE);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::ThumbnailByName), 2);
    assert_eq!(fixture.files_under("invalid_images").len(), 2);
}

#[test]
fn test_corrupt_files_are_invalid() {
    let fixture = TestFixture::new();
    fixture.create_file("broken.jpg", b"definitely not a jpeg");
    fixture.create_file("empty.png", b"");
    fixture.create_file("nested/truncated.png", &[0x89, 0x50, 0x4E, 0x47]);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::Corrupt), 3);
    assert_eq!(report.invalid_count(), 3);
    assert!(report.is_complete_success());
    fixture.assert_file_exists("invalid_images/broken.jpg");
    fixture.assert_file_exists("invalid_images/empty.png");
    fixture.assert_file_exists("invalid_images/nested/truncated.png");
}

#[test]
fn test_decoder_allocation_cap_is_memory_error() {
    let fixture = TestFixture::new();
    fixture.write_config("[sorter]\nmax_decode_alloc_mb = 1\n");
    fixture.create_image("huge.png", (2000, 2000), RED);
    fixture.create_image("fine.png", (200, 200), RED);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::MemoryError), 1);
    assert_eq!(report.count(Category::Valid), 1);
    fixture.assert_file_exists("invalid_images/huge.png");
}

#[test]
fn test_non_image_files_are_untouched() {
    let fixture = TestFixture::new();
    fixture.create_file("notes.txt", b"hello");
    fixture.create_file("archive.zip", &[0x50, 0x4B, 0x03, 0x04]);
    fixture.create_file("favicon.ico", b"icon bytes");

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 0);
    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_exists("archive.zip");
    fixture.assert_file_exists("favicon.ico");
}

// ============================================================================
// Test Suite 4: Dry Run and Destinations
// ============================================================================

#[test]
fn test_dry_run_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (200, 200), RED);
    fixture.copy("a.png", "b.png");
    fixture.create_image("thumb.png", (200, 200), BLUE);

    let before = fixture.list_files_recursive();
    let report = fixture.sort(&["--dry-run"]);

    assert_eq!(report.count(Category::Valid), 1);
    assert_eq!(report.count(Category::Duplicate), 1);
    assert_eq!(report.count(Category::ThumbnailByName), 1);
    assert_eq!(fixture.list_files_recursive(), before);
    assert!(!fixture.path().join("valid_images").exists());
    fixture.assert_file_not_exists(HISTORY_FILE);
}

#[test]
fn test_separate_destination() {
    let fixture = TestFixture::new();
    let destination = TempDir::new().unwrap();
    fixture.create_image("albums/x.png", (300, 300), RED);
    fixture.create_file("albums/y.png", b"junk");

    let args = fixture.args_with_destination(Some(destination.path()), &[]);
    let outcome = run_cli(&args, CancelToken::new()).unwrap();
    assert!(!outcome.interrupted());

    assert!(destination.path().join("valid_images/albums/x.png").is_file());
    assert!(destination.path().join("invalid_images/albums/y.png").is_file());
    assert!(destination.path().join("duplicate_images").is_dir());
    assert!(destination.path().join(HISTORY_FILE).is_file());
    fixture.assert_file_not_exists("albums/x.png");
    fixture.assert_file_not_exists("valid_images");
}

#[test]
fn test_second_run_ignores_sorted_output() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (200, 200), RED);
    fixture.sort(&[]);

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 0);
    fixture.assert_file_exists("valid_images/a.png");
}

// ============================================================================
// Test Suite 5: Undo
// ============================================================================

#[test]
fn test_undo_restores_tree() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (200, 200), RED);
    fixture.copy("a.png", "sub/b.png");
    fixture.create_file("sub/broken.png", b"junk");
    let before = fixture.list_files_recursive();

    fixture.sort(&[]);
    assert_ne!(fixture.list_files_recursive(), before);

    let outcome = run_cli(&fixture.args(&["--undo"]), CancelToken::new()).unwrap();
    match outcome {
        CliOutcome::Undone(report) => {
            assert_eq!(report.restored_files, 3);
            assert!(report.is_complete_success());
        }
        other => panic!("Expected an undo, got {:?}", other),
    }

    assert_eq!(fixture.list_files_recursive(), before);
    fixture.assert_file_not_exists(HISTORY_FILE);
}

#[test]
fn test_undo_without_history_fails() {
    let fixture = TestFixture::new();

    let result = run_cli(&fixture.args(&["--undo"]), CancelToken::new());

    assert!(matches!(result, Err(SortError::Undo(_))));
}

// ============================================================================
// Test Suite 6: Configuration and Edge Cases
// ============================================================================

#[test]
fn test_missing_source_is_fatal() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("does-not-exist");
    let args = Args::parse_from([
        OsString::from("picsort"),
        missing.clone().into(),
        "--config".into(),
        fixture.config_path().into(),
    ]);

    let result = run_cli(&args, CancelToken::new());

    assert!(matches!(result, Err(SortError::InvalidSource(_))));
    assert!(!missing.exists());
}

#[test]
fn test_invalid_config_is_fatal() {
    let fixture = TestFixture::new();
    fixture.write_config("[sorter]\nmax_concurrent = 0\n");
    fixture.create_image("a.png", (200, 200), RED);

    let result = run_cli(&fixture.args(&[]), CancelToken::new());

    assert!(matches!(result, Err(SortError::Config(_))));
    fixture.assert_file_exists("a.png");
}

#[test]
fn test_config_keywords_and_thresholds() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[sorter]
thumbnail_max_dimension = 32
thumbnail_keywords = ["preview"]
"#,
    );
    fixture.create_image("preview_1.png", (300, 300), RED);
    fixture.create_image("thumb_2.png", (300, 300), BLUE);
    fixture.create_image("small.png", (64, 64), [0, 255, 0]);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::ThumbnailByName), 1);
    assert_eq!(report.count(Category::Valid), 2);
    fixture.assert_file_exists("invalid_images/preview_1.png");
    fixture.assert_file_exists("valid_images/thumb_2.png");
    fixture.assert_file_exists("valid_images/small.png");
}

#[test]
fn test_config_icon_extension() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[sorter]
image_extensions = ["png", "ico"]
"#,
    );
    fixture.create_file("site.ico", b"not decoded");
    fixture.create_image("site.png", (300, 300), RED);

    let report = fixture.sort(&[]);

    assert_eq!(report.count(Category::IconFile), 1);
    fixture.assert_file_exists("invalid_images/site.ico");
    fixture.assert_file_exists("valid_images/site.png");
}

#[test]
fn test_config_exclude_patterns() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[filters.exclude]
patterns = ["raw/*"]
"#,
    );
    fixture.create_image("raw/keep.png", (300, 300), RED);
    fixture.create_image("edited/out.png", (300, 300), BLUE);

    let report = fixture.sort(&[]);

    assert_eq!(report.total, 1);
    fixture.assert_file_exists("raw/keep.png");
    fixture.assert_file_exists("valid_images/edited/out.png");
}

#[test]
fn test_cancelled_run_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_image("a.png", (200, 200), RED);
    fixture.create_image("b.png", (200, 200), BLUE);

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = run_cli(&fixture.args(&[]), cancel).unwrap();

    assert!(outcome.interrupted());
    match outcome {
        CliOutcome::Sorted(report) => {
            assert_eq!(report.skipped, 2);
            assert!(report.operations.is_empty());
        }
        other => panic!("Expected a sorting run, got {:?}", other),
    }
    fixture.assert_file_exists("a.png");
    fixture.assert_file_exists("b.png");
}
