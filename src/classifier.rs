//! Per-file classification.
//!
//! Classification is an ordered rule chain. Name rules run first and never
//! touch the file contents; only when none of them match is the file
//! decoded, after which the image rules run, and finally the fingerprint is
//! claimed in the [`DuplicateRegistry`]. Every path through the chain ends
//! in a [`Verdict`]; decode failures are categories, not errors.

use crate::category::Category;
use crate::config::{SorterSettings, has_extension_in};
use crate::enumerate::CandidateFile;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::registry::DuplicateRegistry;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::path::{Path, PathBuf};

/// Why a file could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The decoder hit its allocation limit.
    OutOfMemory(String),
    /// The file is unreadable, truncated, or not an image the decoder knows.
    Corrupt(String),
}

impl DecodeFailure {
    pub fn category(&self) -> Category {
        match self {
            DecodeFailure::OutOfMemory(_) => Category::MemoryError,
            DecodeFailure::Corrupt(_) => Category::Corrupt,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            DecodeFailure::OutOfMemory(reason) | DecodeFailure::Corrupt(reason) => reason,
        }
    }
}

impl From<ImageError> for DecodeFailure {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Limits(limit) => DecodeFailure::OutOfMemory(limit.to_string()),
            other => DecodeFailure::Corrupt(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DecodeFailure {
    fn from(err: std::io::Error) -> Self {
        DecodeFailure::Corrupt(err.to_string())
    }
}

/// Turns a file into pixels.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeFailure>;
}

/// Decoder backed by the `image` crate, with a cap on allocations.
#[derive(Debug, Clone)]
pub struct ImageCrateDecoder {
    max_alloc: u64,
}

impl ImageCrateDecoder {
    pub fn new(max_alloc: u64) -> Self {
        Self { max_alloc }
    }
}

impl Decoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeFailure> {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);

        let mut reader = ImageReader::open(path)?.with_guessed_format()?;
        reader.limits(limits);
        Ok(reader.decode()?)
    }
}

/// A rule evaluated on the lower-cased file name, before decoding.
#[derive(Debug, Clone)]
pub enum NameRule {
    /// Name contains any of the keywords.
    ThumbnailKeyword(Vec<String>),
    /// Name ends in any of the extensions.
    IconExtension(Vec<String>),
}

impl NameRule {
    pub fn category(&self) -> Category {
        match self {
            NameRule::ThumbnailKeyword(_) => Category::ThumbnailByName,
            NameRule::IconExtension(_) => Category::IconFile,
        }
    }

    /// `name` must already be lower-cased.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameRule::ThumbnailKeyword(keywords) => keywords
                .iter()
                .any(|keyword| name.contains(keyword.to_lowercase().as_str())),
            NameRule::IconExtension(extensions) => has_extension_in(Path::new(name), extensions),
        }
    }
}

/// A rule evaluated on the decoded image.
#[derive(Debug, Clone, Copy)]
pub enum ImageRule {
    /// Both dimensions are at most `max_dimension`.
    ThumbnailSize { max_dimension: u32 },
}

impl ImageRule {
    pub fn category(&self) -> Category {
        match self {
            ImageRule::ThumbnailSize { .. } => Category::ThumbnailBySize,
        }
    }

    pub fn matches(&self, image: &DynamicImage) -> bool {
        match self {
            ImageRule::ThumbnailSize { max_dimension } => {
                image.width() <= *max_dimension && image.height() <= *max_dimension
            }
        }
    }
}

/// The terminal outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub category: Category,
    /// Set once the file got as far as fingerprinting.
    pub fingerprint: Option<Fingerprint>,
    /// For duplicates, the relative path of the canonical copy.
    pub canonical: Option<PathBuf>,
    /// Decoder message for corrupt and memory-error files.
    pub detail: Option<String>,
}

impl Verdict {
    fn of(category: Category) -> Self {
        Self {
            category,
            fingerprint: None,
            canonical: None,
            detail: None,
        }
    }
}

/// Runs the rule chain for one file at a time. Shared by all workers.
pub struct Classifier {
    name_rules: Vec<NameRule>,
    image_rules: Vec<ImageRule>,
    decoder: Box<dyn Decoder>,
    hash_size: u32,
}

impl Classifier {
    /// Builds the standard chain with the `image` crate decoder.
    pub fn from_settings(settings: &SorterSettings) -> Self {
        Self::with_decoder(
            settings,
            Box::new(ImageCrateDecoder::new(settings.max_decode_alloc_bytes())),
        )
    }

    /// Builds the standard chain around a custom decoder.
    pub fn with_decoder(settings: &SorterSettings, decoder: Box<dyn Decoder>) -> Self {
        Self {
            name_rules: vec![
                NameRule::ThumbnailKeyword(settings.thumbnail_keywords.clone()),
                NameRule::IconExtension(settings.icon_extensions.clone()),
            ],
            image_rules: vec![ImageRule::ThumbnailSize {
                max_dimension: settings.thumbnail_max_dimension,
            }],
            decoder,
            hash_size: settings.hash_size,
        }
    }

    /// Classifies `file`, claiming its fingerprint in `registry` if it gets
    /// that far. Never fails.
    pub fn classify(&self, file: &CandidateFile, registry: &DuplicateRegistry) -> Verdict {
        let name = file.lowercase_name();
        if let Some(rule) = self.name_rules.iter().find(|rule| rule.matches(&name)) {
            return Verdict::of(rule.category());
        }

        let image = match self.decoder.decode(&file.path) {
            Ok(image) => image,
            Err(failure) => {
                return Verdict {
                    detail: Some(failure.reason().to_string()),
                    ..Verdict::of(failure.category())
                };
            }
        };

        if let Some(rule) = self.image_rules.iter().find(|rule| rule.matches(&image)) {
            return Verdict::of(rule.category());
        }

        let fingerprint = fingerprint(&image, self.hash_size);
        drop(image);

        let canonical = registry.claim(fingerprint, &file.relative);
        Verdict {
            category: if canonical.is_some() {
                Category::Duplicate
            } else {
                Category::Valid
            },
            fingerprint: Some(fingerprint),
            canonical,
            detail: None,
        }
    }
}
