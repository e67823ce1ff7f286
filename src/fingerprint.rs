//! Content fingerprints for duplicate detection.
//!
//! The image is resampled to a small square with bilinear filtering, the
//! resulting RGB samples are folded in row-major order through XxHash64, and
//! the digest is paired with the original dimensions. Two images that shrink
//! to the same square but differ in native size get different fingerprints.

use image::DynamicImage;
use image::imageops::FilterType;
use std::fmt;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Default edge length of the resampled square.
pub const DEFAULT_HASH_SIZE: u32 = 32;

/// Duplicate-detection key for a decoded image.
///
/// Only meaningful within a single run; it is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Digest of the resampled pixel grid.
    pub digest: u64,
    /// Width of the image before resampling.
    pub width: u32,
    /// Height of the image before resampling.
    pub height: u32,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}_{}x{}", self.digest, self.width, self.height)
    }
}

/// Computes a [`Fingerprint`] from a decoded image using a `hash_size` square.
///
/// Pure and deterministic: identical input yields an identical fingerprint
/// on every call and every thread.
///
/// ```
/// use image::{DynamicImage, Rgb, RgbImage};
/// use picsort::fingerprint::fingerprint;
///
/// let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 150, Rgb([255, 0, 0])));
/// let fp = fingerprint(&img, 32);
/// assert_eq!((fp.width, fp.height), (200, 150));
/// assert_eq!(fp, fingerprint(&img, 32));
/// ```
pub fn fingerprint(image: &DynamicImage, hash_size: u32) -> Fingerprint {
    let resampled = image
        .resize_exact(hash_size, hash_size, FilterType::Triangle)
        .to_rgb8();

    let mut hasher = XxHash64::with_seed(0);
    for pixel in resampled.pixels() {
        let [r, g, b] = pixel.0;
        let sample = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        hasher.write(&sample.to_le_bytes());
    }

    Fingerprint {
        digest: hasher.finish(),
        width: image.width(),
        height: image.height(),
    }
}
