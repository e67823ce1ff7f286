/// Terminal categories for sorted images.
///
/// Every candidate file ends up in exactly one category, and the category
/// decides which of the three destination roots the file is moved under.
///
/// # Examples
///
/// ```
/// use picsort::category::Category;
///
/// assert_eq!(Category::Valid.destination(), "valid_images");
/// assert_eq!(Category::Corrupt.destination(), "invalid_images");
/// assert_eq!(Category::Duplicate.destination(), "duplicate_images");
/// ```
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the root that receives canonical images.
pub const VALID_ROOT: &str = "valid_images";
/// Name of the root that receives thumbnails, icons and undecodable files.
pub const INVALID_ROOT: &str = "invalid_images";
/// Name of the root that receives duplicates of an already claimed image.
pub const DUPLICATE_ROOT: &str = "duplicate_images";

/// All destination roots, in the order they are created.
pub const DESTINATION_ROOTS: [&str; 3] = [VALID_ROOT, INVALID_ROOT, DUPLICATE_ROOT];

/// The classification outcome of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Decodable, large enough, and the first to claim its fingerprint.
    Valid,
    /// Decodable, but another file already claimed the same fingerprint.
    Duplicate,
    /// File name contains a thumbnail keyword.
    ThumbnailByName,
    /// Decoded image is no larger than the thumbnail threshold on both axes.
    ThumbnailBySize,
    /// File carries an icon-format extension.
    IconFile,
    /// Decoding failed or produced no image.
    Corrupt,
    /// Decoding ran into the allocation limit.
    MemoryError,
}

impl Category {
    /// Every category, in classification order.
    pub const ALL: [Category; 7] = [
        Category::ThumbnailByName,
        Category::IconFile,
        Category::Corrupt,
        Category::MemoryError,
        Category::ThumbnailBySize,
        Category::Duplicate,
        Category::Valid,
    ];

    /// Returns the destination root directory name for this category.
    pub fn destination(&self) -> &'static str {
        match self {
            Category::Valid => VALID_ROOT,
            Category::Duplicate => DUPLICATE_ROOT,
            Category::ThumbnailByName
            | Category::ThumbnailBySize
            | Category::IconFile
            | Category::Corrupt
            | Category::MemoryError => INVALID_ROOT,
        }
    }

    /// Returns the short label used in log lines.
    ///
    /// Both thumbnail categories share the `thumbnail` label; the invalid
    /// root is not subdivided, so the label is the only record of the reason.
    ///
    /// ```
    /// use picsort::category::Category;
    ///
    /// assert_eq!(Category::ThumbnailByName.label(), "thumbnail");
    /// assert_eq!(Category::IconFile.label(), "ico");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            Category::Valid => "valid",
            Category::Duplicate => "duplicate",
            Category::ThumbnailByName | Category::ThumbnailBySize => "thumbnail",
            Category::IconFile => "ico",
            Category::Corrupt => "corrupt",
            Category::MemoryError => "memory_error",
        }
    }

    /// Returns true for every category that lands under the invalid root.
    pub fn is_invalid(&self) -> bool {
        self.destination() == INVALID_ROOT
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Valid => "Valid",
            Category::Duplicate => "Duplicate",
            Category::ThumbnailByName => "ThumbnailByName",
            Category::ThumbnailBySize => "ThumbnailBySize",
            Category::IconFile => "IconFile",
            Category::Corrupt => "Corrupt",
            Category::MemoryError => "MemoryError",
        };
        f.write_str(name)
    }
}
