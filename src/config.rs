//! Sorter settings and file filtering rules.
//!
//! Configuration is read from TOML. Every key is optional; anything left out
//! falls back to the built-in defaults.
//!
//! ```toml
//! [sorter]
//! max_concurrent = 16
//! thumbnail_max_dimension = 128
//! hash_size = 32
//! max_decode_alloc_mb = 512
//! thumbnail_keywords = ["thumb", "thumbnail", "small", "tiny", "icon"]
//! icon_extensions = ["ico"]
//! image_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = []
//! patterns = ["exports/**"]
//! extensions = []
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".picsortrc.toml";

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// A setting is out of its allowed range.
    InvalidSetting {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidSetting { key, reason } => {
                write!(f, "Invalid value for '{}': {}", key, reason)
            }
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SorterConfig {
    #[serde(default)]
    pub sorter: SorterSettings,
    #[serde(default)]
    pub filters: FilterRules,
}

/// Tunables for classification and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterSettings {
    /// Maximum number of files decoded and classified at the same time.
    pub max_concurrent: usize,
    /// Images no larger than this on both axes are thumbnails.
    pub thumbnail_max_dimension: u32,
    /// Edge length of the square the fingerprint is computed from.
    pub hash_size: u32,
    /// Decoder allocation cap in MiB. Exceeding it is a memory error.
    pub max_decode_alloc_mb: u64,
    /// Substrings that mark a file name as a thumbnail.
    pub thumbnail_keywords: Vec<String>,
    /// Extensions that mark a file as an icon.
    pub icon_extensions: Vec<String>,
    /// Extensions picked up during enumeration.
    pub image_extensions: Vec<String>,
}

impl Default for SorterSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            thumbnail_max_dimension: 128,
            hash_size: 32,
            max_decode_alloc_mb: 512,
            thumbnail_keywords: ["thumb", "thumbnail", "small", "tiny", "icon"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            icon_extensions: vec!["ico".to_string()],
            image_extensions: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SorterSettings {
    /// Checks that every numeric setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.hash_size == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "hash_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_decode_alloc_mb == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "max_decode_alloc_mb",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Returns true if the path carries one of the configured image extensions.
    ///
    /// ```
    /// use picsort::config::SorterSettings;
    /// use std::path::Path;
    ///
    /// let settings = SorterSettings::default();
    /// assert!(settings.is_image_file(Path::new("holiday/IMG_001.JPG")));
    /// assert!(!settings.is_image_file(Path::new("notes.txt")));
    /// ```
    pub fn is_image_file(&self, path: &Path) -> bool {
        has_extension_in(path, &self.image_extensions)
    }

    /// Decoder allocation cap in bytes.
    pub fn max_decode_alloc_bytes(&self) -> u64 {
        self.max_decode_alloc_mb.saturating_mul(1024 * 1024)
    }
}

/// Case-insensitive extension membership test.
pub(crate) fn has_extension_in(path: &Path, extensions: &[String]) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy();
        extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    })
}

/// Rules deciding which enumerated files take part in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude.
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl SorterConfig {
    /// Load configuration, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.picsortrc.toml` in the current directory
    /// 3. `~/.config/picsort/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a file is found (or named) but cannot be read,
    /// parsed, or holds an out-of-range setting.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("picsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.sorter.validate()?;
        Ok(config)
    }

    /// Compile the filter rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check whether a file, given by its path relative to the source root,
    /// takes part in the run.
    ///
    /// Include patterns win over every exclude rule. After that, hidden
    /// files, exact names, extensions, globs and regexes each exclude.
    pub fn should_include(&self, relative: &Path) -> bool {
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(rules: FilterRules) -> CompiledFilters {
        CompiledFilters::new(&rules).expect("filters should compile")
    }

    #[test]
    fn test_default_settings() {
        let settings = SorterSettings::default();
        assert_eq!(settings.max_concurrent, 16);
        assert_eq!(settings.thumbnail_max_dimension, 128);
        assert_eq!(settings.hash_size, 32);
        assert_eq!(settings.thumbnail_keywords.len(), 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_image_extension_match_is_case_insensitive() {
        let settings = SorterSettings::default();
        assert!(settings.is_image_file(Path::new("a.PNG")));
        assert!(settings.is_image_file(Path::new("dir/b.Tif")));
        assert!(settings.is_image_file(Path::new("c.webp")));
        assert!(!settings.is_image_file(Path::new("d.bin")));
        assert!(!settings.is_image_file(Path::new("e.ico")));
        assert!(!settings.is_image_file(Path::new("png")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SorterConfig::from_toml("[sorter]\nmax_concurrent = 4\n").unwrap();
        assert_eq!(config.sorter.max_concurrent, 4);
        assert_eq!(config.sorter.hash_size, 32);
        assert!(!config.filters.enable_hidden_files);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = SorterConfig::from_toml("").unwrap();
        assert_eq!(config.sorter.max_concurrent, 16);
        assert_eq!(config.sorter.icon_extensions, vec!["ico".to_string()]);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = SorterConfig::from_toml("[sorter]\nmax_concurrent = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidSetting {
                key: "max_concurrent",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = SorterConfig::from_toml("[sorter\nmax_concurrent = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_missing_explicit_config() {
        let result = SorterConfig::load(Some(Path::new("/non/existent/picsort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = filters(FilterRules::default());
        assert!(!compiled.should_include(Path::new("._IMG_0001.jpg")));
        assert!(compiled.should_include(Path::new("IMG_0001.jpg")));
    }

    #[test]
    fn test_hidden_file_included_when_enabled() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(compiled.should_include(Path::new(".cover.png")));
    }

    #[test]
    fn test_exclude_rules() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                filenames: vec!["cover.jpg".to_string()],
                patterns: vec!["exports/**".to_string()],
                extensions: vec!["GIF".to_string()],
                regex: vec![r"^scan_\d+\.png$".to_string()],
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("album/cover.jpg")));
        assert!(!compiled.should_include(Path::new("exports/2024/a.png")));
        assert!(!compiled.should_include(Path::new("anim.gif")));
        assert!(!compiled.should_include(Path::new("scan_0042.png")));
        assert!(compiled.should_include(Path::new("album/photo.jpg")));
        assert!(compiled.should_include(Path::new("my_exports/a.png")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                patterns: vec!["raw/**".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["raw/keep/**".to_string()],
            },
        });

        assert!(compiled.should_include(Path::new("raw/keep/a.png")));
        assert!(!compiled.should_include(Path::new("raw/drop/a.png")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = FilterRules {
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            CompiledFilters::new(&bad_regex),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["[invalid".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            CompiledFilters::new(&bad_glob),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
