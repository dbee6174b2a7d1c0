//! # Rules Module
//!
//! Deterministic extension and mime-type mapping to category labels.
//!
//! ## Example
//! ```
//! use smartfile_flow::core::rules::CategoryRules;
//!
//! let rules = CategoryRules::default();
//! assert_eq!(rules.classify_by_rule("jpg"), Some("Images"));
//! assert_eq!(rules.classify_by_rule("PDF"), Some("Documents"));
//! assert_eq!(rules.classify_by_rule("unknownext"), None);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Bucket used when neither rules nor the model produce a category
pub const OTHER_CATEGORY: &str = "Other";

/// Where a category decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Extension or mime rule
    Rule,
    /// Pre-trained model above the acceptance threshold
    Model,
    /// Nothing matched, file goes to `Other`
    Fallback,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationSource::Rule => write!(f, "rule"),
            ClassificationSource::Model => write!(f, "model"),
            ClassificationSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A category decision for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Category label, used as the subdirectory name
    pub category: String,
    /// Which stage produced the label
    pub source: ClassificationSource,
    /// 0.0-1.0, only meaningful for `ClassificationSource::Model`
    pub confidence: f32,
}

impl ClassificationResult {
    /// A rule match, reported with full confidence
    pub fn rule(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            source: ClassificationSource::Rule,
            confidence: 1.0,
        }
    }

    /// A model prediction
    pub fn model(category: impl Into<String>, confidence: f32) -> Self {
        Self {
            category: category.into(),
            source: ClassificationSource::Model,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The `Other` bucket
    pub fn fallback() -> Self {
        Self {
            category: OTHER_CATEGORY.to_string(),
            source: ClassificationSource::Fallback,
            confidence: 0.0,
        }
    }
}

const DEFAULT_EXTENSIONS: &[(&str, &[&str])] = &[
    (
        "Images",
        &[
            "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tiff", "tif", "ico", "heic", "heif",
        ],
    ),
    (
        "Documents",
        &["pdf", "doc", "docx", "txt", "rtf", "odt", "md", "html", "htm"],
    ),
    ("Spreadsheets", &["xls", "xlsx", "ods", "csv"]),
    ("Presentations", &["ppt", "pptx", "odp"]),
    ("Archives", &["zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar"]),
    ("Audio", &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"]),
    ("Video", &["mp4", "mov", "avi", "mkv", "wmv", "webm", "flv", "m4v"]),
    (
        "Code",
        &[
            "rs", "py", "js", "ts", "java", "c", "cpp", "h", "hpp", "go", "sh", "json", "xml",
            "yaml", "yml", "toml",
        ],
    ),
    ("Fonts", &["ttf", "otf", "woff", "woff2"]),
];

// Exact mime types first, then top-level prefixes.
const DEFAULT_MIMES: &[(&str, &str)] = &[
    ("application/pdf", "Documents"),
    ("application/rtf", "Documents"),
    ("application/msword", "Documents"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "Documents",
    ),
    ("application/vnd.oasis.opendocument.text", "Documents"),
    ("application/vnd.ms-excel", "Spreadsheets"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "Spreadsheets",
    ),
    ("application/vnd.ms-powerpoint", "Presentations"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "Presentations",
    ),
    ("application/zip", "Archives"),
    ("application/gzip", "Archives"),
    ("application/x-tar", "Archives"),
    ("application/x-bzip2", "Archives"),
    ("application/x-xz", "Archives"),
    ("application/x-7z-compressed", "Archives"),
    ("application/vnd.rar", "Archives"),
    ("application/x-rar-compressed", "Archives"),
];

const DEFAULT_MIME_PREFIXES: &[(&str, &str)] = &[
    ("image/", "Images"),
    ("audio/", "Audio"),
    ("video/", "Video"),
    ("font/", "Fonts"),
];

/// Maps extensions and mime types to category labels.
///
/// Lookups are case-insensitive. The table is fixed once built, so
/// every lookup is a pure function of its input.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    extension_map: HashMap<String, String>,
    mime_map: HashMap<String, String>,
}

impl CategoryRules {
    /// Create rules with the standard table
    pub fn new() -> Self {
        let mut rules = Self {
            extension_map: HashMap::new(),
            mime_map: HashMap::new(),
        };

        for (category, extensions) in DEFAULT_EXTENSIONS {
            for ext in extensions.iter() {
                rules.add_extension_mapping(ext, category);
            }
        }
        for (mime, category) in DEFAULT_MIMES {
            rules.mime_map.insert(mime.to_string(), category.to_string());
        }

        rules
    }

    /// Create the standard table with extra mappings layered on top.
    ///
    /// Entries in `overrides` replace default mappings for the same extension.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut rules = Self::new();
        for (ext, category) in overrides {
            rules.add_extension_mapping(ext, category);
        }
        rules
    }

    /// Add or replace an extension mapping. A leading dot is ignored.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) {
        let key = ext.trim_start_matches('.').to_lowercase();
        self.extension_map.insert(key, category.to_string());
    }

    /// Category for an extension, if any rule matches
    pub fn classify_by_rule(&self, extension: &str) -> Option<&str> {
        let key = extension.trim_start_matches('.').to_lowercase();
        self.extension_map.get(&key).map(String::as_str)
    }

    /// Category for a sniffed mime type, if any rule matches
    pub fn classify_by_mime(&self, mime: &str) -> Option<&str> {
        let mime = mime.to_lowercase();
        if let Some(category) = self.mime_map.get(&mime) {
            return Some(category.as_str());
        }

        DEFAULT_MIME_PREFIXES
            .iter()
            .find(|(prefix, _)| mime.starts_with(prefix))
            .map(|(_, category)| *category)
    }

    /// Rule classification for a file: extension first, then mime hint
    pub fn classify(
        &self,
        extension: Option<&str>,
        mime_hint: Option<&str>,
    ) -> Option<ClassificationResult> {
        extension
            .and_then(|ext| self.classify_by_rule(ext))
            .or_else(|| mime_hint.and_then(|mime| self.classify_by_mime(mime)))
            .map(ClassificationResult::rule)
    }

    /// The extension table grouped by category, sorted for display
    pub fn table(&self) -> BTreeMap<String, Vec<String>> {
        let mut table: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (ext, category) in &self.extension_map {
            table.entry(category.clone()).or_default().push(ext.clone());
        }
        for extensions in table.values_mut() {
            extensions.sort();
        }
        table
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_extensions_map_to_categories() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify_by_rule("jpg"), Some("Images"));
        assert_eq!(rules.classify_by_rule("png"), Some("Images"));
        assert_eq!(rules.classify_by_rule("pdf"), Some("Documents"));
        assert_eq!(rules.classify_by_rule("txt"), Some("Documents"));
        assert_eq!(rules.classify_by_rule("zip"), Some("Archives"));
        assert_eq!(rules.classify_by_rule("gz"), Some("Archives"));
        assert_eq!(rules.classify_by_rule("mp3"), Some("Audio"));
        assert_eq!(rules.classify_by_rule("mov"), Some("Video"));
    }

    #[test]
    fn lookup_is_case_insensitive_and_ignores_dot() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify_by_rule("JPG"), Some("Images"));
        assert_eq!(rules.classify_by_rule(".Docx"), Some("Documents"));
    }

    #[test]
    fn unknown_extension_has_no_rule() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify_by_rule("unknownext"), None);
        assert_eq!(rules.classify_by_rule(""), None);
    }

    #[test]
    fn rule_lookup_is_pure() {
        let rules = CategoryRules::default();
        let first = rules.classify_by_rule("wav");
        for _ in 0..10 {
            assert_eq!(rules.classify_by_rule("wav"), first);
        }
        assert_eq!(CategoryRules::new().classify_by_rule("wav"), first);
    }

    #[test]
    fn mime_hint_used_when_extension_unknown() {
        let rules = CategoryRules::default();
        let result = rules.classify(Some("bin"), Some("image/png")).unwrap();
        assert_eq!(result.category, "Images");
        assert_eq!(result.source, ClassificationSource::Rule);

        let result = rules.classify(None, Some("application/zip")).unwrap();
        assert_eq!(result.category, "Archives");
    }

    #[test]
    fn extension_wins_over_mime() {
        let rules = CategoryRules::default();
        let result = rules.classify(Some("txt"), Some("image/png")).unwrap();
        assert_eq!(result.category, "Documents");
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides: HashMap<String, String> = [
            ("md".to_string(), "Notes".to_string()),
            ("blend".to_string(), "3D".to_string()),
        ]
        .into_iter()
        .collect();

        let rules = CategoryRules::with_overrides(&overrides);
        assert_eq!(rules.classify_by_rule("md"), Some("Notes"));
        assert_eq!(rules.classify_by_rule("blend"), Some("3D"));
        assert_eq!(rules.classify_by_rule("pdf"), Some("Documents"));
    }

    #[test]
    fn fallback_is_other_with_zero_confidence() {
        let result = ClassificationResult::fallback();
        assert_eq!(result.category, OTHER_CATEGORY);
        assert_eq!(result.source, ClassificationSource::Fallback);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn table_groups_extensions() {
        let table = CategoryRules::default().table();
        assert!(table["Images"].contains(&"jpg".to_string()));
        assert!(table["Audio"].windows(2).all(|w| w[0] <= w[1]));
    }
}
