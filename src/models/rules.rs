use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed set of classification buckets. Files whose extension matches no
/// rule fall into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Images,
    Documents,
    Software,
    Archives,
    Videos,
    Audio,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "Images",
            Self::Documents => "Documents",
            Self::Software => "Software",
            Self::Archives => "Archives",
            Self::Videos => "Videos",
            Self::Audio => "Audio",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Images" => Ok(Self::Images),
            "Documents" => Ok(Self::Documents),
            "Software" => Ok(Self::Software),
            "Archives" => Ok(Self::Archives),
            "Videos" => Ok(Self::Videos),
            "Audio" => Ok(Self::Audio),
            "Other" => Ok(Self::Other),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// One rule row as exposed to callers: a category and the extensions it claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    pub extensions: Vec<String>,
}

/// Extension-to-category rule set.
///
/// Entries keep registration order; registering an extension again moves the
/// claim to the new category (last-registered wins). Extensions are stored
/// lower-cased without a leading dot. The rule set is loaded as a snapshot at
/// the start of each operation and is never mutated by the scanner or the
/// organizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationRules {
    entries: Vec<(String, Category)>,
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

impl OrganizationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock downloads-folder rule set.
    pub fn defaults() -> Self {
        let mut rules = Self::new();
        let seed: &[(Category, &[&str])] = &[
            (
                Category::Images,
                &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "avif"],
            ),
            (
                Category::Documents,
                &[
                    "pdf", "doc", "docx", "txt", "rtf", "xls", "xlsx", "ppt", "pptx", "csv",
                ],
            ),
            (Category::Software, &["exe", "msi", "dmg", "app", "deb", "rpm"]),
            (Category::Archives, &["zip", "rar", "7z", "tar", "gz"]),
            (Category::Videos, &["mp4", "mov", "avi", "mkv", "wmv", "flv"]),
            (Category::Audio, &["mp3", "wav", "aac", "flac", "ogg"]),
        ];
        for (category, extensions) in seed {
            for ext in *extensions {
                rules.insert(ext, *category);
            }
        }
        rules
    }

    /// Registers an extension under a category, stealing it from any
    /// previous owner.
    pub fn insert(&mut self, extension: &str, category: Category) {
        let ext = normalize_extension(extension);
        if ext.is_empty() {
            return;
        }
        self.entries.retain(|(e, _)| *e != ext);
        self.entries.push((ext, category));
    }

    pub fn category_for(&self, extension: &str) -> Option<Category> {
        let ext = normalize_extension(extension);
        self.entries
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, c)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Category)> {
        self.entries.iter().map(|(e, c)| (e.as_str(), *c))
    }

    /// Groups entries by category for the rules endpoint, preserving
    /// registration order within each category.
    pub fn by_category(&self) -> Vec<CategoryRule> {
        let mut out: Vec<CategoryRule> = Vec::new();
        for (ext, category) in &self.entries {
            match out.iter_mut().find(|r| r.category == *category) {
                Some(rule) => rule.extensions.push(ext.clone()),
                None => out.push(CategoryRule {
                    category: *category,
                    extensions: vec![ext.clone()],
                }),
            }
        }
        out
    }

    pub fn from_rules(rules: &[CategoryRule]) -> Self {
        let mut out = Self::new();
        for rule in rules {
            for ext in &rule.extensions {
                out.insert(ext, rule.category);
            }
        }
        out
    }
}
