use crate::models::file_record::FileRecord;
use crate::models::rules::{Category, OrganizationRules};

/// Maps an extension to a category. Pure: identical inputs always yield the
/// same output, so records can be re-classified after rule edits with no
/// side effects. Unmatched extensions (and files without one) are `Other`.
pub fn classify(extension: Option<&str>, rules: &OrganizationRules) -> Category {
    extension
        .and_then(|ext| rules.category_for(ext))
        .unwrap_or(Category::Other)
}

/// Resolves a record's category, trusting the stored value when present and
/// falling back to the rules otherwise. Never writes to the index.
pub fn classify_record(record: &FileRecord, rules: &OrganizationRules) -> Category {
    record
        .category
        .unwrap_or_else(|| classify(record.extension.as_deref(), rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_and_unknown() {
        let rules = OrganizationRules::defaults();
        assert_eq!(classify(Some("jpg"), &rules), Category::Images);
        assert_eq!(classify(Some("JPG"), &rules), Category::Images);
        assert_eq!(classify(Some("xyz"), &rules), Category::Other);
        assert_eq!(classify(None, &rules), Category::Other);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let rules = OrganizationRules::defaults();
        for _ in 0..3 {
            assert_eq!(classify(Some("pdf"), &rules), Category::Documents);
        }
    }

    #[test]
    fn test_stored_category_wins() {
        let rules = OrganizationRules::defaults();
        let record = FileRecord {
            path: "/dl/x.jpg".into(),
            name: "x.jpg".into(),
            extension: Some("jpg".into()),
            mime_type: None,
            size_bytes: 1,
            content_hash: None,
            category: Some(Category::Documents),
            created_at: None,
            modified_at: None,
            is_organized: false,
            original_name: "x.jpg".into(),
            new_name: None,
            last_seen_scan_id: None,
        };
        assert_eq!(classify_record(&record, &rules), Category::Documents);
    }
}
