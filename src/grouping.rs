//! Partitioning of fetched pages into category buckets.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Fields;
use crate::notion::model::Page;

/// Bucket for pages without a category.
pub const OTHER_CATEGORY: &str = "Other";

static MEMBERS_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)member").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingConfig {
    pub category_property: String,
    pub members_label: String,
}

impl From<&Fields> for GroupingConfig {
    fn from(fields: &Fields) -> Self {
        Self {
            category_property: fields.category.clone(),
            members_label: fields.members_label.clone(),
        }
    }
}

impl GroupingConfig {
    pub fn is_members(&self, category: &str) -> bool {
        MEMBERS_KEYWORD.is_match(category)
            || (!self.members_label.is_empty() && category == self.members_label)
    }
}

/// Buckets pages by category, in order of first appearance. The members
/// bucket is ordered most recently edited first; every other bucket keeps
/// the source order.
pub fn group(pages: Vec<Page>, cfg: &GroupingConfig) -> IndexMap<String, Vec<Page>> {
    let mut buckets: IndexMap<String, Vec<Page>> = IndexMap::new();
    for page in pages {
        let category = page
            .option_name(&cfg.category_property)
            .unwrap_or(OTHER_CATEGORY)
            .to_string();
        buckets.entry(category).or_default().push(page);
    }

    for (category, pages) in buckets.iter_mut() {
        if cfg.is_members(category) {
            // stable: equal timestamps keep their relative order
            pages.sort_by(|a, b| b.last_edited_time.cmp(&a.last_edited_time));
        }
    }
    buckets
}
