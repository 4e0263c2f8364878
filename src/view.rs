//! Card summaries for the page list, grouped into sections.
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::Fields;
use crate::grouping::GroupingConfig;
use crate::notion::model::{Page, Tag};

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Members,
    Articles,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Section {
    pub category: String,
    pub kind: SectionKind,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub keywords: Vec<Badge>,
    pub assignees: Vec<Badge>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub class: &'static str,
}

impl From<&Tag> for Badge {
    fn from(tag: &Tag) -> Self {
        Badge {
            id: tag.id.clone(),
            name: tag.name.clone(),
            class: tag.color.style_class(),
        }
    }
}

/// The title always comes from the single configured `title` property.
pub fn card(page: &Page, fields: &Fields) -> Card {
    let badges = |name: &str| -> Vec<Badge> { page.tags(name).iter().map(Badge::from).collect() };
    Card {
        id: page.id.clone(),
        title: page
            .first_text(&fields.title)
            .unwrap_or(UNTITLED)
            .to_string(),
        subtitle: page.first_text(&fields.subtitle).map(str::to_string),
        keywords: badges(&fields.keywords),
        assignees: badges(&fields.assignees),
        photo_url: page.files(&fields.photo).first().map(|f| f.url.clone()),
    }
}

pub fn sections(grouped: &IndexMap<String, Vec<Page>>, fields: &Fields) -> Vec<Section> {
    let grouping = GroupingConfig::from(fields);
    grouped
        .iter()
        .map(|(category, pages)| Section {
            category: category.clone(),
            kind: if grouping.is_members(category) {
                SectionKind::Members
            } else {
                SectionKind::Articles
            },
            cards: pages.iter().map(|p| card(p, fields)).collect(),
        })
        .collect()
}
