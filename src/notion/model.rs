//! Typed view of the Notion page and block payloads.
//!
//! Properties and blocks are decoded through `serde_json::Value` so that a
//! payload of an unexpected shape degrades to an `Unsupported` arm instead of
//! failing the whole response. Serialization writes the same
//! `{ "type": kind, kind: payload }` shape back out, so served JSON decodes
//! again into equal values.
use chrono::{DateTime, Utc};
use serde::ser::{Error as _, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: String,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, PageProperty>,
}

impl Page {
    pub fn property(&self, name: &str) -> Option<&PageProperty> {
        self.properties.get(name)
    }

    /// Name of a select or status property, if set and non-empty.
    pub fn option_name(&self, name: &str) -> Option<&str> {
        match self.property(name)? {
            PageProperty::Select(Some(opt)) | PageProperty::Status(Some(opt)) => {
                Some(opt.name.as_str()).filter(|n| !n.is_empty())
            }
            _ => None,
        }
    }

    /// Text of the first run of a title or rich-text property.
    pub fn first_text(&self, name: &str) -> Option<&str> {
        match self.property(name)? {
            PageProperty::Title(runs) | PageProperty::RichText(runs) => runs
                .first()
                .map(|r| r.plain_text.as_str())
                .filter(|t| !t.is_empty()),
            _ => None,
        }
    }

    /// Tags of a multi-select property; empty when absent.
    pub fn tags(&self, name: &str) -> &[Tag] {
        match self.property(name) {
            Some(PageProperty::MultiSelect(tags)) => tags.as_slice(),
            _ => &[],
        }
    }

    /// Files of a file-reference property; empty when absent.
    pub fn files(&self, name: &str) -> &[FileRef] {
        match self.property(name) {
            Some(PageProperty::Files(files)) => files.as_slice(),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageProperty {
    Title(Vec<RichTextRun>),
    RichText(Vec<RichTextRun>),
    Select(Option<SelectOption>),
    Status(Option<SelectOption>),
    MultiSelect(Vec<Tag>),
    Files(Vec<FileRef>),
    Unsupported,
}

impl From<Value> for PageProperty {
    fn from(value: Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        let Some(payload) = value.get(kind).cloned() else {
            return PageProperty::Unsupported;
        };
        let parsed = match kind {
            "title" => serde_json::from_value(payload).map(PageProperty::Title),
            "rich_text" => serde_json::from_value(payload).map(PageProperty::RichText),
            "select" => serde_json::from_value(payload).map(PageProperty::Select),
            "status" => serde_json::from_value(payload).map(PageProperty::Status),
            "multi_select" => serde_json::from_value(payload).map(PageProperty::MultiSelect),
            "files" => serde_json::from_value::<Vec<Value>>(payload).map(|files| {
                PageProperty::Files(files.iter().filter_map(FileRef::from_value).collect())
            }),
            _ => return PageProperty::Unsupported,
        };
        parsed.unwrap_or(PageProperty::Unsupported)
    }
}

impl Serialize for PageProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageProperty::Title(runs) => tagged(serializer, None, "title", runs),
            PageProperty::RichText(runs) => tagged(serializer, None, "rich_text", runs),
            PageProperty::Select(opt) => tagged(serializer, None, "select", opt),
            PageProperty::Status(opt) => tagged(serializer, None, "status", opt),
            PageProperty::MultiSelect(tags) => tagged(serializer, None, "multi_select", tags),
            PageProperty::Files(files) => {
                let files: Vec<Value> = files.iter().map(FileRef::to_value).collect();
                tagged(serializer, None, "files", &files)
            }
            PageProperty::Unsupported => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", "unsupported")?;
                map.end()
            }
        }
    }
}

/// Writes `{ "id"?, "type": kind, kind: payload }`.
fn tagged<S, T>(serializer: S, id: Option<&str>, kind: &str, payload: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(None)?;
    if let Some(id) = id {
        map.serialize_entry("id", id)?;
    }
    map.serialize_entry("type", kind)?;
    map.serialize_entry(kind, payload)?;
    map.end()
}

impl<'de> Deserialize<'de> for PageProperty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(PageProperty::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectOption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub color: TagColor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: TagColor,
}

/// Closed badge palette. Colour names outside the palette fall back to
/// `Default`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TagColor {
    Gray,
    Brown,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Red,
    #[default]
    #[serde(other)]
    Default,
}

impl TagColor {
    pub fn style_class(self) -> &'static str {
        match self {
            TagColor::Default | TagColor::Gray => "bg-gray-100 text-gray-800",
            TagColor::Brown | TagColor::Yellow => "bg-yellow-100 text-yellow-800",
            TagColor::Orange => "bg-orange-100 text-orange-800",
            TagColor::Green => "bg-green-100 text-green-800",
            TagColor::Blue => "bg-blue-100 text-blue-800",
            TagColor::Purple => "bg-purple-100 text-purple-800",
            TagColor::Pink => "bg-pink-100 text-pink-800",
            TagColor::Red => "bg-red-100 text-red-800",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

impl FileRef {
    /// Accepts both Notion-hosted (`file`) and `external` entries.
    fn from_value(value: &Value) -> Option<Self> {
        let url = hosted_url(value)?;
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(FileRef { name, url })
    }

    fn to_value(&self) -> Value {
        json!({ "name": self.name, "type": "external", "external": { "url": self.url } })
    }
}

/// URL of a `{ "type": "file" | "external", ... }` object.
pub(crate) fn hosted_url(value: &Value) -> Option<String> {
    let kind = value.get("type").and_then(Value::as_str)?;
    if kind != "file" && kind != "external" {
        return None;
    }
    value
        .get(kind)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RichTextRun {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub type_tag: String,
    pub content: BlockContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Heading1(TextBlock),
    Heading2(TextBlock),
    Heading3(TextBlock),
    Paragraph(TextBlock),
    BulletedListItem(TextBlock),
    Image(ImageBlock),
    Divider,
    Unsupported,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextBlock {
    pub rich_text: Vec<RichTextRun>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub url: String,
    pub caption: Vec<RichTextRun>,
}

impl ImageBlock {
    fn from_value(value: &Value) -> Option<Self> {
        let url = hosted_url(value)?;
        let caption = match value.get("caption") {
            Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone()).ok()?,
            _ => Vec::new(),
        };
        Some(ImageBlock { url, caption })
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        Ok(json!({
            "type": "external",
            "external": { "url": self.url },
            "caption": serde_json::to_value(&self.caption)?,
        }))
    }
}

impl BlockContent {
    fn decode(type_tag: &str, payload: Option<&Value>) -> Self {
        let Some(payload) = payload else {
            return BlockContent::Unsupported;
        };
        let text = || serde_json::from_value::<TextBlock>(payload.clone()).ok();
        let decoded = match type_tag {
            "heading_1" => text().map(BlockContent::Heading1),
            "heading_2" => text().map(BlockContent::Heading2),
            "heading_3" => text().map(BlockContent::Heading3),
            "paragraph" => text().map(BlockContent::Paragraph),
            "bulleted_list_item" => text().map(BlockContent::BulletedListItem),
            "image" => ImageBlock::from_value(payload).map(BlockContent::Image),
            "divider" => payload.is_object().then_some(BlockContent::Divider),
            _ => None,
        };
        decoded.unwrap_or(BlockContent::Unsupported)
    }
}

impl From<Value> for Block {
    fn from(value: Value) -> Self {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let type_tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let content = BlockContent::decode(&type_tag, value.get(&type_tag));
        Block {
            id,
            type_tag,
            content,
        }
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let id = Some(self.id.as_str());
        let kind = self.type_tag.as_str();
        match &self.content {
            BlockContent::Heading1(text)
            | BlockContent::Heading2(text)
            | BlockContent::Heading3(text)
            | BlockContent::Paragraph(text)
            | BlockContent::BulletedListItem(text) => tagged(serializer, id, kind, text),
            BlockContent::Image(image) => {
                let payload = image.to_value().map_err(S::Error::custom)?;
                tagged(serializer, id, kind, &payload)
            }
            BlockContent::Divider => tagged(serializer, id, kind, &json!({})),
            // no payload, so the block decodes as unsupported again
            BlockContent::Unsupported => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("id", &self.id)?;
                map.serialize_entry("type", kind)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Block::from)
    }
}

/// `{ "results": [...] }` envelope shared by query and list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}
