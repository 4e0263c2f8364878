//! Block → render node conversion and HTML serialization.
use serde::Serialize;

use crate::notion::model::{Block, BlockContent, ImageBlock, RichTextRun};

/// Alt text used when an image has no caption.
pub const IMAGE_PLACEHOLDER: &str = "content image";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum RenderNode {
    Heading { level: u8, children: Vec<Inline> },
    Paragraph { children: Vec<Inline> },
    ListItem { children: Vec<Inline> },
    Image {
        src: String,
        alt: String,
        caption: Option<String>,
    },
    Divider,
    Unsupported { type_tag: String },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "inline", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Marked { mark: Mark, child: Box<Inline> },
    Link { href: String, child: Box<Inline> },
}

pub fn render(block: &Block) -> RenderNode {
    match &block.content {
        BlockContent::Heading1(t) => heading(1, &t.rich_text),
        BlockContent::Heading2(t) => heading(2, &t.rich_text),
        BlockContent::Heading3(t) => heading(3, &t.rich_text),
        BlockContent::Paragraph(t) => RenderNode::Paragraph {
            children: render_runs(&t.rich_text),
        },
        BlockContent::BulletedListItem(t) => RenderNode::ListItem {
            children: render_runs(&t.rich_text),
        },
        BlockContent::Image(image) => render_image(image),
        BlockContent::Divider => RenderNode::Divider,
        BlockContent::Unsupported => RenderNode::Unsupported {
            type_tag: block.type_tag.clone(),
        },
    }
}

pub fn render_page(blocks: &[Block]) -> Vec<RenderNode> {
    blocks.iter().map(render).collect()
}

fn heading(level: u8, runs: &[RichTextRun]) -> RenderNode {
    RenderNode::Heading {
        level,
        children: render_runs(runs),
    }
}

fn render_image(image: &ImageBlock) -> RenderNode {
    let caption = image
        .caption
        .first()
        .map(|r| r.plain_text.clone())
        .filter(|c| !c.is_empty());
    RenderNode::Image {
        src: image.url.clone(),
        alt: caption.clone().unwrap_or_else(|| IMAGE_PLACEHOLDER.to_string()),
        caption,
    }
}

pub fn render_runs(runs: &[RichTextRun]) -> Vec<Inline> {
    runs.iter().map(render_run).collect()
}

/// Wraps the run text innermost to outermost: bold, italic, underline, code,
/// then link.
pub fn render_run(run: &RichTextRun) -> Inline {
    let a = run.annotations;
    let mut node = Inline::Text {
        text: run.plain_text.clone(),
    };
    for (on, mark) in [
        (a.bold, Mark::Bold),
        (a.italic, Mark::Italic),
        (a.underline, Mark::Underline),
        (a.code, Mark::Code),
    ] {
        if on {
            node = Inline::Marked {
                mark,
                child: Box::new(node),
            };
        }
    }
    if let Some(href) = run.href.as_deref().filter(|h| !h.is_empty()) {
        node = Inline::Link {
            href: href.to_string(),
            child: Box::new(node),
        };
    }
    node
}

pub fn to_html(nodes: &[RenderNode]) -> String {
    let mut out = String::new();
    let mut in_list = false;
    for node in nodes {
        let is_item = matches!(node, RenderNode::ListItem { .. });
        if is_item && !in_list {
            out.push_str("<ul>");
        } else if !is_item && in_list {
            out.push_str("</ul>\n");
        }
        in_list = is_item;
        write_node(&mut out, node);
        out.push('\n');
    }
    if in_list {
        out.push_str("</ul>\n");
    }
    out
}

fn write_node(out: &mut String, node: &RenderNode) {
    match node {
        RenderNode::Heading { level, children } => {
            out.push_str(&format!("<h{}>", level));
            write_inlines(out, children);
            out.push_str(&format!("</h{}>", level));
        }
        RenderNode::Paragraph { children } => {
            out.push_str("<p>");
            write_inlines(out, children);
            out.push_str("</p>");
        }
        RenderNode::ListItem { children } => {
            out.push_str("<li>");
            write_inlines(out, children);
            out.push_str("</li>");
        }
        RenderNode::Image { src, alt, caption } => {
            out.push_str(&format!(
                "<figure><img src=\"{}\" alt=\"{}\" loading=\"lazy\"/>",
                html_attr(src),
                html_attr(alt)
            ));
            if let Some(caption) = caption {
                out.push_str(&format!("<figcaption>{}</figcaption>", html_escape(caption)));
            }
            out.push_str("</figure>");
        }
        RenderNode::Divider => out.push_str("<hr/>"),
        RenderNode::Unsupported { type_tag } => {
            out.push_str(&format!(
                "<p class=\"unsupported\">Unsupported block: {}</p>",
                html_escape(type_tag)
            ));
        }
    }
}

fn write_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        write_inline(out, inline);
    }
}

fn write_inline(out: &mut String, inline: &Inline) {
    match inline {
        Inline::Text { text } => out.push_str(&html_escape(text)),
        Inline::Marked { mark, child } => {
            let tag = match mark {
                Mark::Bold => "strong",
                Mark::Italic => "em",
                Mark::Underline => "u",
                Mark::Code => "code",
            };
            out.push_str(&format!("<{}>", tag));
            write_inline(out, child);
            out.push_str(&format!("</{}>", tag));
        }
        Inline::Link { href, child } => {
            out.push_str(&format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                html_attr(href)
            ));
            write_inline(out, child);
            out.push_str("</a>");
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `html_escape` plus double quotes, for attribute values.
pub fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}
