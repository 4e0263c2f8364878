use anyhow::{anyhow, Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use tracing::info;

use notion_showcase::config::{self, Config};
use notion_showcase::grouping::{group, GroupingConfig};
use notion_showcase::notion::{ContentSource, NotionSource};
use notion_showcase::render::{html_attr, html_escape, render_page, to_html};
use notion_showcase::view::{card, Card};

/// Upper bound on block fetches in flight.
const CONCURRENT_FETCHES: usize = 4;

#[derive(Debug, Parser)]
#[command(
    about = "Export published Notion pages to a standalone HTML file. Images render via their Notion URLs."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Export only this page (must be published)
    #[arg(long)]
    page_id: Option<String>,

    /// Output file
    #[arg(long, default_value = "export.html")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    run(&cfg, args.page_id.as_deref(), &args.out).await
}

async fn run(cfg: &Config, page_id: Option<&str>, out: &std::path::Path) -> Result<()> {
    let source = NotionSource::from_config(cfg).context("failed to build HTTP client")?;
    let fields = &cfg.notion.fields;

    let mut pages = source
        .fetch_published_pages()
        .await
        .context("failed to fetch published pages")?;
    if let Some(id) = page_id {
        pages.retain(|p| p.id == id);
        if pages.is_empty() {
            return Err(anyhow!("page '{}' is not among the published pages", id));
        }
    }

    let grouped = group(pages, &GroupingConfig::from(fields));

    let mut body = String::new();
    for (category, pages) in &grouped {
        body.push_str(&format!("<section><h1>{}</h1>\n", html_escape(category)));

        // fetch bodies concurrently; `buffered` keeps page order
        let rendered: Vec<String> = stream::iter(pages.iter().map(|page| {
            let source = &source;
            async move {
                let blocks = source
                    .fetch_page_blocks(&page.id)
                    .await
                    .with_context(|| format!("failed to fetch blocks of {}", page.id))?;
                Ok::<_, anyhow::Error>(to_html(&render_page(&blocks)))
            }
        }))
        .buffered(CONCURRENT_FETCHES)
        .try_collect()
        .await?;

        for (page, html) in pages.iter().zip(rendered) {
            body.push_str(&article_header(&card(page, fields)));
            body.push_str(&html);
            body.push_str("</article>\n");
        }
        body.push_str("</section>\n");
    }

    let document = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"/><title>Export</title></head>\n<body>\n{}</body></html>\n",
        body
    );
    tokio::fs::write(out, document)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(out = %out.display(), sections = grouped.len(), "export written");
    Ok(())
}

fn article_header(c: &Card) -> String {
    let mut out = format!(
        "<article id=\"{}\"><h2>{}</h2>\n",
        html_attr(&c.id),
        html_escape(&c.title)
    );
    if let Some(subtitle) = &c.subtitle {
        out.push_str(&format!("<p class=\"subtitle\">{}</p>\n", html_escape(subtitle)));
    }
    out
}
