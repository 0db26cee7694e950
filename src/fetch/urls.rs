use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::warn;

use crate::error::ScrapeError;

/// Index page listing one downloadable zip archive per year.
pub const DEFAULT_INDEX_URL: &str = "https://ehw.fit.vutbr.cz/izv/";

/// Primary download buttons on the index page.
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.btn-primary").expect("valid link selector"));

/// Table cells carrying the year labels.
static YEAR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.align-middle").expect("valid year cell selector"));

/// Fetch the index page body.
pub async fn fetch_index(client: &Client, index_url: &str) -> Result<String> {
    client
        .get(index_url)
        .send()
        .await
        .with_context(|| format!("GET {index_url}"))?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("reading body from {index_url}"))
}

/// Resolve the index page into an ordered list of archive references, one per
/// year label on the page.
///
/// Primary download links are `<a class="btn-primary">` hrefs; year labels
/// are the text of `<td class="align-middle">` cells. A year without a
/// matching `data/data-gis{Y}.zip` or `data/data-rok-{Y}.zip` link falls back
/// to the last primary link in document order. Document order says nothing
/// about recency, so every fallback is logged; the behavior is kept for
/// compatibility with the upstream index layout.
pub fn resolve_archives(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let links: Vec<String> = document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.to_string())
        .collect();

    if links.is_empty() {
        return Err(ScrapeError::NoDownloadLinks.into());
    }

    let mut archives = Vec::new();
    for cell in document.select(&YEAR_SELECTOR) {
        let year: String = cell.text().collect::<String>().trim().to_string();
        let pattern = Regex::new(&format!(
            r"^data/data-(?:gis{y}|rok-{y})\.zip",
            y = regex::escape(&year)
        ))
        .context("building per-year archive pattern")?;

        match links.iter().find(|link| pattern.is_match(link)) {
            Some(link) => archives.push(link.clone()),
            None => {
                // Last primary link in document order.
                let fallback = links.last().expect("non-empty link list");
                warn!(%year, %fallback, "no archive link for year; using last primary link");
                archives.push(fallback.clone());
            }
        }
    }

    Ok(archives)
}
