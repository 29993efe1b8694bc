//! Website fetching and HTML text extraction.

use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::ingest::IngestError;
use crate::models::document::IngestMetadata;

const FETCH_TIMEOUT_SECS: u64 = 30;
/// Extractions shorter than this fall through to the next strategy.
const MIN_CONTENT_LEN: usize = 100;

/// Content containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "#content", ".content", "#main", ".main"];

/// Elements stripped before text extraction.
const NOISE_SELECTORS: &[&str] = &[
    "script", "style", "header", "footer", "nav", "noscript", "iframe", "head",
];

/// Metadata scraped from the page itself, merged under caller-supplied
/// metadata (the caller's values win).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteMetadata {
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_title: Option<String>,
    pub site_name: Option<String>,
}

/// Fetches the page body, following redirects.
pub async fn fetch_html(http: &reqwest::Client, url: &str) -> Result<String, IngestError> {
    let response = http
        .get(url)
        .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| IngestError::Extraction(format!("failed to fetch {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Extraction(format!(
            "fetch of {url} returned {status}"
        )));
    }

    response
        .text()
        .await
        .map_err(|e| IngestError::Extraction(format!("failed to read body of {url}: {e}")))
}

/// Extracts readable text from an HTML document: noise elements removed,
/// preferred content containers first, whitespace collapsed.
pub fn extract_text(html: &str) -> Result<String, IngestError> {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&sel).next() {
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if text.len() >= MIN_CONTENT_LEN {
                debug!("Extracted website text via container {selector}");
                return Ok(text);
            }
        }
    }

    // No substantial content container: take the whole body minus noise.
    let text = body_text(&document);
    if text.trim().len() < 10 {
        return Err(IngestError::Extraction(
            "unable to extract meaningful text from website".to_string(),
        ));
    }
    Ok(text)
}

fn body_text(document: &Html) -> String {
    let noise: Vec<Selector> = NOISE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();
    let body = Selector::parse("body").expect("static selector");

    let Some(body_el) = document.select(&body).next() else {
        return String::new();
    };

    let mut parts = Vec::new();
    for node in body_el.descendants() {
        if let Some(text) = node.value().as_text() {
            // Skip text that lives under a noise element.
            let in_noise = node.ancestors().any(|a| {
                scraper::ElementRef::wrap(a)
                    .map(|el| noise.iter().any(|sel| sel.matches(&el)))
                    .unwrap_or(false)
            });
            if !in_noise {
                parts.push(text.trim());
            }
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scrapes title/description/OpenGraph metadata from the page.
pub fn scrape_site_metadata(url: &str, html: &str) -> SiteMetadata {
    let document = Html::parse_document(html);
    let mut meta = SiteMetadata {
        domain: domain_of(url),
        ..Default::default()
    };

    if let Ok(sel) = Selector::parse("title") {
        meta.title = document
            .select(&sel)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty());
    }

    meta.description = meta_content(&document, "meta[name=\"description\"]")
        .or_else(|| meta_content(&document, "meta[property=\"og:description\"]"));
    meta.og_title = meta_content(&document, "meta[property=\"og:title\"]");
    meta.site_name = meta_content(&document, "meta[property=\"og:site_name\"]");

    if meta.title.is_none() {
        meta.title = meta.og_title.clone();
    }
    if meta.title.is_none() {
        meta.title = Some(format!("Content from {}", meta.domain));
    }

    meta
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn domain_of(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = stripped.split(['/', '?', '#']).next().unwrap_or(stripped);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

impl SiteMetadata {
    /// Fills gaps in caller-supplied metadata with scraped values.
    pub fn merge_into(&self, mut metadata: IngestMetadata) -> IngestMetadata {
        if metadata.title.is_empty() {
            metadata.title = self.title.clone().unwrap_or_default();
        }
        if metadata.description.is_none() {
            metadata.description = self.description.clone();
        }
        if metadata.mime_type.is_none() {
            metadata.mime_type = Some("text/html".to_string());
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Offshore Wind Careers</title>
            <meta name="description" content="A guide to offshore wind jobs.">
            <meta property="og:site_name" content="Climate Jobs Board">
          </head>
          <body>
            <nav>Home About Contact</nav>
            <main>
              Offshore wind is one of the fastest growing clean energy sectors.
              Turbine technicians, vessel crews, and grid engineers are all in
              demand along the coast, with training programs expanding every year.
            </main>
            <footer>Copyright</footer>
          </body>
        </html>"#;

    #[test]
    fn test_extracts_main_container_text() {
        let text = extract_text(PAGE).unwrap();
        assert!(text.contains("Turbine technicians"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Home About Contact"));
    }

    #[test]
    fn test_body_fallback_skips_noise_elements() {
        let html = r#"<html><body>
            <script>var x = 1;</script>
            <p>Visible paragraph text here.</p>
        </body></html>"#;
        let text = extract_text(html).unwrap();
        assert!(text.contains("Visible paragraph"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_empty_page_is_an_extraction_error() {
        assert!(extract_text("<html><body></body></html>").is_err());
    }

    #[test]
    fn test_scrapes_title_and_description() {
        let meta = scrape_site_metadata("https://www.example.org/guide", PAGE);
        assert_eq!(meta.title.as_deref(), Some("Offshore Wind Careers"));
        assert_eq!(
            meta.description.as_deref(),
            Some("A guide to offshore wind jobs.")
        );
        assert_eq!(meta.site_name.as_deref(), Some("Climate Jobs Board"));
        assert_eq!(meta.domain, "example.org");
    }

    #[test]
    fn test_title_defaults_to_domain() {
        let meta = scrape_site_metadata("http://example.com/x", "<html><body>hi</body></html>");
        assert_eq!(meta.title.as_deref(), Some("Content from example.com"));
    }

    #[test]
    fn test_domain_strips_scheme_www_and_path() {
        assert_eq!(domain_of("https://www.masscec.com/programs?a=1"), "masscec.com");
        assert_eq!(domain_of("http://example.org"), "example.org");
    }

    #[test]
    fn test_merge_prefers_caller_metadata() {
        let site = SiteMetadata {
            domain: "example.com".to_string(),
            title: Some("Scraped".to_string()),
            description: Some("scraped description".to_string()),
            ..Default::default()
        };
        let caller = IngestMetadata {
            title: "Caller Title".to_string(),
            ..Default::default()
        };
        let merged = site.merge_into(caller);
        assert_eq!(merged.title, "Caller Title");
        assert_eq!(merged.description.as_deref(), Some("scraped description"));
        assert_eq!(merged.mime_type.as_deref(), Some("text/html"));
    }
}
