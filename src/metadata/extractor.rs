use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;
use url::{Host, Url};

use super::document::Document;
use crate::error::ExtractError;
use crate::models::ExtractedMetadata;

/// Pulls raw metadata fields out of a parsed page.
///
/// Implementations must be pure: no I/O, no shared mutable state. Returning
/// an error fails only the URL being processed.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, document: &Document, url: &Url) -> Result<ExtractedMetadata, ExtractError>;
}

// ── Selectors ──────────────────────────────────────────────────────────────

/// A field source: a selector plus the attribute holding the value.
/// `None` means the element's text content.
type Rule = (Selector, Option<&'static str>);

fn rules(specs: &[(&str, Option<&'static str>)]) -> Vec<Rule> {
    specs
        .iter()
        .filter_map(|(css, attr)| Selector::parse(css).ok().map(|s| (s, *attr)))
        .collect()
}

static TITLE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    rules(&[
        (r#"meta[property="og:title"]"#, Some("content")),
        (r#"meta[name="twitter:title"]"#, Some("content")),
        (r#"meta[property="twitter:title"]"#, Some("content")),
        ("title", None),
    ])
});

static DESCRIPTION_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    rules(&[
        (r#"meta[property="og:description"]"#, Some("content")),
        (r#"meta[name="twitter:description"]"#, Some("content")),
        (r#"meta[property="twitter:description"]"#, Some("content")),
        (r#"meta[name="description"]"#, Some("content")),
    ])
});

static PROVIDER_RULES: Lazy<Vec<Rule>> =
    Lazy::new(|| rules(&[(r#"meta[property="og:site_name"]"#, Some("content"))]));

static ICON_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    rules(&[
        (r#"link[rel="apple-touch-icon"]"#, Some("href")),
        (r#"link[rel="apple-touch-icon-precomposed"]"#, Some("href")),
        (r#"link[rel="icon"]"#, Some("href")),
        (r#"link[rel="fluid-icon"]"#, Some("href")),
        (r#"link[rel="shortcut icon"]"#, Some("href")),
        (r#"link[rel="Shortcut Icon"]"#, Some("href")),
        (r#"link[rel="mask-icon"]"#, Some("href")),
    ])
});

static IMAGE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    rules(&[
        (r#"meta[property="og:image"]"#, Some("content")),
        (r#"meta[property="og:image:url"]"#, Some("content")),
        (r#"meta[property="og:image:secure_url"]"#, Some("content")),
        (r#"meta[name="twitter:image"]"#, Some("content")),
        (r#"meta[property="twitter:image"]"#, Some("content")),
        (r#"meta[name="thumbnail"]"#, Some("content")),
        (r#"link[rel="image_src"]"#, Some("href")),
    ])
});

static CANONICAL_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    rules(&[
        (r#"meta[property="og:url"]"#, Some("content")),
        (r#"link[rel="canonical"]"#, Some("href")),
    ])
});

static WWW_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^www[a-zA-Z0-9]*\.").unwrap());

fn first_match(document: &Document, rules: &[Rule]) -> Option<String> {
    rules.iter().find_map(|(selector, attr)| match attr {
        Some(attr) => document.first_attr(selector, attr),
        None => document.first_text(selector),
    })
}

/// Site name derived from the host: `www.example.co.uk` → `example`.
/// IP hosts are returned as-is.
pub fn provider_from_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let stripped = WWW_PREFIX.replace(domain, "").replace(".co.", ".");
            let labels: Vec<&str> = stripped.split('.').collect();
            let name = if labels.len() > 1 {
                labels[..labels.len() - 1].join(" ")
            } else {
                stripped.clone()
            };
            Some(name).filter(|n| !n.is_empty())
        }
        Host::Ipv4(_) | Host::Ipv6(_) => url.host_str().map(str::to_string),
    }
}

// ── Default heuristics ─────────────────────────────────────────────────────

/// Open Graph first, then Twitter cards, then plain HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGraphExtractor;

impl MetadataExtractor for OpenGraphExtractor {
    fn extract(&self, document: &Document, url: &Url) -> Result<ExtractedMetadata, ExtractError> {
        Ok(ExtractedMetadata {
            title: first_match(document, &TITLE_RULES),
            description: first_match(document, &DESCRIPTION_RULES),
            provider: first_match(document, &PROVIDER_RULES).or_else(|| provider_from_host(url)),
            icon_url: first_match(document, &ICON_RULES),
            image_url: first_match(document, &IMAGE_RULES),
            canonical_url: first_match(document, &CANONICAL_RULES),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str, url: &str) -> ExtractedMetadata {
        OpenGraphExtractor
            .extract(&Document::parse(html), &Url::parse(url).unwrap())
            .unwrap()
    }

    #[test]
    fn extracts_og_title() {
        let html = r#"<html><head><meta property="og:title" content="My Title"/></head></html>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("My Title"));
    }

    #[test]
    fn falls_back_to_title_tag() {
        let html = r#"<html><head><title>Page Title</title></head></html>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("Page Title"));
    }

    #[test]
    fn og_title_takes_precedence_over_twitter_and_title_tag() {
        let html = r#"<html><head>
            <title>Page Title</title>
            <meta name="twitter:title" content="Tweet Title"/>
            <meta property="og:title" content="OG Title"/>
        </head></html>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn twitter_card_fills_missing_og_fields() {
        let html = r#"<html><head>
            <meta name="twitter:title" content="Tweet Title"/>
            <meta name="twitter:description" content="Tweet Desc"/>
            <meta name="twitter:image" content="/card.png"/>
        </head></html>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("Tweet Title"));
        assert_eq!(meta.description.as_deref(), Some("Tweet Desc"));
        assert_eq!(meta.image_url.as_deref(), Some("/card.png"));
    }

    #[test]
    fn extracts_all_og_fields() {
        let html = r#"<html><head>
            <meta property="og:title" content="T"/>
            <meta property="og:description" content="D"/>
            <meta property="og:image" content="https://example.com/img.png"/>
            <meta property="og:site_name" content="S"/>
            <meta property="og:url" content="https://example.com/canonical"/>
        </head></html>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("T"));
        assert_eq!(meta.description.as_deref(), Some("D"));
        assert_eq!(meta.image_url.as_deref(), Some("https://example.com/img.png"));
        assert_eq!(meta.provider.as_deref(), Some("S"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/canonical"));
    }

    #[test]
    fn reads_plain_html_fallbacks() {
        let html = r#"<html><head>
            <title>An Example Page</title>
            <meta name="description" content="An example description" />
            <meta name="thumbnail" content="http://www.example.com/preview.png" />
            <link rel="icon" href="http://www.example.com/rich-icon.png" />
            <link rel="canonical" href="/good" />
        </head></html>"#;
        let meta = extract(html, "http://www.example.com/good");
        assert_eq!(meta.title.as_deref(), Some("An Example Page"));
        assert_eq!(meta.description.as_deref(), Some("An example description"));
        assert_eq!(meta.image_url.as_deref(), Some("http://www.example.com/preview.png"));
        assert_eq!(meta.icon_url.as_deref(), Some("http://www.example.com/rich-icon.png"));
        assert_eq!(meta.canonical_url.as_deref(), Some("/good"));
    }

    #[test]
    fn apple_touch_icon_beats_plain_icon() {
        let html = r#"<head>
            <link rel="icon" href="/small.png">
            <link rel="apple-touch-icon" href="/big.png">
        </head>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.icon_url.as_deref(), Some("/big.png"));
    }

    #[test]
    fn og_image_beats_secure_url_and_twitter_image() {
        let html = r#"<head>
            <meta property="og:image:secure_url" content="https://cdn.example.com/secure.png">
            <meta name="twitter:image" content="/twitter.png">
            <meta property="og:image" content="/og.png">
        </head>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.image_url.as_deref(), Some("/og.png"));
    }

    #[test]
    fn secure_url_is_used_without_og_image() {
        let html = r#"<head>
            <meta name="twitter:image" content="/twitter.png">
            <meta property="og:image:secure_url" content="https://cdn.example.com/secure.png">
        </head>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.image_url.as_deref(), Some("https://cdn.example.com/secure.png"));
    }

    #[test]
    fn shortcut_icon_is_recognised() {
        let html = r#"<head><link rel="shortcut icon" href="/fav.ico"></head>"#;
        let meta = extract(html, "https://example.com");
        assert_eq!(meta.icon_url.as_deref(), Some("/fav.ico"));
    }

    #[test]
    fn provider_falls_back_to_host_name() {
        let meta = extract("<html><head></head></html>", "http://www.example.com/good");
        assert_eq!(meta.provider.as_deref(), Some("example"));
    }

    #[test]
    fn provider_heuristic_handles_country_domains_and_ips() {
        let url = Url::parse("https://news.bbc.co.uk/x").unwrap();
        assert_eq!(provider_from_host(&url).as_deref(), Some("news bbc"));
        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(provider_from_host(&url).as_deref(), Some("127.0.0.1"));
        let url = Url::parse("http://localhost/x").unwrap();
        assert_eq!(provider_from_host(&url).as_deref(), Some("localhost"));
    }

    #[test]
    fn returns_none_for_missing_fields() {
        let meta = extract("<html><head></head></html>", "https://example.com");
        assert!(meta.title.is_none());
        assert!(meta.description.is_none());
        assert!(meta.image_url.is_none());
        assert!(meta.icon_url.is_none());
        assert!(meta.canonical_url.is_none());
    }

    #[test]
    fn ignores_whitespace_only_content() {
        let html = r#"<html><head><meta property="og:title" content="   "/></head></html>"#;
        let meta = extract(html, "https://example.com");
        assert!(meta.title.is_none());
    }
}
