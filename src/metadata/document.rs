use scraper::{ElementRef, Html, Selector};

/// A parsed, read-only HTML document.
///
/// Parsing never fails: malformed markup yields whatever tree the HTML5
/// tree builder recovers. Scripts are not run and subresources are not
/// loaded. `Document` is not `Send`, so it must be dropped before the next
/// await point.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        Document {
            html: Html::parse_document(text),
        }
    }

    /// Elements matching `selector`, in document order.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(selector)
    }

    /// The first non-blank value of `attr` among elements matching `selector`.
    pub fn first_attr(&self, selector: &Selector, attr: &str) -> Option<String> {
        self.select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Trimmed text content of the first element matching `selector`.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Parse errors the tree builder recovered from.
    pub fn recovered_errors(&self) -> usize {
        self.html.errors.len()
    }
}
