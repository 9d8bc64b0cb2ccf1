use url::Url;

/// Make `candidate` absolute with respect to `base`.
///
/// A candidate that already names a host is returned unchanged. Everything
/// else, including protocol-relative `//host/path` links, is joined onto the
/// base per RFC 3986. Never fails.
pub fn make_url_absolute(base: &Url, candidate: &str) -> String {
    let candidate = candidate.trim();

    if let Ok(parsed) = Url::parse(candidate) {
        if parsed.has_host() {
            return candidate.to_string();
        }
    }

    match base.join(candidate) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!(
            "{}/{}",
            base.origin().ascii_serialization(),
            candidate.trim_start_matches('/')
        ),
    }
}

/// `{scheme}://{host}/favicon.ico` for the given page.
pub fn default_favicon(base: &Url) -> String {
    make_url_absolute(base, "/favicon.ico")
}
