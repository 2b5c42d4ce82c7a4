//! Utility functions for handling domain names and URLs.

use crate::error::{AppError, Result};
use url::Url;

const ABOUT_KEYWORDS: &[&str] = &["about", "about-us", "who-we-are", "team", "our-team"];
const CONTACT_KEYWORDS: &[&str] = &["contact", "contact-us", "get-in-touch", "reach-us"];
const ASSET_EXTENSIONS: &[&str] = &[".css", ".js", ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".svg"];

fn with_scheme(website_url_str: &str) -> String {
    if !website_url_str.starts_with("http://") && !website_url_str.starts_with("https://") {
        format!("https://{}", website_url_str)
    } else {
        website_url_str.to_string()
    }
}

/// Extracts the base domain name (e.g., "example.com") from a given URL string.
/// Handles missing schemes, "www." prefixes, and ports.
///
/// # Returns
/// * `Ok(String)` containing the lowercase domain name if successful.
/// * `Err(AppError::Config)` if the URL is empty or has no host.
pub fn get_domain_from_url(website_url_str: &str) -> Result<String> {
    let trimmed = website_url_str.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("URL string is empty".to_string()));
    }

    let url = Url::parse(&with_scheme(trimmed))?;
    let host = url.host_str().ok_or_else(|| {
        AppError::Config(format!("Could not extract host from URL: {}", trimmed))
    })?;

    let domain = host.strip_prefix("www.").unwrap_or(host).to_lowercase();
    tracing::debug!("Extracted domain '{}' from '{}'", domain, trimmed);
    Ok(domain)
}

/// Parses the input website string into a valid Url object, adding a scheme if necessary.
pub fn normalize_url(website_url_str: &str) -> Result<Url> {
    let trimmed = website_url_str.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("Website URL is empty".to_string()));
    }
    Ok(Url::parse(&with_scheme(trimmed))?)
}

/// Lowercased path of `url`; strings that do not parse are treated as a path.
fn lower_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase())
}

/// True if the URL path suggests an "About Us" page.
pub fn is_about_page(url: &str) -> bool {
    let path = lower_path(url);
    ABOUT_KEYWORDS.iter().any(|k| path.contains(k))
}

/// True if the URL path suggests a "Contact Us" page. Static assets never match.
pub fn is_contact_page(url: &str) -> bool {
    let path = lower_path(url);
    if ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    CONTACT_KEYWORDS.iter().any(|k| path.contains(k))
}

pub fn is_about_or_contact_page(url: &str) -> bool {
    is_about_page(url) || is_contact_page(url)
}

/// Builds a Google search URL for `query`, form-encoded.
pub fn google_search_url(query: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        "https://www.google.com/search",
        &[("q", query)],
    )?)
}

/// Resolves `href` against `base`. Absolute hrefs come back unchanged.
pub fn absolute_url(base: &Url, href: &str) -> Result<Url> {
    Ok(base.join(href.trim())?)
}

/// True when both URLs share the same host and port.
pub fn is_same_domain(base: &Url, other: &Url) -> bool {
    base.host_str() == other.host_str() && base.port_or_known_default() == other.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain_from_url_simple() {
        assert_eq!(
            get_domain_from_url("https://www.example.com").unwrap(),
            "example.com"
        );
        assert_eq!(
            get_domain_from_url("http://example.com").unwrap(),
            "example.com"
        );
        assert_eq!(get_domain_from_url("example.com").unwrap(), "example.com");
    }

    #[test]
    fn test_get_domain_from_url_edge_cases() {
        assert_eq!(
            get_domain_from_url("https://EXAMPLE.com/path?query=1").unwrap(),
            "example.com"
        );
        assert_eq!(
            get_domain_from_url("http://example.com:8080").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn test_get_domain_from_url_invalid() {
        assert!(get_domain_from_url("").is_err());
        assert!(get_domain_from_url("http://").is_err());
    }

    #[test]
    fn test_page_classifiers() {
        assert!(is_about_page("https://acme.com/about-us"));
        assert!(is_about_page("https://acme.com/company/our-team"));
        assert!(!is_about_page("https://acme.com/pricing"));

        assert!(is_contact_page("https://acme.com/Contact"));
        assert!(is_contact_page("https://acme.com/get-in-touch/"));
        assert!(!is_contact_page("https://acme.com/static/contact.png"));
        assert!(!is_contact_page("https://acme.com/blog"));

        assert!(is_about_or_contact_page("https://acme.com/reach-us"));
        assert!(!is_about_or_contact_page("https://acme.com/"));
    }

    #[test]
    fn test_google_search_url() {
        let url = google_search_url("site:linkedin.com acme corp").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.google.com/search?q=site%3Alinkedin.com+acme+corp"
        );
    }

    #[test]
    fn test_absolute_and_same_domain() {
        let base = Url::parse("https://acme.com/team/").unwrap();
        let abs = absolute_url(&base, "../contact").unwrap();
        assert_eq!(abs.as_str(), "https://acme.com/contact");
        assert!(is_same_domain(&base, &abs));

        let other = absolute_url(&base, "https://other.org/x").unwrap();
        assert!(!is_same_domain(&base, &other));
    }
}
