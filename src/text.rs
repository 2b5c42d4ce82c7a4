//! Regex-driven text helpers: email extraction and edge cleaning.

use crate::error::Result;
use crate::models::Extracted;
use crate::urls::get_domain_from_url;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+").unwrap());

static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());

/// Characters trimmed from both ends by [`strip_special_characters`].
const EDGE_CHARS: &str = ",.?!@#$%^&*()_+=-[]{}|;:\"'<>/\\`~";

/// Options for [`parse_emails`].
#[derive(Debug, Clone)]
pub struct EmailOptions {
    /// Drop repeated addresses, keeping first-seen order.
    pub unique: bool,
    /// Join the matches into one string with this separator.
    pub join_with: Option<String>,
    /// Keep only addresses on this site's domain (URL or bare host).
    pub domain: Option<String>,
}

impl Default for EmailOptions {
    fn default() -> Self {
        Self {
            unique: true,
            join_with: None,
            domain: None,
        }
    }
}

/// Extracts email addresses from free text.
///
/// Trailing dots picked up from sentence punctuation are removed. Returns
/// `Extracted::Empty` when nothing matches, `Single` when `join_with` is set,
/// `Many` otherwise.
pub fn parse_emails(text: &str, opts: &EmailOptions) -> Result<Extracted> {
    let domain_suffix = match opts.domain.as_deref() {
        Some(site) => Some(format!("@{}", get_domain_from_url(site)?)),
        None => None,
    };

    let mut seen = HashSet::new();
    let emails: Vec<String> = EMAIL_REGEX
        .find_iter(text.trim())
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|email| match &domain_suffix {
            Some(suffix) => email.to_lowercase().ends_with(suffix.as_str()),
            None => true,
        })
        .filter(|email| !opts.unique || seen.insert(email.clone()))
        .collect();

    tracing::debug!("Extracted {} email(s) from {} chars", emails.len(), text.len());

    Ok(match &opts.join_with {
        Some(separator) => Extracted::joined(emails, separator),
        None => Extracted::from_list(emails),
    })
}

/// Strips whitespace, punctuation and symbols from both sides of `text`.
/// Characters inside the text are left alone.
pub fn strip_special_characters(text: &str) -> &str {
    text.trim().trim_matches(|c: char| EDGE_CHARS.contains(c)).trim()
}

/// Removes every occurrence of `substring` and trims. An empty `substring`
/// leaves the input as it was.
pub fn remove_substring(text: &str, substring: &str) -> String {
    if substring.is_empty() {
        return text.to_string();
    }
    text.replace(substring, "").trim().to_string()
}

/// Applies [`remove_substring`] for each entry in order.
pub fn remove_substrings<S: AsRef<str>>(text: &str, substrings: &[S]) -> String {
    substrings
        .iter()
        .fold(text.to_string(), |acc, sub| remove_substring(&acc, sub.as_ref()))
}

/// True if `text` contains anything that looks like an HTML tag.
pub fn contains_html_tags(text: &str) -> bool {
    HTML_TAG_REGEX.is_match(text)
}
