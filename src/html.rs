//! Text and attribute extraction from HTML pages.
//!
//! These are wrappers over `scraper`: they take CSS selectors, run them, and
//! massage the matches (trim, drop blanks, dedup, absolutize, join) into an
//! [`Extracted`] value.

use crate::error::{AppError, Result};
use crate::models::Extracted;
use crate::urls::{absolute_url, is_same_domain};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use url::Url;

/// A parsed HTML document together with the URL it was served from.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: Url,
    document: Html,
}

impl HtmlPage {
    /// Wraps raw HTML text as a page located at `url`.
    pub fn from_text(text: &str, url: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            document: Html::parse_document(text),
        })
    }

    /// Reads an HTML file from disk as a page located at `url`.
    pub fn load_file(path: &Path, url: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_text(&text, url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// Options for [`parse_text`].
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    /// Return every match instead of the one at `index`.
    pub extract_all: bool,
    /// Which match to return when `extract_all` is off. Out of range falls back to 0.
    pub index: usize,
    /// Join all matches into a single string with this separator.
    pub join_with: Option<String>,
    /// Only direct text children of the matched elements, not nested text.
    pub direct_only: bool,
    /// Tag names whose text is dropped along with the tag, e.g. `script`.
    pub filtered_tags: Vec<String>,
}

/// Options for [`parse_attr`].
#[derive(Debug, Clone)]
pub struct AttrOptions {
    /// Resolve values against the page URL.
    pub absolute: bool,
    /// Drop repeated values, keeping first-seen order.
    pub unique: bool,
    /// Keep only values that point at the page's own host.
    pub same_domain: bool,
    /// Join all values into a single string with this separator.
    pub join_with: Option<String>,
}

impl Default for AttrOptions {
    fn default() -> Self {
        Self {
            absolute: true,
            unique: true,
            same_domain: false,
            join_with: None,
        }
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

fn element_texts(element: ElementRef<'_>, direct_only: bool, filtered: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    if direct_only {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push(String::from(&**text));
            }
        }
        return out;
    }

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| filtered.iter().any(|tag| tag.eq_ignore_ascii_case(a.value().name())));
        if !hidden {
            out.push(String::from(&**text));
        }
    }
    out
}

/// Extracts text from `page`.
///
/// Selectors are tried in order and the first one yielding any text wins.
/// With no selectors, all text in the document is used.
pub fn parse_text(page: &HtmlPage, selectors: &[&str], opts: &TextOptions) -> Result<Extracted> {
    let mut texts = Vec::new();

    if selectors.is_empty() {
        texts = element_texts(page.document.root_element(), opts.direct_only, &opts.filtered_tags);
    } else {
        for selector in selectors {
            let compiled = compile(selector)?;
            texts = page
                .document
                .select(&compiled)
                .flat_map(|el| element_texts(el, opts.direct_only, &opts.filtered_tags))
                .filter(|t| !t.trim().is_empty())
                .collect();
            if !texts.is_empty() {
                break;
            }
            tracing::debug!("Selector '{}' matched no text on {}", selector, page.url);
        }
    }

    let texts: Vec<String> = texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if texts.is_empty() {
        return Ok(Extracted::Empty);
    }
    if opts.extract_all {
        return Ok(match &opts.join_with {
            Some(separator) => Extracted::joined(texts, separator),
            None => Extracted::Many(texts),
        });
    }

    let index = if opts.index < texts.len() { opts.index } else { 0 };
    Ok(Extracted::Single(texts[index].clone()))
}

/// Extracts attribute `attr` from `page`.
///
/// Selectors are tried in order and the first one producing any value wins.
/// With no selectors, every element carrying `attr` is used.
pub fn parse_attr(
    page: &HtmlPage,
    selectors: &[&str],
    attr: &str,
    opts: &AttrOptions,
) -> Result<Extracted> {
    let fallback = format!("[{}]", attr);
    let candidates: Vec<&str> = if selectors.is_empty() {
        vec![fallback.as_str()]
    } else {
        selectors.to_vec()
    };

    let mut values: Vec<String> = Vec::new();
    for selector in candidates {
        let compiled = compile(selector)?;
        values = page
            .document
            .select(&compiled)
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if !values.is_empty() {
            break;
        }
    }

    if opts.absolute {
        values = values
            .into_iter()
            .map(|v| match absolute_url(&page.url, &v) {
                Ok(abs) => abs.to_string(),
                Err(e) => {
                    tracing::debug!("Keeping unresolvable value '{}' as-is: {}", v, e);
                    v
                }
            })
            .collect();
    }

    if opts.same_domain {
        values.retain(|v| {
            Url::parse(v)
                .map(|u| is_same_domain(&page.url, &u))
                .unwrap_or(false)
        });
    }

    if opts.unique {
        let mut seen = HashSet::new();
        values.retain(|v| seen.insert(v.clone()));
    }

    Ok(match &opts.join_with {
        Some(separator) => Extracted::joined(values, separator),
        None => Extracted::from_list(values),
    })
}

/// Strips tags from `text` and decodes HTML entities, e.g. `&#39;` to `'`.
pub fn remove_html_from_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect::<String>().trim().to_string()
}
