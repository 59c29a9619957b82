//! Main-content text extraction.
//!
//! Looks for a primary-content container first and falls back to the
//! paragraphs, headings and list items of the body. Read-only: the DOM is
//! never touched.

use crate::config::ContentConfig;
use crate::dom::selector::Selector;
use crate::dom::{Document, NodeId};

const FALLBACK_BLOCKS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li"];

/// First configured container whose rendered text is substantial.
fn main_container(doc: &Document, config: &ContentConfig) -> Option<(NodeId, String)> {
    for raw in &config.content_selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Skipping content selector {:?}: {}", raw, e);
                continue;
            }
        };
        if let Some(el) = doc.query_selector(doc.root(), &selector) {
            let text = doc.rendered_text(el);
            if text.chars().count() > config.substantial_content_chars {
                log::debug!("Content container matched by {:?}", raw);
                return Some((el, text));
            }
        }
    }
    None
}

/// The page's headline: the first `<h1>`, else `document.title`.
pub fn page_title(doc: &Document) -> String {
    doc.query_selector(doc.root(), &Selector::tag("h1"))
        .map(|h1| doc.rendered_text(h1).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| doc.title())
}

/// Extract the substantive text of the page, headline first.
pub fn extract_content(doc: &Document, config: &ContentConfig) -> String {
    let scope = doc.body().unwrap_or_else(|| doc.root());

    let text = match main_container(doc, config) {
        Some((_, text)) => text,
        None => {
            // Blocks that render nothing are dropped so a page of empty
            // paragraphs still yields its body text.
            let blocks: Vec<String> = doc
                .query_selector_all(scope, &Selector::tags(FALLBACK_BLOCKS))
                .into_iter()
                .map(|b| doc.rendered_text(b))
                .filter(|t| !t.is_empty())
                .collect();
            if blocks.is_empty() {
                doc.rendered_text(scope)
            } else {
                blocks.join("\n\n")
            }
        }
    };

    let title = page_title(doc);
    if title.is_empty() || text.contains(&title) {
        text
    } else if text.is_empty() {
        title
    } else {
        format!("{}\n\n{}", title, text)
    }
}
