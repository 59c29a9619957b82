//! Context synthesis for a clicked highlight.
//!
//! Builds a one-line description of where a claim sits on the page: page
//! title, nearest section heading (or the page's H1), and the text of the
//! enclosing element.

use thiserror::Error;

use crate::dom::selector::Selector;
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("highlight {0:?} is no longer attached to the page")]
    Detached(NodeId),
}

/// Pieces gathered so far; whatever is present when collection stops is
/// what gets sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextParts {
    pub page_title: String,
    pub section: String,
    pub main_header: String,
    pub surrounding: String,
}

impl ContextParts {
    pub fn render(&self, claim: &str) -> String {
        let mut parts = Vec::new();
        if !self.page_title.is_empty() {
            parts.push(format!("Page: {}", self.page_title));
        }
        if !self.section.is_empty() {
            parts.push(format!("Section: {}", self.section));
        } else if !self.main_header.is_empty() && self.main_header != self.page_title {
            parts.push(format!("Title: {}", self.main_header));
        }
        if !self.surrounding.is_empty() && self.surrounding != claim {
            parts.push(format!("Surrounding Text: \"{}\"", self.surrounding));
        }
        parts.join(" | ")
    }
}

/// Cut to `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Text of the nearest heading among the preceding siblings of `start` or
/// of any of its ancestors, stopping below `<body>`. A heading that renders
/// nothing ends the search on its level and the walk moves up.
fn nearest_section_heading(doc: &Document, start: NodeId) -> Option<String> {
    let mut current = Some(start);
    while let Some(node) = current {
        if doc.tag_name(node).map_or(true, |t| t == "body") {
            break;
        }
        let mut sibling = doc.previous_element_sibling(node);
        while let Some(s) = sibling {
            if doc.element(s).map_or(false, |el| el.is_heading()) {
                let text = doc.rendered_text(s);
                if !text.trim().is_empty() {
                    return Some(text);
                }
                break;
            }
            sibling = doc.previous_element_sibling(s);
        }
        current = doc.parent(node);
    }
    None
}

fn collect(
    doc: &Document,
    span: NodeId,
    max_chars: usize,
    parts: &mut ContextParts,
) -> Result<(), ContextError> {
    let parent = doc
        .parent(span)
        .filter(|&p| doc.is_connected(p))
        .ok_or(ContextError::Detached(span))?;

    parts.surrounding = truncate_chars(&doc.rendered_text(parent), max_chars);

    if let Some(section) = nearest_section_heading(doc, parent) {
        parts.section = section;
    }

    parts.page_title = doc.title();
    if let Some(h1) = doc.query_selector(doc.root(), &Selector::tag("h1")) {
        parts.main_header = doc.rendered_text(h1);
    }
    Ok(())
}

/// Context string for the highlight `span` wrapping `claim`. Collection
/// failures are logged and the partial context is returned.
pub fn synthesize_context(doc: &Document, span: NodeId, claim: &str, max_chars: usize) -> String {
    let mut parts = ContextParts::default();
    if let Err(e) = collect(doc, span, max_chars, &mut parts) {
        log::warn!("Could not get context: {}", e);
    }
    parts.render(claim)
}
