//! Claim highlighting.
//!
//! Each claim is wrapped at its first occurrence inside a single text node.
//! Claims split across inline elements, and further occurrences of a claim,
//! are left alone.

use crate::dom::range::{Surrounded, TextRange};
use crate::dom::selector::Selector;
use crate::dom::{Document, DomError, NodeId};

use super::{BADGE_CLASS, CLAIM_ATTR, HIGHLIGHT_CLASS};

/// Text under these parents is never matched.
const SKIP_PARENTS: &[&str] = &["script", "style", "noscript"];

const HIGHLIGHT_STYLE: &str =
    "background-color: #fce8e6; border-bottom: 2px solid #c5221f; cursor: pointer;";
const HIGHLIGHT_TOOLTIP: &str = "Click to verify with Data Commons";

/// Outcome of one highlighting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightStats {
    pub highlighted: usize,
    /// Empty or too short to match safely.
    pub skipped: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Text nodes eligible for matching, in document order.
fn candidate_text_nodes(doc: &Document) -> Vec<NodeId> {
    let scope = doc.body().unwrap_or_else(|| doc.root());
    doc.descendants(scope)
        .into_iter()
        .filter(|&n| doc.is_text(n))
        .filter(|&n| match doc.parent(n) {
            Some(parent) => {
                let skipped_tag = doc
                    .tag_name(parent)
                    .map_or(false, |t| SKIP_PARENTS.contains(&t));
                !skipped_tag && !doc.is_content_editable(parent)
            }
            None => false,
        })
        .collect()
}

fn create_highlight_span(doc: &mut Document, claim: &str) -> NodeId {
    let span = doc.create_element("span");
    if let Some(el) = doc.element_mut(span) {
        el.set_attr("class", HIGHLIGHT_CLASS);
        el.set_attr("style", HIGHLIGHT_STYLE);
        el.set_attr("title", HIGHLIGHT_TOOLTIP);
        el.set_attr(CLAIM_ATTR, claim);
    }
    span
}

/// Wrap `claim`, found at byte `start` of the text node `node`, in a new
/// highlight span.
fn wrap_claim(
    doc: &mut Document,
    node: NodeId,
    start: usize,
    claim: &str,
) -> Result<Surrounded, DomError> {
    let span = create_highlight_span(doc, claim);
    let range = TextRange {
        node,
        start,
        end: start + claim.len(),
    };
    doc.surround_contents(range, span)
}

/// Highlight the first occurrence of `claim` among `candidates`.
fn highlight_claim(
    doc: &mut Document,
    candidates: &mut Vec<NodeId>,
    claim: &str,
    stats: &mut HighlightStats,
) {
    let found = candidates.iter().enumerate().find_map(|(idx, &node)| {
        doc.text(node)
            .and_then(|text| text.find(claim))
            .map(|start| (idx, node, start))
    });
    let Some((idx, node, start)) = found else {
        log::debug!("Claim not found on page: {:?}", claim);
        stats.not_found += 1;
        return;
    };

    match wrap_claim(doc, node, start, claim) {
        Ok(split) => {
            // The wrapped text is no longer a candidate; what is left on
            // either side still is.
            let rest: Vec<NodeId> = split.before.into_iter().chain(split.after).collect();
            candidates.splice(idx..=idx, rest);
            stats.highlighted += 1;
        }
        Err(e) => {
            log::error!("Failed to highlight {:?}: {}", claim, e);
            stats.failed += 1;
        }
    }
}

/// Replace existing highlights with the given claims.
pub fn highlight_claims(doc: &mut Document, claims: &[String], min_chars: usize) -> HighlightStats {
    let cleared = clear_highlights(doc);
    if cleared > 0 {
        log::debug!("Cleared {} previous highlights", cleared);
    }

    let mut stats = HighlightStats::default();
    if claims.is_empty() {
        return stats;
    }

    let mut candidates = candidate_text_nodes(doc);

    for claim in claims {
        if claim.is_empty() || claim.chars().count() < min_chars {
            stats.skipped += 1;
            continue;
        }

        highlight_claim(doc, &mut candidates, claim, &mut stats);
    }

    log::info!(
        "Highlighted {} of {} claims ({} skipped, {} not found, {} failed)",
        stats.highlighted,
        claims.len(),
        stats.skipped,
        stats.not_found,
        stats.failed
    );
    stats
}

/// Unwrap every highlight back into plain text. Returns how many were
/// removed; zero highlights is a no-op.
pub fn clear_highlights(doc: &mut Document) -> usize {
    let spans = doc.query_selector_all(doc.root(), &Selector::class(HIGHLIGHT_CLASS));
    let mut removed = 0;
    for span in spans {
        let Some(parent) = doc.parent(span) else {
            continue;
        };
        for badge in doc.query_selector_all(span, &Selector::class(BADGE_CLASS)) {
            if let Some(holder) = doc.parent(badge) {
                if let Err(e) = doc.remove_child(holder, badge) {
                    log::debug!("Could not remove verdict badge: {}", e);
                }
            }
        }
        let text = doc.text_content(span);
        let plain = doc.create_text(text);
        match doc.replace_child(parent, plain, span) {
            Ok(()) => {
                doc.normalize(parent);
                removed += 1;
            }
            Err(e) => log::warn!("Could not unwrap highlight: {}", e),
        }
    }
    removed
}

/// Highlight spans currently carrying exactly this claim.
pub fn highlights_for<'a>(doc: &'a Document, claim: &'a str) -> impl Iterator<Item = NodeId> + 'a {
    doc.query_selector_all(doc.root(), &Selector::class(HIGHLIGHT_CLASS))
        .into_iter()
        .filter(move |&span| doc.attr(span, CLAIM_ATTR) == Some(claim))
}
