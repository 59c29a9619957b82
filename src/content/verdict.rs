//! Verdict painting on highlighted claims.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::selector::Selector;
use crate::dom::Document;

use super::highlight::highlights_for;
use super::BADGE_CLASS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Supported,
    Disputed,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown verdict {0:?}")]
pub struct UnknownVerdict(pub String);

impl FromStr for Verdict {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPPORTED" => Ok(Verdict::Supported),
            "DISPUTED" => Ok(Verdict::Disputed),
            "UNSUPPORTED" => Ok(Verdict::Unsupported),
            other => Err(UnknownVerdict(other.to_string())),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Supported => "SUPPORTED",
            Verdict::Disputed => "DISPUTED",
            Verdict::Unsupported => "UNSUPPORTED",
        })
    }
}

/// How a verdict looks on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictStyle {
    pub background: &'static str,
    /// Underline and badge colour.
    pub accent: &'static str,
    pub tooltip: &'static str,
    pub badge_text: &'static str,
}

impl Verdict {
    pub fn style(self) -> VerdictStyle {
        match self {
            Verdict::Supported => VerdictStyle {
                background: "#e6f4ea",
                accent: "#137333",
                tooltip: "Data Commons: Supported",
                badge_text: "✓ Supported",
            },
            Verdict::Disputed => VerdictStyle {
                background: "#fef7e0",
                accent: "#e37400",
                tooltip: "Data Commons: Disputed",
                badge_text: "⚠ Disputed",
            },
            Verdict::Unsupported => VerdictStyle {
                background: "#f1f3f4",
                accent: "#5f6368",
                tooltip: "Data Commons: Unsupported",
                badge_text: "? Unsupported",
            },
        }
    }
}

/// Paint `verdict` on every highlight of `claim`. Unknown verdict strings
/// are ignored. Returns the number of spans updated.
pub fn apply_verdict(doc: &mut Document, claim: &str, verdict: &str) -> usize {
    let Ok(verdict) = verdict.parse::<Verdict>() else {
        log::debug!("Ignoring unrecognized verdict {:?} for {:?}", verdict, claim);
        return 0;
    };
    let style = verdict.style();
    let spans: Vec<_> = highlights_for(doc, claim).collect();

    for &span in &spans {
        for badge in doc.query_selector_all(span, &Selector::class(BADGE_CLASS)) {
            if let Some(holder) = doc.parent(badge) {
                if let Err(e) = doc.remove_child(holder, badge) {
                    log::debug!("Could not remove old verdict badge: {}", e);
                }
            }
        }

        let painted = doc
            .set_style_property(span, "background-color", style.background)
            .and_then(|_| {
                doc.set_style_property(span, "border-bottom", &format!("2px solid {}", style.accent))
            })
            .and_then(|_| doc.set_attr(span, "title", style.tooltip));
        if let Err(e) = painted {
            log::warn!("Could not paint verdict on highlight: {}", e);
        }

        let badge = doc.create_element("span");
        let label = doc.create_text(style.badge_text);
        if let Some(el) = doc.element_mut(badge) {
            el.set_attr("class", BADGE_CLASS);
            el.set_attr(
                "style",
                format!(
                    "background-color: {}; color: #fff; font-size: 10px; font-weight: bold; \
                     margin-left: 4px; padding: 1px 4px; border-radius: 8px;",
                    style.accent
                ),
            );
        }
        let attached = doc
            .append_child(badge, label)
            .and_then(|_| doc.append_child(span, badge));
        if let Err(e) = attached {
            log::warn!("Could not attach verdict badge: {}", e);
        }
    }

    if !spans.is_empty() {
        log::debug!("Marked {} highlight(s) of {:?} as {}", spans.len(), claim, verdict);
    }
    spans.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::highlight::highlight_claims;
    use crate::dom::parser::parse_html;
    use crate::dom::NodeId;

    fn highlighted(html: &str, claim: &str) -> (Document, NodeId) {
        let mut doc = parse_html(html, "");
        highlight_claims(&mut doc, &[claim.to_string()], 5);
        let span = highlights_for(&doc, claim).next().unwrap();
        (doc, span)
    }

    fn badges(doc: &Document, span: NodeId) -> Vec<NodeId> {
        doc.query_selector_all(span, &Selector::class(BADGE_CLASS))
    }

    #[test]
    fn disputed_paints_span_and_appends_badge() {
        let (mut doc, span) = highlighted("<p>The sky is blue today.</p>", "sky is blue");
        assert_eq!(apply_verdict(&mut doc, "sky is blue", "DISPUTED"), 1);

        let css = doc.style(span);
        assert_eq!(css.get("background-color"), Some("#fef7e0"));
        assert_eq!(css.get("border-bottom"), Some("2px solid #e37400"));
        assert_eq!(css.get("cursor"), Some("pointer"));
        assert_eq!(doc.attr(span, "title"), Some("Data Commons: Disputed"));

        let b = badges(&doc, span);
        assert_eq!(b.len(), 1);
        assert_eq!(doc.text_content(b[0]), "⚠ Disputed");
    }

    #[test]
    fn repeated_verdicts_keep_one_badge() {
        let (mut doc, span) = highlighted("<p>Exports doubled in 2020.</p>", "Exports doubled");
        apply_verdict(&mut doc, "Exports doubled", "SUPPORTED");
        apply_verdict(&mut doc, "Exports doubled", "SUPPORTED");
        assert_eq!(badges(&doc, span).len(), 1);

        apply_verdict(&mut doc, "Exports doubled", "UNSUPPORTED");
        let b = badges(&doc, span);
        assert_eq!(b.len(), 1);
        assert_eq!(doc.text_content(b[0]), "? Unsupported");
        assert_eq!(doc.style(span).get("background-color"), Some("#f1f3f4"));
    }

    #[test]
    fn unknown_verdict_or_claim_changes_nothing() {
        let (mut doc, _span) = highlighted("<p>The sky is blue today.</p>", "sky is blue");
        let before = doc.inner_html(doc.root());
        assert_eq!(apply_verdict(&mut doc, "sky is blue", "MAYBE"), 0);
        assert_eq!(apply_verdict(&mut doc, "grass is green", "SUPPORTED"), 0);
        assert_eq!(doc.inner_html(doc.root()), before);
    }

    #[test]
    fn verdict_parsing_is_exact() {
        assert_eq!("DISPUTED".parse::<Verdict>(), Ok(Verdict::Disputed));
        assert!("disputed".parse::<Verdict>().is_err());
        assert_eq!(Verdict::Unsupported.to_string(), "UNSUPPORTED");
    }
}
