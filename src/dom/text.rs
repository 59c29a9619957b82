//! Rendered text, an approximation of the browser's `innerText`.
//!
//! Whitespace inside text runs collapses to single spaces, block elements
//! start and end lines, paragraphs are separated by a blank line, `<br>`
//! forces a newline. Non-rendered subtrees (`script`, `style`, `hidden`,
//! `display: none`, ...) contribute nothing.

use super::{Document, NodeId, NodeType};

/// Elements whose content never renders as text.
const NON_RENDERED: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "meta", "link",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "li", "main", "nav", "ol", "pre", "section", "summary", "table",
    "tr", "ul",
];

enum Piece {
    Text(String),
    /// Required line breaks around a block; adjacent requests take the max.
    Break(usize),
    Newline,
}

fn is_collapsible(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0C')
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.chars() {
        if is_collapsible(ch) {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

fn trim_trailing_spaces(out: &mut String) {
    let len = out.trim_end_matches(' ').len();
    out.truncate(len);
}

impl Document {
    fn is_rendered(&self, id: NodeId) -> bool {
        match self.element(id) {
            Some(el) => {
                !NON_RENDERED.contains(&el.tag.as_str())
                    && el.attr("hidden").is_none()
                    && !self.style(id).hides()
            }
            None => true,
        }
    }

    fn collect_pieces(&self, id: NodeId, out: &mut Vec<Piece>) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(t) => out.push(Piece::Text(t.clone())),
            NodeType::Document => {
                for &child in self.children(id) {
                    self.collect_pieces(child, out);
                }
            }
            NodeType::Element(el) => {
                if !self.is_rendered(id) {
                    return;
                }
                if el.tag == "br" {
                    out.push(Piece::Newline);
                    return;
                }
                let breaks = if el.tag == "p" {
                    2
                } else if BLOCK_TAGS.contains(&el.tag.as_str()) {
                    1
                } else {
                    0
                };
                if breaks > 0 {
                    out.push(Piece::Break(breaks));
                }
                for &child in self.children(id) {
                    self.collect_pieces(child, out);
                }
                if breaks > 0 {
                    out.push(Piece::Break(breaks));
                }
            }
        }
    }

    /// Text of the subtree as a reader would see it on screen.
    pub fn rendered_text(&self, id: NodeId) -> String {
        if !self.is_rendered(id) {
            return String::new();
        }
        let Some(node) = self.node(id) else {
            return String::new();
        };
        let mut pieces = Vec::new();
        match &node.node_type {
            // The element's own block breaks are not part of its text.
            NodeType::Element(_) => {
                for &child in self.children(id) {
                    self.collect_pieces(child, &mut pieces);
                }
            }
            _ => self.collect_pieces(id, &mut pieces),
        }

        let mut out = String::new();
        let mut pending = 0usize;
        for piece in pieces {
            match piece {
                Piece::Break(n) => pending = pending.max(n),
                Piece::Newline => {
                    trim_trailing_spaces(&mut out);
                    out.push('\n');
                    pending = 0;
                }
                Piece::Text(raw) => {
                    let collapsed = collapse_whitespace(&raw);
                    let at_line_start = out.is_empty() || pending > 0 || out.ends_with('\n');
                    let text = if at_line_start || out.ends_with(' ') {
                        collapsed.trim_start_matches(' ')
                    } else {
                        collapsed.as_str()
                    };
                    if text.is_empty() {
                        continue;
                    }
                    if pending > 0 && !out.is_empty() {
                        trim_trailing_spaces(&mut out);
                        let have = out.len() - out.trim_end_matches('\n').len();
                        for _ in have..pending {
                            out.push('\n');
                        }
                    }
                    pending = 0;
                    out.push_str(text);
                }
            }
        }
        out.trim_end().to_string()
    }
}
