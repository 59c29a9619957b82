//! HTML serialization of the arena tree.

use super::{Document, NodeId, NodeType};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

impl Document {
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self
            .tag_name(id)
            .map_or(false, |t| RAW_TEXT_TAGS.contains(&t));
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, raw, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.node_type {
            NodeType::Document => {
                for &child in self.children(id) {
                    self.write_node(child, false, out);
                }
            }
            NodeType::Text(t) if raw_text => out.push_str(t),
            NodeType::Text(t) => escape_text(t, out),
            NodeType::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (k, v) in &el.attributes {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_attr(v, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&el.tag.as_str()) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}
