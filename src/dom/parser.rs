use crate::dom::{Document, NodeId};
use scraper::{ElementRef, Html, Node};

/// Parse raw HTML into an arena [`Document`].
///
/// Every text node is kept, including whitespace-only runs and the bodies of
/// `<script>`/`<style>`, so that the tree mirrors what a content script
/// would see in a live page.
pub fn parse_html(html: &str, url: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    doc.url = url.to_string();

    let root = doc.root();
    convert_element(parsed.root_element(), &mut doc, root);
    doc
}

fn convert_element(el: ElementRef<'_>, doc: &mut Document, parent: NodeId) {
    let id = doc.create_element(el.value().name());
    if let Some(element) = doc.element_mut(id) {
        for (k, v) in el.value().attrs() {
            element.set_attr(k, v);
        }
    }
    if doc.append_child(parent, id).is_err() {
        return;
    }

    for child_ref in el.children() {
        match child_ref.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child_ref) {
                    convert_element(child_el, doc, id);
                }
            }
            Node::Text(t) => {
                let text = doc.create_text(&**t);
                if let Err(e) = doc.append_child(id, text) {
                    log::debug!("Dropping text under <{}>: {}", el.value().name(), e);
                }
            }
            _ => {}
        }
    }
}
