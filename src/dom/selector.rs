//! CSS selector matching over the arena DOM.
//!
//! Parsing is scraper's (`scraper::selector::Parser` into a
//! `selectors::SelectorList`), so the full selector grammar is available,
//! combinators included. Matching runs `selectors` against [`DomElement`],
//! a borrowed view of one arena element.

use html5ever::Namespace;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::{self, ParseRelative, SelectorList};
use selectors::{NthIndexCache, OpaqueElement};
use thiserror::Error;

use super::{Document, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {input:?}: {reason}")]
pub struct SelectorError {
    pub input: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Selector {
    selectors: Vec<parser::Selector<Simple>>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser_input = cssparser::ParserInput::new(input);
        let mut css = cssparser::Parser::new(&mut parser_input);
        SelectorList::parse(&scraper::selector::Parser, &mut css, ParseRelative::No)
            .map(|list| Self {
                selectors: list.0.into_iter().collect(),
            })
            .map_err(|e| SelectorError {
                input: input.to_string(),
                reason: scraper::error::SelectorErrorKind::from(e).to_string(),
            })
    }

    /// Parse a selector built in code. A bad one is logged and matches
    /// nothing.
    fn built(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|e| {
            log::error!("{}", e);
            Self {
                selectors: Vec::new(),
            }
        })
    }

    pub fn tag(tag: &str) -> Self {
        Self::tags(&[tag])
    }

    /// `a, b, c` over plain tag names.
    pub fn tags(tags: &[&str]) -> Self {
        Self::built(&tags.join(", "))
    }

    pub fn class(class: &str) -> Self {
        let mut css = String::from(".");
        if cssparser::serialize_identifier(class, &mut css).is_err() {
            log::error!("Cannot serialize class name {:?}", class);
        }
        Self::built(&css)
    }

    /// Whether the element `id` of `doc` matches. Non-elements never do.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(element) = DomElement::new(doc, id) else {
            return false;
        };
        let mut cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            matching::MatchingMode::Normal,
            None,
            &mut cache,
            matching::QuirksMode::NoQuirks,
            matching::NeedsSelectorFlags::No,
            matching::IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .iter()
            .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
    }
}

/// One element of a [`Document`], as seen by the selector engine.
#[derive(Debug, Clone, Copy)]
pub struct DomElement<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> DomElement<'a> {
    pub fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|_| Self { doc, id })
    }

    fn tag(&self) -> &'a str {
        self.doc.tag_name(self.id).unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.doc.attr(self.id, name)
    }

    fn wrap(&self, id: NodeId) -> Option<Self> {
        Self::new(self.doc, id)
    }

    fn siblings(&self) -> &'a [NodeId] {
        self.doc
            .parent(self.id)
            .map(|p| self.doc.children(p))
            .unwrap_or_default()
    }

    fn position(&self) -> Option<usize> {
        self.siblings().iter().position(|&c| c == self.id)
    }
}

impl<'a> selectors::Element for DomElement<'a> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        match self.doc.node(self.id) {
            Some(node) => OpaqueElement::new(node),
            None => OpaqueElement::new(self.doc),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent(self.id).and_then(|p| self.wrap(p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let idx = self.position()?;
        self.siblings()[..idx]
            .iter()
            .rev()
            .find_map(|&c| self.wrap(c))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let idx = self.position()?;
        self.siblings()[idx + 1..].iter().find_map(|&c| self.wrap(c))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .children(self.id)
            .iter()
            .find_map(|&c| self.wrap(c))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        &*name.0 == self.tag()
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // Arena attributes carry no namespace.
        if matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.attr(&*local_name.0)
            .map_or(false, |value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.tag(), "a" | "area" | "link") && self.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("id")
            .map_or(false, |val| case_sensitivity.eq(id.0.as_bytes(), val.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("class").map_or(false, |classes| {
            classes
                .split_ascii_whitespace()
                .any(|c| case_sensitivity.eq(name.0.as_bytes(), c.as_bytes()))
        })
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|&c| match self.doc.text(c) {
            Some(t) => t.is_empty(),
            None => self.doc.element(c).is_none(),
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }
}
