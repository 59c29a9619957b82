//! Arena DOM used by the content script.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Parent
//! links exist for lookup only; a node removed from the tree stays in the
//! arena, detached, until the document is dropped.

pub mod css;
pub mod parser;
pub mod range;
pub mod selector;
pub mod serialize;
pub mod text;

use thiserror::Error;

use self::selector::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// `h1`..`h6`
    pub fn is_heading(&self) -> bool {
        matches!(self.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("node {0:?} is not an element")]
    NotElement(NodeId),
    #[error("node {0:?} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not attached to a parent")]
    Detached(NodeId),
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("cannot insert {node:?} below itself")]
    HierarchyRequest { node: NodeId },
    #[error("range {start}..{end} is out of bounds for text of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("range {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
}

/// A parsed page: the arena plus the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    pub url: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                node_type: NodeType::Document,
            }],
            root: NodeId(0),
            url: String::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            node_type,
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeType::Element(Element::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeType::Text(text.into()))
    }

    /// `None` for an id that does not belong to this document. Every
    /// accessor below treats such an id as a detached, childless node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.node_type {
            NodeType::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.node_type {
            NodeType::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn set_attr(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let el = self.element_mut(id).ok_or(DomError::NotElement(id))?;
        el.set_attr(name, value);
        Ok(())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.node_type {
            NodeType::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), DomError> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.node_type) {
            Some(NodeType::Text(t)) => {
                *t = value.into();
                Ok(())
            }
            _ => Err(DomError::NotText(id)),
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// Ancestors from the parent upwards, ending at the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    fn index_in_parent(&self, parent: NodeId, child: NodeId) -> Result<usize, DomError> {
        self.children(parent)
            .iter()
            .position(|&c| c == child)
            .ok_or(DomError::NotAChild { parent, child })
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(parent, id).ok()?;
        self.children(parent).get(idx + 1).copied()
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(parent, id).ok()?;
        self.children(parent)[..idx]
            .iter()
            .rev()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        for id in [parent, child] {
            if self.node(id).is_none() {
                return Err(DomError::UnknownNode(id));
            }
        }
        if self.is_text(parent) {
            return Err(DomError::NotElement(parent));
        }
        if child == self.root || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { node: child });
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference`, or last when
    /// `reference` is `None`. A child that already has a parent is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        if let Some(r) = reference {
            self.index_in_parent(parent, r)?;
        }
        self.detach(child);
        let idx = match reference {
            Some(r) => self.index_in_parent(parent, r)?,
            None => self.nodes[parent.0].children.len(),
        };
        self.nodes[parent.0].children.insert(idx, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.index_in_parent(parent, child)?;
        self.detach(child);
        Ok(())
    }

    /// Put `new` where `old` is; `old` ends up detached.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<(), DomError> {
        self.index_in_parent(parent, old)?;
        if new == old {
            return Ok(());
        }
        self.check_insertable(parent, new)?;
        self.detach(new);
        let idx = self.index_in_parent(parent, old)?;
        self.nodes[parent.0].children[idx] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        Ok(())
    }

    /// All descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Concatenated data of every descendant text node (`textContent`).
    pub fn text_content(&self, id: NodeId) -> String {
        match self.text(id) {
            Some(t) => t.to_string(),
            None => self
                .descendants(id)
                .into_iter()
                .filter_map(|n| self.text(n))
                .collect(),
        }
    }

    /// Merge adjacent text nodes and drop empty ones throughout the subtree.
    pub fn normalize(&mut self, id: NodeId) {
        if self.node(id).is_none() {
            return;
        }
        let children = self.children(id).to_vec();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let data = match self.text(child) {
                Some(t) => t.to_string(),
                None => {
                    self.normalize(child);
                    kept.push(child);
                    continue;
                }
            };
            if data.is_empty() {
                self.nodes[child.0].parent = None;
                continue;
            }
            match kept.last().copied().filter(|&p| self.is_text(p)) {
                Some(prev) => {
                    if let NodeType::Text(p) = &mut self.nodes[prev.0].node_type {
                        p.push_str(&data);
                    }
                    self.nodes[child.0].parent = None;
                }
                None => kept.push(child),
            }
        }
        self.nodes[id.0].children = kept;
    }

    /// `contenteditable` resolution: the nearest element carrying the
    /// attribute decides, `false` by default.
    pub fn is_content_editable(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            if let Some(value) = self.attr(n, "contenteditable") {
                match value.to_ascii_lowercase().as_str() {
                    "" | "true" | "plaintext-only" => return true,
                    "false" => return false,
                    _ => {}
                }
            }
            cursor = self.parent(n);
        }
        false
    }

    /// First element in the subtree (excluding `scope`) matching `selector`.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| selector.matches(self, n))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| selector.matches(self, n))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| selector.matches(self, n))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.query_selector(self.root, &Selector::tag("body"))
    }

    /// `document.title`: the first `<title>` text with whitespace collapsed.
    pub fn title(&self) -> String {
        self.query_selector(self.root, &Selector::tag("title"))
            .map(|t| {
                self.text_content(t)
                    .split_ascii_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}
