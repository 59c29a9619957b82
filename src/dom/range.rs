//! Text ranges and the range-splice used to wrap matches.

use super::{Document, DomError, NodeId};

/// A span of bytes inside one text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// Where the pieces of a split text node ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surrounded {
    /// Text before the range; the original node when non-empty.
    pub before: Option<NodeId>,
    /// Text node holding the range contents, now inside the wrapper.
    pub inner: NodeId,
    /// Text after the range, as a new sibling of the wrapper.
    pub after: Option<NodeId>,
}

impl Document {
    fn validate_range(&self, range: TextRange) -> Result<&str, DomError> {
        let text = self.text(range.node).ok_or(DomError::NotText(range.node))?;
        if self.parent(range.node).is_none() {
            return Err(DomError::Detached(range.node));
        }
        if range.start > range.end || range.end > text.len() {
            return Err(DomError::OutOfBounds {
                start: range.start,
                end: range.end,
                len: text.len(),
            });
        }
        if !text.is_char_boundary(range.start) || !text.is_char_boundary(range.end) {
            return Err(DomError::NotCharBoundary {
                start: range.start,
                end: range.end,
            });
        }
        Ok(text)
    }

    /// Move the range contents into `wrapper` and put `wrapper` where the
    /// range was, splitting the text node around it. Any existing children
    /// of `wrapper` are dropped first.
    pub fn surround_contents(
        &mut self,
        range: TextRange,
        wrapper: NodeId,
    ) -> Result<Surrounded, DomError> {
        let text = self.validate_range(range)?.to_string();
        if self.element(wrapper).is_none() {
            return Err(DomError::NotElement(wrapper));
        }
        let node = range.node;
        if self.is_inclusive_ancestor(wrapper, node) {
            return Err(DomError::HierarchyRequest { node: wrapper });
        }
        let parent = self.parent(node).ok_or(DomError::Detached(node))?;

        for child in self.children(wrapper).to_vec() {
            self.remove_child(wrapper, child)?;
        }

        let (head, rest) = text.split_at(range.start);
        let (middle, tail) = rest.split_at(range.end - range.start);

        let inner = self.create_text(middle);
        self.append_child(wrapper, inner)?;

        let before = if head.is_empty() {
            self.replace_child(parent, wrapper, node)?;
            None
        } else {
            self.set_text(node, head)?;
            let next = self.next_sibling(node);
            self.insert_before(parent, wrapper, next)?;
            Some(node)
        };

        let after = if tail.is_empty() {
            None
        } else {
            let after = self.create_text(tail);
            let next = self.next_sibling(wrapper);
            self.insert_before(parent, after, next)?;
            Some(after)
        };

        Ok(Surrounded {
            before,
            inner,
            after,
        })
    }
}
