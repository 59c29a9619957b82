//! Inline `style=""` handling.
//!
//! Highlights and verdict badges are styled inline so they survive whatever
//! stylesheet the host page ships. Declarations keep their order so the
//! serialized attribute stays stable across edits.

use std::fmt;

use super::{Document, DomError, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    /// Parse an inline `style="..."` attribute value.
    pub fn parse(style: &str) -> Self {
        let mut props = Self::default();
        for decl in style.split(';') {
            let parts: Vec<&str> = decl.splitn(2, ':').collect();
            if parts.len() != 2 {
                continue;
            }
            let prop = parts[0].trim();
            let val = parts[1].trim();
            if prop.is_empty() || val.is_empty() {
                continue;
            }
            props.set(prop, val);
        }
        props
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        let prop = prop.to_ascii_lowercase();
        self.declarations
            .iter()
            .find(|(k, _)| *k == prop)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, prop: &str, value: &str) {
        let prop = prop.to_ascii_lowercase();
        match self.declarations.iter_mut().find(|(k, _)| *k == prop) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.declarations.push((prop, value.to_string())),
        }
    }

    /// `display: none` hides the element from rendered text.
    pub fn hides(&self) -> bool {
        self.get("display")
            .map(|v| v.eq_ignore_ascii_case("none"))
            .unwrap_or(false)
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {};", k, v)?;
        }
        Ok(())
    }
}

impl Document {
    /// Parsed inline style of an element (empty for other nodes).
    pub fn style(&self, id: NodeId) -> InlineStyle {
        self.attr(id, "style")
            .map(InlineStyle::parse)
            .unwrap_or_default()
    }

    pub fn set_style_property(
        &mut self,
        id: NodeId,
        prop: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let mut style = self.style(id);
        style.set(prop, value);
        self.set_attr(id, "style", style.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inline() {
        let props = InlineStyle::parse("color: red; Font-Size: 20px;; background-color: #333");
        assert_eq!(props.get("color"), Some("red"));
        assert_eq!(props.get("font-size"), Some("20px"));
        assert_eq!(props.get("background-color"), Some("#333"));
        assert_eq!(props.get("cursor"), None);
    }

    #[test]
    fn set_replaces_in_place_and_serializes() {
        let mut props = InlineStyle::parse("background-color: #fce8e6; cursor: pointer");
        props.set("background-color", "#e6f4ea");
        assert_eq!(
            props.to_string(),
            "background-color: #e6f4ea; cursor: pointer;"
        );
    }

    #[test]
    fn display_none_hides() {
        assert!(InlineStyle::parse("display:NONE").hides());
        assert!(!InlineStyle::parse("display: block").hides());
    }
}
