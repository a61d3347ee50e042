use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashMap;

/// A node in our DOM tree. Owned and mutable so the page can be rewritten in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    Element,
    Text,
    Document,
}

/// Stable reference to an element: the child-index path from the document root.
///
/// Replacing an element or rewriting its children keeps handles outside that
/// element valid, since sibling counts never change. Handles below it go stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(Vec<usize>);

impl ElementHandle {
    pub fn new(path: Vec<usize>) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &[usize] {
        &self.0
    }
}

impl DomNode {
    pub fn new_element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Element,
        }
    }

    pub fn new_text(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    pub fn new_document() -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Document,
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attr("class").unwrap_or("").split_whitespace()
    }

    /// Get the visible text content of this node and all children.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => {
                let trimmed = self.text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Resolve a child-index path relative to this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&DomNode> {
        let mut node = self;
        for &idx in path {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DomNode> {
        let mut node = self;
        for &idx in path {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }

    /// Visit every element below this node in document order, with its path.
    pub fn walk_elements(&self, visit: &mut dyn FnMut(&[usize], &DomNode)) {
        let mut path = Vec::new();
        walk_recursive(self, &mut path, visit);
    }

    /// Serialize this node back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

fn walk_recursive(
    node: &DomNode,
    path: &mut Vec<usize>,
    visit: &mut dyn FnMut(&[usize], &DomNode),
) {
    for (idx, child) in node.children.iter().enumerate() {
        if !child.is_element() {
            continue;
        }
        path.push(idx);
        visit(path, child);
        walk_recursive(child, path, visit);
        path.pop();
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn write_html(node: &DomNode, out: &mut String) {
    match node.node_type {
        NodeType::Document => {
            out.push_str("<!DOCTYPE html>");
            for child in &node.children {
                write_html(child, out);
            }
        }
        NodeType::Text => out.push_str(&escape_text(&node.text)),
        NodeType::Element => {
            out.push('<');
            out.push_str(&node.tag);
            // HashMap order is arbitrary; sort for stable output
            let mut attrs: Vec<(&String, &String)> = node.attributes.iter().collect();
            attrs.sort();
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&node.tag.as_str()) {
                return;
            }
            let raw = node.tag == "script" || node.tag == "style";
            for child in &node.children {
                if raw && child.node_type == NodeType::Text {
                    out.push_str(&child.text);
                } else {
                    write_html(child, out);
                }
            }
            out.push_str("</");
            out.push_str(&node.tag);
            out.push('>');
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Parse an HTML string into a DomNode tree.
pub fn parse_html(html: &str) -> DomNode {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = parse_document(RcDom::default(), opts).one(html);

    convert_node(&dom.document).unwrap_or_else(DomNode::new_document)
}

fn convert_node(handle: &Handle) -> Option<DomNode> {
    match &handle.data {
        NodeData::Document => {
            let mut doc = DomNode::new_document();
            doc.children = convert_children(handle);
            Some(doc)
        }
        NodeData::Element { name, attrs, .. } => {
            let mut node = DomNode::new_element(&name.local);
            for attr in attrs.borrow().iter() {
                node.attributes
                    .insert(attr.name.local.to_string(), attr.value.to_string());
            }
            node.children = convert_children(handle);
            Some(node)
        }
        NodeData::Text { contents } => Some(DomNode::new_text(&contents.borrow())),
        _ => None, // Comments, PIs, doctypes → ignored
    }
}

fn convert_children(handle: &Handle) -> Vec<DomNode> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert_node)
        // Skip empty text nodes
        .filter(|n| !(n.node_type == NodeType::Text && n.text.trim().is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_and_serialize() {
        let doc = parse_html(r#"<table><tr><td title="A">A</td><td><input name="a"></td></tr></table>"#);
        let mut found = Vec::new();
        doc.walk_elements(&mut |path, node| {
            if node.tag == "input" {
                found.push(path.to_vec());
            }
        });
        assert_eq!(found.len(), 1);
        let input = doc.node_at(&found[0]).unwrap();
        assert_eq!(input.get_attr("name"), Some("a"));
        assert!(doc.to_html().contains(r#"<input name="a">"#));
        assert!(!doc.to_html().contains("</input>"));
    }

    #[test]
    fn escapes_attribute_values() {
        let node = DomNode::new_element("option")
            .with_attr("value", r#"a "b" & c"#)
            .with_child(DomNode::new_text("<x>"));
        assert_eq!(
            node.to_html(),
            r#"<option value="a &quot;b&quot; &amp; c">&lt;x&gt;</option>"#
        );
    }
}
