//! The page as an injected capability.
//!
//! The populator never touches a document directly; it asks a `UiSurface` to
//! find, replace and fill elements. `DomSurface` implements it over a parsed
//! HTML page; tests can substitute their own fake.

use crate::css::SelectorList;
use crate::dom::{self, DomNode, ElementHandle, NodeType};
use crate::error::SurfaceError;

/// One `<option>` of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl DropdownOption {
    /// Value and label set to the same text.
    pub fn plain(text: &str) -> Self {
        Self {
            value: text.to_string(),
            label: text.to_string(),
            selected: false,
        }
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

pub trait UiSurface: Send {
    /// Elements matching `selector`, in document order.
    fn query(&self, selector: &SelectorList) -> Vec<ElementHandle>;

    fn tag_name(&self, element: &ElementHandle) -> Option<String>;

    fn attribute(&self, element: &ElementHandle, name: &str) -> Option<String>;

    /// Whether any element on the page already carries this `id`.
    fn id_in_use(&self, id: &str) -> bool;

    /// Swap the element for `replacement`, keeping its position.
    fn replace_element(
        &mut self,
        element: &ElementHandle,
        replacement: DomNode,
    ) -> Result<(), SurfaceError>;

    /// Clear the dropdown's options and insert `options` in order.
    fn set_options(
        &mut self,
        element: &ElementHandle,
        options: &[DropdownOption],
    ) -> Result<(), SurfaceError>;

    fn options(&self, element: &ElementHandle) -> Result<Vec<DropdownOption>, SurfaceError>;
}

/// `UiSurface` over an owned, parsed HTML document.
#[derive(Debug, Clone)]
pub struct DomSurface {
    document: DomNode,
}

impl DomSurface {
    pub fn new(document: DomNode) -> Self {
        Self { document }
    }

    pub fn from_html(html: &str) -> Self {
        Self::new(dom::parse_html(html))
    }

    pub fn document(&self) -> &DomNode {
        &self.document
    }

    pub fn element(&self, element: &ElementHandle) -> Option<&DomNode> {
        self.document
            .node_at(element.path())
            .filter(|n| n.node_type == NodeType::Element)
    }

    pub fn to_html(&self) -> String {
        self.document.to_html()
    }

    fn select_mut(&mut self, element: &ElementHandle) -> Result<&mut DomNode, SurfaceError> {
        let node = self
            .document
            .node_at_mut(element.path())
            .filter(|n| n.node_type == NodeType::Element)
            .ok_or_else(|| SurfaceError::StaleHandle(element.clone()))?;
        if node.tag != "select" {
            return Err(SurfaceError::NotASelect {
                handle: element.clone(),
                tag: node.tag.clone(),
            });
        }
        Ok(node)
    }
}

impl UiSurface for DomSurface {
    fn query(&self, selector: &SelectorList) -> Vec<ElementHandle> {
        selector
            .query(&self.document)
            .into_iter()
            .map(ElementHandle::new)
            .collect()
    }

    fn tag_name(&self, element: &ElementHandle) -> Option<String> {
        self.element(element).map(|n| n.tag.clone())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> Option<String> {
        self.element(element)
            .and_then(|n| n.get_attr(name))
            .map(str::to_string)
    }

    fn id_in_use(&self, id: &str) -> bool {
        let mut found = false;
        self.document.walk_elements(&mut |_, node| {
            found = found || node.get_attr("id") == Some(id);
        });
        found
    }

    fn replace_element(
        &mut self,
        element: &ElementHandle,
        replacement: DomNode,
    ) -> Result<(), SurfaceError> {
        let node = self
            .document
            .node_at_mut(element.path())
            .filter(|n| n.node_type == NodeType::Element)
            .ok_or_else(|| SurfaceError::StaleHandle(element.clone()))?;
        *node = replacement;
        Ok(())
    }

    fn set_options(
        &mut self,
        element: &ElementHandle,
        options: &[DropdownOption],
    ) -> Result<(), SurfaceError> {
        let select = self.select_mut(element)?;
        select.children = options.iter().map(option_node).collect();
        Ok(())
    }

    fn options(&self, element: &ElementHandle) -> Result<Vec<DropdownOption>, SurfaceError> {
        let node = self
            .element(element)
            .ok_or_else(|| SurfaceError::StaleHandle(element.clone()))?;
        Ok(node
            .children
            .iter()
            .filter(|c| c.is_element() && c.tag == "option")
            .map(|c| {
                let label = c.text_content();
                DropdownOption {
                    value: c.get_attr("value").map(str::to_string).unwrap_or_else(|| label.clone()),
                    label,
                    selected: c.attributes.contains_key("selected"),
                }
            })
            .collect())
    }
}

fn option_node(option: &DropdownOption) -> DomNode {
    let mut node = DomNode::new_element("option").with_attr("value", &option.value);
    if option.selected {
        node.set_attr("selected", "selected");
    }
    if !option.label.is_empty() {
        node.children.push(DomNode::new_text(&option.label));
    }
    node
}
