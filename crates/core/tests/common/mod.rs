//! Fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use refdrop_core::css::SelectorList;
use refdrop_core::dom::{DomNode, ElementHandle};
use refdrop_core::error::{FetchFailure, SurfaceError};
use refdrop_core::source::{Endpoint, ListShape, RefSource, RemoteItem};
use refdrop_core::surface::{DropdownOption, UiSurface};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const TAGS_URL: &str = "https://lists.test/tags";
pub const BRANCHES_URL: &str = "https://lists.test/branches";

pub fn endpoint(url: &str) -> Endpoint {
    Endpoint::new(url, ListShape::Bare).unwrap()
}

/// A form laid out the way the test configuration page renders parameters.
pub const TABLE_PAGE: &str = r#"
<html><body>
<form id="test-form">
  <table>
    <tr>
      <td title="TestVersion">TestVersion</td>
      <td><input type="text" id="param-1" class="qs-editable-input-disabled" name="param_1"
                 data-test-id="TestParameter" data-editor-name="TestVersion" data-input-control="text"></td>
    </tr>
    <tr>
      <td title="AnotherInput">AnotherInput</td>
      <td><input type="text" class="qs-editable-input-disabled" name="param_2"
                 data-test-id="TestParameter" data-editor-name="AnotherInput" data-input-control="text"></td>
    </tr>
    <tr>
      <td title="Untouched">Untouched</td>
      <td><input type="text" class="qs-editable-input-disabled" name="param_3"></td>
    </tr>
  </table>
</form>
</body></html>
"#;

/// Custom test parameters: each label block is followed by its input block.
pub const CUSTOM_PARAMETER_PAGE: &str = r#"
<html><body>
<div class="params">
  <div><input type="text" readonly value="cmd /c"></div>
  <div><input type="text" id="cp-1" name="custom_1" data-test-id="CustomTestParameter"></div>
  <div><input type="text" readonly value="ping"></div>
  <div><input type="text" id="cp-2" name="custom_2" data-test-id="CustomTestParameter"></div>
</div>
</body></html>
"#;

/// Canned responses keyed by URL. Unknown URLs fail with `error: Not Found`.
#[derive(Default)]
pub struct StaticSource {
    responses: HashMap<String, Result<Vec<RemoteItem>, FetchFailure>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(mut self, url: &str, names: &[&str]) -> Self {
        let items = names.iter().map(|n| RemoteItem::named(n)).collect();
        self.responses.insert(url.to_string(), Ok(items));
        self
    }

    pub fn failing(mut self, url: &str, failure: FetchFailure) -> Self {
        self.responses.insert(url.to_string(), Err(failure));
        self
    }

    /// Hold every fetch until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RefSource for StaticSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<RemoteItem>, FetchFailure> {
        let url = endpoint.url().as_str().to_string();
        self.calls.lock().push(url.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.responses
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Err(FetchFailure::error("Not Found")))
    }
}

/// A flat list of elements standing in for a page, recording every mutation.
pub struct RecordingSurface {
    root: DomNode,
    options: HashMap<usize, Vec<DropdownOption>>,
    pub replacements: Vec<usize>,
    pub option_writes: Vec<(usize, Vec<DropdownOption>)>,
}

impl RecordingSurface {
    pub fn new(elements: Vec<DomNode>) -> Self {
        let mut root = DomNode::new_document();
        root.children = elements;
        Self {
            root,
            options: HashMap::new(),
            replacements: Vec::new(),
            option_writes: Vec::new(),
        }
    }

    pub fn element(&self, index: usize) -> &DomNode {
        &self.root.children[index]
    }

    fn index(&self, element: &ElementHandle) -> Result<usize, SurfaceError> {
        match element.path() {
            [i] if *i < self.root.children.len() => Ok(*i),
            _ => Err(SurfaceError::StaleHandle(element.clone())),
        }
    }
}

impl UiSurface for RecordingSurface {
    fn query(&self, selector: &SelectorList) -> Vec<ElementHandle> {
        (0..self.root.children.len())
            .filter(|&i| selector.matches(&self.root, &[i]))
            .map(|i| ElementHandle::new(vec![i]))
            .collect()
    }

    fn tag_name(&self, element: &ElementHandle) -> Option<String> {
        let i = self.index(element).ok()?;
        Some(self.root.children[i].tag.clone())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> Option<String> {
        let i = self.index(element).ok()?;
        self.root.children[i].get_attr(name).map(str::to_string)
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.root.children.iter().any(|c| c.get_attr("id") == Some(id))
    }

    fn replace_element(
        &mut self,
        element: &ElementHandle,
        replacement: DomNode,
    ) -> Result<(), SurfaceError> {
        let i = self.index(element)?;
        self.root.children[i] = replacement;
        self.options.remove(&i);
        self.replacements.push(i);
        Ok(())
    }

    fn set_options(
        &mut self,
        element: &ElementHandle,
        options: &[DropdownOption],
    ) -> Result<(), SurfaceError> {
        let i = self.index(element)?;
        if self.root.children[i].tag != "select" {
            return Err(SurfaceError::NotASelect {
                handle: element.clone(),
                tag: self.root.children[i].tag.clone(),
            });
        }
        self.options.insert(i, options.to_vec());
        self.option_writes.push((i, options.to_vec()));
        Ok(())
    }

    fn options(&self, element: &ElementHandle) -> Result<Vec<DropdownOption>, SurfaceError> {
        let i = self.index(element)?;
        Ok(self.options.get(&i).cloned().unwrap_or_default())
    }
}
