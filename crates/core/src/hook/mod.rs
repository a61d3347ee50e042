//! Entry point invoked by the host page when a test form loads.

use crate::css::selector::quote_value;
use crate::css::SelectorList;
use crate::error::{FetchFailure, SelectorError};
use crate::populate::{DropdownPopulator, Loader};
use crate::surface::UiSurface;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Class the host UI puts on editable parameter inputs.
pub const EDITABLE_INPUT_CLASS: &str = "qs-editable-input-disabled";
/// `data-test-id` of custom test parameter inputs.
pub const CUSTOM_PARAMETER_TEST_ID: &str = "CustomTestParameter";
/// Reason shown in dropdowns when `on_load` runs outside a tokio runtime.
pub const NO_RUNTIME_REASON: &str = "no async runtime";

/// Where a field's control sits relative to its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `<td title="...">` label cell followed by the editor cell.
    TableCell,
    /// A `div` holding an element whose `value` is the title, followed by the
    /// `div` with the custom parameter input.
    CustomParameter,
    /// Any selector, used verbatim.
    Selector(String),
}

impl Locator {
    pub fn selector_for(&self, title: &str) -> String {
        match self {
            Locator::TableCell => format!(
                "td[title={}] + td .{}",
                quote_value(title),
                EDITABLE_INPUT_CLASS
            ),
            Locator::CustomParameter => format!(
                "div:has([value={}]) + div [data-test-id={}]",
                quote_value(title),
                quote_value(CUSTOM_PARAMETER_TEST_ID)
            ),
            Locator::Selector(selector) => selector.clone(),
        }
    }
}

/// One configured field: its title, how to find it, and where its refs come from.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    title: String,
    locator: Locator,
    loader: Loader,
}

impl FieldBinding {
    pub fn new(title: &str, locator: Locator, loader: Loader) -> Self {
        Self {
            title: title.to_string(),
            locator,
            loader,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn selector(&self) -> Result<SelectorList, SelectorError> {
        SelectorList::parse(&self.locator.selector_for(&self.title))
    }
}

/// Runs every binding when the host page loads.
///
/// `on_load` performs the synchronous phase for each field and spawns its
/// load on the current tokio runtime; it returns before any fetch finishes.
/// Spawned loads are detached: dropping the hook does not cancel them.
pub struct ExtensibilityHook<S> {
    populator: DropdownPopulator<S>,
    bindings: Vec<FieldBinding>,
    loads: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: UiSurface + 'static> ExtensibilityHook<S> {
    pub fn new(populator: DropdownPopulator<S>, bindings: Vec<FieldBinding>) -> Self {
        Self {
            populator,
            bindings,
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn populator(&self) -> &DropdownPopulator<S> {
        &self.populator
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Hand `data` straight back after kicking off every field's load.
    pub fn on_load<T>(&self, data: T) -> T {
        let runtime = Handle::try_current().ok();
        for binding in &self.bindings {
            self.start(binding, runtime.as_ref());
        }
        data
    }

    fn start(&self, binding: &FieldBinding, runtime: Option<&Handle>) {
        let selector = match binding.selector() {
            Ok(selector) => selector,
            Err(e) => {
                tracing::error!(field = %binding.title(), error = %e, "skipping field with invalid selector");
                return;
            }
        };
        let pending = match self.populator.prepare(&selector) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(field = %binding.title(), error = %e, "failed to prepare dropdowns");
                return;
            }
        };
        if pending.targets().is_empty() {
            tracing::debug!(field = %binding.title(), selector = %selector, "field not on this page");
            return;
        }
        let Some(runtime) = runtime else {
            tracing::error!(field = %binding.title(), "no async runtime, cannot load refs");
            pending.fail(&FetchFailure::error(NO_RUNTIME_REASON));
            return;
        };

        let title = binding.title().to_string();
        let loader = binding.loader().clone();
        let source = self.populator.source();
        let load = runtime.spawn(async move {
            let filled = pending.complete(&loader, source.as_ref()).await;
            tracing::debug!(field = %title, targets = filled, "field populated");
        });
        self.loads.lock().push(load);
    }

    /// Number of loads spawned and not yet awaited by [`settle`](Self::settle).
    pub fn pending_loads(&self) -> usize {
        self.loads.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every load spawned so far.
    pub async fn settle(&self) {
        let loads = std::mem::take(&mut *self.loads.lock());
        for load in loads {
            if let Err(e) = load.await {
                tracing::warn!(error = %e, "load task did not complete");
            }
        }
    }
}
