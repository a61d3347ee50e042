//! Turning free-text inputs into dropdowns filled from a remote ref list.
//!
//! Population happens in two phases. [`DropdownPopulator::prepare`] runs
//! synchronously: it converts every target into a `<select>`, shows the
//! `Loading...` placeholder and registers one listener per target.
//! [`PendingPopulation::complete`] then runs the [`Loader`] once and hands
//! the resulting labels to every listener. Completion always writes: either
//! the labels or the labels accumulated so far plus a one-line error.

use crate::css::SelectorList;
use crate::dom::{DomNode, ElementHandle};
use crate::error::{ConfigError, FetchFailure, PopulateError, SurfaceError};
use crate::source::{field_label, name_label, Endpoint, LabelFn, RefSource};
use crate::surface::{DropdownOption, UiSurface};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const PLACEHOLDER: &str = "Loading...";
pub const NO_RESULTS_LABEL: &str = "(no results)";
pub const TAG_PREFIX: &str = "tags/";

/// Attributes the surrounding form uses to recognise the field.
pub const PASS_THROUGH_ATTRIBUTES: &[&str] = &[
    "name",
    "class",
    "data-test-id",
    "data-editor-name",
    "data-input-control",
];

/// Elements that may become dropdowns. Containers are never replaced, so a
/// field nested in a matched wrapper keeps its own attributes.
pub const FORM_CONTROL_TAGS: &[&str] = &["input", "textarea", "select"];

/// One fetch in a loader chain.
#[derive(Clone)]
pub struct Step {
    pub endpoint: Endpoint,
    pub label: LabelFn,
}

/// An ordered chain of fetches whose labels are concatenated.
#[derive(Clone)]
pub struct Loader {
    steps: Vec<Step>,
    stop_on_error: bool,
}

impl Loader {
    /// Single endpoint, labelled by item `name`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_label(endpoint, name_label())
    }

    pub fn with_label(endpoint: Endpoint, label: LabelFn) -> Self {
        Self {
            steps: vec![Step { endpoint, label }],
            stop_on_error: false,
        }
    }

    /// Append a step, run after the previous ones finish.
    pub fn then(mut self, endpoint: Endpoint, label: LabelFn) -> Self {
        self.steps.push(Step { endpoint, label });
        self
    }

    /// Stop at the first failed step instead of running the rest.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// GitHub tags followed by branches, both labelled by `field` with
    /// `prefix` prepended. Tags additionally get [`TAG_PREFIX`] in front.
    pub fn github_refs(owner: &str, repo: &str, field: &str, prefix: &str) -> Result<Self, ConfigError> {
        let tags = field_label(field, &format!("{}{}", TAG_PREFIX, prefix));
        Ok(Self::with_label(Endpoint::github_tags(owner, repo)?, tags)
            .then(Endpoint::github_branches(owner, repo)?, field_label(field, prefix)))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order and return the accumulated labels.
    ///
    /// A failed step contributes its single-line error message in place of
    /// its items. Nothing is sorted or deduplicated.
    pub async fn load(&self, source: &dyn RefSource) -> Vec<String> {
        self.load_report(source).await.labels
    }

    /// Like [`load`](Self::load), also returning the failures behind any error labels.
    pub async fn load_report(&self, source: &dyn RefSource) -> LoadReport {
        let mut report = LoadReport::default();
        for step in &self.steps {
            match source.fetch(&step.endpoint).await {
                Ok(items) => {
                    let before = report.labels.len();
                    report
                        .labels
                        .extend(items.iter().filter_map(|item| (step.label)(item)));
                    tracing::debug!(
                        url = %step.endpoint,
                        items = items.len(),
                        labels = report.labels.len() - before,
                        "loader step finished"
                    );
                }
                Err(failure) => {
                    tracing::warn!(url = %step.endpoint, error = %failure, "ref list fetch failed");
                    report.labels.push(failure.message());
                    report.failures.push(failure);
                    if self.stop_on_error {
                        break;
                    }
                }
            }
        }
        report
    }
}

/// Labels delivered to listeners plus the failures folded into them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub labels: Vec<String>,
    pub failures: Vec<FetchFailure>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field(
                "steps",
                &self.steps.iter().map(|s| s.endpoint.to_string()).collect::<Vec<_>>(),
            )
            .field("stop_on_error", &self.stop_on_error)
            .finish()
    }
}

type Callback = Box<dyn FnOnce(&[String]) + Send>;

/// Named consumers of one loaded list. Each is invoked exactly once.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(String, Callback)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, callback: impl FnOnce(&[String]) + Send + 'static) {
        self.entries.push((name.into(), Box::new(callback)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Hand the same list to every listener, in registration order.
    pub fn notify(self, labels: &[String]) {
        for (name, callback) in self.entries {
            tracing::trace!(listener = %name, labels = labels.len(), "notifying listener");
            callback(labels);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// How inputs are turned into dropdowns.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Give each new dropdown a fresh random id instead of the input's id.
    pub randomize_ids: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            randomize_ids: true,
        }
    }
}

/// Targets that show the placeholder and wait for their list.
#[derive(Debug)]
pub struct PendingPopulation {
    targets: Vec<ElementHandle>,
    listeners: Listeners,
}

impl PendingPopulation {
    pub fn targets(&self) -> &[ElementHandle] {
        &self.targets
    }

    /// Register an extra consumer of the loaded list.
    pub fn listen(&mut self, name: impl Into<String>, callback: impl FnOnce(&[String]) + Send + 'static) {
        self.listeners.register(name, callback);
    }

    /// Load once and notify every listener. Returns the number of listeners notified.
    pub async fn complete(self, loader: &Loader, source: &dyn RefSource) -> usize {
        if self.listeners.is_empty() {
            tracing::debug!(?loader, "no listeners, skipping load");
            return 0;
        }
        let labels = loader.load(source).await;
        let notified = self.listeners.len();
        self.listeners.notify(&labels);
        notified
    }

    /// Finish without loading: every listener gets the single-line failure.
    pub fn fail(self, failure: &FetchFailure) -> usize {
        let notified = self.listeners.len();
        self.listeners.notify(&[failure.message()]);
        notified
    }
}

/// Converts and fills dropdowns on a shared surface.
pub struct DropdownPopulator<S> {
    surface: Arc<Mutex<S>>,
    source: Arc<dyn RefSource>,
    options: ConvertOptions,
}

impl<S: UiSurface + 'static> DropdownPopulator<S> {
    pub fn new(surface: Arc<Mutex<S>>, source: Arc<dyn RefSource>) -> Self {
        Self {
            surface,
            source,
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn surface(&self) -> &Arc<Mutex<S>> {
        &self.surface
    }

    pub fn source(&self) -> Arc<dyn RefSource> {
        Arc::clone(&self.source)
    }

    /// Synchronous phase for every element matching `target`.
    pub fn prepare(&self, target: &SelectorList) -> Result<PendingPopulation, PopulateError> {
        let elements = self.surface.lock().query(target);
        tracing::debug!(selector = %target, matches = elements.len(), "preparing dropdowns");
        self.prepare_elements(&elements)
    }

    /// Synchronous phase for explicit element handles. Only form controls
    /// (see [`FORM_CONTROL_TAGS`]) are taken; other matches are skipped.
    pub fn prepare_elements(&self, elements: &[ElementHandle]) -> Result<PendingPopulation, PopulateError> {
        let mut surface = self.surface.lock();
        let mut listeners = Listeners::new();
        let mut targets: Vec<ElementHandle> = Vec::with_capacity(elements.len());

        for element in elements {
            let tag = surface
                .tag_name(element)
                .ok_or_else(|| SurfaceError::StaleHandle(element.clone()))?;
            if !FORM_CONTROL_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
                tracing::debug!(path = ?element.path(), tag = %tag, "skipping match that is not a form control");
                continue;
            }
            targets.push(element.clone());
            if convert_to_dropdown(&mut *surface, element, &self.options)? {
                tracing::debug!(path = ?element.path(), "converted input to dropdown");
            }
            surface.set_options(element, &[DropdownOption::plain(PLACEHOLDER).selected()])?;

            let shared = Arc::clone(&self.surface);
            let target = element.clone();
            listeners.register(format!("{:?}", element.path()), move |labels: &[String]| {
                if let Err(e) = shared.lock().set_options(&target, &options_for(labels)) {
                    tracing::warn!(error = %e, "dropdown vanished before its list arrived");
                }
            });
        }

        Ok(PendingPopulation { targets, listeners })
    }

    /// Both phases: prepare the targets, load, fill. Returns how many were filled.
    pub async fn populate(&self, target: &SelectorList, loader: &Loader) -> Result<usize, PopulateError> {
        let pending = self.prepare(target)?;
        Ok(pending.complete(loader, self.source.as_ref()).await)
    }
}

/// Replace a non-`select` element by an empty dropdown carrying its form
/// attributes. Returns false when the element already is a dropdown.
pub fn convert_to_dropdown<S: UiSurface + ?Sized>(
    surface: &mut S,
    element: &ElementHandle,
    options: &ConvertOptions,
) -> Result<bool, SurfaceError> {
    let tag = surface
        .tag_name(element)
        .ok_or_else(|| SurfaceError::StaleHandle(element.clone()))?;
    if tag.eq_ignore_ascii_case("select") {
        return Ok(false);
    }

    let mut select = DomNode::new_element("select").with_attr("autocomplete", "off");
    for name in PASS_THROUGH_ATTRIBUTES {
        if let Some(value) = surface.attribute(element, name) {
            select.set_attr(name, &value);
        }
    }
    let id = if options.randomize_ids {
        Some(fresh_id(surface))
    } else {
        surface.attribute(element, "id")
    };
    if let Some(id) = id {
        select.set_attr("id", &id);
    }

    surface.replace_element(element, select)?;
    Ok(true)
}

fn fresh_id<S: UiSurface + ?Sized>(surface: &S) -> String {
    loop {
        let id = format!("refdrop-{}", Uuid::new_v4().simple());
        if !surface.id_in_use(&id) {
            return id;
        }
    }
}

/// Options for a loaded list; the first is selected. An empty list still
/// yields one option so the dropdown is never left empty.
pub fn options_for(labels: &[String]) -> Vec<DropdownOption> {
    if labels.is_empty() {
        return vec![DropdownOption {
            value: String::new(),
            label: NO_RESULTS_LABEL.to_string(),
            selected: true,
        }];
    }
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let option = DropdownOption::plain(label);
            if i == 0 {
                option.selected()
            } else {
                option
            }
        })
        .collect()
}
