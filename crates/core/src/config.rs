//! JSON configuration: which fields become dropdowns and where their refs come from.

use crate::error::ConfigError;
use crate::hook::{FieldBinding, Locator};
use crate::populate::{ConvertOptions, Loader};
use crate::source::{field_label, Endpoint, ListShape};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("refdrop/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub randomize_ids: bool,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub http: FetchConfig,
    pub fields: Vec<FieldConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub title: String,
    #[serde(default)]
    pub locator: LocatorConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorConfig {
    #[default]
    TableCell,
    CustomParameter,
    Selector(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(flatten)]
    pub kind: SourceKind,
    /// JSON key to label items by.
    #[serde(default = "default_field")]
    pub field: String,
    /// Prepended to every label.
    #[serde(default)]
    pub prefix: String,
}

fn default_field() -> String {
    "name".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    BitbucketBranches { owner: String, repo: String },
    GithubTags { owner: String, repo: String },
    GithubBranches { owner: String, repo: String },
    Url { url: String, shape: ListShape },
}

impl SourceKind {
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        match self {
            SourceKind::BitbucketBranches { owner, repo } => Endpoint::bitbucket_branches(owner, repo),
            SourceKind::GithubTags { owner, repo } => Endpoint::github_tags(owner, repo),
            SourceKind::GithubBranches { owner, repo } => Endpoint::github_branches(owner, repo),
            SourceKind::Url { url, shape } => Endpoint::new(url, *shape),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            randomize_ids: self.randomize_ids,
        }
    }

    /// Resolve every field into a binding. Fields without sources are rejected.
    pub fn bindings(&self) -> Result<Vec<FieldBinding>, ConfigError> {
        self.fields
            .iter()
            .map(|field| field.binding(self.stop_on_error))
            .collect()
    }
}

impl FieldConfig {
    pub fn binding(&self, stop_on_error: bool) -> Result<FieldBinding, ConfigError> {
        let mut sources = self.sources.iter();
        let first = sources
            .next()
            .ok_or_else(|| ConfigError::NoSources(self.title.clone()))?;
        let mut loader = Loader::with_label(first.kind.endpoint()?, first.label());
        for source in sources {
            loader = loader.then(source.kind.endpoint()?, source.label());
        }

        let locator = match &self.locator {
            LocatorConfig::TableCell => Locator::TableCell,
            LocatorConfig::CustomParameter => Locator::CustomParameter,
            LocatorConfig::Selector(s) => Locator::Selector(s.clone()),
        };
        let binding = FieldBinding::new(&self.title, locator, loader.stop_on_error(stop_on_error));
        binding.selector()?;
        Ok(binding)
    }
}

impl SourceConfig {
    pub fn label(&self) -> crate::source::LabelFn {
        field_label(&self.field, &self.prefix)
    }
}
