//! Remote ref lists: endpoints, response shapes, and the `RefSource` seam.

use crate::error::{ConfigError, FetchFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const GITHUB_API: &str = "https://api.github.com";
pub const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

/// One entry of a list response, kept as its raw JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteItem {
    fields: Map<String, Value>,
}

impl RemoteItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Convenience for tests and fakes: an item with only a `name`.
    pub fn named(name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        Self { fields }
    }

    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    /// A string-valued field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// How the list is laid out in the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListShape {
    /// `{"values": [...]}` (Bitbucket)
    Wrapped,
    /// `[...]` (GitHub)
    Bare,
}

#[derive(Deserialize)]
struct Wrapped {
    values: Vec<Value>,
}

/// Decode a response body into items. Any mismatch is a `parsererror`.
pub fn decode_list(body: &[u8], shape: ListShape) -> Result<Vec<RemoteItem>, FetchFailure> {
    let values = match shape {
        ListShape::Wrapped => serde_json::from_slice::<Wrapped>(body)
            .map(|w| w.values)
            .map_err(|e| FetchFailure::parse(e.to_string()))?,
        ListShape::Bare => serde_json::from_slice::<Vec<Value>>(body)
            .map_err(|e| FetchFailure::parse(e.to_string()))?,
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Object(fields) => Ok(RemoteItem::new(fields)),
            other => Err(FetchFailure::parse(format!(
                "item {} is not an object: {}",
                i, other
            ))),
        })
        .collect()
}

/// A list endpoint: where to GET, and how to decode what comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    shape: ListShape,
}

impl Endpoint {
    pub fn new(url: &str, shape: ListShape) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { url, shape })
    }

    /// `GET {BITBUCKET_API}/repositories/{owner}/{repo}/refs/branches`
    pub fn bitbucket_branches(owner: &str, repo: &str) -> Result<Self, ConfigError> {
        Self::repo_endpoint(
            BITBUCKET_API,
            &["repositories", owner, repo, "refs", "branches"],
            ListShape::Wrapped,
        )
    }

    /// `GET {GITHUB_API}/repos/{owner}/{repo}/tags`
    pub fn github_tags(owner: &str, repo: &str) -> Result<Self, ConfigError> {
        Self::repo_endpoint(GITHUB_API, &["repos", owner, repo, "tags"], ListShape::Bare)
    }

    /// `GET {GITHUB_API}/repos/{owner}/{repo}/branches`
    pub fn github_branches(owner: &str, repo: &str) -> Result<Self, ConfigError> {
        Self::repo_endpoint(GITHUB_API, &["repos", owner, repo, "branches"], ListShape::Bare)
    }

    fn repo_endpoint(base: &str, segments: &[&str], shape: ListShape) -> Result<Self, ConfigError> {
        for segment in segments {
            if segment.is_empty() || segment.contains('/') || *segment == "." || *segment == ".." {
                return Err(ConfigError::InvalidRepo(segment.to_string()));
            }
        }
        Self::new(&format!("{}/{}", base, segments.join("/")), shape)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn shape(&self) -> ListShape {
        self.shape
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Anything that can turn an endpoint into a list of items.
#[async_trait]
pub trait RefSource: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<RemoteItem>, FetchFailure>;
}

/// Value-extraction function: item to dropdown label. `None` skips the item.
pub type LabelFn = Arc<dyn Fn(&RemoteItem) -> Option<String> + Send + Sync>;

/// The default extraction: the item's `name`.
pub fn name_label() -> LabelFn {
    Arc::new(|item: &RemoteItem| item.name().map(str::to_string))
}

/// Label by `field`, with `prefix` prepended (`"tags/"` for GitHub tags).
pub fn field_label(field: &str, prefix: &str) -> LabelFn {
    let field = field.to_string();
    let prefix = prefix.to_string();
    Arc::new(move |item: &RemoteItem| item.field(&field).map(|v| format!("{}{}", prefix, v)))
}
