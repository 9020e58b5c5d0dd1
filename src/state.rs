// Shared state structs to avoid circular dependencies.
// These are used by the store, the view binder and the CLI, and can be tested independently.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Marker substituted with the encoded query in a search engine template.
pub const QUERY_MARKER: &str = "%s";

/// A persisted shortcut or search engine.
///
/// Field names on disk follow the long-standing `navigator_*` storage layout.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "url")]
    pub target_url_template: String,
    #[serde(rename = "favicon", default)]
    pub icon_url: String,
    #[serde(default)]
    pub domain: String,
}

pub type Site = Entity;
pub type SearchEngine = Entity;

impl Entity {
    pub fn new(id: &str, name: &str, url: &str, domain: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: name.to_string(),
            target_url_template: url.to_string(),
            icon_url: crate::modules::navigation::favicon_url(domain),
            domain: domain.to_string(),
        }
    }

    /// Checks the shape rules an entity must satisfy before it enters `collection`.
    pub fn validate(&self, collection: CollectionId) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("entity id is required"));
        }
        if self.display_name.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "'{}' is missing a display name",
                self.id
            )));
        }
        if self.target_url_template.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "'{}' is missing a url",
                self.id
            )));
        }
        if collection == CollectionId::SearchEngines {
            let markers = self.target_url_template.matches(QUERY_MARKER).count();
            if markers != 1 {
                return Err(StoreError::validation(format!(
                    "search engine '{}' must contain exactly one {} marker, found {}",
                    self.id, QUERY_MARKER, markers
                )));
            }
        }
        Ok(())
    }
}

/// The two ordered collections owned by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionId {
    Sites,
    SearchEngines,
}

impl CollectionId {
    pub const ALL: [CollectionId; 2] = [CollectionId::Sites, CollectionId::SearchEngines];

    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Sites => "navigator_sites",
            Self::SearchEngines => "navigator_searchEngines",
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sites => f.write_str("sites"),
            Self::SearchEngines => f.write_str("searchEngines"),
        }
    }
}

impl FromStr for CollectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sites" | "site" => Ok(Self::Sites),
            "engines" | "searchEngines" | "search-engines" => Ok(Self::SearchEngines),
            other => Err(format!("unknown collection '{}'", other)),
        }
    }
}

/// Notification delivered to store subscribers after a committed mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreChange {
    Collection(CollectionId),
    Settings,
    /// Everything was replaced at once (import).
    All,
}

impl StoreChange {
    pub fn touches(&self, collection: CollectionId) -> bool {
        match self {
            Self::Collection(c) => *c == collection,
            Self::Settings => false,
            Self::All => true,
        }
    }
}
