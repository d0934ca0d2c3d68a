use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instance-scoped identifier assigned by the Help Center API.
pub type RemoteId = u64;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Category {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Section {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub category_id: Option<RemoteId>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Article {
    pub id: RemoteId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub section_id: Option<RemoteId>,
    #[serde(default)]
    pub permission_group_id: Option<RemoteId>,
    #[serde(default)]
    pub user_segment_id: Option<RemoteId>,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PermissionGroup {
    pub id: RemoteId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserSegment {
    pub id: RemoteId,
    pub name: String,
}

/// One page of the article listing. `next_page` is the absolute URL of the following page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub next_page: Option<String>,
}

/// Categories and sections of one language, captured during backup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub categories: Vec<Category>,
    pub sections: Vec<Section>,
}

/// Metadata persisted next to an article body; the only input a restore has besides the body.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ArticleMetadata {
    pub title: Option<String>,
    pub section_id: Option<RemoteId>,
    pub user_segment_id: Option<RemoteId>,
    pub permission_group_id: Option<RemoteId>,
    pub locale: Option<String>,
}

impl ArticleMetadata {
    pub fn from_article(article: &Article, language: &str) -> Self {
        Self {
            title: Some(
                article
                    .title
                    .clone()
                    .unwrap_or_else(|| default_title(article.id)),
            ),
            section_id: article.section_id,
            user_segment_id: article.user_segment_id,
            permission_group_id: article.permission_group_id,
            locale: Some(
                article
                    .locale
                    .clone()
                    .unwrap_or_else(|| language.to_string()),
            ),
        }
    }
}

pub fn default_title(article_id: RemoteId) -> String {
    format!("Article {article_id}")
}

/// Source id to target id for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    entries: BTreeMap<RemoteId, RemoteId>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: RemoteId, target: RemoteId) {
        self.entries.insert(source, target);
    }

    pub fn get(&self, source: RemoteId) -> Option<RemoteId> {
        self.entries.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Case-insensitive name comparison used when matching entities across instances.
pub fn names_match(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}
