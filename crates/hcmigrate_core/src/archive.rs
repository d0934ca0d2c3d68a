use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{ArticleMetadata, Category, RemoteId, Section, Snapshot};

pub const STRUCTURE_DIR: &str = "structure";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const SECTIONS_FILE: &str = "sections.json";

/// Article bodies, metadata and the structure snapshot for one language.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn structure_dir(&self) -> PathBuf {
        self.root.join(STRUCTURE_DIR)
    }

    pub fn body_path(&self, article_id: RemoteId) -> PathBuf {
        self.root.join(format!("{article_id}.html"))
    }

    pub fn metadata_path(&self, article_id: RemoteId) -> PathBuf {
        self.root.join(format!("{article_id}.json"))
    }

    /// Create the archive directory. Returns `true` when it did not exist before.
    pub fn ensure_layout(&self) -> Result<bool> {
        if self.root.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        Ok(true)
    }

    pub fn write_article(
        &self,
        article_id: RemoteId,
        body: &str,
        metadata: &ArticleMetadata,
    ) -> Result<()> {
        let body_path = self.body_path(article_id);
        fs::write(&body_path, body)
            .with_context(|| format!("failed to write {}", body_path.display()))?;
        write_json(&self.metadata_path(article_id), metadata)
    }

    pub fn read_body(&self, article_id: RemoteId) -> Result<String> {
        let path = self.body_path(article_id);
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// `Ok(None)` when no metadata file exists for the article.
    pub fn read_metadata(&self, article_id: RemoteId) -> Result<Option<ArticleMetadata>> {
        let path = self.metadata_path(article_id);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Ids of every archived article body, ascending. Files whose stem is not an id are ignored.
    pub fn article_ids(&self) -> Result<Vec<RemoteId>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to list {}", self.root.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_html = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extension == "html");
            if !is_html {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<RemoteId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let structure_dir = self.structure_dir();
        fs::create_dir_all(&structure_dir)
            .with_context(|| format!("failed to create {}", structure_dir.display()))?;
        write_json(&structure_dir.join(CATEGORIES_FILE), &snapshot.categories)?;
        write_json(&structure_dir.join(SECTIONS_FILE), &snapshot.sections)
    }

    /// True when a structure snapshot directory was archived.
    pub fn has_snapshot(&self) -> bool {
        self.structure_dir().is_dir()
    }

    /// A missing file reads as an empty list.
    pub fn read_categories(&self) -> Result<Vec<Category>> {
        read_json_or_default(&self.structure_dir().join(CATEGORIES_FILE))
    }

    /// A missing file reads as an empty list.
    pub fn read_sections(&self) -> Result<Vec<Section>> {
        read_json_or_default(&self.structure_dir().join(SECTIONS_FILE))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}
