use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::LocalArchive;
use crate::attempt::{non_empty, standard_then_guide};
use crate::client::{ApiError, ApiSurface, HelpCenterApi};
use crate::model::{ArticleMetadata, RemoteId, Section, Snapshot};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StructureBackup {
    pub categories: usize,
    pub sections: usize,
    pub errors: Vec<String>,
}

/// Snapshot categories and sections of `language`. Listing failures are recorded and the
/// snapshot is still written, with whatever was collected.
pub fn backup_structure<A: HelpCenterApi>(
    api: &mut A,
    archive: &LocalArchive,
    language: &str,
) -> Result<StructureBackup> {
    let mut report = StructureBackup::default();
    let mut snapshot = Snapshot::default();

    match api.list_categories(language) {
        Ok(categories) => snapshot.categories = categories,
        Err(error) => {
            warn!(%error, "failed to list source categories");
            report.errors.push(format!("list categories: {error}"));
        }
    }

    let mut seen = BTreeSet::new();
    for category in &snapshot.categories {
        match api.list_category_sections(language, category.id) {
            Ok(sections) => {
                debug!(category_id = category.id, count = sections.len(), "listed category sections");
                push_unique(&mut snapshot.sections, &mut seen, sections);
            }
            Err(error) => {
                warn!(category_id = category.id, %error, "failed to list sections for category");
                report
                    .errors
                    .push(format!("list sections of category {}: {error}", category.id));
            }
        }
    }

    match api.list_sections(ApiSurface::Standard, language) {
        Ok(sections) => push_unique(&mut snapshot.sections, &mut seen, sections),
        Err(error) => {
            warn!(%error, "failed to list all source sections");
            report.errors.push(format!("list sections: {error}"));
        }
    }

    archive
        .write_snapshot(&snapshot)
        .context("failed to write structure snapshot")?;
    report.categories = snapshot.categories.len();
    report.sections = snapshot.sections.len();
    info!(
        categories = report.categories,
        sections = report.sections,
        "backed up structure"
    );
    Ok(report)
}

fn push_unique(into: &mut Vec<Section>, seen: &mut BTreeSet<RemoteId>, sections: Vec<Section>) {
    for section in sections {
        if seen.insert(section.id) {
            into.push(section);
        }
    }
}

/// Ids of every non-draft article, from the first surface that yields any.
pub fn list_public_article_ids<A: HelpCenterApi>(
    api: &mut A,
) -> Result<(ApiSurface, Vec<RemoteId>), ApiError> {
    standard_then_guide("list articles", |surface| {
        collect_public_ids(api, surface).and_then(|ids| non_empty(ids, "public articles"))
    })
}

/// Follow `next_page` until it is absent or repeats. A failure after the first page keeps
/// what was already collected.
fn collect_public_ids<A: HelpCenterApi>(
    api: &mut A,
    surface: ApiSurface,
) -> Result<Vec<RemoteId>, ApiError> {
    let mut ids = Vec::new();
    let mut known = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match api.list_articles(surface, cursor.as_deref()) {
            Ok(page) => page,
            Err(error) if pages == 0 => return Err(error),
            Err(error) => {
                warn!(surface = surface.as_str(), pages, %error, "article listing stopped early");
                break;
            }
        };
        pages += 1;

        for article in page.articles {
            if article.draft {
                continue;
            }
            if known.insert(article.id) {
                ids.push(article.id);
            }
        }

        let Some(next) = page.next_page else {
            break;
        };
        if !visited.insert(next.clone()) {
            warn!(surface = surface.as_str(), next_page = %next, "article listing repeated a page; stopping");
            break;
        }
        cursor = Some(next);
    }

    debug!(surface = surface.as_str(), pages, count = ids.len(), "listed public articles");
    Ok(ids)
}

/// Fetch one article and persist its body and metadata. A missing body is archived empty.
pub fn pull_article<A: HelpCenterApi>(
    api: &mut A,
    archive: &LocalArchive,
    article_id: RemoteId,
    language: &str,
) -> Result<ApiSurface> {
    let (surface, article) =
        standard_then_guide("get article", |surface| api.get_article(surface, article_id))
            .with_context(|| format!("failed to fetch article {article_id}"))?;
    let metadata = ArticleMetadata::from_article(&article, language);
    archive.write_article(article_id, article.body.as_deref().unwrap_or_default(), &metadata)?;
    info!(article_id, surface = surface.as_str(), "backed up article");
    Ok(surface)
}
