use serde::Serialize;
use tracing::{info, warn};

use crate::client::{ApiSurface, HelpCenterApi, NewContainer};
use crate::model::{Category, IdMapping, RemoteId, Section, Snapshot, names_match};

/// Old-to-new id mappings plus what it took to build them.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub category_map: IdMapping,
    pub section_map: IdMapping,
    pub summary: ReconcileSummary,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub categories_matched: usize,
    pub categories_created: usize,
    pub sections_matched: usize,
    pub sections_created: usize,
    pub sections_skipped: usize,
    pub errors: Vec<String>,
}

/// Reuse target entities whose name matches case-insensitively and create the rest,
/// categories first so each section lands under its mapped parent. Failures leave the
/// entity unmapped and never stop the pass.
pub fn reconcile<A: HelpCenterApi>(
    api: &mut A,
    snapshot: &Snapshot,
    language: &str,
) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();

    let existing_categories = match api.list_categories(language) {
        Ok(categories) => {
            info!(count = categories.len(), "found existing target categories");
            categories
        }
        Err(error) => {
            warn!(%error, "failed to list target categories; treating target as empty");
            reconciliation
                .summary
                .errors
                .push(format!("list categories: {error}"));
            Vec::new()
        }
    };
    reconcile_categories(
        api,
        &snapshot.categories,
        &existing_categories,
        language,
        &mut reconciliation,
    );

    let existing_sections = match api.list_sections(ApiSurface::Standard, language) {
        Ok(sections) => {
            info!(count = sections.len(), "found existing target sections");
            sections
        }
        Err(error) => {
            warn!(%error, "failed to list target sections; treating target as empty");
            reconciliation
                .summary
                .errors
                .push(format!("list sections: {error}"));
            Vec::new()
        }
    };
    let first_existing_category = existing_categories.first().map(|category| category.id);
    reconcile_sections(
        api,
        &snapshot.sections,
        &existing_sections,
        first_existing_category,
        language,
        &mut reconciliation,
    );

    reconciliation
}

fn reconcile_categories<A: HelpCenterApi>(
    api: &mut A,
    archived: &[Category],
    existing: &[Category],
    language: &str,
    reconciliation: &mut Reconciliation,
) {
    for category in archived {
        if let Some(found) = existing
            .iter()
            .find(|candidate| names_match(&candidate.name, &category.name))
        {
            info!(
                name = %category.name,
                source_id = category.id,
                target_id = found.id,
                "category already exists"
            );
            reconciliation.category_map.insert(category.id, found.id);
            reconciliation.summary.categories_matched += 1;
            continue;
        }

        let new_category = NewContainer {
            name: category.name.clone(),
            description: category.description.clone().unwrap_or_default(),
            locale: language.to_string(),
        };
        match api.create_category(language, &new_category) {
            Ok(created) => {
                info!(
                    name = %category.name,
                    source_id = category.id,
                    target_id = created.id,
                    "created category"
                );
                reconciliation.category_map.insert(category.id, created.id);
                reconciliation.summary.categories_created += 1;
            }
            Err(error) => {
                warn!(name = %category.name, source_id = category.id, %error, "failed to create category");
                reconciliation
                    .summary
                    .errors
                    .push(format!("create category '{}': {error}", category.name));
            }
        }
    }
}

fn reconcile_sections<A: HelpCenterApi>(
    api: &mut A,
    archived: &[Section],
    existing: &[Section],
    first_existing_category: Option<RemoteId>,
    language: &str,
    reconciliation: &mut Reconciliation,
) {
    for section in archived {
        let Some(category_id) = resolve_parent_category(
            section,
            &reconciliation.category_map,
            first_existing_category,
        ) else {
            warn!(name = %section.name, source_id = section.id, "no valid category for section; skipping");
            reconciliation.summary.sections_skipped += 1;
            continue;
        };

        if let Some(found) = existing
            .iter()
            .find(|candidate| names_match(&candidate.name, &section.name))
        {
            info!(
                name = %section.name,
                source_id = section.id,
                target_id = found.id,
                "section already exists"
            );
            reconciliation.section_map.insert(section.id, found.id);
            reconciliation.summary.sections_matched += 1;
            continue;
        }

        let new_section = NewContainer {
            name: section.name.clone(),
            description: section.description.clone().unwrap_or_default(),
            locale: language.to_string(),
        };
        match api.create_section(language, category_id, &new_section) {
            Ok(created) => {
                info!(
                    name = %section.name,
                    source_id = section.id,
                    target_id = created.id,
                    category_id,
                    "created section"
                );
                reconciliation.section_map.insert(section.id, created.id);
                reconciliation.summary.sections_created += 1;
            }
            Err(error) => {
                warn!(name = %section.name, source_id = section.id, %error, "failed to create section");
                reconciliation
                    .summary
                    .errors
                    .push(format!("create section '{}': {error}", section.name));
            }
        }
    }
}

/// Mapped parent category, else the first category the target already had.
fn resolve_parent_category(
    section: &Section,
    category_map: &IdMapping,
    first_existing_category: Option<RemoteId>,
) -> Option<RemoteId> {
    if let Some(mapped) = section
        .category_id
        .and_then(|category_id| category_map.get(category_id))
    {
        return Some(mapped);
    }
    let fallback = first_existing_category?;
    info!(
        name = %section.name,
        category_id = fallback,
        "using first available category for section"
    );
    Some(fallback)
}
