use std::fmt;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::archive::LocalArchive;
use crate::backup::{StructureBackup, backup_structure, list_public_article_ids, pull_article};
use crate::client::HelpCenterApi;
use crate::config::MigrateConfig;
use crate::fallback::{FallbackIds, resolve_fallbacks};
use crate::model::{ArticleMetadata, RemoteId, Snapshot};
use crate::reconcile::{ReconcileSummary, Reconciliation, reconcile};
use crate::restore::{RestoreContext, restore_article};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Backup,
    Restore,
    Both,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Both => "both",
        }
    }

    pub fn includes_backup(self) -> bool {
        matches!(self, Self::Backup | Self::Both)
    }

    pub fn includes_restore(self) -> bool {
        matches!(self, Self::Restore | Self::Both)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    pub created_archive_dir: bool,
    pub structure: StructureBackup,
    pub listed: usize,
    pub listing_surface: Option<&'static str>,
    pub backed_up: Vec<RemoteId>,
    pub failures: Vec<String>,
    pub request_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub queued: usize,
    pub restored: Vec<RemoteId>,
    pub skipped: Vec<RemoteId>,
    pub failures: Vec<String>,
    pub aborted: Option<String>,
    pub reconcile: ReconcileSummary,
    pub categories_mapped: usize,
    pub sections_mapped: usize,
    pub fallbacks: FallbackIds,
    pub request_count: usize,
}

pub fn backup_pass<A: HelpCenterApi>(
    api: &mut A,
    archive: &LocalArchive,
    config: &MigrateConfig,
) -> Result<BackupReport> {
    let mut report = BackupReport {
        created_archive_dir: archive.ensure_layout()?,
        ..BackupReport::default()
    };
    if report.created_archive_dir {
        info!(path = %archive.root().display(), "created archive directory");
    }

    report.structure = backup_structure(api, archive, &config.language)?;

    let ids = match list_public_article_ids(api) {
        Ok((surface, ids)) => {
            report.listing_surface = Some(surface.as_str());
            ids
        }
        Err(error) => {
            warn!(%error, "no public articles could be listed");
            report.failures.push(format!("list articles: {error}"));
            Vec::new()
        }
    };
    report.listed = ids.len();
    info!(count = ids.len(), "found public articles");

    for article_id in ids {
        match pull_article(api, archive, article_id, &config.language) {
            Ok(_) => report.backed_up.push(article_id),
            Err(error) => {
                warn!(article_id, error = %format!("{error:#}"), "failed to back up article");
                report.failures.push(format!("{article_id}: {error:#}"));
            }
        }
    }

    report.request_count = api.request_count();
    Ok(report)
}

pub fn restore_pass<A: HelpCenterApi>(
    api: &mut A,
    archive: &LocalArchive,
    config: &MigrateConfig,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();

    let ids = archive.article_ids()?;
    report.queued = ids.len();
    if ids.is_empty() {
        warn!(path = %archive.root().display(), "no articles found to restore");
        report.aborted = Some("no articles found to restore".to_string());
        report.request_count = api.request_count();
        return Ok(report);
    }
    info!(count = ids.len(), "found articles to restore");

    let mut load_errors = Vec::new();
    let mut reconciliation = match load_snapshot(archive, &mut load_errors) {
        Some(snapshot) => reconcile(api, &snapshot, &config.language),
        None => {
            warn!("no structure snapshot in archive; articles rely on the fallback section");
            Reconciliation::default()
        }
    };
    if !load_errors.is_empty() {
        load_errors.append(&mut reconciliation.summary.errors);
        reconciliation.summary.errors = load_errors;
    }
    report.categories_mapped = reconciliation.category_map.len();
    report.sections_mapped = reconciliation.section_map.len();
    info!(
        categories = report.categories_mapped,
        sections = report.sections_mapped,
        "reconciled structure"
    );

    let fallbacks = resolve_fallbacks(api, config);
    let context = RestoreContext {
        fallbacks: &fallbacks,
        section_map: &reconciliation.section_map,
        language: &config.language,
    };

    let mut remaining = ids.as_slice();
    if options.fail_fast
        && let Some((&probe_id, rest)) = ids.split_first()
    {
        info!(article_id = probe_id, "fail-fast: probing with a single article");
        match restore_one(api, archive, probe_id, &context) {
            Step::Restored => {
                report.restored.push(probe_id);
                remaining = rest;
                info!(remaining = rest.len(), "probe succeeded");
            }
            Step::Missing(reason) | Step::Failed(reason) => {
                warn!(article_id = probe_id, %reason, "probe failed; aborting restore");
                report.failures.push(format!("{probe_id}: {reason}"));
                report.aborted = Some(format!("probe article {probe_id} failed"));
                return Ok(finish(report, reconciliation, fallbacks, api));
            }
        }
    }

    for &article_id in remaining {
        match restore_one(api, archive, article_id, &context) {
            Step::Restored => report.restored.push(article_id),
            Step::Missing(reason) => {
                warn!(article_id, %reason, "skipping article");
                report.skipped.push(article_id);
                if options.fail_fast {
                    report.aborted = Some(format!("missing data for article {article_id}"));
                    break;
                }
            }
            Step::Failed(reason) => {
                report.failures.push(format!("{article_id}: {reason}"));
                if options.fail_fast {
                    report.aborted = Some(format!("restore of article {article_id} failed"));
                    break;
                }
            }
        }
    }

    info!(
        restored = report.restored.len(),
        queued = report.queued,
        "restore finished"
    );
    Ok(finish(report, reconciliation, fallbacks, api))
}

enum Step {
    Restored,
    Missing(String),
    Failed(String),
}

/// Structure files are loaded one at a time; an unreadable file contributes nothing and is
/// recorded in `errors`.
fn load_snapshot(archive: &LocalArchive, errors: &mut Vec<String>) -> Option<Snapshot> {
    if !archive.has_snapshot() {
        return None;
    }
    let categories = archive.read_categories().unwrap_or_else(|error| {
        warn!(error = %format!("{error:#}"), "ignoring unreadable archived categories");
        errors.push(format!("load categories: {error:#}"));
        Vec::new()
    });
    let sections = archive.read_sections().unwrap_or_else(|error| {
        warn!(error = %format!("{error:#}"), "ignoring unreadable archived sections");
        errors.push(format!("load sections: {error:#}"));
        Vec::new()
    });
    Some(Snapshot {
        categories,
        sections,
    })
}

fn restore_one<A: HelpCenterApi>(
    api: &mut A,
    archive: &LocalArchive,
    article_id: RemoteId,
    context: &RestoreContext<'_>,
) -> Step {
    let body = match archive.read_body(article_id) {
        Ok(body) => body,
        Err(error) => return Step::Failed(format!("{error:#}")),
    };
    let metadata = match load_metadata(archive, article_id) {
        Ok(metadata) => metadata,
        Err(reason) => return Step::Missing(reason),
    };
    let outcome = restore_article(api, article_id, &body, &metadata, context);
    if outcome.is_success() {
        Step::Restored
    } else {
        Step::Failed(outcome.describe())
    }
}

/// Absent and unparsable metadata both count as missing.
fn load_metadata(
    archive: &LocalArchive,
    article_id: RemoteId,
) -> std::result::Result<ArticleMetadata, String> {
    match archive.read_metadata(article_id) {
        Ok(Some(metadata)) => Ok(metadata),
        Ok(None) => Err("no metadata found".to_string()),
        Err(error) => Err(format!("unreadable metadata: {error:#}")),
    }
}

fn finish<A: HelpCenterApi>(
    mut report: RestoreReport,
    reconciliation: Reconciliation,
    fallbacks: FallbackIds,
    api: &A,
) -> RestoreReport {
    report.reconcile = reconciliation.summary;
    report.fallbacks = fallbacks;
    report.request_count = api.request_count();
    report
}
