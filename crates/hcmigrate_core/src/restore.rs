use serde::Serialize;
use tracing::{debug, info, warn};

use crate::attempt::standard_then_guide;
use crate::client::{ApiError, ApiSurface, ArticlePayload, HelpCenterApi};
use crate::fallback::FallbackIds;
use crate::model::{ArticleMetadata, IdMapping, RemoteId, default_title};

/// Values shared by every article restored in one pass.
#[derive(Debug, Clone, Copy)]
pub struct RestoreContext<'a> {
    pub fallbacks: &'a FallbackIds,
    pub section_map: &'a IdMapping,
    pub language: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ArticleOutcome {
    Created {
        section_id: RemoteId,
        surface: &'static str,
        new_id: RemoteId,
    },
    Updated {
        section_id: RemoteId,
        surface: &'static str,
    },
    NoSection,
    Failed {
        reason: String,
    },
}

impl ArticleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Created {
                section_id,
                surface,
                new_id,
            } => format!("created as {new_id} in section {section_id} via {surface} api"),
            Self::Updated {
                section_id,
                surface,
            } => format!("updated in section {section_id} via {surface} api"),
            Self::NoSection => "no valid target section".to_string(),
            Self::Failed { reason } => reason.clone(),
        }
    }
}

/// Mapped original section first, then the instance-wide fallback.
pub fn resolve_target_section(
    metadata: &ArticleMetadata,
    section_map: &IdMapping,
    fallback: Option<RemoteId>,
) -> Option<RemoteId> {
    metadata
        .section_id
        .and_then(|section_id| section_map.get(section_id))
        .or(fallback)
}

pub fn build_payload(
    article_id: RemoteId,
    body: &str,
    metadata: &ArticleMetadata,
    section_id: RemoteId,
    context: &RestoreContext<'_>,
) -> ArticlePayload {
    ArticlePayload {
        title: metadata
            .title
            .clone()
            .unwrap_or_else(|| default_title(article_id)),
        body: body.to_string(),
        locale: metadata
            .locale
            .clone()
            .unwrap_or_else(|| context.language.to_string()),
        section_id,
        draft: false,
        promoted: true,
        permission_group_id: context.fallbacks.permission_group_id,
        user_segment_id: context.fallbacks.user_segment_id,
    }
}

pub fn restore_article<A: HelpCenterApi>(
    api: &mut A,
    article_id: RemoteId,
    body: &str,
    metadata: &ArticleMetadata,
    context: &RestoreContext<'_>,
) -> ArticleOutcome {
    let Some(section_id) =
        resolve_target_section(metadata, context.section_map, context.fallbacks.section_id)
    else {
        warn!(article_id, "cannot restore article: no valid section found");
        return ArticleOutcome::NoSection;
    };
    debug!(
        article_id,
        original_section_id = ?metadata.section_id,
        section_id,
        "resolved target section"
    );

    let payload = build_payload(article_id, body, metadata, section_id, context);
    match write_article(api, article_id, section_id, &payload) {
        Ok(outcome) => {
            info!(article_id, outcome = %outcome.describe(), "restored article");
            outcome
        }
        Err(error) => {
            warn!(article_id, %error, "failed to restore article");
            ArticleOutcome::Failed {
                reason: error.to_string(),
            }
        }
    }
}

fn write_article<A: HelpCenterApi>(
    api: &mut A,
    article_id: RemoteId,
    section_id: RemoteId,
    payload: &ArticlePayload,
) -> Result<ArticleOutcome, ApiError> {
    if article_exists(api, article_id)? {
        info!(article_id, "article exists, updating");
        let (surface, ()) = standard_then_guide("update article", |surface| {
            api.update_article(surface, article_id, payload)
        })?;
        return Ok(ArticleOutcome::Updated {
            section_id,
            surface: surface.as_str(),
        });
    }

    info!(article_id, section_id, "article not found, creating");
    let (surface, created) = standard_then_guide("create article", |surface| {
        api.create_article(surface, section_id, payload)
    })?;
    Ok(ArticleOutcome::Created {
        section_id,
        surface: surface.as_str(),
        new_id: created.id,
    })
}

/// "Not there" only when every surface answered with a status. Any transport or decode
/// failure fails the check, even if another surface answered 404.
fn article_exists<A: HelpCenterApi>(api: &mut A, article_id: RemoteId) -> Result<bool, ApiError> {
    let mut unanswered: Option<ApiError> = None;
    let attempt = standard_then_guide("probe article", |surface: ApiSurface| {
        api.get_article(surface, article_id).inspect_err(|error| {
            if !error.is_status() && unanswered.is_none() {
                unanswered = Some(error.clone());
            }
        })
    });
    match attempt {
        Ok(_) => Ok(true),
        Err(error) => match unanswered {
            Some(unanswered) => Err(unanswered),
            None if error.is_status() => Ok(false),
            None => Err(error),
        },
    }
}
