use serde::Serialize;
use tracing::{info, warn};

use crate::attempt::{non_empty, standard_then_guide};
use crate::client::HelpCenterApi;
use crate::config::MigrateConfig;
use crate::model::{RemoteId, UserSegment};

const PREFERRED_SEGMENT_NAMES: [&str; 3] = ["everyone", "all", "signed-in users"];

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FallbackIds {
    pub section_id: Option<RemoteId>,
    pub permission_group_id: Option<RemoteId>,
    pub user_segment_id: Option<RemoteId>,
}

pub fn resolve_fallbacks<A: HelpCenterApi>(api: &mut A, config: &MigrateConfig) -> FallbackIds {
    FallbackIds {
        section_id: resolve_section(api, &config.language, config.section_id),
        permission_group_id: resolve_permission_group(api, config.permission_group_id),
        user_segment_id: resolve_user_segment(api, config.user_segment_id),
    }
}

/// First section the target lists, else `configured`.
pub fn resolve_section<A: HelpCenterApi>(
    api: &mut A,
    language: &str,
    configured: Option<RemoteId>,
) -> Option<RemoteId> {
    let attempt = standard_then_guide("list sections", |surface| {
        api.list_sections(surface, language)
            .and_then(|sections| non_empty(sections, "sections"))
    });
    match attempt {
        Ok((surface, sections)) => {
            let first = &sections[0];
            info!(
                name = %first.name,
                section_id = first.id,
                surface = surface.as_str(),
                "using fallback section"
            );
            Some(first.id)
        }
        Err(error) => {
            warn!(%error, configured = ?configured, "no target sections found; using configured section");
            configured
        }
    }
}

/// First permission group the target lists, else `configured`.
pub fn resolve_permission_group<A: HelpCenterApi>(
    api: &mut A,
    configured: Option<RemoteId>,
) -> Option<RemoteId> {
    let attempt = standard_then_guide("list permission groups", |surface| {
        api.list_permission_groups(surface)
            .and_then(|groups| non_empty(groups, "permission groups"))
    });
    match attempt {
        Ok((surface, groups)) => {
            for group in &groups {
                info!(
                    name = %group.name,
                    permission_group_id = group.id,
                    surface = surface.as_str(),
                    "available permission group"
                );
            }
            Some(groups[0].id)
        }
        Err(error) => {
            warn!(%error, configured = ?configured, "failed to fetch permission groups; using configured group");
            configured
        }
    }
}

/// A segment named like "Everyone" when present, else the first listed, else `configured`.
pub fn resolve_user_segment<A: HelpCenterApi>(
    api: &mut A,
    configured: Option<RemoteId>,
) -> Option<RemoteId> {
    let attempt = standard_then_guide("list user segments", |surface| {
        api.list_user_segments(surface)
            .and_then(|segments| non_empty(segments, "user segments"))
    });
    match attempt {
        Ok((surface, segments)) => {
            for segment in &segments {
                info!(
                    name = %segment.name,
                    user_segment_id = segment.id,
                    surface = surface.as_str(),
                    "available user segment"
                );
            }
            Some(preferred_segment(&segments).unwrap_or(segments[0].id))
        }
        Err(error) => {
            warn!(%error, configured = ?configured, "no user segments found; using configured segment");
            configured
        }
    }
}

fn preferred_segment(segments: &[UserSegment]) -> Option<RemoteId> {
    segments
        .iter()
        .find(|segment| {
            let name = segment.name.to_lowercase();
            PREFERRED_SEGMENT_NAMES.contains(&name.as_str())
        })
        .map(|segment| segment.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiSurface;
    use crate::mock::{Call, MockApi, section};
    use crate::model::{PermissionGroup, UserSegment};

    fn group(id: RemoteId, name: &str) -> PermissionGroup {
        PermissionGroup {
            id,
            name: name.to_string(),
        }
    }

    fn segment(id: RemoteId, name: &str) -> UserSegment {
        UserSegment {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn first_standard_section_wins() {
        let mut api = MockApi::new();
        api.sections = vec![section(40, "First", Some(1)), section(41, "Second", Some(1))];
        api.guide_sections = vec![section(90, "Guide", Some(1))];

        assert_eq!(resolve_section(&mut api, "en-us", Some(5)), Some(40));
        assert_eq!(api.calls, vec![Call::ListSections(ApiSurface::Standard)]);
    }

    #[test]
    fn guide_sections_are_used_when_standard_is_empty() {
        let mut api = MockApi::new();
        api.guide_sections = vec![section(90, "Guide", Some(1))];

        assert_eq!(resolve_section(&mut api, "en-us", None), Some(90));
        assert_eq!(
            api.calls,
            vec![
                Call::ListSections(ApiSurface::Standard),
                Call::ListSections(ApiSurface::Guide)
            ]
        );
    }

    #[test]
    fn configured_section_is_used_when_both_surfaces_fail() {
        let mut api = MockApi::new();
        api.fail("list_sections", ApiSurface::Standard);
        api.break_transport("list_sections", ApiSurface::Guide);

        assert_eq!(resolve_section(&mut api, "en-us", Some(5)), Some(5));
        assert_eq!(resolve_section(&mut api, "en-us", None), None);
    }

    #[test]
    fn first_permission_group_wins_with_guide_fallback() {
        let mut api = MockApi::new();
        api.fail("list_permission_groups", ApiSurface::Standard);
        api.guide_permission_groups = vec![group(3, "Admins"), group(4, "Agents")];

        assert_eq!(resolve_permission_group(&mut api, Some(1)), Some(3));
    }

    #[test]
    fn permission_group_defaults_when_none_listed() {
        let mut api = MockApi::new();
        assert_eq!(resolve_permission_group(&mut api, Some(1)), Some(1));
        assert_eq!(api.calls.len(), 2);
    }

    #[test]
    fn everyone_segment_is_preferred() {
        let mut api = MockApi::new();
        api.user_segments = vec![
            segment(7, "Agents only"),
            segment(8, "Signed-in users"),
            segment(9, "Everyone"),
        ];

        assert_eq!(resolve_user_segment(&mut api, None), Some(8));
    }

    #[test]
    fn first_segment_is_used_without_a_preferred_name() {
        let mut api = MockApi::new();
        api.guide_user_segments = vec![segment(7, "Agents only"), segment(8, "VIP")];

        assert_eq!(resolve_user_segment(&mut api, Some(2)), Some(7));
    }

    #[test]
    fn segment_defaults_to_configured_value() {
        let mut api = MockApi::new();
        api.break_transport("list_user_segments", ApiSurface::Standard);
        api.break_transport("list_user_segments", ApiSurface::Guide);

        assert_eq!(resolve_user_segment(&mut api, Some(2)), Some(2));
    }

    #[test]
    fn resolve_fallbacks_uses_config_defaults() {
        let mut api = MockApi::new();
        api.sections = vec![section(40, "First", Some(1))];
        let config = MigrateConfig {
            section_id: Some(1),
            permission_group_id: Some(2),
            user_segment_id: Some(3),
            ..MigrateConfig::default()
        };

        let fallbacks = resolve_fallbacks(&mut api, &config);
        assert_eq!(
            fallbacks,
            FallbackIds {
                section_id: Some(40),
                permission_group_id: Some(2),
                user_segment_id: Some(3),
            }
        );
    }
}
