use std::collections::{BTreeMap, BTreeSet};

use crate::client::{ApiError, ApiSurface, ArticlePayload, HelpCenterApi, NewContainer};
use crate::model::{
    Article, ArticlePage, Category, PermissionGroup, RemoteId, Section, UserSegment,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCategories,
    ListCategorySections(RemoteId),
    ListSections(ApiSurface),
    ListPermissionGroups(ApiSurface),
    ListUserSegments(ApiSurface),
    ListArticles(ApiSurface, Option<String>),
    GetArticle(ApiSurface, RemoteId),
    CreateCategory(String),
    CreateSection(RemoteId, String),
    CreateArticle(ApiSurface, RemoteId),
    UpdateArticle(ApiSurface, RemoteId),
}

/// In-memory Help Center instance. Operations listed in `failing` answer HTTP 500 and
/// operations listed in `broken` fail at the transport level; keys are built with [`key`].
#[derive(Debug, Default)]
pub struct MockApi {
    pub categories: Vec<Category>,
    pub sections: Vec<Section>,
    pub guide_sections: Vec<Section>,
    pub permission_groups: Vec<PermissionGroup>,
    pub guide_permission_groups: Vec<PermissionGroup>,
    pub user_segments: Vec<UserSegment>,
    pub guide_user_segments: Vec<UserSegment>,
    pub articles: BTreeMap<RemoteId, Article>,
    pub article_pages: Vec<(ApiSurface, Option<String>, ArticlePage)>,
    pub failing: BTreeSet<String>,
    pub broken: BTreeSet<String>,
    pub next_id: RemoteId,
    pub created_categories: Vec<NewContainer>,
    pub created_sections: Vec<(RemoteId, NewContainer)>,
    pub created_articles: Vec<(ApiSurface, RemoteId, ArticlePayload)>,
    pub updated_articles: Vec<(ApiSurface, RemoteId, ArticlePayload)>,
    pub calls: Vec<Call>,
}

pub fn key(operation: &str, surface: ApiSurface) -> String {
    format!("{operation}:{}", surface.as_str())
}

pub fn category(id: RemoteId, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        description: None,
        locale: Some("en-us".to_string()),
        extra: BTreeMap::new(),
    }
}

pub fn section(id: RemoteId, name: &str, category_id: Option<RemoteId>) -> Section {
    Section {
        id,
        name: name.to_string(),
        description: None,
        locale: Some("en-us".to_string()),
        category_id,
        extra: BTreeMap::new(),
    }
}

pub fn article(id: RemoteId, section_id: RemoteId, draft: bool) -> Article {
    Article {
        id,
        title: Some(format!("Title {id}")),
        body: Some(format!("<p>{id}</p>")),
        locale: Some("en-us".to_string()),
        section_id: Some(section_id),
        permission_group_id: None,
        user_segment_id: None,
        draft,
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            next_id: 1_000,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, operation: &str, surface: ApiSurface) {
        self.failing.insert(key(operation, surface));
    }

    pub fn break_transport(&mut self, operation: &str, surface: ApiSurface) {
        self.broken.insert(key(operation, surface));
    }

    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::CreateCategory(_)
                        | Call::CreateSection(..)
                        | Call::CreateArticle(..)
                        | Call::UpdateArticle(..)
                )
            })
            .count()
    }

    fn check(&self, operation: &str, surface: ApiSurface) -> Result<(), ApiError> {
        let name = key(operation, surface);
        if self.broken.contains(&name) {
            return Err(ApiError::Transport {
                path: name,
                message: "connection reset".to_string(),
            });
        }
        if self.failing.contains(&name) {
            return Err(ApiError::Status {
                status: 500,
                path: name,
                body: "{\"error\":\"mock failure\"}".to_string(),
            });
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> RemoteId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl HelpCenterApi for MockApi {
    fn list_categories(&mut self, _locale: &str) -> Result<Vec<Category>, ApiError> {
        self.calls.push(Call::ListCategories);
        self.check("list_categories", ApiSurface::Standard)?;
        Ok(self.categories.clone())
    }

    fn list_category_sections(
        &mut self,
        _locale: &str,
        category_id: RemoteId,
    ) -> Result<Vec<Section>, ApiError> {
        self.calls.push(Call::ListCategorySections(category_id));
        self.check("list_category_sections", ApiSurface::Standard)?;
        Ok(self
            .sections
            .iter()
            .filter(|section| section.category_id == Some(category_id))
            .cloned()
            .collect())
    }

    fn list_sections(
        &mut self,
        surface: ApiSurface,
        _locale: &str,
    ) -> Result<Vec<Section>, ApiError> {
        self.calls.push(Call::ListSections(surface));
        self.check("list_sections", surface)?;
        Ok(match surface {
            ApiSurface::Standard => self.sections.clone(),
            ApiSurface::Guide => self.guide_sections.clone(),
        })
    }

    fn list_permission_groups(
        &mut self,
        surface: ApiSurface,
    ) -> Result<Vec<PermissionGroup>, ApiError> {
        self.calls.push(Call::ListPermissionGroups(surface));
        self.check("list_permission_groups", surface)?;
        Ok(match surface {
            ApiSurface::Standard => self.permission_groups.clone(),
            ApiSurface::Guide => self.guide_permission_groups.clone(),
        })
    }

    fn list_user_segments(&mut self, surface: ApiSurface) -> Result<Vec<UserSegment>, ApiError> {
        self.calls.push(Call::ListUserSegments(surface));
        self.check("list_user_segments", surface)?;
        Ok(match surface {
            ApiSurface::Standard => self.user_segments.clone(),
            ApiSurface::Guide => self.guide_user_segments.clone(),
        })
    }

    fn list_articles(
        &mut self,
        surface: ApiSurface,
        page_url: Option<&str>,
    ) -> Result<ArticlePage, ApiError> {
        self.calls
            .push(Call::ListArticles(surface, page_url.map(str::to_string)));
        self.check("list_articles", surface)?;
        Ok(self
            .article_pages
            .iter()
            .find(|(page_surface, cursor, _)| {
                *page_surface == surface && cursor.as_deref() == page_url
            })
            .map(|(_, _, page)| page.clone())
            .unwrap_or_default())
    }

    fn get_article(
        &mut self,
        surface: ApiSurface,
        article_id: RemoteId,
    ) -> Result<Article, ApiError> {
        self.calls.push(Call::GetArticle(surface, article_id));
        self.check("get_article", surface)?;
        self.articles
            .get(&article_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                path: key("get_article", surface),
                body: "{\"error\":\"RecordNotFound\"}".to_string(),
            })
    }

    fn create_category(
        &mut self,
        _locale: &str,
        new_category: &NewContainer,
    ) -> Result<Category, ApiError> {
        self.calls
            .push(Call::CreateCategory(new_category.name.clone()));
        self.check("create_category", ApiSurface::Standard)?;
        let id = self.allocate_id();
        let created = category(id, &new_category.name);
        self.categories.push(created.clone());
        self.created_categories.push(new_category.clone());
        Ok(created)
    }

    fn create_section(
        &mut self,
        _locale: &str,
        category_id: RemoteId,
        new_section: &NewContainer,
    ) -> Result<Section, ApiError> {
        self.calls
            .push(Call::CreateSection(category_id, new_section.name.clone()));
        self.check("create_section", ApiSurface::Standard)?;
        let id = self.allocate_id();
        let created = section(id, &new_section.name, Some(category_id));
        self.sections.push(created.clone());
        self.created_sections.push((category_id, new_section.clone()));
        Ok(created)
    }

    fn create_article(
        &mut self,
        surface: ApiSurface,
        section_id: RemoteId,
        payload: &ArticlePayload,
    ) -> Result<Article, ApiError> {
        self.calls.push(Call::CreateArticle(surface, section_id));
        self.check("create_article", surface)?;
        let id = self.allocate_id();
        let created = Article {
            id,
            title: Some(payload.title.clone()),
            body: Some(payload.body.clone()),
            locale: Some(payload.locale.clone()),
            section_id: Some(section_id),
            permission_group_id: payload.permission_group_id,
            user_segment_id: payload.user_segment_id,
            draft: payload.draft,
        };
        self.articles.insert(id, created.clone());
        self.created_articles
            .push((surface, section_id, payload.clone()));
        Ok(created)
    }

    fn update_article(
        &mut self,
        surface: ApiSurface,
        article_id: RemoteId,
        payload: &ArticlePayload,
    ) -> Result<(), ApiError> {
        self.calls.push(Call::UpdateArticle(surface, article_id));
        self.check("update_article", surface)?;
        self.updated_articles
            .push((surface, article_id, payload.clone()));
        Ok(())
    }

    fn request_count(&self) -> usize {
        self.calls.len()
    }
}
