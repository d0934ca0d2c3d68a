use std::env;
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::config::InstanceCredentials;
use crate::model::{
    Article, ArticlePage, Category, PermissionGroup, RemoteId, Section, UserSegment,
};

pub const DEFAULT_USER_AGENT: &str = "hcmigrate/0.1";

const ERROR_BODY_LIMIT: usize = 500;

/// Failure of a single remote call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("no {what} returned")]
    Empty { what: &'static str },
}

impl ApiError {
    /// True when the server answered with a non-success status.
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// The two parallel REST surfaces of the Help Center API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSurface {
    Standard,
    Guide,
}

impl ApiSurface {
    /// Order in which dual-path operations are attempted.
    pub const ORDER: [ApiSurface; 2] = [ApiSurface::Standard, ApiSurface::Guide];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Guide => "guide",
        }
    }
}

pub mod endpoints {
    use super::ApiSurface;
    use crate::model::RemoteId;

    pub fn categories(locale: &str) -> String {
        format!("/api/v2/help_center/{locale}/categories.json")
    }

    pub fn category_sections(locale: &str, category_id: RemoteId) -> String {
        format!("/api/v2/help_center/{locale}/categories/{category_id}/sections.json")
    }

    pub fn sections(surface: ApiSurface, locale: &str) -> String {
        match surface {
            ApiSurface::Standard => format!("/api/v2/help_center/{locale}/sections.json"),
            ApiSurface::Guide => "/api/v2/guide/sections.json".to_string(),
        }
    }

    pub fn permission_groups(surface: ApiSurface) -> String {
        match surface {
            ApiSurface::Standard => "/api/v2/help_center/permission_groups.json".to_string(),
            ApiSurface::Guide => "/api/v2/guide/permission_groups.json".to_string(),
        }
    }

    pub fn user_segments(surface: ApiSurface) -> String {
        match surface {
            ApiSurface::Standard => "/api/v2/help_center/user_segments.json".to_string(),
            ApiSurface::Guide => "/api/v2/guide/user_segments.json".to_string(),
        }
    }

    pub fn articles(surface: ApiSurface) -> String {
        match surface {
            ApiSurface::Standard => "/api/v2/help_center/articles.json".to_string(),
            ApiSurface::Guide => "/api/v2/guide/articles.json".to_string(),
        }
    }

    pub fn article(surface: ApiSurface, article_id: RemoteId) -> String {
        match surface {
            ApiSurface::Standard => format!("/api/v2/help_center/articles/{article_id}.json"),
            ApiSurface::Guide => format!("/api/v2/guide/articles/{article_id}.json"),
        }
    }

    pub fn section_articles(surface: ApiSurface, locale: &str, section_id: RemoteId) -> String {
        match surface {
            ApiSurface::Standard => {
                format!("/api/v2/help_center/{locale}/sections/{section_id}/articles.json")
            }
            ApiSurface::Guide => format!("/api/v2/guide/sections/{section_id}/articles.json"),
        }
    }
}

/// Fields sent when creating a category or section.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewContainer {
    pub name: String,
    pub description: String,
    pub locale: String,
}

/// Article body sent on create and update.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArticlePayload {
    pub title: String,
    pub body: String,
    pub locale: String,
    pub section_id: RemoteId,
    pub draft: bool,
    pub promoted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_group_id: Option<RemoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_segment_id: Option<RemoteId>,
}

pub trait HelpCenterApi {
    fn list_categories(&mut self, locale: &str) -> Result<Vec<Category>, ApiError>;
    fn list_category_sections(
        &mut self,
        locale: &str,
        category_id: RemoteId,
    ) -> Result<Vec<Section>, ApiError>;
    fn list_sections(&mut self, surface: ApiSurface, locale: &str)
    -> Result<Vec<Section>, ApiError>;
    fn list_permission_groups(
        &mut self,
        surface: ApiSurface,
    ) -> Result<Vec<PermissionGroup>, ApiError>;
    fn list_user_segments(&mut self, surface: ApiSurface) -> Result<Vec<UserSegment>, ApiError>;
    /// Fetch one page of articles. `page_url` is a `next_page` cursor from a previous page.
    fn list_articles(
        &mut self,
        surface: ApiSurface,
        page_url: Option<&str>,
    ) -> Result<ArticlePage, ApiError>;
    fn get_article(&mut self, surface: ApiSurface, article_id: RemoteId)
    -> Result<Article, ApiError>;
    fn create_category(
        &mut self,
        locale: &str,
        category: &NewContainer,
    ) -> Result<Category, ApiError>;
    fn create_section(
        &mut self,
        locale: &str,
        category_id: RemoteId,
        section: &NewContainer,
    ) -> Result<Section, ApiError>;
    fn create_article(
        &mut self,
        surface: ApiSurface,
        section_id: RemoteId,
        article: &ArticlePayload,
    ) -> Result<Article, ApiError>;
    fn update_article(
        &mut self,
        surface: ApiSurface,
        article_id: RemoteId,
        article: &ArticlePayload,
    ) -> Result<(), ApiError>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub max_read_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            max_read_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl ClientSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_agent: env::var("HC_USER_AGENT")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.user_agent),
            timeout_ms: env_value_u64("HC_HTTP_TIMEOUT_MS", defaults.timeout_ms),
            max_read_retries: env_value_usize("HC_HTTP_RETRIES", defaults.max_read_retries),
            retry_delay_ms: env_value_u64("HC_HTTP_RETRY_DELAY_MS", defaults.retry_delay_ms),
        }
    }
}

/// Blocking Help Center client for one instance.
pub struct HelpCenterClient {
    client: Client,
    base_url: String,
    username: String,
    token: String,
    settings: ClientSettings,
    request_count: usize,
}

impl HelpCenterClient {
    pub fn new(credentials: &InstanceCredentials, settings: ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("failed to build Help Center HTTP client")?;

        Ok(Self {
            client,
            base_url: credentials.base_url(),
            username: format!("{}/token", credentials.zendesk_user_email.trim()),
            token: credentials.zendesk_api_token.trim().to_string(),
            settings,
            request_count: 0,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{}", self.base_url, path_or_url)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.token))
            .header("Content-Type", "application/json")
    }

    fn get_json<T: DeserializeOwned>(&mut self, path_or_url: &str) -> Result<T, ApiError> {
        let url = self.url_for(path_or_url);
        let max_retries = self.settings.max_read_retries;

        for attempt in 0..=max_retries {
            self.request_count += 1;
            let response = self.request(Method::GET, &url).send();
            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() && attempt < max_retries && is_retryable_status(status)
                    {
                        debug!(path = path_or_url, status = status.as_u16(), "retrying read");
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return decode_response(path_or_url, response);
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_error(&error) {
                        debug!(path = path_or_url, %error, "retrying read");
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(transport_error(path_or_url, &error));
                }
            }
        }

        Err(ApiError::Transport {
            path: path_or_url.to_string(),
            message: "retry budget exhausted".to_string(),
        })
    }

    fn send_json<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        let url = self.url_for(path);
        self.request_count += 1;
        let response = self
            .request(method, &url)
            .json(body)
            .send()
            .map_err(|error| transport_error(path, &error))?;
        decode_response(path, response)
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .settings
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl HelpCenterApi for HelpCenterClient {
    fn list_categories(&mut self, locale: &str) -> Result<Vec<Category>, ApiError> {
        let envelope: CategoriesEnvelope = self.get_json(&endpoints::categories(locale))?;
        Ok(envelope.categories)
    }

    fn list_category_sections(
        &mut self,
        locale: &str,
        category_id: RemoteId,
    ) -> Result<Vec<Section>, ApiError> {
        let envelope: SectionsEnvelope =
            self.get_json(&endpoints::category_sections(locale, category_id))?;
        Ok(envelope.sections)
    }

    fn list_sections(
        &mut self,
        surface: ApiSurface,
        locale: &str,
    ) -> Result<Vec<Section>, ApiError> {
        let envelope: SectionsEnvelope = self.get_json(&endpoints::sections(surface, locale))?;
        Ok(envelope.sections)
    }

    fn list_permission_groups(
        &mut self,
        surface: ApiSurface,
    ) -> Result<Vec<PermissionGroup>, ApiError> {
        let envelope: PermissionGroupsEnvelope =
            self.get_json(&endpoints::permission_groups(surface))?;
        Ok(envelope.permission_groups)
    }

    fn list_user_segments(&mut self, surface: ApiSurface) -> Result<Vec<UserSegment>, ApiError> {
        let envelope: UserSegmentsEnvelope = self.get_json(&endpoints::user_segments(surface))?;
        Ok(envelope.user_segments)
    }

    fn list_articles(
        &mut self,
        surface: ApiSurface,
        page_url: Option<&str>,
    ) -> Result<ArticlePage, ApiError> {
        let path = match page_url {
            Some(url) => url.to_string(),
            None => endpoints::articles(surface),
        };
        let envelope: ArticlesEnvelope = self.get_json(&path)?;
        Ok(ArticlePage {
            articles: envelope.articles,
            next_page: envelope.next_page.filter(|next| !next.trim().is_empty()),
        })
    }

    fn get_article(
        &mut self,
        surface: ApiSurface,
        article_id: RemoteId,
    ) -> Result<Article, ApiError> {
        let envelope: ArticleEnvelope = self.get_json(&endpoints::article(surface, article_id))?;
        Ok(envelope.article)
    }

    fn create_category(
        &mut self,
        locale: &str,
        category: &NewContainer,
    ) -> Result<Category, ApiError> {
        let envelope: CategoryEnvelope = self.send_json(
            Method::POST,
            &endpoints::categories(locale),
            &json!({ "category": category }),
        )?;
        Ok(envelope.category)
    }

    fn create_section(
        &mut self,
        locale: &str,
        category_id: RemoteId,
        section: &NewContainer,
    ) -> Result<Section, ApiError> {
        let envelope: SectionEnvelope = self.send_json(
            Method::POST,
            &endpoints::category_sections(locale, category_id),
            &json!({ "section": section }),
        )?;
        Ok(envelope.section)
    }

    fn create_article(
        &mut self,
        surface: ApiSurface,
        section_id: RemoteId,
        article: &ArticlePayload,
    ) -> Result<Article, ApiError> {
        let envelope: ArticleEnvelope = self.send_json(
            Method::POST,
            &endpoints::section_articles(surface, &article.locale, section_id),
            &json!({ "article": article, "notify_subscribers": false }),
        )?;
        Ok(envelope.article)
    }

    fn update_article(
        &mut self,
        surface: ApiSurface,
        article_id: RemoteId,
        article: &ArticlePayload,
    ) -> Result<(), ApiError> {
        let _: Value = self.send_json(
            Method::PUT,
            &endpoints::article(surface, article_id),
            &json!({ "article": article }),
        )?;
        Ok(())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::blocking::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|error| transport_error(path, &error))?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            path: path.to_string(),
            body: truncate_body(&text),
        });
    }
    let source = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str(source).map_err(|error| ApiError::Decode {
        path: path.to_string(),
        message: error.to_string(),
    })
}

fn transport_error(path: &str, error: &reqwest::Error) -> ApiError {
    ApiError::Transport {
        path: path.to_string(),
        message: error.to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

#[derive(Debug, Deserialize, Default)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct CategoryEnvelope {
    category: Category,
}

#[derive(Debug, Deserialize, Default)]
struct SectionsEnvelope {
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct SectionEnvelope {
    section: Section,
}

#[derive(Debug, Deserialize, Default)]
struct PermissionGroupsEnvelope {
    #[serde(default)]
    permission_groups: Vec<PermissionGroup>,
}

#[derive(Debug, Deserialize, Default)]
struct UserSegmentsEnvelope {
    #[serde(default)]
    user_segments: Vec<UserSegment>,
}

#[derive(Debug, Deserialize, Default)]
struct ArticlesEnvelope {
    #[serde(default)]
    articles: Vec<Article>,
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_paths_follow_help_center_layout() {
        assert_eq!(
            endpoints::sections(ApiSurface::Standard, "en-us"),
            "/api/v2/help_center/en-us/sections.json"
        );
        assert_eq!(
            endpoints::category_sections("en-us", 12),
            "/api/v2/help_center/en-us/categories/12/sections.json"
        );
        assert_eq!(
            endpoints::section_articles(ApiSurface::Standard, "fr", 55),
            "/api/v2/help_center/fr/sections/55/articles.json"
        );
        assert_eq!(
            endpoints::article(ApiSurface::Standard, 101),
            "/api/v2/help_center/articles/101.json"
        );
    }

    #[test]
    fn guide_paths_drop_the_locale() {
        assert_eq!(
            endpoints::sections(ApiSurface::Guide, "en-us"),
            "/api/v2/guide/sections.json"
        );
        assert_eq!(
            endpoints::section_articles(ApiSurface::Guide, "en-us", 55),
            "/api/v2/guide/sections/55/articles.json"
        );
        assert_eq!(
            endpoints::user_segments(ApiSurface::Guide),
            "/api/v2/guide/user_segments.json"
        );
        assert_eq!(
            endpoints::permission_groups(ApiSurface::Guide),
            "/api/v2/guide/permission_groups.json"
        );
    }

    #[test]
    fn article_payload_omits_absent_group_and_segment() {
        let payload = ArticlePayload {
            title: "Hi".to_string(),
            body: "<p>Hi</p>".to_string(),
            locale: "en-us".to_string(),
            section_id: 55,
            draft: false,
            promoted: true,
            permission_group_id: None,
            user_segment_id: Some(4),
        };
        let rendered = serde_json::to_value(&payload).expect("serialize payload");
        assert!(rendered.get("permission_group_id").is_none());
        assert_eq!(rendered["user_segment_id"], Value::from(4));
        assert_eq!(rendered["draft"], Value::Bool(false));
        assert_eq!(rendered["promoted"], Value::Bool(true));
    }

    #[test]
    fn articles_envelope_reads_cursor() {
        let envelope: ArticlesEnvelope = serde_json::from_str(
            r#"{"articles":[{"id":1,"draft":false},{"id":2,"draft":true}],"next_page":"https://x/api?page=2","count":2}"#,
        )
        .expect("parse envelope");
        assert_eq!(envelope.articles.len(), 2);
        assert!(envelope.articles[1].draft);
        assert_eq!(envelope.next_page.as_deref(), Some("https://x/api?page=2"));
    }

    #[test]
    fn client_builds_token_username_and_base_url() {
        let credentials = InstanceCredentials {
            zendesk_api_token: "secret".to_string(),
            zendesk_user_email: "agent@example.com".to_string(),
            zendesk_subdomain: "https://acme.zendesk.com/".to_string(),
        };
        let client =
            HelpCenterClient::new(&credentials, ClientSettings::default()).expect("client");
        assert_eq!(client.base_url(), "https://acme.zendesk.com");
        assert_eq!(client.username, "agent@example.com/token");
        assert_eq!(
            client.url_for("/api/v2/help_center/articles.json"),
            "https://acme.zendesk.com/api/v2/help_center/articles.json"
        );
        assert_eq!(
            client.url_for("https://acme.zendesk.com/api/v2/help_center/articles.json?page=2"),
            "https://acme.zendesk.com/api/v2/help_center/articles.json?page=2"
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(ERROR_BODY_LIMIT + 10);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), ERROR_BODY_LIMIT + 3);
    }
}
