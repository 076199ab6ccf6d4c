use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::transport::{ApiRequest, BasicCredentials, DualTransport, Transport};
use super::{MAX_UPLOAD_BYTES, PublishError};
use crate::capability::PhotoFile;
use crate::config::Settings;

/// A rendered field as the REST API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct Rendered {
    pub rendered: String,
}

/// The authenticated account, returned by the connection test.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// A site category.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// A tag term, from search results or a create call.
#[derive(Debug, Clone, Deserialize)]
pub struct TagTerm {
    pub id: u64,
    pub name: String,
}

/// An uploaded media item.
#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    pub id: u64,
    pub source_url: Option<String>,
}

/// A published post, as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: Rendered,
    pub link: String,
    pub content: Rendered,
}

/// Payload for post creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub status: String,
    pub featured_media: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

/// Client for the WordPress REST API, all calls through the dual transport.
pub struct WordPressClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for WordPressClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WordPressClient {
    pub fn new(settings: &Settings) -> Self {
        let credentials = BasicCredentials {
            username: settings.username.clone(),
            app_password: settings.app_password.clone(),
        };
        Self {
            base_url: settings.site_url.trim_end_matches('/').to_string(),
            transport: Arc::new(DualTransport::new(credentials)),
        }
    }

    /// Construct with an explicit transport.
    pub fn with_transport(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{path}", self.base_url)
    }

    /// Validate the configured credentials against `users/me`.
    pub async fn test_connection(&self) -> Result<User, PublishError> {
        let value = self
            .transport
            .execute(ApiRequest::get(self.endpoint("users/me")))
            .await
            .map_err(PublishError::ConnectionTest)?;
        Ok(serde_json::from_value(value)?)
    }

    /// List site categories. Never fails: any error degrades to an empty
    /// list so the draft form stays usable.
    pub async fn categories(&self) -> Vec<Category> {
        let request = ApiRequest::get(self.endpoint("categories")).query("per_page", "100");
        match self.transport.execute(request).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                log::warn!("unexpected categories payload: {err}");
                Vec::new()
            }),
            Err(err) => {
                log::warn!("failed to fetch categories: {err}");
                Vec::new()
            }
        }
    }

    /// Resolve tag names to ids, creating missing tags. A tag that cannot
    /// be resolved is logged and omitted; the server stays the source of
    /// truth for tag identity.
    pub async fn resolve_tags(&self, names: &[String]) -> Vec<u64> {
        let mut ids = Vec::new();
        for name in names {
            match self.resolve_tag(name).await {
                Ok(id) => ids.push(id),
                Err(err) => log::warn!("failed to resolve tag {name:?}: {err}"),
            }
        }
        ids
    }

    async fn resolve_tag(&self, name: &str) -> Result<u64, PublishError> {
        let request = ApiRequest::get(self.endpoint("tags")).query("search", name);
        let value = self
            .transport
            .execute(request)
            .await
            .map_err(PublishError::TagResolution)?;
        let existing: Vec<TagTerm> = serde_json::from_value(value)?;

        if let Some(tag) = existing.into_iter().find(|tag| tag.name == name) {
            return Ok(tag.id);
        }

        let body = serde_json::json!({ "name": name, "slug": slugify(name) });
        let value = self
            .transport
            .execute(ApiRequest::post_json(self.endpoint("tags"), body))
            .await
            .map_err(PublishError::TagResolution)?;
        let created: TagTerm = serde_json::from_value(value)?;
        log::debug!("created tag {name:?} as id {}", created.id);
        Ok(created.id)
    }

    /// Multipart upload of the photo. Fatal when both transports fail.
    pub async fn upload_media(&self, photo: &PhotoFile) -> Result<Media, PublishError> {
        if photo.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(PublishError::MediaTooLarge(photo.bytes.len()));
        }

        let request = ApiRequest::post_multipart(
            self.endpoint("media"),
            photo.file_name.clone(),
            photo.mime_type.clone(),
            photo.bytes.clone(),
        );
        let value = self
            .transport
            .execute(request)
            .await
            .map_err(PublishError::MediaUpload)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Create the post.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, PublishError> {
        let request = ApiRequest::post_json(self.endpoint("posts"), post)
            .timeout(Duration::from_secs(30));
        let value = self
            .transport
            .execute(request)
            .await
            .map_err(PublishError::PostCreation)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Most recent posts, newest first. Errors on total failure — the
    /// history view has no meaningful empty state to degrade to.
    pub async fn recent_posts(&self, limit: u32) -> Result<Vec<Post>, PublishError> {
        let request = ApiRequest::get(self.endpoint("posts"))
            .query("per_page", limit.to_string())
            .query("orderby", "date")
            .query("order", "desc");
        let value = self
            .transport
            .execute(request)
            .await
            .map_err(PublishError::PostListing)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Slug for a new tag: lowercased, whitespace runs collapsed to hyphens.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
