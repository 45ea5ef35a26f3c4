//! HTTP implementation of [`ResourceApi`].
//!
//! The client speaks a small JSON REST shape whose paths and field names come
//! from [`ApiConfig`], so it can front most services that expose a resource
//! with a status field and a tag sub-resource.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode, Url};
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::config::ApiConfig;
use crate::error::{ApiError, ConfigError, ConvergeError, Result};
use crate::tags::TagSet;

use super::types::{lookup_field, ResourceView};
use super::ResourceApi;

/// Placeholder replaced by the resource id in configured paths.
const ID_PLACEHOLDER: &str = "{id}";

/// JSON REST client for remote resources.
#[derive(Debug, Clone)]
pub struct HttpResourceClient {
    /// HTTP client.
    client: Client,
    /// Endpoint settings.
    config: ApiConfig,
    /// Parsed `config.base_url`.
    base: Url,
    /// Bearer token.
    token: Option<String>,
}

impl HttpResourceClient {
    /// Creates a client from API settings, reading the token from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token variable is missing or the HTTP client
    /// cannot be created.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let token = config.token()?;
        Self::new(config.clone(), token)
    }

    /// Creates a client with an explicit token.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path or the HTTP
    /// client cannot be created.
    pub fn new(config: ApiConfig, token: Option<String>) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::validation(format!("Invalid URL '{}': {e}", config.base_url), "api.base_url")
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::validation(
                format!("URL '{}' cannot carry a path", config.base_url),
                "api.base_url",
            )
            .into());
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            base,
            token,
        })
    }

    /// URL of a single resource.
    #[must_use]
    pub fn resource_url(&self, id: &str) -> String {
        self.url(&self.config.resource_path, id)
    }

    /// URL of a resource's tags.
    #[must_use]
    pub fn tags_url(&self, id: &str) -> String {
        self.url(&self.config.tags_path, id)
    }

    /// Appends `path` to the base URL, percent-encoding each segment so an
    /// id containing `/`, `?` or `#` stays a single segment.
    fn url(&self, path: &str, id: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&segment.replace(ID_PLACEHOLDER, id));
            }
        }
        url.into()
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")).into())
    }

    async fn json_body(response: Response) -> Result<serde_json::Value> {
        response
            .json()
            .await
            .map_err(|e| ApiError::invalid_response(format!("Failed to parse response: {e}")).into())
    }
}

/// Maps an unsuccessful response to an API error.
async fn status_error(response: Response, resource_id: &str) -> ConvergeError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|value| {
                let parsed = parse_retry_after(value, Utc::now());
                if parsed.is_none() {
                    debug!("Ignoring unreadable Retry-After header: {value}");
                }
                parsed
            })
            .unwrap_or_default();
        return ApiError::RateLimited { retry_after_secs }.into();
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ApiError::AuthenticationFailed {
            message: format!("{status} for resource {resource_id}"),
        }
        .into();
    }

    if status == StatusCode::NOT_FOUND {
        return ApiError::ResourceNotFound {
            resource_id: resource_id.to_string(),
        }
        .into();
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return ApiError::ServiceUnavailable {
            status: status.as_u16(),
            message: body,
        }
        .into();
    }

    ApiError::api_error(status.as_u16(), body).into()
}

/// Reads a `Retry-After` value given either as seconds or as an HTTP date.
///
/// A date in the past yields zero.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse() {
        return Some(secs);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let secs = at.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(u64::try_from(secs).unwrap_or(0))
}

/// Reads a tag map out of a tags body.
fn parse_tags(body: &serde_json::Value, field: &str) -> Result<TagSet> {
    let Some(value) = lookup_field(body, field) else {
        return Err(ApiError::invalid_response(format!("missing tags field '{field}'")).into());
    };
    if value.is_null() {
        return Ok(TagSet::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::invalid_response(format!("tags are not a string map: {e}")).into())
}

/// Wraps a tag map under a dotted field for a request body.
fn tags_payload(tags: &TagSet, field: &str) -> Result<serde_json::Value> {
    let encoded = serde_json::to_value(tags)
        .map_err(|e| ConvergeError::internal(format!("Failed to encode tags: {e}")))?;

    Ok(field.rsplit('.').filter(|s| !s.is_empty()).fold(encoded, |inner, segment| {
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(segment.to_string(), inner);
        serde_json::Value::Object(wrapper)
    }))
}

#[async_trait]
impl ResourceApi for HttpResourceClient {
    async fn get_resource(&self, id: &str) -> Result<Option<ResourceView>> {
        let url = self.resource_url(id);
        trace!("GET {url}");

        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Resource {id} not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }

        let body = Self::json_body(response).await?;
        let field = &self.config.status_field;
        let raw = match lookup_field(&body, field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) => String::new(),
            Some(other) => {
                return Err(ApiError::invalid_response(format!(
                    "status field '{field}' is not a string: {other}"
                ))
                .into());
            }
            None => {
                return Err(
                    ApiError::invalid_response(format!("missing status field '{field}'")).into(),
                );
            }
        };

        Ok(Some(ResourceView::new(id, &raw, body)))
    }

    async fn list_tags(&self, id: &str) -> Result<TagSet> {
        let url = self.tags_url(id);
        trace!("GET {url}");

        let response = self.send(self.client.get(&url)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }

        let body = Self::json_body(response).await?;
        parse_tags(&body, &self.config.tags_field)
    }

    async fn add_tags(&self, id: &str, tags: &TagSet) -> Result<()> {
        let url = self.tags_url(id);
        trace!("POST {url}");

        let payload = tags_payload(tags, &self.config.tags_field)?;

        let response = self.send(self.client.post(&url).json(&payload)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }
        Ok(())
    }

    async fn remove_tags(&self, id: &str, keys: &BTreeSet<String>) -> Result<()> {
        let url = self.tags_url(id);
        trace!("DELETE {url}");

        let query: Vec<(&str, &str)> = keys
            .iter()
            .map(|key| (self.config.tag_keys_param.as_str(), key.as_str()))
            .collect();

        let response = self.send(self.client.delete(&url).query(&query)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, id).await);
        }
        Ok(())
    }
}
