//! REST collaborator
//!
//! The workspace talks to the server only through [`ApplicationsApi`]. Responses are returned
//! as raw JSON documents; normalizing them is the workspace's job so that a bad document is
//! reported the same way whichever implementation produced it.

use crate::config::ApiConfig;
use crate::error::{ApiError, DEFAULT_SERVER_MESSAGE};
use crate::meta::WireMeta;
use appdesk_row::{FieldPatch, ServerId};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Body of `GET /applications`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    /// Application documents, in server order
    #[serde(default)]
    pub items: Vec<Value>,
    /// Catalogue and access metadata
    #[serde(default)]
    pub meta: WireMeta,
}

/// Operations the workspace needs from the server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationsApi: Send + Sync {
    /// `GET /applications`
    async fn fetch_applications(&self) -> Result<ListResponse, ApiError>;

    /// `GET /applications/:id`
    async fn fetch_application(&self, id: &ServerId) -> Result<Value, ApiError>;

    /// `POST /applications`
    async fn create_application(&self, patch: &FieldPatch) -> Result<Value, ApiError>;

    /// `PATCH /applications/:id`
    async fn update_application(
        &self,
        id: &ServerId,
        patch: &FieldPatch,
    ) -> Result<Value, ApiError>;
}

/// [`ApplicationsApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpApplicationsApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApplicationsApi {
    /// Build a client from configuration
    ///
    /// # Errors
    /// [`ApiError::Transport`] if the HTTP client cannot be constructed
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Replace the bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL requests are sent to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("server rejected the session token");
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| DEFAULT_SERVER_MESSAGE.to_string());
            return Err(ApiError::status(status.as_u16(), message));
        }

        let body: Value = response.json().await?;
        if let Some(message) = error_message(&body) {
            return Err(ApiError::status(status.as_u16(), message));
        }
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// The `error` field of a response body, if it is a non-empty string
fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ApplicationsApi for HttpApplicationsApi {
    async fn fetch_applications(&self) -> Result<ListResponse, ApiError> {
        self.send(self.request(Method::GET, "/applications")).await
    }

    async fn fetch_application(&self, id: &ServerId) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, &format!("/applications/{id}")))
            .await
    }

    async fn create_application(&self, patch: &FieldPatch) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, "/applications").json(patch))
            .await
    }

    async fn update_application(
        &self,
        id: &ServerId,
        patch: &FieldPatch,
    ) -> Result<Value, ApiError> {
        self.send(
            self.request(Method::PATCH, &format!("/applications/{id}"))
                .json(patch),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_reads_error_field() {
        assert_eq!(
            error_message(&json!({"error": "Not the assigned checker"})).as_deref(),
            Some("Not the assigned checker")
        );
        assert!(error_message(&json!({"error": ""})).is_none());
        assert!(error_message(&json!({"_id": "a1"})).is_none());
    }

    #[test]
    fn base_url_is_trimmed() {
        let api = HttpApplicationsApi::new(&ApiConfig {
            base_url: "http://ops.test/api/".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(api.base_url(), "http://ops.test/api");
    }

    #[test]
    fn list_response_tolerates_missing_parts() {
        let list: ListResponse = serde_json::from_value(json!({"items": [{"_id": "a1"}]})).unwrap();
        assert_eq!(list.items.len(), 1);
        assert!(list.meta.access.is_none());
    }
}
