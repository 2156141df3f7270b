//! REST implementation of [`RemoteActions`].
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so the async
//! runtime is never blocked. Action endpoints answer with partial payloads
//! (`{"liked": true}`), so post actions read the canonical post back with
//! `GET /api/posts/{id}` once the action has been accepted.

use std::time::Duration;

use async_trait::async_trait;
use clipsync_core::{Comment, CoreError, Post, RemoteSettings};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::RemoteError;
use crate::remote::{LikeState, ReclipOutcome, RemoteActions};

/// Remote actions against the clips REST API.
///
/// - `base_url` is the API origin; paths are appended to it verbatim
/// - `auth_token`, when set, is sent as `Authorization: Bearer <token>`
/// - `timeout` bounds each request end to end
#[derive(Debug, Clone)]
pub struct HttpRemoteActions {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpRemoteActions {
    pub fn new(base_url: &str) -> Self {
        HttpRemoteActions {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            timeout: Duration::from_millis(10_000),
        }
    }

    /// Build from the `[remote]` config section. The token falls back to
    /// `CLIPSYNC_AUTH_TOKEN`.
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, CoreError> {
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CoreError::Config {
                path: "[remote]".to_string(),
                reason: "base_url is not set".to_string(),
            })?;
        let mut remote = Self::new(base_url).with_timeout(Duration::from_millis(settings.timeout_ms));
        remote.auth_token = settings.resolved_auth_token();
        Ok(remote)
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/api/posts/P1/like`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T>(&self, method: Method, path: String, body: Option<Value>) -> Result<T, RemoteError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(&path);
        let auth_token = self.auth_token.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .http_status_as_error(false)
                .build()
                .into();
            let bearer = auth_token.map(|token| format!("Bearer {token}"));

            let response = match method {
                Method::Get => {
                    let mut request = agent.get(&url).header("Accept", "application/json");
                    if let Some(ref bearer) = bearer {
                        request = request.header("Authorization", bearer);
                    }
                    request.call()
                }
                Method::Post => {
                    let mut request = agent.post(&url).header("Accept", "application/json");
                    if let Some(ref bearer) = bearer {
                        request = request.header("Authorization", bearer);
                    }
                    match body {
                        Some(body) => request.send_json(&body),
                        None => request.send_empty(),
                    }
                }
            }
            .map_err(|e| RemoteError::Network {
                reason: format!("{url}: {e}"),
            })?;

            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                let message = response
                    .into_body()
                    .read_to_string()
                    .map(|text| error_message(&text))
                    .unwrap_or_default();
                return Err(RemoteError::Rejected { status, message });
            }

            response
                .into_body()
                .read_json::<T>()
                .map_err(|e| RemoteError::InvalidResponse {
                    reason: format!("{url}: {e}"),
                })
        })
        .await
        .map_err(|e| RemoteError::Network {
            reason: format!("task join error: {e}"),
        })?
    }

    async fn post_action(&self, path: String, body: Option<Value>) -> Result<Value, RemoteError> {
        self.call(Method::Post, path, body).await
    }

    async fn fetch_post(&self, post_id: &str) -> Result<Post, RemoteError> {
        self.call(Method::Get, format!("/api/posts/{post_id}"), None).await
    }

    async fn post_then_fetch(&self, post_id: &str, action: &str) -> Result<Post, RemoteError> {
        self.post_action(format!("/api/posts/{post_id}/{action}"), None)
            .await?;
        self.fetch_post(post_id).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
}

/// Pull a readable message out of an error body such as
/// `{"error": "Cannot reclip your own post"}`.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl RemoteActions for HttpRemoteActions {
    async fn toggle_like(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.post_then_fetch(post_id, "like").await
    }

    async fn toggle_bookmark(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.post_then_fetch(post_id, "bookmark").await
    }

    async fn toggle_follow(
        &self,
        _user_id: &str,
        post_id: &str,
        author_handle: &str,
    ) -> Result<Post, RemoteError> {
        self.post_action(format!("/api/users/{author_handle}/follow"), None)
            .await?;
        self.fetch_post(post_id).await
    }

    async fn reclip(
        &self,
        _user_id: &str,
        post_id: &str,
        _user_handle: &str,
    ) -> Result<ReclipOutcome, RemoteError> {
        let created = self
            .post_action(format!("/api/posts/{post_id}/reclip"), None)
            .await?;
        let original_post = self.fetch_post(post_id).await?;
        let reclipped_post = serde_json::from_value::<Post>(created)
            .ok()
            .filter(|p| p.id != original_post.id);
        Ok(ReclipOutcome {
            original_post,
            reclipped_post,
        })
    }

    async fn add_comment(
        &self,
        _user_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        self.call(
            Method::Post,
            format!("/api/comments/post/{post_id}"),
            Some(json!({ "text": text })),
        )
        .await
    }

    async fn add_reply(
        &self,
        _user_id: &str,
        _post_id: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        self.call(
            Method::Post,
            format!("/api/comments/reply/{parent_id}"),
            Some(json!({ "text": text })),
        )
        .await
    }

    async fn toggle_comment_like(
        &self,
        _user_id: &str,
        comment_id: &str,
    ) -> Result<LikeState, RemoteError> {
        self.call(Method::Post, format!("/api/comments/{comment_id}/like"), None)
            .await
    }

    async fn toggle_reply_like(
        &self,
        _user_id: &str,
        _parent_id: &str,
        reply_id: &str,
    ) -> Result<LikeState, RemoteError> {
        self.call(Method::Post, format!("/api/comments/{reply_id}/like"), None)
            .await
    }

    async fn track_view(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.post_then_fetch(post_id, "view").await
    }

    async fn track_share(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.post_then_fetch(post_id, "share").await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let remote = HttpRemoteActions::new("https://api.example.com/");
        assert_eq!(
            remote.endpoint("/api/posts/P1/like"),
            "https://api.example.com/api/posts/P1/like"
        );
    }

    #[test]
    fn from_settings_requires_base_url() {
        let err = HttpRemoteActions::from_settings(&RemoteSettings::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn from_settings_prefers_configured_token() {
        let settings = RemoteSettings {
            base_url: Some("http://localhost:8000".into()),
            auth_token: Some("secret".into()),
            timeout_ms: 250,
        };
        let remote = HttpRemoteActions::from_settings(&settings).unwrap();
        assert_eq!(remote.auth_token.as_deref(), Some("secret"));
        assert_eq!(remote.timeout, Duration::from_millis(250));
    }

    #[test]
    fn error_message_reads_laravel_error_body() {
        assert_eq!(
            error_message(r#"{"error":"Cannot reclip your own post"}"#),
            "Cannot reclip your own post"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let remote = HttpRemoteActions::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let err = remote.toggle_like("u1", "P1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Network { .. }), "{err:?}");
    }
}
