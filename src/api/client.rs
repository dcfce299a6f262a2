use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

use super::{encode_path, Backend, IndexAction, Listing, LoginStatus};
use crate::error::ApiError;

/// Cookie the server uses for its session token.
pub const TOKEN_COOKIE: &str = "MIMSRV_TOKEN";

/// HTTP implementation of [`Backend`].
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a client for `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let cookie = HeaderValue::from_str(&format!("{}={}", TOKEN_COOKIE, token))
                .map_err(|e| ApiError::Transport(format!("bad token: {}", e)))?;
            headers.insert(COOKIE, cookie);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/api/list/foo`.
    pub fn url(&self, api_path: &str) -> String {
        format!("{}{}", self.base_url, api_path)
    }

    fn list_url(&self, dir: &str) -> String {
        if dir.is_empty() {
            self.url("/api/list/")
        } else {
            self.url(&format!("/api/list{}", encode_path(dir)))
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), &body))
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list(&self, dir: &str) -> Result<Listing, ApiError> {
        let url = self.list_url(dir);
        tracing::debug!(%url, "listing");
        let resp = self.client.get(&url).send().await.map_err(transport)?;
        Self::check(resp)
            .await?
            .json::<Listing>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn put_text(&self, text_path: &str, content: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/text{}", encode_path(text_path)));
        let body = serde_json::json!({ "Content": content });
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp).await.map(|_| ())
    }

    async fn update_index(
        &self,
        index_file: &str,
        item: &str,
        action: IndexAction,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/index{}", encode_path(index_file)));
        let form = [
            ("item", item),
            ("action", action.action()),
            ("value", action.value()),
            ("autocreate", "true"),
        ];
        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp).await.map(|_| ())
    }

    async fn login_status(&self) -> Result<bool, ApiError> {
        let resp = self
            .client
            .get(self.url("/auth/status/"))
            .send()
            .await
            .map_err(transport)?;
        let status = Self::check(resp)
            .await?
            .json::<LoginStatus>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(status.logged_in)
    }

    async fn warm_image(&self, url: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .get(self.url(url))
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp).await?.bytes().await.map_err(transport)?;
        Ok(())
    }
}
