use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ApiError;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
    session::AuthController,
    settings::{ClientSettings, UnauthorizedPolicy},
};

#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("not authorized: {}", .0.message)]
    Unauthorized(ApiError),
    #[error("not found: {}", .0.message)]
    NotFound(ApiError),
    #[error("request rejected: {}", .0.message)]
    Server(ApiError),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid endpoint url: {0}")]
    Endpoint(String),
    #[error("no signed-in vendor")]
    NoSession,
}

impl ApiFailure {
    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            Self::Unauthorized(_) | Self::NoSession => {
                "Access token required. Please sign in again.".to_string()
            }
            Self::NotFound(err) | Self::Server(err) => err.message.clone(),
            Self::Decode(_) | Self::Endpoint(_) => {
                "Unexpected response from the server.".to_string()
            }
        }
    }
}

/// HTTP plumbing shared by every endpoint: base URL, bearer header and the
/// 401 policy.
#[derive(Clone)]
pub struct ApiTransport {
    http: Client,
    base_url: Url,
    auth: Arc<AuthController>,
    policy: UnauthorizedPolicy,
}

impl ApiTransport {
    pub fn new(settings: &ClientSettings, auth: Arc<AuthController>) -> Result<Self, ApiFailure> {
        let base_url = Url::parse(&settings.api_base_url)
            .map_err(|err| ApiFailure::Endpoint(format!("{}: {err}", settings.api_base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiFailure::Endpoint(settings.api_base_url.clone()));
        }
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url,
            auth,
            policy: settings.unauthorized_policy,
        })
    }

    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiFailure> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiFailure::Endpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(String, String)],
    ) -> Result<T, ApiFailure> {
        let url = self.endpoint(segments)?;
        let request = self.http.get(url).query(query);
        self.execute(request, true).await
    }

    pub async fn send<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<&B>,
    ) -> Result<T, ApiFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, true).await
    }

    /// Unauthenticated POST, used by sign-in.
    pub async fn post_public<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let request = self.http.post(url).json(body);
        self.execute(request, false).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        mut request: RequestBuilder,
        authenticated: bool,
    ) -> Result<T, ApiFailure> {
        if authenticated {
            if let Some(token) = self.live_token().await {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "api request failed");
            ApiFailure::Transport(err)
        })?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;
        debug!(%url, status = status.as_u16(), "api response");

        if status.is_success() {
            return decode_body(&body);
        }

        let err = ApiError::from_response(status.as_u16(), &body);
        match status {
            StatusCode::UNAUTHORIZED => {
                self.apply_unauthorized_policy(authenticated).await;
                Err(ApiFailure::Unauthorized(err))
            }
            StatusCode::NOT_FOUND => Err(ApiFailure::NotFound(err)),
            _ => Err(ApiFailure::Server(err)),
        }
    }

    async fn live_token(&self) -> Option<String> {
        self.auth.bearer_token().await?;
        if !self.auth.check_expiry().await {
            return None;
        }
        self.auth.bearer_token().await
    }

    async fn apply_unauthorized_policy(&self, authenticated: bool) {
        if !authenticated {
            return;
        }
        match self.policy {
            UnauthorizedPolicy::Ignore => {}
            UnauthorizedPolicy::Demote => self.auth.demote().await,
            UnauthorizedPolicy::SignOut => self.auth.expire().await,
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiFailure> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|err| ApiFailure::Decode(err.to_string()))
}
