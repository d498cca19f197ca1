//! Async REST client for the streaming service and the token exchange backend.

use std::time::Duration;

use dvxr_common::config::{AppConfig, AuthConfig, AuthMethod};
use dvxr_common::error::{DvError, DvResult};
use dvxr_common::models::{AccessToken, ComputerDescriptor};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::types::{ConnectRequest, ConnectResponse, RoomOptions, TokenResponse};

/// Async client for every HTTP call the orchestrator makes.
///
/// Cheap to clone; clones share the connection pool.
///
/// ```rust,no_run
/// use dvxr_api::ServiceClient;
/// use dvxr_common::config::AppConfig;
///
/// # async fn run() -> dvxr_common::DvResult<()> {
/// let client = ServiceClient::from_config(&AppConfig::default())?;
/// let token = client.exchange_code("abc").await?;
/// let computers = client.list_computers(&token).await?;
/// println!("{computers:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    service_url: Url,
    backend_url: Url,
}

impl ServiceClient {
    pub fn new(service_url: &str, backend_url: &str, timeout: Duration) -> DvResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut h = reqwest::header::HeaderMap::new();
                h.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                h
            })
            .build()
            .map_err(DvError::Http)?;

        Ok(Self {
            client,
            service_url: Url::parse(service_url.trim_end_matches('/'))?,
            backend_url: Url::parse(backend_url.trim_end_matches('/'))?,
        })
    }

    pub fn from_config(config: &AppConfig) -> DvResult<Self> {
        Self::new(
            &config.service.base_url,
            &config.service.auth_backend_url,
            Duration::from_secs(config.connection.http_timeout_secs),
        )
    }

    // ── Internal ──────────────────────────────────────────────────────────────

    /// `base` with `segments` appended as individually escaped path segments.
    fn endpoint(base: &Url, segments: &[&str]) -> DvResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| DvError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> DvResult<T> {
        tracing::debug!(%method, path = url.path(), "Service request");
        let mut req = self.client.request(method, url);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(|e| e.as_str())
                        .map(str::to_owned)
                })
                .unwrap_or_else(|| status.to_string());
            return Err(DvError::Api { status: status.as_u16(), message: msg });
        }
        Ok(resp.json::<T>().await?)
    }

    // ── Authorization ─────────────────────────────────────────────────────────

    /// Login page URL for one authorization attempt.
    ///
    /// `redirect_uri` is where the provider sends the user back; it is tagged
    /// with `oauth=<provider_tag>` so the resumed page knows why it was loaded.
    pub fn authorization_url(&self, auth: &AuthConfig, redirect_uri: &Url) -> DvResult<Url> {
        let mut redirect = redirect_uri.clone();
        redirect
            .query_pairs_mut()
            .append_pair("oauth", &auth.provider_tag);

        let mut url = Self::endpoint(&self.service_url, &["login", ""])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &auth.client_id)
                .append_pair("scope", &auth.scopes.join(","))
                .append_pair("redirect_uri", redirect.as_str());
            if auth.method == AuthMethod::Popup {
                query.append_pair("redirect_type", "popup");
            }
            query.append_pair("selectComputer", if auth.select_computer { "true" } else { "false" });
        }
        Ok(url)
    }

    /// Trade an authorization code for an access token via the first-party backend.
    pub async fn exchange_code(&self, code: &str) -> DvResult<AccessToken> {
        let mut url = Self::endpoint(&self.backend_url, &["desktop-vision-auth"])?;
        url.query_pairs_mut().append_pair("code", code);
        let resp: TokenResponse = self.request(Method::GET, url, None).await?;
        Ok(resp.token)
    }

    // ── Directory ─────────────────────────────────────────────────────────────

    /// Computers visible to the token's subject, in server order.
    pub async fn list_computers(&self, token: &AccessToken) -> DvResult<Vec<ComputerDescriptor>> {
        let mut url =
            Self::endpoint(&self.service_url, &["api", "users", &token.uid, "computers"])?;
        url.query_pairs_mut()
            .append_pair("access_token", &token.access_token);
        self.request(Method::GET, url, None).await
    }

    // ── Connect ───────────────────────────────────────────────────────────────

    /// Ask the service for transport parameters for `channel_name`.
    pub async fn request_room_options(
        &self,
        token: &AccessToken,
        channel_name: &str,
    ) -> DvResult<RoomOptions> {
        let mut url = Self::endpoint(&self.service_url, &["api", "connect"])?;
        url.query_pairs_mut()
            .append_pair("access_token", &token.access_token);
        let body = serde_json::to_value(ConnectRequest { channel_name })?;
        let resp: ConnectResponse = self.request(Method::POST, url, Some(&body)).await?;
        Ok(resp.room_options)
    }
}
