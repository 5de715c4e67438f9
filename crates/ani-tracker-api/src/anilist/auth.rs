//! OAuth2 Authorization Code Grant for AniList, with a pasted-back redirect.
//!
//! 1. Open the browser to the AniList consent page.
//! 2. The user pastes the URL they were redirected to (it carries `?code=...`).
//! 3. Exchange the code for an access token.

use std::time::Duration;

use ani_tracker_core::config::AniListConfig;
use serde::Deserialize;
use url::Url;

use super::error::AniListError;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

/// Client settings for one authorization attempt.
#[derive(Debug, Clone)]
pub struct AuthorizationFlow {
    authorize_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    timeout: Duration,
}

impl AuthorizationFlow {
    pub fn new(
        config: &AniListConfig,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Self {
        Self {
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            timeout: config.request_timeout(),
        }
    }

    /// The consent page URL.
    pub fn authorization_url(&self) -> Result<Url, AniListError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| AniListError::Auth(format!("invalid authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code");
        Ok(url)
    }

    /// Open the consent page in the default browser.
    pub fn open_browser(&self) -> Result<Url, AniListError> {
        let url = self.authorization_url()?;
        tracing::info!("Opening AniList authorization URL in browser");
        open::that(url.as_str())
            .map_err(|e| AniListError::Auth(format!("failed to open browser: {e}")))?;
        Ok(url)
    }

    /// Exchange the authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AniListError> {
        let http = reqwest::Client::new();
        let resp = http
            .post(&self.token_url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "grant_type": "authorization_code",
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "redirect_uri": self.redirect_uri,
                "code": code,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AniListError::Api {
                status,
                message: body,
            });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| AniListError::Parse(e.to_string()))
    }
}

/// Pull the `code` parameter out of the pasted redirect URL.
///
/// Accepts a full URL or any text containing `code=...`.
pub fn extract_code(pasted: &str) -> Result<String, AniListError> {
    let pasted = pasted.trim();

    if let Ok(url) = Url::parse(pasted) {
        if let Some((_, code)) = url.query_pairs().find(|(k, _)| k == "code") {
            if !code.is_empty() {
                return Ok(code.into_owned());
            }
        }
    }

    pasted
        .split_once("code=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or_default())
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AniListError::Auth("no code found in URL".into()))
}
