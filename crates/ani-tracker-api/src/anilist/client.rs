use std::time::Duration;

use ani_tracker_core::config::AniListConfig;
use ani_tracker_core::Credentials;
use reqwest::Client;

use super::error::AniListError;
use super::types::{GraphQLResponse, MediaLookupResponse, SaveEntryResponse};
use crate::traits::{MediaRecord, ProgressUpdate, SavedEntry, TrackerService};

const API_URL: &str = "https://graphql.anilist.co";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LOOKUP_QUERY: &str = r#"
query ($search: String) {
    Media(search: $search, type: ANIME) {
        id
        episodes
    }
}
"#;

const SAVE_PROGRESS_MUTATION: &str = r#"
mutation ($mediaId: Int, $progress: Int) {
    SaveMediaListEntry(mediaId: $mediaId, progress: $progress) {
        id
        progress
        status
    }
}
"#;

const SAVE_COMPLETED_MUTATION: &str = r#"
mutation ($mediaId: Int, $progress: Int, $score: Int, $status: MediaListStatus) {
    SaveMediaListEntry(mediaId: $mediaId, progress: $progress, scoreRaw: $score, status: $status) {
        id
        progress
        score(format: POINT_10)
        status
    }
}
"#;

/// AniList GraphQL API client.
///
/// Lookups are anonymous; mutations need an access token and fail without
/// touching the network when none is configured.
pub struct AniListClient {
    access_token: Option<String>,
    api_url: String,
    timeout: Duration,
    http: Client,
}

impl AniListClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            api_url: API_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &AniListConfig, credentials: &Credentials) -> Self {
        Self::new(credentials.bearer_token().map(str::to_string))
            .with_api_url(&config.api_url)
            .with_timeout(config.request_timeout())
    }

    /// Point the client at a different GraphQL endpoint.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// Limit on each request, from connect to the end of the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
        authenticated: bool,
    ) -> Result<T, AniListError> {
        tracing::debug!(operation, authenticated, "AniList GraphQL request");

        let mut request = self
            .http
            .post(&self.api_url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if authenticated {
            let token = self.access_token.as_deref().ok_or(AniListError::MissingToken)?;
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let resp = request
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let status_code = status.as_u16();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(AniListError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "AniList response received");
        let parsed: GraphQLResponse<T> =
            serde_json::from_str(&body).map_err(|_| AniListError::UnexpectedShape {
                operation: operation.to_string(),
                body: body.clone(),
            })?;

        match parsed.data {
            Some(data) => Ok(data),
            None if !parsed.errors.is_empty() => Err(AniListError::GraphQL(
                parsed
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
            None => Err(AniListError::UnexpectedShape {
                operation: operation.to_string(),
                body,
            }),
        }
    }

    /// Find the anime matching `search` and return its id and episode count.
    pub async fn lookup(&self, search: &str) -> Result<MediaRecord, AniListError> {
        let resp: MediaLookupResponse = self
            .graphql_request(
                "Lookup",
                LOOKUP_QUERY,
                serde_json::json!({ "search": search }),
                false,
            )
            .await?;
        Ok(resp.media.into())
    }

    /// Send a `SaveMediaListEntry` mutation for `update`.
    pub async fn save_media_list_entry(
        &self,
        update: &ProgressUpdate,
    ) -> Result<SavedEntry, AniListError> {
        let (operation, query, variables) = match *update {
            ProgressUpdate::Progress { media_id, progress } => (
                "SaveProgress",
                SAVE_PROGRESS_MUTATION,
                serde_json::json!({ "mediaId": media_id, "progress": progress }),
            ),
            ProgressUpdate::Completed {
                media_id,
                progress,
                score,
            } => (
                "SaveCompleted",
                SAVE_COMPLETED_MUTATION,
                serde_json::json!({
                    "mediaId": media_id,
                    "progress": progress,
                    // POINT_100 raw score, independent of the user's scoring format.
                    "score": (score * 10.0).round() as u32,
                    "status": "COMPLETED",
                }),
            ),
        };

        let resp: SaveEntryResponse = self
            .graphql_request(operation, query, variables, true)
            .await?;
        Ok(resp.entry.into())
    }
}

impl TrackerService for AniListClient {
    type Error = AniListError;

    async fn lookup_media(&self, title: &str) -> Result<MediaRecord, AniListError> {
        self.lookup(title).await
    }

    async fn save_progress(&self, update: &ProgressUpdate) -> Result<SavedEntry, AniListError> {
        self.save_media_list_entry(update).await
    }
}
