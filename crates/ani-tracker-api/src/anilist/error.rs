use thiserror::Error;

/// Errors from the AniList API client.
#[derive(Debug, Error)]
pub enum AniListError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("no access token configured; run `ani-tracker get-token` first")]
    MissingToken,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQL(String),

    #[error("unexpected {operation} response: {body}")]
    UnexpectedShape { operation: String, body: String },

    #[error("parse error: {0}")]
    Parse(String),
}
