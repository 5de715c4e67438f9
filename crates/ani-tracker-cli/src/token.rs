//! `get-token`: authorize in the browser, paste the redirect URL back.

use std::io::{self, BufRead, Write};
use std::path::Path;

use ani_tracker_api::anilist::auth::extract_code;
use ani_tracker_api::anilist::{AniListError, AuthorizationFlow};
use ani_tracker_core::config::AniListConfig;
use ani_tracker_core::{CoreError, Credentials};

const DEFAULT_REDIRECT: &str = "http://localhost";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("ID and SECRET must be set in {0}")]
    MissingClient(String),
    #[error(transparent)]
    AniList(#[from] AniListError),
    #[error("failed to save token: {0}")]
    Save(#[from] CoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TokenError {
    /// Whether the failure is a setup problem rather than a failed attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingClient(_))
    }
}

/// Run the authorization flow and store the new token in `credentials_path`.
pub async fn get_token<R: BufRead, W: Write>(
    config: &AniListConfig,
    mut credentials: Credentials,
    credentials_path: &Path,
    input: &mut R,
    out: &mut W,
) -> Result<String, TokenError> {
    let path_display = credentials_path.display().to_string();
    let (Some(client_id), Some(client_secret)) =
        (credentials.client_id(), credentials.client_secret())
    else {
        return Err(TokenError::MissingClient(path_display));
    };
    let redirect = credentials.redirect_uri().unwrap_or(DEFAULT_REDIRECT);
    let flow = AuthorizationFlow::new(config, client_id, client_secret, redirect);

    let url = match flow.open_browser() {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "Could not open browser");
            flow.authorization_url()?
        }
    };
    writeln!(out, "Authorize the app at:\n{url}\n")?;
    writeln!(out, "Paste the URL you were redirected to:")?;
    write!(out, "> ")?;
    out.flush()?;

    let mut pasted = String::new();
    input.read_line(&mut pasted)?;
    let code = extract_code(&pasted)?;

    let token = flow.exchange_code(&code).await?;
    writeln!(out, "Access Token: {}", token.access_token)?;

    credentials.access_token = token.access_token.clone();
    credentials.save(credentials_path)?;
    writeln!(out, "Saved to {path_display}")?;
    tracing::info!("Access token stored");

    Ok(token.access_token)
}
