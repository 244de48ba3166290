//! OAuth 2.0 token handling for the Google Sheets API.
//!
//! Built on `yup-oauth2`'s installed-app flow: the consent flow opens a
//! browser to Google's authorization page with a redirect back to a
//! short-lived local listener, and the token store persisted to disk handles
//! silent refreshes afterward.

use crate::api::OAUTH_SCOPES;
use crate::Result;
use anyhow::{ensure, Context};
use std::path::Path;
use tracing::info;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

const CALLBACK_PORT: u16 = 3030;

/// Wraps an authenticator holding the OAuth client credentials and the
/// persisted token store, producing valid access tokens on demand.
pub(crate) struct TokenProvider {
    auth: DefaultAuthenticator,
}

impl TokenProvider {
    /// Loads credentials and the previously-persisted token store. Fails up
    /// front when `token.json` does not exist so a non-interactive run cannot
    /// fall into the consent flow.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Result<Self> {
        ensure!(
            token_path.is_file(),
            "No token store at {}, run 'opsync auth' to authorize",
            token_path.display()
        );
        let auth = build_authenticator(secret_path, token_path).await?;
        Ok(Self { auth })
    }

    /// Runs the consent flow and persists the resulting tokens.
    pub(crate) async fn authorize(secret_path: &Path, token_path: &Path) -> Result<()> {
        let auth = build_authenticator(secret_path, token_path).await?;
        info!("A browser window should open; waiting for the OAuth callback on localhost:{CALLBACK_PORT}");
        auth.token(OAUTH_SCOPES)
            .await
            .context("The OAuth consent flow did not produce a token")?;
        info!("Authorization successful, tokens saved to {}", token_path.display());
        Ok(())
    }

    /// Returns a valid access token, refreshing through the token store
    /// first if the cached one has expired.
    pub(crate) async fn access_token(&self) -> Result<String> {
        let token = self
            .auth
            .token(OAUTH_SCOPES)
            .await
            .context("Unable to obtain a Sheets API access token")?;
        let value = token
            .token()
            .context("The token store returned an entry without an access token")?;
        Ok(value.to_string())
    }
}

async fn build_authenticator(
    secret_path: &Path,
    token_path: &Path,
) -> Result<DefaultAuthenticator> {
    let secret = yup_oauth2::read_application_secret(secret_path)
        .await
        .with_context(|| {
            format!(
                "Unable to read the OAuth client secret at {}, run 'opsync init' to put it in place",
                secret_path.display()
            )
        })?;
    InstalledFlowAuthenticator::builder(
        secret,
        InstalledFlowReturnMethod::HTTPPortRedirect(CALLBACK_PORT),
    )
    .persist_tokens_to_disk(token_path)
    .build()
    .await
    .context("Unable to build the OAuth authenticator")
}
