//! Authentication command handlers for the OAuth flow.
//!
//! - `opsync auth` - initial OAuth consent flow
//! - `opsync auth --verify` - verify and refresh authentication

use crate::api::TokenProvider;
use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `opsync auth` command - runs the OAuth consent flow.
///
/// This is the only command meant to open a browser for OAuth
/// authentication. It persists the resulting tokens to token.json.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    TokenProvider::authorize(&config.client_secret_path(), &config.token_path()).await?;
    Ok("Authorization complete".into())
}

/// Handles the `opsync auth --verify` command.
///
/// Loads the persisted token store and requests an access token from it to
/// prove the saved refresh token still works. If the store is missing it
/// fails with a message telling the user to run `opsync auth`.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let token_provider = TokenProvider::load(&config.client_secret_path(), &config.token_path())
        .await
        .context(
            "Unable to use the existing token store. \n\n\
            You should run 'opsync auth' (without the --verify flag).",
        )?;
    token_provider
        .access_token()
        .await
        .context("Unable to obtain a fresh access token")?;
    Ok("Your OAuth token is valid".to_string().into())
}
