//! Auth commands exposed to the UI layer
//!
//! Every command returns `Result<_, String>` where the error is the
//! user-facing message for the failure kind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sidepanel_common::auth::{AuthStatus, CallbackMessage, UserInfo};
use sidepanel_common::AuthError;

use crate::utils::command_helpers::execute_auth_command;
use crate::AppContext;

/// Session summary for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub status: AuthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Open the provider's sign-in page; returns the authorization URL
pub async fn login(ctx: &AppContext) -> Result<String, String> {
    execute_auth_command("auth::login", move || ctx.auth.login()).await
}

/// Feed a relayed landing-page message into the orchestrator
///
/// Returns the signed-in user for a completed login and `None` for a
/// sign-out acknowledgement.
pub async fn complete_login(
    ctx: &AppContext,
    message: CallbackMessage,
) -> Result<Option<UserInfo>, String> {
    execute_auth_command("auth::complete_login", || async move {
        match ctx.auth.handle_message(message).await? {
            Some(_) => ctx.auth.current_user().await,
            None => Ok(None),
        }
    })
    .await
}

/// Derive the session status (may refresh inline)
pub async fn auth_state(ctx: &AppContext) -> Result<SessionSummary, String> {
    execute_auth_command("auth::auth_state", || async move {
        let status = ctx.auth.get_auth_state().await;
        let (user, expires_at) = if status == AuthStatus::Authenticated {
            let tokens = ctx.auth.store().get_tokens().await?;
            (ctx.auth.current_user().await?, tokens.map(|t| t.expires_at))
        } else {
            (None, None)
        };
        Ok::<_, AuthError>(SessionSummary { status, user, expires_at })
    })
    .await
}

pub async fn whoami(ctx: &AppContext) -> Result<Option<UserInfo>, String> {
    execute_auth_command("auth::whoami", move || ctx.auth.current_user()).await
}

/// Access token for an API call, or an error asking the user to sign in
pub async fn access_token(ctx: &AppContext) -> Result<String, String> {
    execute_auth_command("auth::access_token", || async move {
        ctx.auth.get_valid_access_token().await.ok_or(AuthError::TokenExpired)
    })
    .await
}

/// Force a refresh; returns the new expiry
pub async fn refresh(ctx: &AppContext) -> Result<DateTime<Utc>, String> {
    execute_auth_command("auth::refresh", || async move {
        ctx.auth.refresh_tokens().await.map(|tokens| tokens.expires_at)
    })
    .await
}

pub async fn logout(ctx: &AppContext) -> Result<(), String> {
    execute_auth_command("auth::logout", move || ctx.observer.sign_out()).await
}
