//! Command execution helpers
//!
//! Time, log and map the error of every auth command in one place so the
//! command bodies stay one expression long.

use std::time::Instant;

use sidepanel_common::AuthError;

use crate::utils::logging::log_command_execution;

/// Execute an auth command with timing, logging and UI error mapping
///
/// Failures are logged with their stable kind label and returned as the
/// user-facing message for that kind; diagnostic detail stays in the log.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn refresh(ctx: &AppContext) -> Result<TokenExpiry, String> {
///     execute_auth_command("auth::refresh", || async {
///         ctx.auth.refresh_tokens().await.map(TokenExpiry::from)
///     })
///     .await
/// }
/// ```
pub async fn execute_auth_command<F, Fut, T>(command_name: &str, command_fn: F) -> Result<T, String>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, AuthError>>,
{
    let start = Instant::now();
    let result = command_fn().await;
    let elapsed = start.elapsed();

    match result {
        Ok(value) => {
            log_command_execution(command_name, elapsed, None);
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(command = command_name, error = %err, "Command failed");
            log_command_execution(command_name, elapsed, Some(err.kind().as_str()));
            Err(err.user_message().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_error_to_user_message() {
        let result: Result<(), String> = execute_auth_command("test::fail", || async {
            Err(AuthError::Network("connection refused to 10.0.0.1".to_string()))
        })
        .await;

        let message = result.expect_err("Expected failure");
        assert_eq!(message, AuthError::Network(String::new()).user_message());
        assert!(!message.contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn passes_success_through() {
        let result = execute_auth_command("test::ok", || async { Ok::<_, AuthError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
