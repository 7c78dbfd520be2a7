//! Loopback relay for the provider's redirect landing pages.
//!
//! Binds the host and port of the configured `redirect_uri`, serves the
//! callback and sign-out paths, and forwards each landing as a
//! [`CallbackMessage`] over an mpsc channel. Validation of the message
//! against pending login state is the orchestrator's job.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use sidepanel_common::auth::CallbackMessage;
use sidepanel_domain::{Result, SidepanelError};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

const RELAY_CAPACITY: usize = 8;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Complete</title></head>
<body><h1>Sign-in complete</h1><p>You can close this window.</p>
<script>window.close();</script></body>
</html>"#;

const SIGNOUT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Signed Out</title></head>
<body><h1>You have been signed out</h1><p>You can close this window.</p>
<script>window.close();</script></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Failed</title></head>
<body><h1>Sign-in failed</h1><p>Return to the application and try again.</p></body>
</html>"#;

#[derive(Clone)]
struct RelayState {
    tx: mpsc::Sender<CallbackMessage>,
}

/// Running loopback relay
pub struct CallbackServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Start serving the paths of `redirect_uri` and `logout_uri` on the
    /// host and port of `redirect_uri`
    ///
    /// # Errors
    /// Returns `SidepanelError::Config` for an unusable URI and
    /// `SidepanelError::Io` if the address cannot be bound
    pub async fn start(
        redirect_uri: &str,
        logout_uri: &str,
    ) -> Result<(Self, mpsc::Receiver<CallbackMessage>)> {
        let redirect = parse_loopback(redirect_uri)?;
        let signout_path = Url::parse(logout_uri)
            .map_err(|e| SidepanelError::Config(format!("Invalid logout URI: {e}")))?
            .path()
            .to_string();

        let host = redirect.host_str().unwrap_or("127.0.0.1");
        let port = redirect.port_or_known_default().unwrap_or(80);
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            SidepanelError::Io(format!("Failed to bind callback server on {host}:{port}: {e}"))
        })?;
        let addr = listener
            .local_addr()
            .map_err(|e| SidepanelError::Io(format!("Failed to determine callback port: {e}")))?;

        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
        let app = Router::new()
            .route(redirect.path(), get(handle_callback))
            .route(&signout_path, get(handle_signout))
            .with_state(RelayState { tx });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "Callback server error");
            }
        });

        info!(%addr, callback = redirect.path(), signout = %signout_path, "Callback server listening");
        Ok((Self { addr, shutdown_tx: Some(shutdown_tx), handle: Some(handle) }, rx))
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut down the relay gracefully
    ///
    /// # Errors
    /// Returns `SidepanelError::Internal` if the server task panicked
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(SidepanelError::Internal(format!(
                        "Callback server panicked: {err}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

fn parse_loopback(redirect_uri: &str) -> Result<Url> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| SidepanelError::Config(format!("Invalid redirect URI: {e}")))?;
    if url.scheme() != "http" {
        return Err(SidepanelError::Config(
            "Callback server requires an http:// redirect URI".to_string(),
        ));
    }
    Ok(url)
}

async fn handle_callback(
    State(relay): State<RelayState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    match CallbackMessage::from_query_pairs(params) {
        Ok(message) => {
            let page = match &message {
                CallbackMessage::Success { .. } => SUCCESS_PAGE,
                _ => FAILURE_PAGE,
            };
            forward(&relay, message);
            (StatusCode::OK, Html(page))
        }
        Err(e) => {
            warn!(error = %e, "Rejected malformed callback");
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        }
    }
}

async fn handle_signout(State(relay): State<RelayState>) -> Html<&'static str> {
    forward(&relay, CallbackMessage::SignoutSuccess);
    Html(SIGNOUT_PAGE)
}

fn forward(relay: &RelayState, message: CallbackMessage) {
    let kind = message.kind();
    if let Err(e) = relay.tx.try_send(message) {
        warn!(kind, error = %e, "Dropped callback message");
    }
}
