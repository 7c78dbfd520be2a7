//! Sidepanel - command-line host for the sign-in core
//!
//! Run with: `sidepanel <command>`
//!
//! Results go to stdout; diagnostics go to stderr through `tracing`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use sidepanel_common::auth::CallbackMessage;
use sidepanel_domain::Config;
use sidepanel_infra::{open_store, CallbackServer, PrintUrlOpener};
use sidepanel_lib::utils::logging::{error_label, init_logging};
use sidepanel_lib::{commands, AppContext};

/// How long `logout` waits for the provider's sign-out page to report back
const SIGNOUT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    let task = env::args().nth(1);

    if matches!(task.as_deref(), Some("help" | "--help" | "-h") | None) {
        print_help();
        return ExitCode::SUCCESS;
    }

    match run(task.as_deref().unwrap_or_default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sidepanel: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("Sidepanel");
    println!();
    println!("USAGE:");
    println!("    sidepanel <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    login     Sign in through the browser");
    println!("    status    Show the session status");
    println!("    whoami    Show the signed-in user");
    println!("    token     Print a valid access token");
    println!("    refresh   Force a token refresh");
    println!("    logout    Sign out and clear the stored session");
    println!("    watch     Print session changes until interrupted");
    println!("    help      Show this help message");
}

async fn run(task: &str) -> anyhow::Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let config = sidepanel_infra::config::load().context("Failed to load configuration")?;
    init_logging(&config.logging);

    let ctx = build_context(config).await?;

    match task {
        "login" => login(&ctx).await,
        "status" => {
            let summary = commands::auth_state(&ctx).await.map_err(|e| anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        "whoami" => match commands::whoami(&ctx).await.map_err(|e| anyhow!(e))? {
            Some(user) => {
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            None => Err(anyhow!("Not signed in")),
        },
        "token" => {
            let token = commands::access_token(&ctx).await.map_err(|e| anyhow!(e))?;
            println!("{token}");
            Ok(())
        }
        "refresh" => {
            let expires_at = commands::refresh(&ctx).await.map_err(|e| anyhow!(e))?;
            println!("Session refreshed; expires at {}", expires_at.to_rfc3339());
            Ok(())
        }
        "logout" => logout(&ctx).await,
        "watch" => watch(&ctx).await,
        unknown => {
            print_help();
            Err(anyhow!("Unknown command: {unknown}"))
        }
    }
}

/// Wire the context; `SIDEPANEL_NO_BROWSER` prints URLs instead of opening them
async fn build_context(config: Config) -> anyhow::Result<AppContext> {
    let result = if env::var_os("SIDEPANEL_NO_BROWSER").is_some() {
        let store = open_store(&config.storage);
        AppContext::new_with(config, store, Arc::new(PrintUrlOpener)).await
    } else {
        AppContext::new(config).await
    };

    result.map_err(|e| {
        tracing::error!(error_kind = error_label(&e), error = %e, "Failed to start");
        anyhow::Error::new(e).context("Failed to start")
    })
}

/// Open the sign-in page and wait for the relay to deliver its result
async fn login(ctx: &AppContext) -> anyhow::Result<()> {
    let provider = &ctx.config.provider;
    let (server, mut rx) = CallbackServer::start(&provider.redirect_uri, &provider.logout_uri)
        .await
        .context("Failed to start the callback listener")?;

    let url = commands::login(ctx).await.map_err(|e| anyhow!(e))?;
    eprintln!("If the browser did not open, visit:\n  {url}");

    let outcome = loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    break Err(anyhow!("Callback listener stopped"));
                };
                if message == CallbackMessage::SignoutSuccess {
                    continue;
                }
                break match commands::complete_login(ctx, message).await {
                    Ok(Some(user)) => {
                        println!("Signed in as {}", user.email);
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(e) => Err(anyhow!(e)),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                break Err(anyhow!("Sign-in cancelled"));
            }
        }
    };

    server.shutdown().await?;
    outcome
}

/// Sign out, then give the provider's sign-out page a moment to report back
async fn logout(ctx: &AppContext) -> anyhow::Result<()> {
    let provider = &ctx.config.provider;
    let relay = CallbackServer::start(&provider.redirect_uri, &provider.logout_uri).await;
    if let Err(e) = &relay {
        tracing::debug!(error = %e, "Sign-out acknowledgement unavailable");
    }

    commands::logout(ctx).await.map_err(|e| anyhow!(e))?;
    println!("Signed out");

    if let Ok((server, mut rx)) = relay {
        let ack = tokio::time::timeout(SIGNOUT_ACK_TIMEOUT, async {
            while let Some(message) = rx.recv().await {
                if message == CallbackMessage::SignoutSuccess {
                    return true;
                }
            }
            false
        })
        .await;
        if matches!(ack, Ok(true)) {
            tracing::info!("Provider confirmed sign-out");
        }
        server.shutdown().await?;
    }
    Ok(())
}

/// Print each session change until Ctrl-C
async fn watch(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.observer.start();
    let mut rx = ctx.observer.subscribe();
    ctx.observer.refresh().await;

    loop {
        let view = rx.borrow_and_update().clone();
        if !view.checking {
            match &view.user {
                Some(user) if view.logged_in => println!("signed in: {}", user.email),
                _ if view.logged_in => println!("signed in"),
                _ => println!("signed out"),
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
