//! System browser launcher
//!
//! Desktop hosts have no popup window; the authorization and logout pages
//! open in the user's default browser and the requested geometry is ignored.

use async_trait::async_trait;
use sidepanel_common::auth::{WindowOpener, WindowSpec};
use tracing::{debug, info};

/// Opens URLs in the default system browser
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowserOpener;

#[async_trait]
impl WindowOpener for SystemBrowserOpener {
    async fn open(&self, url: &str, spec: WindowSpec) -> Result<(), String> {
        debug!(width = spec.width, height = spec.height, "Browser ignores requested window size");
        open::that_detached(url).map_err(|e| format!("Failed to launch browser: {e}"))?;
        info!("Opened page in system browser");
        Ok(())
    }
}

/// Prints the URL instead of launching a browser, for headless sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintUrlOpener;

#[async_trait]
impl WindowOpener for PrintUrlOpener {
    async fn open(&self, url: &str, _spec: WindowSpec) -> Result<(), String> {
        println!("Open this URL in your browser:\n\n  {url}\n");
        Ok(())
    }
}
