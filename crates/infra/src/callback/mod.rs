//! Redirect landing pages for desktop hosts

pub mod server;

pub use server::CallbackServer;
