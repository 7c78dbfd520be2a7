//! Commands invoked by the host UI

pub mod auth;

pub use auth::{
    access_token, auth_state, complete_login, login, logout, refresh, whoami, SessionSummary,
};
