//! Account and session layer of the support portal: registration, email
//! verification, login, password reset, admin bootstrap and bearer-token
//! guards for the rest of the API.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod state;
#[cfg(test)]
mod test_support;
