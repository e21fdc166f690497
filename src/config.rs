use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// SMTP settings; absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Shared secret for the admin bootstrap routes. `None` disables them.
    pub admin_secret: Option<String>,
    /// Public base URL of the portal, used to build links in emails.
    pub app_base_url: String,
    pub smtp: Option<SmtpConfig>,
    /// Listen address for the HTTP server.
    pub host: String,
    pub port: u16,
}

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PORT: u16 = 8080;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `JWT_SECRET` must be present and non-empty.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = non_empty("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: non_empty("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: non_empty("JWT_ISSUER").unwrap_or_else(|| "supportdesk".into()),
            audience: non_empty("JWT_AUDIENCE").unwrap_or_else(|| "supportdesk-users".into()),
        };

        let smtp = non_empty("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: lookup("SMTP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: non_empty("SMTP_FROM")
                .unwrap_or_else(|| "noreply@supportdesk.local".into()),
            user: non_empty("SMTP_USER"),
            password: non_empty("SMTP_PASSWORD"),
        });

        let port = match non_empty("APP_PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("APP_PORT is not a port number: {v}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            jwt,
            admin_secret: non_empty("ADMIN_SECRET"),
            app_base_url: non_empty("APP_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:3000".into()),
            smtp,
            host: non_empty("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }
}
