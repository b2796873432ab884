//! API server configuration.

use std::path::PathBuf;
use std::str::FromStr;

use axum_extra::extract::cookie::SameSite;
use chessearn_core::auth::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, resolve_jwt_secret,
};
use chessearn_core::auth::password::DEFAULT_BCRYPT_COST;
use chessearn_core::auth::revocation::DEFAULT_RETENTION_DAYS;

/// Deployment environment; drives cookie security defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Flags applied to every auth cookie.
#[derive(Clone, Copy, Debug)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    /// Development allows plain HTTP; production always sets `Secure`.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                secure: false,
                same_site: SameSite::Lax,
            },
            Environment::Production => Self {
                secure: true,
                same_site: SameSite::Strict,
            },
        }
    }

    /// Override SameSite. `None` forces `Secure`, browsers drop it otherwise.
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        if same_site == SameSite::None {
            self.secure = true;
        }
        self
    }
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:5000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub environment: Environment,
    pub cookies: CookiePolicy,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    /// Login attempts allowed per client address per minute.
    pub login_rate_limit: u32,
    pub revocation_retention_days: i64,
    pub prune_interval_secs: u64,
    pub cors_origins: Vec<String>,
    /// Directory profile photos are written to.
    pub upload_dir: PathBuf,
    /// Externally visible base URL, used to build absolute photo URLs.
    pub public_base_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Development defaults with the given secret; reads no environment.
    pub fn development(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".into(),
            database_url: "postgres://localhost:5432/chessearn".into(),
            jwt_secret: jwt_secret.into(),
            environment: Environment::Development,
            cookies: CookiePolicy::for_environment(Environment::Development),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            login_rate_limit: 10,
            revocation_retention_days: DEFAULT_RETENTION_DAYS,
            prune_interval_secs: 3600,
            cors_origins: vec!["http://localhost:5173".into()],
            upload_dir: PathBuf::from("uploads/profile_photos"),
            public_base_url: "http://localhost:5000".into(),
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                      | Default                                 |
    /// |-------------------------------|-----------------------------------------|
    /// | `BIND_ADDR`                   | `0.0.0.0:5000`                          |
    /// | `DATABASE_URL`                | `postgres://localhost:5432/chessearn`   |
    /// | `JWT_SECRET_KEY` / `JWT_SECRET` | generated & persisted to file         |
    /// | `APP_ENV`                     | `development`                           |
    /// | `COOKIE_SAMESITE`             | `lax` (dev) / `strict` (prod)           |
    /// | `JWT_ACCESS_TOKEN_EXPIRES`    | `900`                                   |
    /// | `JWT_REFRESH_TOKEN_EXPIRES`   | `2592000`                               |
    /// | `BCRYPT_COST`                 | `10`                                    |
    /// | `LOGIN_RATE_LIMIT`            | `10`                                    |
    /// | `REVOCATION_RETENTION_DAYS`   | `30`                                    |
    /// | `PRUNE_INTERVAL_SECS`         | `3600`                                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`                 |
    /// | `UPLOAD_DIR`                  | `uploads/profile_photos`                |
    /// | `PUBLIC_BASE_URL`             | `http://localhost:5000`                 |
    pub fn from_env() -> Self {
        let defaults = Self::development(String::new());

        let environment = env_parse("APP_ENV", Environment::Development);
        let mut cookies = CookiePolicy::for_environment(environment);
        if let Some(same_site) = std::env::var("COOKIE_SAMESITE")
            .ok()
            .as_deref()
            .and_then(parse_same_site)
        {
            cookies = cookies.with_same_site(same_site);
        }

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Self {
            bind_addr: env_or("BIND_ADDR", &defaults.bind_addr),
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            jwt_secret: resolve_jwt_secret(),
            environment,
            cookies,
            access_token_ttl_secs: env_parse(
                "JWT_ACCESS_TOKEN_EXPIRES",
                defaults.access_token_ttl_secs,
            ),
            refresh_token_ttl_secs: env_parse(
                "JWT_REFRESH_TOKEN_EXPIRES",
                defaults.refresh_token_ttl_secs,
            ),
            bcrypt_cost: env_parse("BCRYPT_COST", defaults.bcrypt_cost),
            login_rate_limit: env_parse("LOGIN_RATE_LIMIT", defaults.login_rate_limit),
            revocation_retention_days: env_parse(
                "REVOCATION_RETENTION_DAYS",
                defaults.revocation_retention_days,
            ),
            prune_interval_secs: env_parse("PRUNE_INTERVAL_SECS", defaults.prune_interval_secs),
            cors_origins,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: env_or("PUBLIC_BASE_URL", &defaults.public_base_url)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}
