//! Server configuration.
//!
//! Every flag has an `APPRAISAL_*` environment fallback. `main` loads a
//! `.env` file with dotenvy before clap parses, so the same keys can live
//! there.

use clap::Args;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("APPRAISAL_JWT_SECRET must be set and at least {min} characters long")]
    WeakSecret { min: usize },
    #[error("APPRAISAL_TOKEN_TTL_HOURS must be between 1 and {max}")]
    TokenTtl { max: u32 },
    #[error("APPRAISAL_RATE_LIMIT_RPS must be greater than zero")]
    RateLimit,
    #[error("invalid CORS origin '{0}'")]
    CorsOrigin(String),
}

/// Minimum length of the token signing secret.
pub const MIN_SECRET_LEN: usize = 16;

/// Longest token lifetime accepted.
pub const MAX_TOKEN_TTL_HOURS: u32 = 24 * 7;

/// Settings for `appraisal serve`.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "APPRAISAL_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// HS256 signing secret for access tokens.
    #[arg(long, env = "APPRAISAL_JWT_SECRET", hide_env_values = true, default_value = "")]
    pub jwt_secret: String,

    /// Access token lifetime in hours.
    #[arg(long, env = "APPRAISAL_TOKEN_TTL_HOURS", default_value_t = 8)]
    pub token_ttl_hours: u32,

    /// Global request quota per second.
    #[arg(long, env = "APPRAISAL_RATE_LIMIT_RPS", default_value_t = 50)]
    pub rate_limit_rps: u32,

    /// Allowed CORS origins, comma separated. Empty allows any origin.
    #[arg(long, env = "APPRAISAL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Use a throwaway in-memory database seeded with demo data.
    #[arg(long)]
    pub in_memory: bool,
}

impl ServerConfig {
    /// A config for tests and embedding: loopback, permissive CORS.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: 8,
            rate_limit_rps: 50,
            cors_origins: Vec::new(),
            in_memory: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret { min: MIN_SECRET_LEN });
        }
        if self.token_ttl_hours == 0 || self.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::TokenTtl {
                max: MAX_TOKEN_TTL_HOURS,
            });
        }
        if self.rate_limit_rps == 0 {
            return Err(ConfigError::RateLimit);
        }
        if let Some(bad) = self
            .cors_origins
            .iter()
            .find(|origin| !(origin.starts_with("http://") || origin.starts_with("https://")))
        {
            return Err(ConfigError::CorsOrigin(bad.clone()));
        }
        Ok(())
    }

    /// The validated quota.
    pub fn quota(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.rate_limit_rps).ok_or(ConfigError::RateLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123";

    #[test]
    fn defaults_validate() {
        assert_eq!(ServerConfig::new(SECRET).validate(), Ok(()));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert_eq!(
            ServerConfig::new("short").validate(),
            Err(ConfigError::WeakSecret { min: MIN_SECRET_LEN })
        );
    }

    #[test]
    fn zero_quota_is_rejected() {
        let mut config = ServerConfig::new(SECRET);
        config.rate_limit_rps = 0;
        assert_eq!(config.validate(), Err(ConfigError::RateLimit));
        assert!(config.quota().is_err());
    }

    #[test]
    fn cors_origins_need_a_scheme() {
        let mut config = ServerConfig::new(SECRET);
        config.cors_origins = vec!["localhost:4200".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::CorsOrigin(_))));
        config.cors_origins = vec!["http://localhost:4200".to_string()];
        assert_eq!(config.validate(), Ok(()));
    }
}
