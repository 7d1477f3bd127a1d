// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and is
//! immutable afterwards. Malformed values fail startup instead of surfacing
//! at request time.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | HS256 signing secret for session tokens | Required |
//! | `JWT_EXPIRES_IN_SECS` | Session token lifetime | `86400` |
//! | `SPECIAL_USER_ID` | Operational bypass principal id | Unset (bypass off) |
//! | `SPECIAL_USER_TOKEN` | Operational bypass secret | Unset (bypass off) |
//! | `SPECIAL_USER_ROLE` | Role granted on bypass | `user` |
//! | `RATE_LIMIT_LOGIN_MAX` | Login attempts per window | `10` |
//! | `RATE_LIMIT_LOGIN_WINDOW_HOURS` | Login window length (1 to 8784) | `1` |
//! | `RATE_LIMIT_MESSAGE_MAX` | Messages per window | `50` |
//! | `RATE_LIMIT_MESSAGE_WINDOW_HOURS` | Message window length (1 to 8784) | `1` |
//! | `API_KEY_HEADER` | Dedicated API-key header | `x-api-key` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::str::FromStr;
use std::time::Duration;

use crate::auth::{ActionKind, BypassRule, RateLimitSpec, Role};

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_EXPIRES_IN_SECS_ENV: &str = "JWT_EXPIRES_IN_SECS";
pub const SPECIAL_USER_ID_ENV: &str = "SPECIAL_USER_ID";
pub const SPECIAL_USER_TOKEN_ENV: &str = "SPECIAL_USER_TOKEN";
pub const SPECIAL_USER_ROLE_ENV: &str = "SPECIAL_USER_ROLE";
pub const RATE_LIMIT_LOGIN_MAX_ENV: &str = "RATE_LIMIT_LOGIN_MAX";
pub const RATE_LIMIT_LOGIN_WINDOW_HOURS_ENV: &str = "RATE_LIMIT_LOGIN_WINDOW_HOURS";
pub const RATE_LIMIT_MESSAGE_MAX_ENV: &str = "RATE_LIMIT_MESSAGE_MAX";
pub const RATE_LIMIT_MESSAGE_WINDOW_HOURS_ENV: &str = "RATE_LIMIT_MESSAGE_WINDOW_HOURS";
pub const API_KEY_HEADER_ENV: &str = "API_KEY_HEADER";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// 24 hours.
pub const DEFAULT_JWT_TTL_SECS: u64 = 86_400;
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";
/// 366 days.
pub const MAX_WINDOW_HOURS: u32 = 8_784;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be at least 1 hour")]
    ZeroWindow(&'static str),

    #[error("{var} must be at most {max} hours, got {hours}")]
    WindowTooLong {
        var: &'static str,
        hours: u32,
        max: u32,
    },
}

/// Quota per action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub login: RateLimitSpec,
    pub message: RateLimitSpec,
}

impl RateLimits {
    pub fn for_kind(&self, kind: ActionKind) -> &RateLimitSpec {
        match kind {
            ActionKind::Login => &self.login,
            ActionKind::Message => &self.message,
        }
    }

    /// Longest configured window, used to prune idle counters.
    pub fn max_window_hours(&self) -> u32 {
        self.login.window_hours.max(self.message.window_hours)
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login: RateLimitSpec::new(ActionKind::Login, 10, 1),
            message: RateLimitSpec::new(ActionKind::Message, 50, 1),
        }
    }
}

/// Gatekeeper configuration.
#[derive(Clone)]
pub struct GatekeeperConfig {
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub bypass: BypassRule,
    pub rate_limits: RateLimits,
    pub api_key_header: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for GatekeeperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatekeeperConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("bypass", &self.bypass)
            .field("rate_limits", &self.rate_limits)
            .field("api_key_header", &self.api_key_header)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl GatekeeperConfig {
    /// Defaults for everything but the signing secret. Bypass disabled.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_ttl: Duration::from_secs(DEFAULT_JWT_TTL_SECS),
            bypass: BypassRule::disabled(),
            rate_limits: RateLimits::default(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }

    pub fn with_bypass(mut self, bypass: BypassRule) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let mut config = Self::new(jwt_secret);

        let ttl_secs = parse_or(&lookup, JWT_EXPIRES_IN_SECS_ENV, DEFAULT_JWT_TTL_SECS)?;
        config.jwt_ttl = Duration::from_secs(ttl_secs);

        let bypass_role = match lookup(SPECIAL_USER_ROLE_ENV) {
            Some(value) => Role::parse(&value).ok_or(ConfigError::Invalid {
                var: SPECIAL_USER_ROLE_ENV,
                value,
            })?,
            None => Role::default(),
        };
        config.bypass = BypassRule::new(
            lookup(SPECIAL_USER_ID_ENV).unwrap_or_default(),
            lookup(SPECIAL_USER_TOKEN_ENV).unwrap_or_default(),
        )
        .with_role(bypass_role);

        let defaults = RateLimits::default();
        config.rate_limits = RateLimits {
            login: RateLimitSpec::new(
                ActionKind::Login,
                parse_or(&lookup, RATE_LIMIT_LOGIN_MAX_ENV, defaults.login.max_count)?,
                window_hours(&lookup, RATE_LIMIT_LOGIN_WINDOW_HOURS_ENV, defaults.login.window_hours)?,
            ),
            message: RateLimitSpec::new(
                ActionKind::Message,
                parse_or(&lookup, RATE_LIMIT_MESSAGE_MAX_ENV, defaults.message.max_count)?,
                window_hours(
                    &lookup,
                    RATE_LIMIT_MESSAGE_WINDOW_HOURS_ENV,
                    defaults.message.window_hours,
                )?,
            ),
        };

        if let Some(header) = lookup(API_KEY_HEADER_ENV) {
            let header = header.trim().to_ascii_lowercase();
            if axum::http::HeaderName::from_str(&header).is_err() {
                return Err(ConfigError::Invalid {
                    var: API_KEY_HEADER_ENV,
                    value: header,
                });
            }
            config.api_key_header = header;
        }

        if let Some(host) = lookup(HOST_ENV) {
            config.host = host;
        }
        config.port = parse_or(&lookup, PORT_ENV, config.port)?;

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn window_hours<F>(lookup: &F, var: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, var, default)? {
        0 => Err(ConfigError::ZeroWindow(var)),
        hours if hours > MAX_WINDOW_HOURS => Err(ConfigError::WindowTooLong {
            var,
            hours,
            max: MAX_WINDOW_HOURS,
        }),
        hours => Ok(hours),
    }
}
