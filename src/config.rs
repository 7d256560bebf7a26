//! Configuration module
//!
//! Environment-driven configuration with per-section defaults. Every knob
//! has a working default so the server boots with no environment at all.

use serde::{Deserialize, Serialize};

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub otp: OtpConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind port
    pub port: u16,
    /// Deployment environment label ("development" | "production")
    pub env: String,
    /// Per-operation timeout in seconds
    pub operation_timeout_secs: u64,
}

/// Credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    /// HMAC secret for refresh tokens
    pub jwt_refresh_secret: String,
    /// Access token lifetime in days
    pub jwt_expire_days: i64,
    /// Refresh token lifetime in days
    pub jwt_refresh_expire_days: i64,
    /// bcrypt cost factor
    pub bcrypt_cost: u32,
}

/// One-time-password settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Booking retrieval OTP lifetime in minutes
    pub booking_expire_minutes: i64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter, e.g. "info" or "stackpark=debug,info"
    pub level: String,
}

/// CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated allow-list; empty means allow any origin
    pub allowed_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env_parse("PORT", 5000),
                env: env_or("APP_ENV", "development"),
                operation_timeout_secs: env_parse("OPERATION_TIMEOUT_SECS", 30),
            },
            security: SecurityConfig {
                jwt_secret: env_or("JWT_SECRET", "change-me-access-secret"),
                jwt_refresh_secret: env_or("JWT_REFRESH_SECRET", "change-me-refresh-secret"),
                jwt_expire_days: env_parse("JWT_EXPIRE_DAYS", 7),
                jwt_refresh_expire_days: env_parse("JWT_REFRESH_EXPIRE_DAYS", 30),
                bcrypt_cost: env_parse("BCRYPT_COST", 12),
            },
            otp: OtpConfig {
                booking_expire_minutes: env_parse("OTP_EXPIRE_MINUTES", 30),
            },
            logging: LoggingConfig {
                level: env_or("LOG_LEVEL", "info"),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("ALLOWED_ORIGINS")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.server.env == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_without_environment() {
        let cfg = Config::from_env();
        assert!(cfg.server.port > 0);
        assert_eq!(cfg.security.bcrypt_cost, 12);
        assert_eq!(cfg.otp.booking_expire_minutes, 30);
        assert!(!cfg.is_production() || cfg.server.env == "production");
    }
}
