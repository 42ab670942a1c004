//! Configuration management.

use std::env;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::auth::SeedUser;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("AUTH_USERS entry {0:?} must have the form username:password")]
    InvalidSeedUser(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub token: TokenConfig,
    pub users: UsersConfig,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub request_timeout_secs: u64,
    pub max_body_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SecretString,
    pub ttl_secs: u64,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UsersConfig {
    pub seed: Vec<SeedUser>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limiting_enabled: bool,
    pub rate_limit_requests_per_minute: u32,
    pub min_password_length: usize,
    pub require_password_complexity: bool,
    pub password_hash_cost: u32,
    pub totp_issuer: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_enabled: bool,
}

fn var_or<T: FromStr>(
    key: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn list_var(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Parses `user:password,user2:password2`. Only the first `:` splits, so
/// passwords may contain colons.
pub fn parse_seed_users(raw: &str) -> Result<Vec<SeedUser>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(SeedUser {
                    username: username.to_string(),
                    password: SecretString::from(password.to_string()),
                })
            }
            _ => Err(ConfigError::InvalidSeedUser(entry.to_string())),
        })
        .collect()
}

impl Config {
    /// Reads the process environment only. Callers that want `.env`
    /// support load it first (see `main`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Self::parse_environment();

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: var_or("PORT", 8080, "port number")?,
                environment: environment.clone(),
                request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", 30, "number")?,
                max_body_size: var_or("MAX_BODY_SIZE", 1_048_576, "number")?,
            },
            token: Self::parse_token_config()?,
            users: UsersConfig {
                seed: match env::var("AUTH_USERS") {
                    Ok(raw) => parse_seed_users(&raw)?,
                    Err(_) => Vec::new(),
                },
            },
            security: Self::parse_security_config(&environment)?,
            cors: Self::parse_cors_config(&environment)?,
            logging: Self::parse_logging_config(&environment),
            telemetry: Self::parse_telemetry_config()?,
        })
    }

    fn parse_environment() -> Environment {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    fn parse_token_config() -> Result<TokenConfig, ConfigError> {
        let secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let ttl_secs = var_or(
            "TOKEN_TTL_SECS",
            crate::auth::token::DEFAULT_TOKEN_TTL_SECS,
            "number of seconds",
        )?;
        if ttl_secs > crate::auth::token::MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_SECS",
                expected: "number of seconds no greater than one year",
                value: ttl_secs.to_string(),
            });
        }

        Ok(TokenConfig {
            secret: SecretString::from(secret),
            ttl_secs,
            issuer: env::var("TOKEN_ISSUER").ok().filter(|s| !s.is_empty()),
        })
    }

    fn parse_security_config(environment: &Environment) -> Result<SecurityConfig, ConfigError> {
        let is_prod = environment.is_production();

        Ok(SecurityConfig {
            rate_limiting_enabled: var_or("RATE_LIMITING_ENABLED", is_prod, "boolean")?,
            rate_limit_requests_per_minute: var_or(
                "RATE_LIMIT_REQUESTS_PER_MINUTE",
                20,
                "number",
            )?,
            min_password_length: var_or("MIN_PASSWORD_LENGTH", 8, "number")?,
            require_password_complexity: var_or("REQUIRE_PASSWORD_COMPLEXITY", is_prod, "boolean")?,
            password_hash_cost: var_or("PASSWORD_HASH_COST", 12, "number")?,
            totp_issuer: env::var("TOTP_ISSUER").unwrap_or_else(|_| "keygate".to_string()),
        })
    }

    fn parse_cors_config(environment: &Environment) -> Result<CorsConfig, ConfigError> {
        let default_origins = if environment.is_development() {
            strings(&["*"])
        } else {
            Vec::new()
        };

        Ok(CorsConfig {
            allowed_origins: list_var("CORS_ALLOWED_ORIGINS").unwrap_or(default_origins),
            allowed_methods: list_var("CORS_ALLOWED_METHODS")
                .unwrap_or_else(|| strings(&["GET", "POST", "OPTIONS"])),
            allowed_headers: list_var("CORS_ALLOWED_HEADERS").unwrap_or_else(|| {
                strings(&["Content-Type", "Authorization", "X-Request-ID"])
            }),
            max_age_secs: var_or("CORS_MAX_AGE_SECS", 3600, "number")?,
        })
    }

    fn parse_logging_config(environment: &Environment) -> LoggingConfig {
        let is_dev = environment.is_development();

        let level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| if is_dev { "debug" } else { "info" }.to_string());

        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| if is_dev { "pretty" } else { "json" }.to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        LoggingConfig { level, format }
    }

    fn parse_telemetry_config() -> Result<TelemetryConfig, ConfigError> {
        Ok(TelemetryConfig {
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "keygate".to_string()),
            metrics_enabled: var_or("METRICS_ENABLED", true, "boolean")?,
        })
    }

    pub fn validate_for_production(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.server.environment.is_production() {
            return issues;
        }

        if self.token.secret.expose_secret().len() < 32 {
            issues.push("JWT_SECRET should be at least 32 bytes in production".to_string());
        }

        if self.token.ttl_secs > 3600 {
            issues.push("Token lifetime should not exceed 1 hour in production".to_string());
        }

        if self.cors.allowed_origins.iter().any(|o| o == "*") {
            issues.push("CORS should not allow all origins (*) in production".to_string());
        }

        if !self.security.rate_limiting_enabled {
            issues.push("Rate limiting should be enabled in production".to_string());
        }

        if self.security.min_password_length < 8 {
            issues.push("Minimum password length should be at least 8".to_string());
        }

        issues
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn default_for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: Environment::Development,
                request_timeout_secs: 30,
                max_body_size: 1_048_576,
            },
            token: TokenConfig {
                secret: SecretString::from("keygate-test-secret-0123456789abcdef".to_string()),
                ttl_secs: 3600,
                issuer: None,
            },
            users: UsersConfig {
                seed: vec![SeedUser {
                    username: "admin".to_string(),
                    password: SecretString::from("password".to_string()),
                }],
            },
            security: SecurityConfig {
                rate_limiting_enabled: false,
                rate_limit_requests_per_minute: 20,
                min_password_length: 8,
                require_password_complexity: false,
                password_hash_cost: 4,
                totp_issuer: "keygate-test".to_string(),
            },
            cors: CorsConfig {
                allowed_origins: strings(&["*"]),
                allowed_methods: strings(&["GET", "POST"]),
                allowed_headers: strings(&["Content-Type", "Authorization"]),
                max_age_secs: 3600,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                service_name: "keygate-test".to_string(),
                metrics_enabled: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "ENVIRONMENT",
        "JWT_SECRET",
        "TOKEN_TTL_SECS",
        "TOKEN_ISSUER",
        "AUTH_USERS",
        "RATE_LIMITING_ENABLED",
        "LOG_FORMAT",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let mut all: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|k| (*k, None)).collect();
        for &(key, value) in vars {
            all.retain(|(k, _)| *k != key);
            all.push((key, Some(value)));
        }
        temp_env::with_vars(all, f);
    }

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Production.is_development());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Development.is_production());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        with_env(&[], || {
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
        });
    }

    #[test]
    fn test_empty_secret_is_an_error() {
        with_env(&[("JWT_SECRET", "")], || {
            assert!(matches!(
                Config::from_env(),
                Err(ConfigError::Missing("JWT_SECRET"))
            ));
        });
    }

    #[test]
    fn test_from_env_defaults() {
        with_env(&[("JWT_SECRET", "s3cret")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.token.ttl_secs, 3600);
            assert!(config.token.issuer.is_none());
            assert!(config.users.seed.is_empty());
            assert_eq!(config.server.environment, Environment::Development);
            assert!(!config.security.rate_limiting_enabled);
            assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
        });
    }

    #[test]
    fn test_from_env_overrides() {
        with_env(
            &[
                ("JWT_SECRET", "s3cret"),
                ("PORT", "9090"),
                ("TOKEN_TTL_SECS", "900"),
                ("TOKEN_ISSUER", "keygate"),
                ("ENVIRONMENT", "production"),
                ("AUTH_USERS", "admin:password, ops:p:w"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.token.ttl_secs, 900);
                assert_eq!(config.token.issuer.as_deref(), Some("keygate"));
                assert!(config.security.rate_limiting_enabled);
                assert_eq!(config.logging.format, LogFormat::Json);
                assert_eq!(config.users.seed.len(), 2);
                assert_eq!(config.users.seed[1].username, "ops");
                assert_eq!(config.users.seed[1].password.expose_secret(), "p:w");
            },
        );
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        with_env(&[("JWT_SECRET", "s3cret"), ("PORT", "eighty")], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("PORT"));
        });
    }

    #[test]
    fn test_ttl_above_one_year_is_an_error() {
        with_env(
            &[("JWT_SECRET", "s3cret"), ("TOKEN_TTL_SECS", "3000000000")],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(
                    err,
                    ConfigError::Invalid {
                        key: "TOKEN_TTL_SECS",
                        ..
                    }
                ));
            },
        );
    }

    #[test]
    fn test_from_env_ignores_dotenv_file() {
        let dir = std::env::temp_dir().join(format!("keygate-dotenv-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".env"), "JWT_SECRET=from-dotenv-file\n").unwrap();
        let previous = std::env::current_dir().unwrap();

        with_env(&[], || {
            std::env::set_current_dir(&dir).unwrap();
            let result = Config::from_env();
            std::env::set_current_dir(&previous).unwrap();
            assert!(matches!(result, Err(ConfigError::Missing("JWT_SECRET"))));
        });

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parse_seed_users_rejects_bad_entries() {
        assert!(parse_seed_users("admin").is_err());
        assert!(parse_seed_users(":password").is_err());
        assert!(parse_seed_users("admin:").is_err());
        assert!(parse_seed_users("").unwrap().is_empty());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = Config::default_for_testing();
        let debug = format!("{:?}", config.token);
        assert!(!debug.contains("keygate-test-secret"));
    }

    #[test]
    fn test_production_validation() {
        let mut config = Config::default_for_testing();
        config.server.environment = Environment::Production;
        config.token.secret = SecretString::from("short".to_string());
        config.token.ttl_secs = 7200;

        let issues = config.validate_for_production();
        assert!(issues.iter().any(|i| i.contains("JWT_SECRET")));
        assert!(issues.iter().any(|i| i.contains("1 hour")));
        assert!(issues.iter().any(|i| i.contains("CORS")));
        assert!(issues.iter().any(|i| i.contains("Rate limiting")));
    }

    #[test]
    fn test_development_skips_validation() {
        let config = Config::default_for_testing();
        assert!(config.validate_for_production().is_empty());
    }
}
