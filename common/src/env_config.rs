use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// Holds the database connection details, JWT configuration, server
/// host and port, worker count, CORS and logging preferences, the keys
/// accepted on internal hooks and the family sharing settings.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// File the logger appends to.
    pub log_file: String,
    /// API keys accepted by the internal subscription hooks.
    pub hooks_api_keys: Vec<String>,
    /// Family sharing settings.
    pub family: FamilyConfig,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// Tokens are issued by the auth service; this side only verifies them.
pub struct JwtConfig {
    /// The secret key used to verify JWTs.
    pub secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Settings of the family subscription engine.
pub struct FamilyConfig {
    /// How long before the start of a new payer period the previous
    /// period may have ended and still be considered the same lineage.
    pub renewal_gap_hours: i64,
    /// Length of a dependent subscription under `days` provisioning when
    /// the payer subscription carries no `family_subscription_days` meta.
    pub days_per_seat: i64,
    /// Maximum number of successor periods a single donation follows.
    pub max_renewal_hops: u32,
}

impl Default for FamilyConfig {
    fn default() -> Self {
        FamilyConfig {
            renewal_gap_hours: 72,
            days_per_seat: 30,
            max_renewal_hops: 2,
        }
    }
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// Reads the JWT configuration from environment variables:
    /// - `JWT_SECRET`: Required. The secret key for JWT verification.
    ///
    /// # Panics
    ///
    /// This function will panic if `JWT_SECRET` is not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
        }
    }
}

impl FamilyConfig {
    /// Reads the family settings, falling back to [`FamilyConfig::default`]
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = FamilyConfig::default();

        FamilyConfig {
            renewal_gap_hours: parse_var("FAMILY_RENEWAL_GAP_HOURS", defaults.renewal_gap_hours),
            days_per_seat: parse_var("FAMILY_DAYS_PER_SEAT", defaults.days_per_seat),
            max_renewal_hops: parse_var("FAMILY_MAX_RENEWAL_HOPS", defaults.max_renewal_hops),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT verification (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_FILE`: Log file path (default: "family.log")
    /// - `HOOKS_API_KEYS`: Comma separated keys for internal hooks (default: none)
    /// - `FAMILY_*`: see [`FamilyConfig::from_env`]
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("PORT", 8080),
            num_workers: parse_var("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "family.log".to_string()),
            hooks_api_keys: env::var("HOOKS_API_KEYS")
                .map(|keys| split_keys(&keys))
                .unwrap_or_default(),
            family: FamilyConfig::from_env(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}
