//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;
use std::time::Duration;

use crate::ServerConfig;
use crate::auth::{AuthError, ClientIpHeader, TokenService};
use crate::db::{Database, MemberRole};
use crate::mail::LogMailSender;
use crate::password::Argon2Verifier;
use crate::rate_limit::DEFAULT_LOGIN_PER_MINUTE;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for either token lifetime (one year).
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storefront-auth",
    about = "Member authentication with rotating refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "storefront.db")]
    pub database: String,

    /// Public base URL used in verification links (e.g., "https://shop.example.com")
    #[arg(long, default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "1800", value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "1209600", value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub refresh_token_ttl: u64,

    /// Omit the Secure flag on the refresh cookie (local development over plain HTTP)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_rate_per_minute: u32,

    /// Read the client IP from this header for rate limiting.
    /// Only set this behind a reverse proxy that overwrites the header
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Create an admin member with this email on startup if it does not exist.
    /// The password is read from the ADMIN_PASSWORD env var
    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from the environment and remove it so child processes never see it.
fn take_env_secret(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var(name) };
    Some(value)
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Some(secret) = take_env_secret("JWT_SECRET") {
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the public base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_base_url(base_url: &str) -> Option<Url> {
    let url = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %base_url, error = %e, "Invalid base URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("base-url must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Create the bootstrap admin if requested. Existing members are left untouched.
/// Returns false if startup should abort.
pub async fn bootstrap_admin(service: &TokenService, db: &Database, email: &str) -> bool {
    match db.members().exists_by_email(email).await {
        Ok(true) => {
            info!(email = %email, "Admin member already exists");
            return true;
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            return false;
        }
    }

    let Some(password) = take_env_secret("ADMIN_PASSWORD") else {
        error!("ADMIN_PASSWORD environment variable is required with --admin-email");
        return false;
    };

    match service.register(email, &password, MemberRole::Admin).await {
        Ok(id) => {
            info!(member_id = id, email = %email, "Admin member created");
            true
        }
        Err(AuthError::DuplicateEmail) => {
            warn!(email = %email, "Admin member was created concurrently");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin member");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String, base_url: Url) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl: Duration::from_secs(args.access_token_ttl),
        refresh_token_ttl: Duration::from_secs(args.refresh_token_ttl),
        secure_cookies: !args.insecure_cookies,
        login_rate_per_minute: args.login_rate_per_minute,
        ip_header: args.ip_header,
        credentials: Arc::new(Argon2Verifier),
        mail: Arc::new(LogMailSender),
        base_url,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
