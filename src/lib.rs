pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod mail;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use auth::{ClientIpHeader, TokenService};
use axum::Router;
use db::Database;
use jwt::{TokenCodec, TokenIssuer};
use mail::{MailSender, VerificationMailer};
use password::CredentialVerifier;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Login attempts per minute per client IP
    pub login_rate_per_minute: u32,
    /// Trusted reverse proxy header for the client IP (requires running behind a proxy)
    pub ip_header: Option<ClientIpHeader>,
    /// Password hashing backend
    pub credentials: Arc<dyn CredentialVerifier>,
    /// Delivery for signup verification mail
    pub mail: Arc<dyn MailSender>,
    /// Public URL that verification links point at
    pub base_url: Url,
}

impl ServerConfig {
    /// Build the token service for this configuration.
    pub fn token_service(&self) -> TokenService {
        let issuer = TokenIssuer::new(
            TokenCodec::from_secret(&self.jwt_secret),
            self.access_token_ttl,
            self.refresh_token_ttl,
        );
        TokenService::new(
            self.db.clone(),
            Arc::new(issuer),
            self.credentials.clone(),
            VerificationMailer::new(self.mail.clone(), self.base_url.clone()),
        )
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let rate_limit_config = Arc::new(RateLimitConfig::new(config.login_rate_per_minute, config.ip_header));

    let api_router = create_api_router(
        config.db.clone(),
        config.token_service(),
        config.secure_cookies,
        rate_limit_config,
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
