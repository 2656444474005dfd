use clap::Parser;
use storefront_auth::cli::{
    Args, bootstrap_admin, build_config, init_logging, load_jwt_secret, open_database,
    validate_base_url,
};
use storefront_auth::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(base_url) = validate_base_url(&args.base_url) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, jwt_secret, base_url);

    if let Some(email) = args.admin_email.as_deref() {
        if !bootstrap_admin(&config.token_service(), &config.db, email).await {
            std::process::exit(1);
        }
    }

    if !config.secure_cookies {
        info!("Refresh cookie Secure flag disabled");
    }

    init_cleanup(&config.db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
