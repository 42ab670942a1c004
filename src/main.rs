use keygate::{create_router, init_tracing, shutdown_telemetry, AppState, Config};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // The subscriber depends on config, so this goes straight to stderr.
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    info!(
        service = "keygate",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        token_ttl_secs = config.token.ttl_secs,
        "Starting server"
    );

    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    if config.users.seed.is_empty() {
        warn!("AUTH_USERS is empty; only registered users can log in");
    }

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize application state");
            shutdown_telemetry();
            std::process::exit(1);
        }
    };
    let app = create_router(state, &config);

    let http_addr = config.server_addr();
    let listener = match tokio::net::TcpListener::bind(&http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, address = %http_addr, "Failed to bind HTTP server");
            shutdown_telemetry();
            std::process::exit(1);
        }
    };

    info!(
        http_address = %http_addr,
        docs_url = %format!("http://{}/swagger-ui", http_addr),
        "HTTP server ready"
    );

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = result {
        error!(error = %e, "HTTP server error");
    }

    shutdown_telemetry();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
