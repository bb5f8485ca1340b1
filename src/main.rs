use std::{net::IpAddr, process::ExitCode};

use clap::Parser;
use directory_scim::{
    AppState, build_app, build_directory,
    config::ServiceConfig,
    observability::init_tracing,
};

/// CLI arguments for the directory SCIM service
#[derive(Parser, Debug)]
#[command(version, about = "SCIM 2.0 User endpoint over a directory store", long_about = None)]
struct Args {
    /// Path to config file (built-in defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address from the config file
    #[arg(long)]
    host: Option<IpAddr>,

    /// Override the port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => match ServiceConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ServiceConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    if !config.auth.enabled {
        tracing::warn!("SCIM authorization is disabled; every request is accepted");
    }

    let store = match build_directory(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize directory");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        base_dn = %config.directory.base_dn,
        groups = config.directory.groups.len(),
        "Directory initialized"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config.clone(), store);
    let app = build_app(&config, state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind to address");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    // Graceful shutdown: wait for SIGINT/SIGTERM, then drain in-flight requests
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
