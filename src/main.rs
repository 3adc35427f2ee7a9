use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use idcard_hub::{bootstrap, db, routes, AppState, Config};

const DEFAULT_CONFIG: &str = "./etc/idcard-hub.toml";

fn print_usage() {
    println!("Usage: idcard-hub [-config <path>]");
    println!();
    println!("  -config <path>  TOML configuration (default: {})", DEFAULT_CONFIG);
    println!("  -help           Show this message");
}

/// Value following `-config`, if any
fn config_path_from(args: &[String]) -> String {
    args.windows(2)
        .find(|pair| pair[0] == "-config")
        .map(|pair| pair[1].clone())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        print_usage();
        return Ok(());
    }
    let config_path = config_path_from(&args);

    // Logging depends on the config, so the config is read first
    let (config, load_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // RUST_LOG wins over log.level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    match load_error {
        None => info!("Configuration loaded from {}", config_path),
        Some(e) => tracing::warn!("Config {} not usable ({}), running with defaults", config_path, e),
    }

    tokio::fs::create_dir_all(&config.upload_dir).await.map_err(|e| {
        anyhow::anyhow!("Cannot create upload directory {:?}: {}", config.upload_dir, e)
    })?;

    let db_conn = db::init_database(&config.database).await.map_err(|e| {
        tracing::error!("Database initialization failed: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    bootstrap::run(&db_conn, &config).await?;

    let addr: SocketAddr = config.addr.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid address '{}', falling back to 0.0.0.0:8080", config.addr);
        SocketAddr::from(([0, 0, 0, 0], 8080))
    });

    let app = routes::create_router(AppState::new(db_conn, config));

    let listener = TcpListener::bind(addr).await?;
    info!("idcard-hub listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("idcard-hub stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_path() {
        assert_eq!(config_path_from(&args(&["idcard-hub"])), DEFAULT_CONFIG);
        assert_eq!(
            config_path_from(&args(&["idcard-hub", "-config", "/etc/cards.toml"])),
            "/etc/cards.toml"
        );
        // Dangling flag keeps the default
        assert_eq!(config_path_from(&args(&["idcard-hub", "-config"])), DEFAULT_CONFIG);
    }
}
