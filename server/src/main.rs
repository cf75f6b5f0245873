use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    let world = config.load_world().map_err(|e| {
        error!("Failed to load map: {}", e);
        e
    })?;
    let catalog = config.load_catalog().map_err(|e| {
        error!("Failed to load monster catalog: {}", e);
        e
    })?;

    info!(
        "Starting server on {} (sync {} ms, AI {} ms, max {} clients)",
        config.bind_addr(),
        config.sync_interval_ms,
        config.ai_interval_ms,
        config.max_clients
    );

    let mut server = Server::new(&config, world, catalog).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
