use cirql::{
    cirql_server::CirqlServer, config::Config, error::Error, logging::init_logging,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config: Config = Config::load()?;
    let _guard = init_logging(&config.logging);
    info!("Starting cirql on port {}", config.server.port);

    let server = CirqlServer::builder().config(config).start_server().await?;

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Could not listen for shutdown signal: {}", err);
    }
    info!("Shutdown requested");
    server.shutdown().await;
    Ok(())
}
