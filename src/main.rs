use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use chessboard_api::config::Config;
use chessboard_api::coordinator::PositionCoordinator;
use chessboard_api::engine::uci::UciEngine;
use chessboard_api::logging;
use chessboard_api::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    logging::init(&config.log_level, config.log_file())?;

    let engine_path = config.resolve_engine_path().map_err(|err| {
        error!("{err}");
        err
    })?;
    info!("using engine {}", engine_path.display());

    let engine = UciEngine::spawn(&engine_path, config.engine_options()).await?;
    let coordinator = Arc::new(PositionCoordinator::new(engine).await?);

    let cors = server::cors_layer(&config.cors_origin)?;

    let served = server::run_http(&config.bind, coordinator.clone(), cors).await;

    match Arc::try_unwrap(coordinator) {
        Ok(coordinator) => coordinator.into_engine().quit().await,
        Err(_) => warn!("engine still in use at shutdown, leaving it to exit with the process"),
    }

    served?;
    Ok(())
}
