//! An authenticated item service with axum.

use axum_items::{
    app,
    infra::{config, database::Storage, logging},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let config = config::load_config()?;
    let _guard = logging::init_logging(&config.logging)?;

    let storage = Storage::connect(&config).await?;

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.server.http_address, config.server.http_port
    ))
    .await?;
    app::run_app(listener, storage, config).await?;

    Ok(())
}
