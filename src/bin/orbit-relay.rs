//! Orbit relay server entry point.

// crates.io
use color_eyre::Result;
// self
use orbit_relay::{config::RelayConfig, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	// A missing `.env` is normal outside development.
	let _ = dotenvy::dotenv();

	server::init_tracing();

	let config = RelayConfig::load()?;

	tracing::debug!(?config, "Configuration loaded.");

	server::serve(config).await
}
