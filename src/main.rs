//! Salesforce OAuth relay server.

// crates.io
use color_eyre::Result;
// self
use sfdc_oauth_relay::{config::Config, flows::ReqwestRelay, obs, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing();

	let config = Config::from_env()?;

	config.warn_missing();

	let addr = config.bind_address;
	let relay = ReqwestRelay::from_config(config)?;

	server::serve(relay, addr).await?;

	Ok(())
}
