pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use time::OffsetDateTime;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = clause_cli::VERSION,
	rename_all = "kebab",
	styles = clause_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = clause_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let state = AppState::new(config).await?;
	let _refresh = spawn_catalog_refresh(&state);
	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app).await?;

	Ok(())
}

/// Periodically reloads the facet catalog and drops dead sessions. Disabled when the interval is
/// zero.
pub fn spawn_catalog_refresh(state: &AppState) -> Option<JoinHandle<()>> {
	let interval_secs = state.service.cfg.catalog.refresh_interval_secs;

	if interval_secs == 0 {
		return None;
	}

	let state = state.clone();

	Some(tokio::spawn(async move {
		let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

		loop {
			ticker.tick().await;

			if let Err(err) = state.service.refresh_catalog().await {
				tracing::warn!(error = %err, "Background catalog refresh failed.");
			}

			let pruned =
				state.sessions.prune(OffsetDateTime::now_utc(), state.service.session_ttl()).await;

			if pruned > 0 {
				tracing::debug!(pruned, "Dropped expired sessions.");
			}
		}
	}))
}

fn init_tracing(config: &clause_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
