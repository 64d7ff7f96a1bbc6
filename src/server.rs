//! HTTP front end: axum routes translating [`FetchResult`]s into JSON responses.
//!
//! Every satellite route resolves to one [`Endpoint`], runs it through the shared
//! [`ResilientFetch`](crate::fetch::ResilientFetch), and shapes the payload on the way out.
//! Cache provenance is reported through the `x-cache` header.

pub mod error;
pub mod routes;

pub use error::*;

// std
use std::net::SocketAddr;
// crates.io
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
// self
use crate::{
	_prelude::*,
	config::RelayConfig,
	error::PermanentError,
	fetch::{FetchResult, ReqwestResilientFetch},
	satellite::Endpoint,
};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Shared handler state; cloning is cheap.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Orchestrator shared by every request.
	pub fetch: ReqwestResilientFetch,
	/// Validated relay settings.
	pub config: Arc<RelayConfig>,
	base_url: Url,
	api_key: Arc<str>,
}
impl AppState {
	/// Builds state for `config`, failing fast when the API key or base URL is unusable.
	pub fn new(config: RelayConfig) -> Result<Self> {
		config.validate()?;

		let fetch = ReqwestResilientFetch::from_config(&config)?;

		Self::with_fetch(config, fetch)
	}

	/// Builds state around an existing orchestrator.
	pub fn with_fetch(config: RelayConfig, fetch: ReqwestResilientFetch) -> Result<Self> {
		let base_url = config.base_url()?;
		let api_key = Arc::from(config.api_key()?);

		Ok(Self { fetch, config: Arc::new(config), base_url, api_key })
	}

	/// Runs `endpoint` through the orchestrator under its logical key.
	///
	/// Payloads reporting an unknown satellite come back as a not-found failure.
	pub async fn fetch(&self, endpoint: Endpoint) -> FetchResult {
		let key = match endpoint.cache_key() {
			Ok(key) => key,
			Err(e) => return FetchResult::Failed(e.into()),
		};
		let result = self
			.fetch
			.resilient_fetch(
				&key,
				|| endpoint.url(&self.base_url, &self.config.observer, &self.api_key),
				self.config.cache_ttl(),
			)
			.await;

		match result.payload() {
			Some(payload) if endpoint.reports_no_results(payload) =>
				FetchResult::Failed(PermanentError::NoResults.into()),
			_ => result,
		}
	}
}

/// Builds the relay router with request tracing attached.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health))
		.route("/api/categories", get(routes::categories))
		.route("/api/config", get(routes::frontend_config))
		.route("/api/satellites/{category}", get(routes::satellites))
		.route("/api/satellite/{sat_id}", get(routes::position))
		.route("/api/satellite/{sat_id}/trajectory", get(routes::trajectory))
		.route("/api/satellite/{sat_id}/info", get(routes::info))
		.route("/api/search", get(routes::search))
		.fallback(routes::not_found)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Installs the global `tracing` subscriber, honouring `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_tracing() {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Binds `config.bind_addr` and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: RelayConfig) -> color_eyre::Result<()> {
	let addr = config.bind_addr.parse::<SocketAddr>()?;
	let state = AppState::new(config)?;

	tracing::info!(
		%addr,
		base_url = %state.base_url,
		cache_ttl_secs = state.config.cache_ttl_secs,
		min_interval_ms = state.config.min_interval_ms,
		max_attempts = state.fetch.retry.max_attempts(),
		"Orbit relay listening."
	);

	let listener = tokio::net::TcpListener::bind(addr).await?;

	axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("Orbit relay stopped.");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Ctrl-C handler could not be installed.");

			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "SIGTERM handler could not be installed.");

				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("Received Ctrl-C; shutting down."),
		_ = terminate => tracing::info!("Received SIGTERM; shutting down."),
	}
}
