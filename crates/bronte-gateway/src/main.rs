//! `bronte` binary entrypoint.
//!
//! Starts the Axum server using configuration from `bronte.{yml,json}` or
//! environment variables.

use bronte_gateway::serve;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to gateway-friendly info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = bronte_config::load_config(None)?;
    serve(config).await
}
