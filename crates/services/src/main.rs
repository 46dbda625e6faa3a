use anyhow::Context;

use ami_infra::AppConfig;
use ami_services::App;

// Workers and the blocking HTTP scorer run on plain threads; the async runtime
// only waits for Ctrl-C and is dropped before shutdown.
fn main() -> anyhow::Result<()> {
    ami_observability::init_from_env();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = App::from_config(config);
    app.start().context("failed to start worker pools")?;
    tracing::info!(concurrency = app.runtime.config().concurrency, "ami-worker running; press Ctrl-C to stop");

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    signals
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for shutdown signal")?;
    drop(signals);

    tracing::info!("shutdown requested");
    app.shutdown();
    Ok(())
}
