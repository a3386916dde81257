mod app;
mod config;
mod dispatcher;
mod harness;
mod report;
mod volume;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::volume::Volume;

/// The batch to evaluate. Fixed at the source level; there is no
/// argument parsing on the job-submission surface.
const PRETRAINED_MODELS: &[&str] = &["meta-llama/Llama-3.2-1B"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lm_eval_dispatch=info".parse().unwrap()),
        )
        .init();

    let config = Arc::new(config::Config::from_env());
    config.print_banner();

    let app_spec = app::AppSpec::default();
    app_spec.log_declaration();

    let volume = Arc::new(volume::LocalVolume::open(&config.output_dir).await?);
    info!("Results volume ready at {}", volume.mount_dir().display());
    let runner = Arc::new(harness::ProcessRunner::new(
        Duration::from_secs(config.eval_timeout_secs),
        config.max_output_bytes,
    ));

    let models: Vec<String> = PRETRAINED_MODELS.iter().map(|m| m.to_string()).collect();
    let dispatcher = dispatcher::Dispatcher::new(config, runner, volume);
    let report = dispatcher.run(&models).await;

    // Failures are surfaced in the report, not as a process error; a
    // partially failed batch still exits cleanly.
    info!(
        "Report: {}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("<unserializable: {}>", e))
    );

    Ok(())
}
