use std::path::PathBuf;

use crate::app;

const DEFAULT_HARNESS_BIN: &str = "lm_eval";
const DEFAULT_DEVICE: &str = "cuda:0";
const DEFAULT_BATCH_SIZE: u32 = 16;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub harness_bin: String,
    pub device: String,
    pub batch_size: u32,
    pub output_dir: PathBuf,
    pub eval_timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            harness_bin: std::env::var("HARNESS_BIN")
                .unwrap_or_else(|_| DEFAULT_HARNESS_BIN.into()),
            device: std::env::var("EVAL_DEVICE").unwrap_or_else(|_| DEFAULT_DEVICE.into()),
            batch_size: env_parse("EVAL_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            output_dir: PathBuf::from(
                std::env::var("OUTPUT_DIR").unwrap_or_else(|_| app::MOUNT_DIR.into()),
            ),
            eval_timeout_secs: env_parse("EVAL_TIMEOUT_SECS", app::JOB_TIMEOUT_SECS),
            max_output_bytes: env_parse("MAX_OUTPUT_BYTES", DEFAULT_MAX_OUTPUT_BYTES),
        }
    }

    pub fn print_banner(&self) {
        tracing::info!("╔══════════════════════════════════════════════════╗");
        tracing::info!("║          lm-eval-dispatch v{}                 ║", env!("CARGO_PKG_VERSION"));
        tracing::info!("╠══════════════════════════════════════════════════╣");
        tracing::info!("║  Harness bin:       {:<28}║", self.harness_bin);
        tracing::info!("║  Device:            {:<28}║", self.device);
        tracing::info!("║  Batch size:        {:<28}║", self.batch_size);
        tracing::info!("║  Output dir:        {:<28}║", self.output_dir.display());
        tracing::info!("║  Eval timeout:      {:<25}s ║", self.eval_timeout_secs);
        tracing::info!("╚══════════════════════════════════════════════════╝");

        // The platform injects the hub token from the secret named in the
        // app spec. Gated models will fail to load without it.
        if std::env::var("HF_TOKEN").is_err() {
            tracing::warn!(
                "HF_TOKEN is not set; secret '{}' may not be attached",
                app::HF_SECRET_NAME
            );
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
