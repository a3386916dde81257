use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::harness::{EvalCommand, HarnessRunner};
use crate::report::{JobReport, ModelRun, RunStatus};
use crate::volume::Volume;

pub struct Dispatcher {
    config: Arc<Config>,
    runner: Arc<dyn HarnessRunner>,
    volume: Arc<dyn Volume>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, runner: Arc<dyn HarnessRunner>, volume: Arc<dyn Volume>) -> Self {
        Self {
            config,
            runner,
            volume,
        }
    }

    /// Evaluates the given models strictly in order, one at a time. Each
    /// model gets one harness invocation followed by one volume commit,
    /// whether or not the invocation succeeded; a failing model never
    /// stops the batch.
    pub async fn run(&self, models: &[String]) -> JobReport {
        let job_id = uuid::Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now();
        info!("Job {}: dispatching {} model(s)", job_id, models.len());

        let mut runs = Vec::with_capacity(models.len());
        for model in models {
            runs.push(self.run_model(model).await);
        }

        let report = JobReport {
            job_id,
            started_at,
            finished_at: chrono::Utc::now(),
            runs,
        };
        info!(
            "Job {}: {} completed, {} failed",
            report.job_id,
            report.completed(),
            report.failed()
        );
        report
    }

    async fn run_model(&self, model: &str) -> ModelRun {
        let start = std::time::Instant::now();
        let cmd = EvalCommand::new(
            &self.config.harness_bin,
            model,
            &self.config.device,
            self.config.batch_size,
            &self.config.output_dir,
        );

        info!("[{}] Running: {}", model, cmd.argv().join(" "));

        let mut run = match self.runner.run(&cmd).await {
            Ok(out) => {
                info!("[{}] Output:\n{}", model, out.stdout);
                info!("[{}] Error:\n{}", model, out.stderr);
                let status = if out.exit_code == 0 {
                    RunStatus::Completed
                } else {
                    warn!("[{}] Harness exited with code {}", model, out.exit_code);
                    RunStatus::Failed
                };
                ModelRun {
                    model: model.to_string(),
                    status,
                    exit_code: Some(out.exit_code),
                    error: None,
                    duration_ms: 0,
                }
            }
            Err(e) => {
                warn!("[{}] Harness invocation failed: {:#}", model, e);
                ModelRun {
                    model: model.to_string(),
                    status: RunStatus::Failed,
                    exit_code: None,
                    error: Some(format!("{:#}", e)),
                    duration_ms: 0,
                }
            }
        };

        // Commit whatever the harness managed to write, so earlier models'
        // artifacts survive a later failure or a killed job.
        if let Err(e) = self.volume.commit().await {
            warn!("[{}] Volume commit failed: {:#}", model, e);
        }

        run.duration_ms = start.elapsed().as_millis() as u64;
        run
    }
}
