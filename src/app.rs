use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "lm-evaluation-harness";
pub const MOUNT_DIR: &str = "/root/lm-eval-results";
pub const VOLUME_NAME: &str = "evaluation-results";
pub const HF_SECRET_NAME: &str = "my-huggingface-secret";
pub const GPU_CLASS: &str = "A100";
pub const JOB_TIMEOUT_SECS: u64 = 7200;

const HARNESS_REPO: &str = "https://github.com/EleutherAI/lm-evaluation-harness";

/// One step of a container image build plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BuildStep {
    AptInstall { packages: Vec<String> },
    RunCommand { command: String },
}

/// Declarative container image: base OS, pinned interpreter, build steps.
/// Pure data; the platform builds it, build failures never reach this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSpec {
    pub base: String,
    pub python_version: String,
    pub steps: Vec<BuildStep>,
}

impl ImageSpec {
    pub fn debian_slim(python_version: &str) -> Self {
        Self {
            base: "debian-slim".to_string(),
            python_version: python_version.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn apt_install(mut self, packages: &[&str]) -> Self {
        self.steps.push(BuildStep::AptInstall {
            packages: packages.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn run_command(mut self, command: &str) -> Self {
        self.steps.push(BuildStep::RunCommand {
            command: command.to_string(),
        });
        self
    }

    /// Flattens the image into ordered build-plan lines for logging.
    pub fn render_plan(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "FROM {} (python {})",
            self.base, self.python_version
        )];
        for step in &self.steps {
            match step {
                BuildStep::AptInstall { packages } => {
                    lines.push(format!("APT {}", packages.join(" ")));
                }
                BuildStep::RunCommand { command } => {
                    lines.push(format!("RUN {}", command));
                }
            }
        }
        lines
    }
}

/// Named durable volume the harness writes its result artifacts into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub create_if_missing: bool,
}

/// The full deployment declaration: image, volume mount, GPU class,
/// timeout ceiling, and the platform-injected model-hub secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    pub image: ImageSpec,
    pub volume: VolumeSpec,
    pub mount_dir: PathBuf,
    pub gpu: String,
    pub timeout_secs: u64,
    pub secrets: Vec<String>,
}

impl Default for AppSpec {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            image: ImageSpec::debian_slim("3.11").apt_install(&["git"]).run_command(&format!(
                "git clone --depth 1 {} && cd lm-evaluation-harness && pip install -e .",
                HARNESS_REPO
            )),
            volume: VolumeSpec {
                name: VOLUME_NAME.to_string(),
                create_if_missing: true,
            },
            mount_dir: PathBuf::from(MOUNT_DIR),
            gpu: GPU_CLASS.to_string(),
            timeout_secs: JOB_TIMEOUT_SECS,
            secrets: vec![HF_SECRET_NAME.to_string()],
        }
    }
}

impl AppSpec {
    pub fn log_declaration(&self) {
        tracing::info!("App: {} (gpu {}, timeout {}s)", self.name, self.gpu, self.timeout_secs);
        tracing::info!(
            "Volume: {} mounted at {} (create_if_missing: {})",
            self.volume.name,
            self.mount_dir.display(),
            self.volume.create_if_missing
        );
        tracing::info!("Secrets: {}", self.secrets.join(", "));
        for line in self.image.render_plan() {
            tracing::info!("Image: {}", line);
        }
    }
}
