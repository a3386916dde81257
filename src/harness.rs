use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The fixed benchmark suite, run identically for every model.
pub const TASKS: [&str; 9] = [
    "medmcqa",
    "medqa_4options",
    "mmlu_anatomy",
    "mmlu_clinical_knowledge",
    "mmlu_college_biology",
    "mmlu_college_medicine",
    "mmlu_medical_genetics",
    "mmlu_professional_medicine",
    "pubmedqa",
];

/// A single `lm_eval` invocation for one pretrained model.
#[derive(Debug, Clone)]
pub struct EvalCommand {
    pub bin: String,
    pub model: String,
    pub device: String,
    pub batch_size: u32,
    pub output_path: PathBuf,
}

impl EvalCommand {
    pub fn new(bin: &str, model: &str, device: &str, batch_size: u32, output_path: &Path) -> Self {
        Self {
            bin: bin.to_string(),
            model: model.to_string(),
            device: device.to_string(),
            batch_size,
            output_path: output_path.to_path_buf(),
        }
    }

    pub fn model_args(&self) -> String {
        format!("pretrained={},trust_remote_code=True", self.model)
    }

    pub fn argv(&self) -> Vec<String> {
        vec![
            self.bin.clone(),
            "--model".into(),
            "hf".into(),
            "--model_args".into(),
            self.model_args(),
            "--tasks".into(),
            TASKS.join(","),
            "--device".into(),
            self.device.clone(),
            "--batch_size".into(),
            self.batch_size.to_string(),
            "--log_samples".into(),
            "--output_path".into(),
            self.output_path.to_string_lossy().into_owned(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Seam between the dispatcher and the harness CLI, so tests can record
/// invocations without spawning anything.
#[async_trait]
pub trait HarnessRunner: Send + Sync {
    async fn run(&self, cmd: &EvalCommand) -> Result<RunOutput>;
}

pub struct ProcessRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl HarnessRunner for ProcessRunner {
    async fn run(&self, cmd: &EvalCommand) -> Result<RunOutput> {
        let argv = cmd.argv();
        let (program, args) = argv.split_first().context("empty argv")?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // A timed-out harness must not keep holding the GPU while the
            // batch moves on to the next model.
            .kill_on_drop(true);

        let mut child = command.spawn().context("Failed to spawn harness process")?;

        // The harness may prompt for confirmation before executing remote
        // model code (trust_remote_code=True). Answer once, then close
        // stdin so a missing prompt cannot block the child.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"Y\n").await;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => anyhow::bail!("Process error: {}", e),
            Err(_) => anyhow::bail!("Harness timed out after {}s", self.timeout.as_secs()),
        };

        Ok(RunOutput {
            stdout: truncate_output(&output.stdout, self.max_output_bytes),
            stderr: truncate_output(&output.stderr, self.max_output_bytes),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

fn truncate_output(raw: &[u8], max: usize) -> String {
    if raw.len() <= max {
        String::from_utf8_lossy(raw).to_string()
    } else {
        let t = String::from_utf8_lossy(&raw[..max]).to_string();
        format!("{}\n\n... [truncated at {} bytes, total {}]", t, max, raw.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_for(model: &str) -> EvalCommand {
        EvalCommand::new("lm_eval", model, "cuda:0", 16, Path::new("/root/lm-eval-results"))
    }

    #[test]
    fn test_model_args() {
        let cmd = cmd_for("meta-llama/Llama-3.2-1B");
        assert_eq!(
            cmd.model_args(),
            "pretrained=meta-llama/Llama-3.2-1B,trust_remote_code=True"
        );
    }

    #[test]
    fn test_argv_shape() {
        let cmd = cmd_for("meta-llama/Llama-3.2-1B");
        let argv = cmd.argv();
        assert_eq!(argv[0], "lm_eval");
        assert_eq!(argv[1..3], ["--model".to_string(), "hf".to_string()]);
        assert_eq!(argv[3], "--model_args");
        assert_eq!(argv[4], "pretrained=meta-llama/Llama-3.2-1B,trust_remote_code=True");
        assert_eq!(argv[5], "--tasks");
        assert_eq!(
            argv[6],
            "medmcqa,medqa_4options,mmlu_anatomy,mmlu_clinical_knowledge,\
             mmlu_college_biology,mmlu_college_medicine,mmlu_medical_genetics,\
             mmlu_professional_medicine,pubmedqa"
        );
        assert_eq!(argv[7..9], ["--device".to_string(), "cuda:0".to_string()]);
        assert_eq!(argv[9..11], ["--batch_size".to_string(), "16".to_string()]);
        assert_eq!(argv[11], "--log_samples");
        assert_eq!(
            argv[12..14],
            ["--output_path".to_string(), "/root/lm-eval-results".to_string()]
        );
    }

    #[test]
    fn test_fixed_args_identical_across_models() {
        let a = cmd_for("org/model-a").argv();
        let b = cmd_for("org/model-b").argv();
        // Only the model_args element differs.
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            if i == 4 {
                assert_ne!(x, y);
            } else {
                assert_eq!(x, y);
            }
        }
    }

    #[test]
    fn test_truncate_output() {
        let small = vec![b'A'; 100];
        assert_eq!(truncate_output(&small, 1024).len(), 100);

        let big = vec![b'B'; 2048];
        let t = truncate_output(&big, 1024);
        assert!(t.contains("truncated at 1024 bytes"));
    }

    #[tokio::test]
    async fn test_process_runner_missing_executable() {
        let runner = ProcessRunner::new(Duration::from_secs(5), 1024);
        let cmd = EvalCommand::new(
            "definitely-not-a-real-binary-xyz",
            "org/model",
            "cuda:0",
            16,
            Path::new("/tmp"),
        );
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_timeout_kills_harness_process() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let marker = tmp.path().join("marker");
        let script = tmp.path().join("slow_harness.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch {}\n", marker.display()),
        )
        .expect("write script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("chmod script");
        }

        let runner = ProcessRunner::new(Duration::from_millis(200), 1024);
        let cmd = EvalCommand::new(
            &script.to_string_lossy(),
            "org/model",
            "cuda:0",
            16,
            Path::new("/tmp"),
        );
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));

        // The child is killed on timeout; give it time to prove it would
        // have written the marker had it survived.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_process_runner_reports_exit_code() {
        let runner = ProcessRunner::new(Duration::from_secs(5), 1024 * 1024);
        // `true` ignores the harness flags and the stdin confirmation.
        let cmd = EvalCommand::new("true", "org/model", "cuda:0", 16, Path::new("/tmp"));
        let out = runner.run(&cmd).await.expect("true should run");
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.is_empty());
    }
}
