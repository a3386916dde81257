use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to the durable results volume. Passed into the dispatcher
/// explicitly so tests can substitute an in-memory double.
#[async_trait]
pub trait Volume: Send + Sync {
    fn mount_dir(&self) -> &Path;

    /// Makes writes under the mount dir persistent and visible to other
    /// consumers of the volume.
    async fn commit(&self) -> Result<()>;
}

/// A volume backed by a locally mounted directory. Commit flushes the
/// directory so artifacts survive the job being killed afterwards.
pub struct LocalVolume {
    mount: PathBuf,
}

impl LocalVolume {
    pub async fn open(mount: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(mount)
            .await
            .with_context(|| format!("Failed to create mount dir {}", mount.display()))?;
        Ok(Self {
            mount: mount.to_path_buf(),
        })
    }
}

#[async_trait]
impl Volume for LocalVolume {
    fn mount_dir(&self) -> &Path {
        &self.mount
    }

    async fn commit(&self) -> Result<()> {
        let dir = tokio::fs::File::open(&self.mount)
            .await
            .with_context(|| format!("Failed to open mount dir {}", self.mount.display()))?;
        dir.sync_all()
            .await
            .context("Failed to sync mount dir")?;
        debug!("Committed volume at {}", self.mount.display());
        Ok(())
    }
}
