//! Object-store mount adapters.

use landsat_common::{LandsatConfig, LandsatError, LandsatResult};
use std::path::Path;
use std::process::{Command, Output};
use tracing::{debug, instrument};

/// Exposes a remote prefix as a local directory.
///
/// Calls block until the external driver returns.
pub trait MountAdapter: Send + Sync {
    /// Mount `bucket/remote_prefix` at `local_path`.
    fn mount(&self, bucket: &str, remote_prefix: &str, local_path: &Path) -> LandsatResult<()>;

    /// Unmount `local_path`. A path that is not mounted reports
    /// [`LandsatError::NotMounted`].
    fn unmount(&self, local_path: &Path) -> LandsatResult<()>;
}

/// Adapter driving `gcsfuse` / `fusermount` subprocesses.
#[derive(Debug, Clone)]
pub struct GcsFuseAdapter {
    mount_command: String,
    unmount_command: String,
}

impl Default for GcsFuseAdapter {
    fn default() -> Self {
        Self {
            mount_command: "gcsfuse".to_string(),
            unmount_command: "fusermount".to_string(),
        }
    }
}

impl GcsFuseAdapter {
    pub fn new(mount_command: impl Into<String>, unmount_command: impl Into<String>) -> Self {
        Self {
            mount_command: mount_command.into(),
            unmount_command: unmount_command.into(),
        }
    }

    pub fn from_config(config: &LandsatConfig) -> Self {
        Self::new(config.mount_command.clone(), config.unmount_command.clone())
    }
}

fn stderr_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr
    }
}

impl MountAdapter for GcsFuseAdapter {
    #[instrument(skip(self), fields(local = %local_path.display()))]
    fn mount(&self, bucket: &str, remote_prefix: &str, local_path: &Path) -> LandsatResult<()> {
        let remote = format!("gs://{}/{}", bucket, remote_prefix);
        let output = Command::new(&self.mount_command)
            .arg("--implicit-dirs")
            .arg("--only-dir")
            .arg(remote_prefix)
            .arg(bucket)
            .arg(local_path)
            .output()
            .map_err(|e| LandsatError::mount_failed(&remote, e.to_string()))?;

        if !output.status.success() {
            return Err(LandsatError::mount_failed(remote, stderr_text(&output)));
        }
        debug!("Mounted");
        Ok(())
    }

    #[instrument(skip(self), fields(local = %local_path.display()))]
    fn unmount(&self, local_path: &Path) -> LandsatResult<()> {
        let local = local_path.display().to_string();
        let output = Command::new(&self.unmount_command)
            .arg("-u")
            .arg(local_path)
            .output()
            .map_err(|e| LandsatError::mount_failed(&local, e.to_string()))?;

        if output.status.success() {
            debug!("Unmounted");
            return Ok(());
        }

        let message = stderr_text(&output);
        let lower = message.to_lowercase();
        if lower.contains("not mounted") || lower.contains("not found in /etc/mtab") {
            Err(LandsatError::NotMounted(local))
        } else {
            Err(LandsatError::mount_failed(local, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_a_mount_failure() {
        let adapter = GcsFuseAdapter::new("/nonexistent/gcsfuse", "/nonexistent/fusermount");
        let dir = std::env::temp_dir();

        let err = adapter.mount("bucket", "prefix", &dir).unwrap_err();
        assert!(matches!(err, LandsatError::MountFailed { ref prefix, .. } if prefix == "gs://bucket/prefix"));
        assert!(adapter.unmount(&dir).is_err());
    }

    #[test]
    fn test_non_zero_exit_is_a_mount_failure() {
        let adapter = GcsFuseAdapter::new("false", "false");
        let err = adapter
            .mount("bucket", "prefix", &std::env::temp_dir())
            .unwrap_err();
        assert!(matches!(err, LandsatError::MountFailed { .. }));
    }
}
