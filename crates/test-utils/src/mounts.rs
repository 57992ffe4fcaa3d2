//! Mount adapter that records calls instead of running a FUSE driver.

use landsat_common::{LandsatError, LandsatResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use storage::MountAdapter;

#[derive(Debug, Default)]
pub struct CountingMountAdapter {
    mounted: Mutex<HashSet<PathBuf>>,
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
    failing_prefix: Option<String>,
    busy_unmounts: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingMountAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every mount whose remote prefix contains `prefix`.
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefix = Some(prefix.into());
        self
    }

    /// Fail the next `count` unmounts as if the mount were still in use.
    pub fn with_busy_unmounts(self, count: usize) -> Self {
        self.busy_unmounts.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep inside every mount, widening race windows in concurrency tests.
    pub fn with_mount_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Successful mounts so far.
    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    /// Successful unmounts so far.
    pub fn unmounts(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self, local_path: &Path) -> bool {
        self.mounted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(local_path)
    }
}

impl MountAdapter for CountingMountAdapter {
    fn mount(&self, bucket: &str, remote_prefix: &str, local_path: &Path) -> LandsatResult<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(failing) = &self.failing_prefix {
            if remote_prefix.contains(failing.as_str()) {
                return Err(LandsatError::mount_failed(
                    format!("gs://{}/{}", bucket, remote_prefix),
                    "injected failure",
                ));
            }
        }

        let mut mounted = self.mounted.lock().unwrap_or_else(|p| p.into_inner());
        if !mounted.insert(local_path.to_path_buf()) {
            return Err(LandsatError::mount_failed(
                local_path.display().to_string(),
                "already mounted",
            ));
        }
        self.mounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unmount(&self, local_path: &Path) -> LandsatResult<()> {
        let busy = self
            .busy_unmounts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(LandsatError::mount_failed(
                local_path.display().to_string(),
                "device busy",
            ));
        }

        let mut mounted = self.mounted.lock().unwrap_or_else(|p| p.into_inner());
        if !mounted.remove(local_path) {
            return Err(LandsatError::NotMounted(local_path.display().to_string()));
        }
        self.unmounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
