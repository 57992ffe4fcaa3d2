//! Scoped mount leases.

use catalog::Metadata;
use landsat_common::LandsatResult;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::manager::{MountManager, MountTarget};

/// Holds one holder key on a set of mounts and releases them on drop.
pub struct SceneLease {
    manager: Arc<MountManager>,
    holder: String,
    targets: Vec<MountTarget>,
}

impl SceneLease {
    /// Empty lease with a fresh holder key.
    pub fn new(manager: Arc<MountManager>) -> Self {
        Self {
            manager,
            holder: Uuid::new_v4().to_string(),
            targets: Vec::new(),
        }
    }

    /// Mount every scene's directory. On failure the mounts taken so far are
    /// released and the error returned.
    pub fn acquire_scenes(manager: Arc<MountManager>, scenes: &[Metadata]) -> LandsatResult<Self> {
        let mut lease = Self::new(manager);
        for scene in scenes {
            lease.add(MountTarget::for_scene(scene))?;
        }
        Ok(lease)
    }

    /// Add one target to the lease.
    pub fn add(&mut self, target: MountTarget) -> LandsatResult<()> {
        if self.targets.contains(&target) {
            return Ok(());
        }
        self.manager.acquire(&target, &self.holder)?;
        self.targets.push(target);
        Ok(())
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn targets(&self) -> &[MountTarget] {
        &self.targets
    }

    /// Release now instead of at drop, reporting the first error.
    pub fn release(mut self) -> LandsatResult<()> {
        let mut first_error = None;
        for target in std::mem::take(&mut self.targets) {
            if let Err(e) = self.manager.release(&target, &self.holder, false) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for SceneLease {
    fn drop(&mut self) {
        for target in self.targets.drain(..) {
            debug!(holder = %self.holder, prefix = %target.key(), "Releasing lease");
            if let Err(e) = self.manager.release(&target, &self.holder, false) {
                warn!(prefix = %target.key(), error = %e, "Failed to release mount");
            }
        }
    }
}

impl std::fmt::Debug for SceneLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLease")
            .field("holder", &self.holder)
            .field("targets", &self.targets)
            .finish()
    }
}
