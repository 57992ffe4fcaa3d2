//! Reference-counted mount manager.
//!
//! Each remote prefix has one entry holding the set of holder keys. The first
//! holder triggers the external mount; the last release (or a forced one)
//! triggers the unmount. Acquire/release on the same prefix serialize on the
//! entry's lock; different prefixes proceed in parallel.

use catalog::Metadata;
use landsat_common::{LandsatError, LandsatResult};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, info, instrument, warn};

use crate::adapter::MountAdapter;

/// A remote prefix and the local directory it is mounted at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountTarget {
    pub bucket: String,
    pub remote_prefix: String,
    pub local_path: PathBuf,
}

impl MountTarget {
    pub fn new(
        bucket: impl Into<String>,
        remote_prefix: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            remote_prefix: remote_prefix.into(),
            local_path: local_path.into(),
        }
    }

    /// The directory holding a scene's files.
    pub fn for_scene(scene: &Metadata) -> Self {
        Self::new(scene.bucket(), scene.remote_prefix(), scene.full_mount_path())
    }

    /// Identity of the mount: `bucket/prefix`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.bucket, self.remote_prefix)
    }
}

impl fmt::Display for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key(), self.local_path.display())
    }
}

#[derive(Debug)]
struct MountEntry {
    target: MountTarget,
    holders: BTreeSet<String>,
    /// Set once the entry has left the registry; lockers must look it up again.
    retired: bool,
}

/// Process-wide registry of active mounts.
pub struct MountManager {
    adapter: Arc<dyn MountAdapter>,
    entries: Mutex<HashMap<String, Arc<Mutex<MountEntry>>>>,
}

/// Lock a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn dir_is_empty(path: &Path) -> LandsatResult<bool> {
    Ok(std::fs::read_dir(path)?.next().is_none())
}

impl MountManager {
    pub fn new(adapter: Arc<dyn MountAdapter>) -> Self {
        Self {
            adapter,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, target: &MountTarget) -> Arc<Mutex<MountEntry>> {
        let mut entries = lock(&self.entries);
        entries
            .entry(target.key())
            .or_insert_with(|| {
                Arc::new(Mutex::new(MountEntry {
                    target: target.clone(),
                    holders: BTreeSet::new(),
                    retired: false,
                }))
            })
            .clone()
    }

    fn existing(&self, target: &MountTarget) -> Option<Arc<Mutex<MountEntry>>> {
        lock(&self.entries).get(&target.key()).cloned()
    }

    /// Drop a holder-less entry from the registry. Called with the entry locked.
    fn retire(&self, handle: &Arc<Mutex<MountEntry>>, entry: &mut MountEntry) {
        entry.retired = true;
        let key = entry.target.key();
        let mut entries = lock(&self.entries);
        if entries.get(&key).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            entries.remove(&key);
        }
    }

    /// Register `holder` on `target`, mounting it if it has no holder yet.
    ///
    /// Idempotent per `(target, holder)`. A missing local directory is
    /// created; a non-empty one is taken as already mounted.
    #[instrument(skip(self), fields(prefix = %target.key()))]
    pub fn acquire(&self, target: &MountTarget, holder: &str) -> LandsatResult<()> {
        loop {
            let handle = self.entry(target);
            let mut entry = lock(&handle);
            if entry.retired {
                continue;
            }

            if entry.holders.contains(holder) {
                return Ok(());
            }

            if entry.holders.is_empty() {
                if let Err(e) = self.mount(target) {
                    self.retire(&handle, &mut entry);
                    return Err(e);
                }
            }

            entry.holders.insert(holder.to_string());
            debug!(holders = entry.holders.len(), "Holder registered");
            return Ok(());
        }
    }

    fn mount(&self, target: &MountTarget) -> LandsatResult<()> {
        let local = &target.local_path;
        let needs_mount = if local.exists() {
            dir_is_empty(local)?
        } else {
            std::fs::create_dir_all(local)?;
            true
        };

        if needs_mount {
            info!(local = %local.display(), "Mounting remote prefix");
            self.adapter
                .mount(&target.bucket, &target.remote_prefix, local)?;
            counter!("landsat_mounts_total").increment(1);
        } else {
            debug!(local = %local.display(), "Local path not empty, treating as mounted");
        }
        Ok(())
    }

    /// Mount the directory of a scene.
    pub fn acquire_scene(&self, scene: &Metadata, holder: &str) -> LandsatResult<MountTarget> {
        let target = MountTarget::for_scene(scene);
        self.acquire(&target, holder)?;
        Ok(target)
    }

    /// Drop `holder` from `target`; unmount when no holder is left or `force` is set.
    ///
    /// Returns whether an unmount was attempted. An unmount of a path that is
    /// not mounted is not an error.
    #[instrument(skip(self), fields(prefix = %target.key()))]
    pub fn release(&self, target: &MountTarget, holder: &str, force: bool) -> LandsatResult<bool> {
        let Some(handle) = self.existing(target) else {
            return Ok(false);
        };
        let mut entry = lock(&handle);

        let removed = entry.holders.remove(holder);
        if !force && (!removed || !entry.holders.is_empty()) {
            return Ok(false);
        }

        let local = entry.target.local_path.clone();
        counter!("landsat_unmounts_total").increment(1);
        match self.adapter.unmount(&local) {
            Ok(()) => info!(local = %local.display(), "Unmounted remote prefix"),
            Err(LandsatError::NotMounted(path)) => debug!(path = %path, "Path was not mounted"),
            Err(e) => {
                // The mount is still live: keep the caller's claim on it.
                if removed {
                    entry.holders.insert(holder.to_string());
                }
                warn!(local = %local.display(), error = %e, "Unmount failed");
                return Err(e);
            }
        }

        entry.holders.clear();
        self.retire(&handle, &mut entry);
        Ok(true)
    }

    pub fn release_scene(&self, scene: &Metadata, holder: &str, force: bool) -> LandsatResult<bool> {
        self.release(&MountTarget::for_scene(scene), holder, force)
    }

    /// Whether any holder is registered on `target`.
    pub fn is_mounted(&self, target: &MountTarget) -> bool {
        self.existing(target)
            .map(|entry| {
                let entry = lock(&entry);
                !entry.holders.is_empty()
            })
            .unwrap_or(false)
    }

    pub fn is_scene_mounted(&self, scene: &Metadata) -> bool {
        self.is_mounted(&MountTarget::for_scene(scene))
    }

    /// Holder keys registered on `target`.
    pub fn holders(&self, target: &MountTarget) -> BTreeSet<String> {
        self.existing(target)
            .map(|entry| {
                let entry = lock(&entry);
                entry.holders.clone()
            })
            .unwrap_or_default()
    }

    /// Prefixes the registry currently tracks.
    pub fn tracked_prefixes(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Targets with at least one holder.
    pub fn mounted_targets(&self) -> Vec<MountTarget> {
        let entries: Vec<_> = lock(&self.entries).values().cloned().collect();
        let mut targets: Vec<MountTarget> = entries
            .iter()
            .filter_map(|entry| {
                let entry = lock(entry);
                (!entry.holders.is_empty()).then(|| entry.target.clone())
            })
            .collect();
        targets.sort_by_key(MountTarget::key);
        targets
    }

    /// Force-release every mount. Errors are logged, not returned.
    pub fn shutdown(&self) {
        for target in self.mounted_targets() {
            if let Err(e) = self.release(&target, "", true) {
                warn!(prefix = %target.key(), error = %e, "Failed to unmount at shutdown");
            }
        }
    }
}

impl fmt::Debug for MountManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountManager")
            .field("entries", &lock(&self.entries).len())
            .finish()
    }
}

static GLOBAL_MANAGER: OnceLock<Arc<MountManager>> = OnceLock::new();

/// Install the process-wide mount manager. A second call keeps the first.
pub fn init(adapter: Arc<dyn MountAdapter>) -> Arc<MountManager> {
    GLOBAL_MANAGER
        .get_or_init(|| Arc::new(MountManager::new(adapter)))
        .clone()
}

/// The process-wide mount manager, if initialized.
pub fn global() -> Option<Arc<MountManager>> {
    GLOBAL_MANAGER.get().cloned()
}

/// Force-release every mount of the process-wide manager.
pub fn shutdown() {
    if let Some(manager) = global() {
        manager.shutdown();
    }
}
