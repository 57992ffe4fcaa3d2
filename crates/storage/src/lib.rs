//! Object-store mounts for Landsat scenes.
//!
//! Provides:
//! - [`MountAdapter`]: the external FUSE driver seam, with a `gcsfuse` implementation
//! - [`MountManager`]: reference-counted, at-most-one mount per remote prefix
//! - [`SceneLease`]: scoped ownership of mounts, released on drop

pub mod adapter;
pub mod lease;
pub mod manager;

pub use adapter::{GcsFuseAdapter, MountAdapter};
pub use lease::SceneLease;
pub use manager::{global, init, shutdown, MountManager, MountTarget};
