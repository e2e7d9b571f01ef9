//! JSON documents read and written by lockstep: the lock file and the root
//! manifest.

mod lock;
mod manifest;

pub use lock::{LockAlias, LockFile, LockedPackage};
pub use manifest::RootManifest;
