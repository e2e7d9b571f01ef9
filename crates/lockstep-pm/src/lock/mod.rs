//! Lock store: persists a resolution and checks whether it still matches
//! the manifest it was made for.

pub mod hash;
mod locker;
mod storage;

pub use locker::{LockSnapshot, Locker, README};
pub use storage::{to_pretty_json, JsonFile, LockGuard, LockStorage, MemoryStorage};
