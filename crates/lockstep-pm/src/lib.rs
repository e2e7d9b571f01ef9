//! Dependency resolution core for lockstep.
//!
//! Turns a root manifest plus repository metadata into a deterministic set of
//! package versions, an ordered transaction, and a lock record that can later
//! be checked for freshness.
//!
//! ```ignore
//! use lockstep_pm::{Config, Resolver, RepositorySet};
//!
//! let request = manifest.to_request()?;
//! let pool = repositories.load_pool(&request).await?;
//! let resolution = Resolver::new(Config::default()).resolve(&pool, &request)?;
//! ```

pub mod config;
pub mod error;
pub mod json;
pub mod lock;
pub mod package;
pub mod repository;
pub mod resolver;
pub mod solver;
pub mod util;

pub use config::Config;
pub use error::{Error, InvariantViolation, Result};
pub use lock::{JsonFile, LockSnapshot, LockStorage, Locker, MemoryStorage};
pub use package::{AliasPackage, Package};
pub use repository::{ArrayRepository, PlatformRepository, Repository, RepositorySet};
pub use resolver::{Resolution, Resolver, UpdateMode};

/// Version tag written to `plugin-api-version` in lock files.
pub const PLUGIN_API_VERSION: &str = "2.6.0";

/// Version reported for the `composer-runtime-api` platform package.
pub const RUNTIME_API_VERSION: &str = "2.2.2";
