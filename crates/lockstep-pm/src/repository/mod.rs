//! Repository collaborators.
//!
//! A repository answers one question: which versions of a package does it
//! know about. Fetching is async so network-backed implementations can live
//! behind the same trait; the in-tree implementations are in-memory.

mod array;
mod platform;
mod set;

pub use array::ArrayRepository;
pub use platform::PlatformRepository;
pub use set::RepositorySet;

use async_trait::async_trait;

use crate::package::Package;
use crate::Result;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Name used in logs and for repository priorities
    fn name(&self) -> &str;

    /// Every version of `name`, plus packages that provide or replace it.
    ///
    /// Failures are reported as `Error::DataSource` and are not retried by
    /// the caller.
    async fn fetch_versions(&self, name: &str) -> Result<Vec<Package>>;
}
