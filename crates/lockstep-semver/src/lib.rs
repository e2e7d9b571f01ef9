//! Version handling for lockstep.
//!
//! Provides Composer-compatible version normalization, stability tiers,
//! constraint parsing and matching. Normalized versions are plain strings
//! (`1.2.3.0`, `1.0.0.0-beta2`, `dev-main`) compared with [`compare_versions`].

mod comparator;
mod constraint;
mod error;
mod stability;
mod version_parser;

pub use comparator::{compare_versions, version_compare};
pub use constraint::{Constraint, Operator, SingleConstraint};
pub use error::VersionError;
pub use stability::Stability;
pub use version_parser::VersionParser;
