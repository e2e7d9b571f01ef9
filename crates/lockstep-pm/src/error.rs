use std::time::Duration;

use lockstep_semver::VersionError;
use thiserror::Error;

use crate::solver::ProblemSet;

/// Broken preconditions. Always fatal to the current call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("fixed package {name} {version} is not present in the pool")]
    FixedPackageMissing { name: String, version: String },

    #[error("package {name} has no version")]
    PackageWithoutVersion { name: String },

    #[error("a package without a name cannot be locked")]
    PackageWithoutName,

    #[error("dependency cycle between {}", packages.join(", "))]
    DependencyCycle { packages: Vec<String> },

    #[error("no lock file is present, locked packages cannot be read")]
    NotLocked,

    #[error("solver reached an inconsistent state: {0}")]
    SolverState(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InputInvariant(#[from] InvariantViolation),

    #[error("dependencies could not be resolved: {0}")]
    Unsatisfiable(ProblemSet),

    #[error("search exhausted after {steps} steps in {elapsed:?} without reaching a result")]
    SearchExhausted { steps: u64, elapsed: Duration },

    #[error("resolution cancelled")]
    Cancelled,

    #[error("the lock file is not up to date with the manifest")]
    StaleLock,

    #[error("repository {repository} failed: {message}")]
    DataSource { repository: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Version(#[from] VersionError),
}

impl Error {
    pub fn data_source(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DataSource {
            repository: repository.into(),
            message: message.into(),
        }
    }

    /// The problems behind an unsatisfiable result, if that is what this is.
    pub fn problems(&self) -> Option<&ProblemSet> {
        match self {
            Error::Unsatisfiable(problems) => Some(problems),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
