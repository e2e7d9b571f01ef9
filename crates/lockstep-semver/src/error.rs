use thiserror::Error;

/// Errors raised while parsing versions, constraints or stabilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),

    #[error("Could not parse version constraint {constraint}: {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("Invalid operator \"{operator}\", expected one of: {expected}")]
    InvalidOperator { operator: String, expected: String },

    #[error("Invalid stability \"{0}\", expected one of: stable, RC, beta, alpha, dev")]
    InvalidStability(String),
}
