use std::fmt;
use std::str::FromStr;

use crate::VersionError;

/// Maturity tier of a version.
///
/// Variants are ordered from most to least stable, so `Stable < Dev`.
/// The numeric priority matches the values Composer persists in lock files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Stability {
    #[default]
    Stable,
    RC,
    Beta,
    Alpha,
    Dev,
}

impl Stability {
    pub const ALL: [Stability; 5] = [
        Stability::Stable,
        Stability::RC,
        Stability::Beta,
        Stability::Alpha,
        Stability::Dev,
    ];

    /// Lock-file priority (lower = more stable)
    pub fn priority(self) -> u8 {
        match self {
            Stability::Stable => 0,
            Stability::RC => 5,
            Stability::Beta => 10,
            Stability::Alpha => 15,
            Stability::Dev => 20,
        }
    }

    pub fn from_priority(priority: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.priority() == priority)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stability::Stable => "stable",
            Stability::RC => "RC",
            Stability::Beta => "beta",
            Stability::Alpha => "alpha",
            Stability::Dev => "dev",
        }
    }

    /// True if `self` is allowed under a floor of `floor`.
    pub fn is_at_least_as_stable_as(self, floor: Stability) -> bool {
        self.priority() <= floor.priority()
    }
}

impl FromStr for Stability {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(Stability::Stable),
            "rc" => Ok(Stability::RC),
            "beta" => Ok(Stability::Beta),
            "alpha" => Ok(Stability::Alpha),
            "dev" => Ok(Stability::Dev),
            _ => Err(VersionError::InvalidStability(s.to_string())),
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_priority() {
        assert!(Stability::Stable < Stability::RC);
        assert!(Stability::Alpha < Stability::Dev);
        assert_eq!(Stability::Beta.priority(), 10);
        assert_eq!(Stability::from_priority(15), Some(Stability::Alpha));
        assert_eq!(Stability::from_priority(3), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("RC".parse::<Stability>().unwrap(), Stability::RC);
        assert_eq!("rc".parse::<Stability>().unwrap(), Stability::RC);
        assert_eq!("Dev".parse::<Stability>().unwrap(), Stability::Dev);
        assert!("nightly".parse::<Stability>().is_err());
    }

    #[test]
    fn test_floor() {
        assert!(Stability::Stable.is_at_least_as_stable_as(Stability::Beta));
        assert!(Stability::Beta.is_at_least_as_stable_as(Stability::Beta));
        assert!(!Stability::Dev.is_at_least_as_stable_as(Stability::Beta));
    }
}
