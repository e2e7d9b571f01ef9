//! Version constraints.
//!
//! A [`Constraint`] is an immutable predicate over normalized versions. It
//! can be tested against a concrete version ([`Constraint::matches_version`])
//! or against another constraint to check whether the two ranges intersect
//! ([`Constraint::matches`]).

#[allow(clippy::module_inception)]
mod constraint;

use std::fmt;
use std::str::FromStr;

pub use constraint::SingleConstraint;

use crate::VersionError;

/// Comparison operator of a single constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }

    pub fn supported_operators() -> &'static [&'static str] {
        &["=", "==", "<", "<=", ">", ">=", "<>", "!="]
    }

    /// Which side of a version the operator opens towards, if any.
    pub(crate) fn direction(self) -> Option<bool> {
        match self {
            Operator::LessThan | Operator::LessThanOrEqual => Some(false),
            Operator::GreaterThan | Operator::GreaterThanOrEqual => Some(true),
            _ => None,
        }
    }

    pub(crate) fn is_inclusive(self) -> bool {
        matches!(self, Operator::LessThanOrEqual | Operator::GreaterThanOrEqual)
    }
}

impl FromStr for Operator {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "=" | "==" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            _ => Err(VersionError::InvalidOperator {
                operator: s.to_string(),
                expected: Self::supported_operators().join(", "),
            }),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over normalized versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Matches every version
    Any,
    /// Matches nothing
    None,
    Single(SingleConstraint),
    /// AND (`conjunctive`) or OR combination of constraints
    Multi {
        constraints: Vec<Constraint>,
        conjunctive: bool,
    },
}

impl Constraint {
    pub fn single(operator: Operator, version: impl Into<String>) -> Self {
        Constraint::Single(SingleConstraint::new(operator, version))
    }

    /// AND-combine constraints, simplifying trivial members away
    pub fn all_of(constraints: Vec<Constraint>) -> Self {
        if constraints.iter().any(Constraint::is_none) {
            return Constraint::None;
        }
        let mut constraints: Vec<_> = constraints.into_iter().filter(|c| !c.is_any()).collect();
        match constraints.len() {
            0 => Constraint::Any,
            1 => constraints.remove(0),
            _ => Constraint::Multi {
                constraints,
                conjunctive: true,
            },
        }
    }

    /// OR-combine constraints, simplifying trivial members away
    pub fn any_of(constraints: Vec<Constraint>) -> Self {
        if constraints.iter().any(Constraint::is_any) {
            return Constraint::Any;
        }
        let mut constraints: Vec<_> = constraints.into_iter().filter(|c| !c.is_none()).collect();
        match constraints.len() {
            0 => Constraint::None,
            1 => constraints.remove(0),
            _ => Constraint::Multi {
                constraints,
                conjunctive: false,
            },
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Constraint::Any)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Constraint::None)
    }

    /// Whether a normalized version satisfies this constraint
    pub fn matches_version(&self, version: &str) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::Single(c) => c.matches_version(version),
            Constraint::Multi {
                constraints,
                conjunctive: true,
            } => constraints.iter().all(|c| c.matches_version(version)),
            Constraint::Multi { constraints, .. } => {
                constraints.iter().any(|c| c.matches_version(version))
            }
        }
    }

    /// Whether some version can satisfy both `self` and `other`
    pub fn matches(&self, other: &Constraint) -> bool {
        match (self, other) {
            (Constraint::None, _) | (_, Constraint::None) => false,
            (Constraint::Any, _) | (_, Constraint::Any) => true,
            (Constraint::Single(a), Constraint::Single(b)) => a.match_specific(b),
            (
                Constraint::Multi {
                    constraints,
                    conjunctive: false,
                },
                _,
            ) => constraints.iter().any(|c| c.matches(other)),
            (
                Constraint::Multi {
                    conjunctive: true, ..
                },
                Constraint::Multi {
                    conjunctive: false, ..
                },
            ) => other.matches(self),
            (Constraint::Multi { constraints, .. }, _) => {
                constraints.iter().all(|c| c.matches(other))
            }
            (Constraint::Single(_), Constraint::Multi { .. }) => other.matches(self),
        }
    }

    /// Constraint satisfied by versions matching both sides
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        Constraint::all_of(vec![self.clone(), other.clone()])
    }

    pub fn pretty_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::None => f.write_str("[]"),
            Constraint::Single(c) => write!(f, "{}", c),
            Constraint::Multi {
                constraints,
                conjunctive,
            } => {
                let separator = if *conjunctive { " " } else { " || " };
                let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(separator))
            }
        }
    }
}
