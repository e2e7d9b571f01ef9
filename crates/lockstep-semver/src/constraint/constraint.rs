//! Single version constraint implementation

use std::fmt;

use super::Operator;
use crate::comparator::version_compare;

/// A single version constraint (e.g., ">= 1.0.0.0")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SingleConstraint {
    operator: Operator,
    version: String,
}

impl SingleConstraint {
    pub fn new(operator: Operator, version: impl Into<String>) -> Self {
        Self {
            operator,
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn matches_version(&self, version: &str) -> bool {
        version_compare(version, &self.version, self.operator)
    }

    /// Whether this constraint and `provider` have at least one version in common
    pub fn match_specific(&self, provider: &SingleConstraint) -> bool {
        let is_equal_op = self.operator == Operator::Equal;
        let is_non_equal_op = self.operator == Operator::NotEqual;
        let is_provider_equal_op = provider.operator == Operator::Equal;
        let is_provider_non_equal_op = provider.operator == Operator::NotEqual;

        if is_non_equal_op || is_provider_non_equal_op {
            if is_non_equal_op
                && !is_provider_non_equal_op
                && !is_provider_equal_op
                && provider.version.starts_with("dev-")
            {
                return false;
            }
            if is_provider_non_equal_op
                && !is_non_equal_op
                && !is_equal_op
                && self.version.starts_with("dev-")
            {
                return false;
            }
            if !is_equal_op && !is_provider_equal_op {
                return true;
            }
            return version_compare(&provider.version, &self.version, Operator::NotEqual);
        }

        let own_direction = self.operator.direction();
        let provider_direction = provider.operator.direction();

        // both open towards the same side: always overlap
        if own_direction.is_some() && own_direction == provider_direction {
            return !(self.version.starts_with("dev-") || provider.version.starts_with("dev-"));
        }

        let (left, right, operator) = if is_equal_op {
            (&self.version, &provider.version, provider.operator)
        } else {
            (&provider.version, &self.version, self.operator)
        };

        if !version_compare(left, right, operator) {
            return false;
        }

        // opposite directions meeting at the same version need both bounds inclusive
        if own_direction.is_some()
            && provider_direction.is_some()
            && version_compare(&provider.version, &self.version, Operator::Equal)
        {
            return self.operator.is_inclusive() && provider.operator.is_inclusive();
        }

        true
    }
}

impl fmt::Display for SingleConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(op: Operator, v: &str) -> SingleConstraint {
        SingleConstraint::new(op, v)
    }

    #[test]
    fn test_display() {
        assert_eq!(c(Operator::GreaterThanOrEqual, "1.0.0.0").to_string(), ">= 1.0.0.0");
    }

    #[test]
    fn test_match_specific_exact() {
        let gt = c(Operator::GreaterThan, "1.0.0.0");
        assert!(gt.match_specific(&c(Operator::Equal, "2.0.0.0")));
        assert!(!gt.match_specific(&c(Operator::Equal, "0.5.0.0")));
    }

    #[test]
    fn test_match_specific_opposite_directions() {
        let ge2 = c(Operator::GreaterThanOrEqual, "2.0.0.0");
        assert!(ge2.match_specific(&c(Operator::LessThanOrEqual, "2.0.0.0")));
        assert!(!ge2.match_specific(&c(Operator::LessThan, "2.0.0.0")));
        assert!(!ge2.match_specific(&c(Operator::LessThan, "1.0.0.0")));
        assert!(ge2.match_specific(&c(Operator::LessThan, "3.0.0.0")));
    }

    #[test]
    fn test_match_specific_same_direction() {
        assert!(c(Operator::GreaterThan, "5.0.0.0").match_specific(&c(Operator::GreaterThanOrEqual, "1.0.0.0")));
        assert!(c(Operator::LessThan, "1.0.0.0").match_specific(&c(Operator::LessThan, "9.0.0.0")));
    }

    #[test]
    fn test_match_specific_not_equal() {
        let ne = c(Operator::NotEqual, "1.0.0.0");
        assert!(!ne.match_specific(&c(Operator::Equal, "1.0.0.0")));
        assert!(ne.match_specific(&c(Operator::Equal, "1.1.0.0")));
        assert!(ne.match_specific(&c(Operator::GreaterThan, "1.0.0.0")));
    }

    #[test]
    fn test_branches() {
        let branch = c(Operator::Equal, "dev-main");
        assert!(branch.match_specific(&c(Operator::Equal, "dev-main")));
        assert!(!branch.match_specific(&c(Operator::GreaterThanOrEqual, "1.0.0.0")));
        assert!(branch.matches_version("dev-main"));
        assert!(!branch.matches_version("dev-feature"));
    }
}
