//! Composer-compatible version and constraint parsing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::{Constraint, Operator, Stability, VersionError};

const MODIFIER: &str = r"[._-]?(?:(stable|beta|b|RC|alpha|a|patch|pl|p)((?:[.-]?\d+)*)?)?([.-]?dev)?";

lazy_static! {
    static ref CLASSICAL: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{1,5}})(\.\d+)?(\.\d+)?(\.\d+)?{}$",
        MODIFIER
    ))
    .unwrap();
    static ref DATETIME: Regex = Regex::new(&format!(
        r"(?i)^v?(\d{{4}}(?:[.:-]?\d{{2}}){{1,6}}(?:[.:-]?\d{{1,3}}){{0,2}}){}$",
        MODIFIER
    ))
    .unwrap();
    static ref VERSION: Regex = Regex::new(&format!(
        r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?{}(?:\+[^\s]+)?$",
        MODIFIER
    ))
    .unwrap();
    static ref STABILITY_TAIL: Regex =
        Regex::new(&format!(r"(?i){}(?:\+.*)?$", MODIFIER)).unwrap();
    static ref MODIFIER_SUFFIX: Regex = Regex::new(&format!(r"(?i)-{}$", MODIFIER)).unwrap();
    static ref BRANCH: Regex =
        Regex::new(r"(?i)^v?(\d+)(\.(?:\d+|[xX*]))?(\.(?:\d+|[xX*]))?(\.(?:\d+|[xX*]))?$").unwrap();
    static ref DEV_SUFFIX: Regex = Regex::new(r"(?i)^(.*?)[.-]?dev$").unwrap();
    static ref ALIAS: Regex = Regex::new(r"^([^,\s]+) +as +([^,\s]+)$").unwrap();
    static ref FLAG_SUFFIX: Regex = Regex::new(r"(?i)@(?:stable|RC|beta|alpha|dev)$").unwrap();
    static ref BUILD_METADATA: Regex = Regex::new(r"^([^,\s+]+)\+[^\s]+$").unwrap();
    static ref CONSTRAINT_FLAG: Regex =
        Regex::new(r"(?i)^([^,\s]*?)@(stable|RC|beta|alpha|dev)$").unwrap();
    static ref EXPLICIT_FLAG: Regex = Regex::new(r"(?i)^[^@]*?@(stable|RC|beta|alpha|dev)$").unwrap();
    static ref REFERENCE: Regex = Regex::new(r"(?i)^(dev-[^,\s@]+?|[^,\s@]+?\.x-dev)#.+$").unwrap();
    static ref MATCH_ALL: Regex = Regex::new(r"(?i)^(v)?[xX*](\.[xX*])*$").unwrap();
    static ref WILDCARD: Regex = Regex::new(r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.[xX*])+$").unwrap();
    static ref HYPHEN: Regex = Regex::new(r"^(\S+) +- +(\S+)$").unwrap();
    static ref BASIC: Regex = Regex::new(r"^(<>|!=|>=?|<=?|==?)?\s*(.*)$").unwrap();
    static ref OPERATOR_ONLY: Regex = Regex::new(r"^(<>|!=|>=?|<=?|==?)$").unwrap();
    static ref OR_SPLIT: Regex = Regex::new(r"\s*\|\|?\s*").unwrap();
    static ref AND_SPLIT: Regex = Regex::new(r"[\s,]+").unwrap();
    static ref SINGLE_TOKEN: Regex = Regex::new(r"^[^,\s@]+$").unwrap();
}

/// Version string parser
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionParser;

impl VersionParser {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a version string to its canonical form (`1.2` → `1.2.0.0`).
    pub fn normalize(&self, version: &str) -> Result<String, VersionError> {
        let original = version.trim();
        let mut version = original.to_string();

        if let Some(caps) = ALIAS.captures(&version) {
            version = caps[1].to_string();
        }
        if let Some(m) = FLAG_SUFFIX.find(&version) {
            version.truncate(m.start());
        }
        if matches!(version.as_str(), "master" | "trunk" | "default") {
            version = format!("dev-{}", version);
        }
        if version.to_lowercase().starts_with("dev-") {
            return Ok(format!("dev-{}", &version[4..]));
        }
        if let Some(caps) = BUILD_METADATA.captures(&version) {
            version = caps[1].to_string();
        }

        if let Some(caps) = CLASSICAL.captures(&version) {
            let mut normalized = caps[1].to_string();
            for i in 2..=4 {
                normalized.push_str(caps.get(i).map(|m| m.as_str()).unwrap_or(".0"));
            }
            return Ok(Self::append_modifier(normalized, &caps, 5));
        }
        if let Some(caps) = DATETIME.captures(&version) {
            let normalized: String = caps[1]
                .chars()
                .map(|c| if c.is_ascii_digit() { c } else { '.' })
                .collect();
            return Ok(Self::append_modifier(normalized, &caps, 2));
        }

        if let Some(caps) = DEV_SUFFIX.captures(&version) {
            let normalized = Self::normalize_branch(&caps[1]);
            if !normalized.starts_with("dev-") {
                return Ok(normalized);
            }
        }

        Err(VersionError::InvalidVersion(original.to_string()))
    }

    fn append_modifier(mut version: String, caps: &Captures<'_>, index: usize) -> String {
        if let Some(modifier) = caps.get(index).map(|m| m.as_str()) {
            let modifier = modifier.to_lowercase();
            if modifier == "stable" {
                return version;
            }
            version.push('-');
            version.push_str(Self::expand_stability(&modifier));
            if let Some(number) = caps.get(index + 1) {
                version.push_str(number.as_str().trim_start_matches(['.', '-']));
            }
        }
        if caps.get(index + 2).is_some() {
            version.push_str("-dev");
        }
        version
    }

    fn expand_stability(modifier: &str) -> &str {
        match modifier {
            "a" => "alpha",
            "b" => "beta",
            "p" | "pl" => "patch",
            "rc" => "RC",
            other => other,
        }
    }

    /// Normalize a branch name; numeric branches become `x.y.9999999.9999999-dev`.
    pub fn normalize_branch(name: &str) -> String {
        let name = name.trim();
        if let Some(caps) = BRANCH.captures(name) {
            let mut version = String::new();
            for i in 1..=4 {
                match caps.get(i) {
                    Some(part) => version.push_str(&part.as_str().replace(['*', 'X'], "x")),
                    None => version.push_str(".x"),
                }
            }
            return format!("{}-dev", version.replace('x', "9999999"));
        }
        format!("dev-{}", name)
    }

    /// Stability tier of a version string (pretty or normalized)
    pub fn parse_stability(version: &str) -> Stability {
        let version = version.split('#').next().unwrap_or(version).to_lowercase();

        if version.starts_with("dev-") || version.ends_with("-dev") {
            return Stability::Dev;
        }

        let Some(caps) = STABILITY_TAIL.captures(&version) else {
            return Stability::Stable;
        };
        if caps.get(3).is_some() {
            return Stability::Dev;
        }
        match caps.get(1).map(|m| m.as_str()) {
            Some("beta") | Some("b") => Stability::Beta,
            Some("alpha") | Some("a") => Stability::Alpha,
            Some("rc") => Stability::RC,
            _ => Stability::Stable,
        }
    }

    pub fn normalize_stability(stability: &str) -> Result<Stability, VersionError> {
        stability.parse()
    }

    /// Parse a constraint expression such as `^1.2 || >=2.0,<2.5`.
    pub fn parse_constraints(&self, constraints: &str) -> Result<Constraint, VersionError> {
        let trimmed = constraints.trim();
        if trimmed.is_empty() {
            return Ok(Constraint::Any);
        }

        let mut or_groups = Vec::new();
        for or_part in OR_SPLIT.split(trimmed) {
            let or_part = or_part.trim();
            if or_part.is_empty() {
                return Err(invalid(constraints, "empty alternative"));
            }

            if HYPHEN.is_match(or_part) {
                or_groups.push(self.parse_constraint(or_part)?);
                continue;
            }

            let and_parts = split_and(or_part)
                .iter()
                .map(|part| self.parse_constraint(part))
                .collect::<Result<Vec<_>, _>>()?;
            or_groups.push(Constraint::all_of(and_parts));
        }

        Ok(Constraint::any_of(or_groups))
    }

    fn parse_constraint(&self, constraint: &str) -> Result<Constraint, VersionError> {
        let original = constraint;
        let mut constraint = constraint.trim().to_string();

        if let Some(caps) = ALIAS.captures(&constraint) {
            constraint = caps[1].to_string();
        }

        let mut stability_modifier: Option<String> = None;
        if let Some(caps) = CONSTRAINT_FLAG.captures(&constraint) {
            let flag = caps[2].to_lowercase();
            if flag != "stable" {
                stability_modifier = Some(Self::expand_stability(&flag).to_string());
            }
            constraint = if caps[1].is_empty() {
                "*".to_string()
            } else {
                caps[1].to_string()
            };
        }

        if let Some(caps) = REFERENCE.captures(&constraint) {
            constraint = caps[1].to_string();
        }

        if let Some(caps) = MATCH_ALL.captures(&constraint) {
            if caps.get(1).is_some() || caps.get(2).is_some() {
                return Ok(Constraint::single(Operator::GreaterThanOrEqual, "0.0.0.0-dev"));
            }
            return Ok(Constraint::Any);
        }

        if let Some(rest) = constraint.strip_prefix('~') {
            if rest.starts_with('>') {
                return Err(invalid(original, "the ~> operator is not supported, use ~ instead"));
            }
            let caps = VERSION
                .captures(rest)
                .ok_or_else(|| invalid(original, "invalid tilde range"))?;
            let position = if caps.get(4).is_some() {
                4
            } else if caps.get(3).is_some() {
                3
            } else if caps.get(2).is_some() {
                2
            } else {
                1
            };
            let low = self.normalize(&format!("{}{}", rest, dev_suffix(&caps, 5, 7)))?;
            let high = format!("{}-dev", manipulate_version(&caps, 1, (position - 1).max(1), 1));
            return Ok(range(low, high));
        }

        if let Some(rest) = constraint.strip_prefix('^') {
            let caps = VERSION
                .captures(rest)
                .ok_or_else(|| invalid(original, "invalid caret range"))?;
            let major = caps.get(1).map(|m| m.as_str());
            let minor = caps.get(2).map(|m| m.as_str());
            let patch = caps.get(3).map(|m| m.as_str());
            let position = if major != Some("0") || minor.is_none() {
                1
            } else if minor != Some("0") || patch.is_none() {
                2
            } else {
                3
            };
            let low = self.normalize(&format!("{}{}", rest, dev_suffix(&caps, 5, 7)))?;
            let high = format!("{}-dev", manipulate_version(&caps, 1, position, 1));
            return Ok(range(low, high));
        }

        if let Some(caps) = WILDCARD.captures(&constraint) {
            let position = if caps.get(3).is_some() {
                3
            } else if caps.get(2).is_some() {
                2
            } else {
                1
            };
            let low = format!("{}-dev", manipulate_version(&caps, 1, position, 0));
            let high = format!("{}-dev", manipulate_version(&caps, 1, position, 1));
            if low == "0.0.0.0-dev" {
                return Ok(Constraint::single(Operator::LessThan, high));
            }
            return Ok(range(low, high));
        }

        if let Some(caps) = HYPHEN.captures(&constraint) {
            let from = &caps[1];
            let to = &caps[2];
            let from_caps = VERSION
                .captures(from)
                .ok_or_else(|| invalid(original, "invalid lower bound of hyphen range"))?;
            let to_caps = VERSION
                .captures(to)
                .ok_or_else(|| invalid(original, "invalid upper bound of hyphen range"))?;

            let low = format!("{}{}", self.normalize(from)?, dev_suffix(&from_caps, 5, 7));
            let lower = Constraint::single(Operator::GreaterThanOrEqual, low);

            let fully_specified = to_caps.get(2).is_some() && to_caps.get(3).is_some();
            let upper = if fully_specified || to_caps.get(5).is_some() || to_caps.get(7).is_some() {
                Constraint::single(Operator::LessThanOrEqual, self.normalize(to)?)
            } else {
                self.normalize(to)?;
                let position = if to_caps.get(2).is_none() { 1 } else { 2 };
                let high = format!("{}-dev", manipulate_version(&to_caps, 1, position, 1));
                Constraint::single(Operator::LessThan, high)
            };
            return Ok(Constraint::all_of(vec![lower, upper]));
        }

        if let Some(caps) = BASIC.captures(&constraint) {
            let operator_str = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let raw_version = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let mut version = self
                .normalize(raw_version)
                .map_err(|e| invalid(original, &e.to_string()))?;
            let operator: Operator = operator_str.parse()?;

            if operator != Operator::Equal
                && stability_modifier.is_some()
                && Self::parse_stability(&version) == Stability::Stable
            {
                if let Some(modifier) = &stability_modifier {
                    version = format!("{}-{}", version, modifier);
                }
            } else if matches!(operator, Operator::LessThan | Operator::GreaterThanOrEqual)
                && !MODIFIER_SUFFIX.is_match(&raw_version.to_lowercase())
                && !raw_version.starts_with("dev-")
            {
                version.push_str("-dev");
            }

            return Ok(Constraint::single(operator, version));
        }

        Err(invalid(original, "unrecognized constraint"))
    }

    /// Stability implied by a root requirement constraint, if unstable.
    ///
    /// Explicit `@flag` suffixes win; otherwise the least stable version
    /// operand (`1.0.0-beta`, `dev-main`) is used.
    pub fn constraint_stability(constraint: &str) -> Option<Stability> {
        let parts: Vec<String> = OR_SPLIT
            .split(constraint.trim())
            .flat_map(split_and)
            .collect();

        let explicit = parts
            .iter()
            .filter_map(|part| EXPLICIT_FLAG.captures(part))
            .filter_map(|caps| caps[1].parse::<Stability>().ok())
            .max();
        if explicit.is_some() {
            return explicit;
        }

        parts
            .iter()
            .filter(|part| SINGLE_TOKEN.is_match(part))
            .map(|part| Self::parse_stability(part))
            .filter(|s| *s != Stability::Stable)
            .max()
    }
}

/// Split an AND group into single constraints, keeping operators attached
/// to their version and dropping `as <alias>` suffixes.
fn split_and(group: &str) -> Vec<String> {
    let tokens: Vec<&str> = AND_SPLIT.split(group.trim()).filter(|t| !t.is_empty()).collect();
    let mut parts = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token == "as" {
            i += 2;
            continue;
        }
        if OPERATOR_ONLY.is_match(token) && i + 1 < tokens.len() {
            parts.push(format!("{}{}", token, tokens[i + 1]));
            i += 2;
            continue;
        }
        parts.push(token.to_string());
        i += 1;
    }
    parts
}

fn dev_suffix(caps: &Captures<'_>, modifier: usize, dev: usize) -> &'static str {
    if caps.get(modifier).is_none() && caps.get(dev).is_none() {
        "-dev"
    } else {
        ""
    }
}

/// Bump the part at `position` (1-based) by `increment` and zero everything after it.
fn manipulate_version(caps: &Captures<'_>, first_group: usize, position: usize, increment: u64) -> String {
    let mut parts = [0u64; 4];
    for (i, part) in parts.iter_mut().enumerate() {
        *part = caps
            .get(first_group + i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
    }
    for i in (1..=4).rev() {
        if i > position {
            parts[i - 1] = 0;
        } else if i == position {
            parts[i - 1] += increment;
        }
    }
    format!("{}.{}.{}.{}", parts[0], parts[1], parts[2], parts[3])
}

fn range(low: String, high: String) -> Constraint {
    Constraint::all_of(vec![
        Constraint::single(Operator::GreaterThanOrEqual, low),
        Constraint::single(Operator::LessThan, high),
    ])
}

fn invalid(constraint: &str, reason: &str) -> VersionError {
    VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(v: &str) -> String {
        VersionParser::new().normalize(v).unwrap()
    }

    fn parse(c: &str) -> Constraint {
        VersionParser::new().parse_constraints(c).unwrap()
    }

    #[test]
    fn test_normalize_classical() {
        assert_eq!(normalize("1"), "1.0.0.0");
        assert_eq!(normalize("1.2"), "1.2.0.0");
        assert_eq!(normalize("v1.2.3"), "1.2.3.0");
        assert_eq!(normalize("1.2.3.4"), "1.2.3.4");
        assert_eq!(normalize("1.0.0-beta"), "1.0.0.0-beta");
        assert_eq!(normalize("1.0.0-beta.2"), "1.0.0.0-beta2");
        assert_eq!(normalize("1.0.0-rc1"), "1.0.0.0-RC1");
        assert_eq!(normalize("1.0.0-alpha3"), "1.0.0.0-alpha3");
        assert_eq!(normalize("1.0.0-p1"), "1.0.0.0-patch1");
        assert_eq!(normalize("1.0-dev"), "1.0.0.0-dev");
        assert_eq!(normalize("1.0.0-stable"), "1.0.0.0");
        assert_eq!(normalize("1.0.0+build.5"), "1.0.0.0");
        assert_eq!(normalize("0.1.10"), "0.1.10.0");
    }

    #[test]
    fn test_normalize_branches_and_aliases() {
        assert_eq!(normalize("dev-main"), "dev-main");
        assert_eq!(normalize("master"), "dev-master");
        assert_eq!(normalize("1.0.x-dev"), "1.0.9999999.9999999-dev");
        assert_eq!(normalize("2.x-dev"), "2.9999999.9999999.9999999-dev");
        assert_eq!(normalize("dev-main as 1.0.0"), "dev-main");
        assert_eq!(normalize("1.0.0@beta"), "1.0.0.0");
    }

    #[test]
    fn test_normalize_dates() {
        assert_eq!(normalize("20100102"), "20100102");
        assert_eq!(normalize("2010-01-02"), "2010.01.02");
    }

    #[test]
    fn test_normalize_invalid() {
        let parser = VersionParser::new();
        assert!(parser.normalize("").is_err());
        assert!(parser.normalize("not a version").is_err());
        assert!(parser.normalize("1.0.0-foo").is_err());
    }

    #[test]
    fn test_parse_stability() {
        assert_eq!(VersionParser::parse_stability("1.0.0"), Stability::Stable);
        assert_eq!(VersionParser::parse_stability("1.0.0.0-beta2"), Stability::Beta);
        assert_eq!(VersionParser::parse_stability("1.0.0-RC1"), Stability::RC);
        assert_eq!(VersionParser::parse_stability("1.0.0-alpha"), Stability::Alpha);
        assert_eq!(VersionParser::parse_stability("dev-main"), Stability::Dev);
        assert_eq!(VersionParser::parse_stability("1.0.x-dev"), Stability::Dev);
        assert_eq!(VersionParser::parse_stability("1.0.0-patch1"), Stability::Stable);
    }

    #[test]
    fn test_parse_caret() {
        let c = parse("^1.2");
        assert_eq!(c.to_string(), "[>= 1.2.0.0-dev < 2.0.0.0-dev]");
        assert!(c.matches_version("1.9.0.0"));
        assert!(!c.matches_version("2.0.0.0"));

        assert_eq!(parse("^0.3").to_string(), "[>= 0.3.0.0-dev < 0.4.0.0-dev]");
        assert_eq!(parse("^0.0.3").to_string(), "[>= 0.0.3.0-dev < 0.0.4.0-dev]");
        assert!(parse("^1.0").matches_version("1.0.0.0-beta"));
    }

    #[test]
    fn test_parse_tilde() {
        assert_eq!(parse("~1.2").to_string(), "[>= 1.2.0.0-dev < 2.0.0.0-dev]");
        assert_eq!(parse("~1.2.3").to_string(), "[>= 1.2.3.0-dev < 1.3.0.0-dev]");
        assert_eq!(parse("~1").to_string(), "[>= 1.0.0.0-dev < 2.0.0.0-dev]");
        assert!(VersionParser::new().parse_constraints("~>1.0").is_err());
    }

    #[test]
    fn test_parse_wildcards() {
        assert_eq!(parse("1.2.*").to_string(), "[>= 1.2.0.0-dev < 1.3.0.0-dev]");
        assert_eq!(parse("0.*").to_string(), "< 1.0.0.0-dev");
        assert!(parse("*").is_any());
        assert!(parse("").is_any());
    }

    #[test]
    fn test_parse_hyphen_range() {
        assert_eq!(parse("1.0 - 2.0").to_string(), "[>= 1.0.0.0-dev < 2.1.0.0-dev]");
        assert_eq!(parse("1.0.0 - 2.1.0").to_string(), "[>= 1.0.0.0-dev <= 2.1.0.0]");
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(parse(">=1.0").to_string(), ">= 1.0.0.0-dev");
        assert_eq!(parse("<1.1").to_string(), "< 1.1.0.0-dev");
        assert_eq!(parse(">1.0").to_string(), "> 1.0.0.0");
        assert_eq!(parse("1.0.0").to_string(), "== 1.0.0.0");
        assert_eq!(parse("!=1.0").to_string(), "!= 1.0.0.0");
        assert_eq!(parse(">= 1.0, < 2.0").to_string(), "[>= 1.0.0.0-dev < 2.0.0.0-dev]");
        assert_eq!(parse(">=1.0@beta").to_string(), ">= 1.0.0.0-beta");
    }

    #[test]
    fn test_parse_disjunction() {
        let c = parse("^1.0 || ^3.0");
        assert!(c.matches_version("1.5.0.0"));
        assert!(c.matches_version("3.0.0.0"));
        assert!(!c.matches_version("2.0.0.0"));
        assert!(parse("1.0.0|2.0.0").matches_version("2.0.0.0"));
    }

    #[test]
    fn test_parse_branches() {
        assert!(parse("dev-main").matches_version("dev-main"));
        assert!(parse("dev-main as 1.0.0").matches_version("dev-main"));
        assert!(parse("dev-main#abc123").matches_version("dev-main"));
        assert!(parse("1.0.x-dev").matches_version("1.0.9999999.9999999-dev"));
    }

    #[test]
    fn test_parse_invalid() {
        let parser = VersionParser::new();
        assert!(parser.parse_constraints("foo bar").is_err());
        assert!(parser.parse_constraints(">=").is_err());
    }

    #[test]
    fn test_constraint_stability() {
        assert_eq!(VersionParser::constraint_stability("^1.0"), None);
        assert_eq!(VersionParser::constraint_stability("^1.0@dev"), Some(Stability::Dev));
        assert_eq!(VersionParser::constraint_stability("1.0.0-beta2"), Some(Stability::Beta));
        assert_eq!(VersionParser::constraint_stability("dev-main as 1.0.0"), Some(Stability::Dev));
        assert_eq!(
            VersionParser::constraint_stability("^1.0@RC || 2.0.0-alpha"),
            Some(Stability::RC)
        );
        assert_eq!(VersionParser::constraint_stability("@stable"), Some(Stability::Stable));
    }
}
