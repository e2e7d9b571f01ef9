//! Ordering of normalized version strings.

use std::cmp::Ordering;

use crate::Operator;

/// Total order over normalized versions.
///
/// Numbered versions compare part by part with pre-release tags ordered
/// `dev < alpha < beta < RC < stable < patch`. `dev-*` branches sort below
/// every numbered version. Versions that are equivalent under PHP's
/// `version_compare` are finally ordered by their string form so that two
/// distinct normalized versions never compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_branch = a.starts_with("dev-");
    let b_branch = b.starts_with("dev-");

    match (a_branch, b_branch) {
        (true, true) => a.cmp(b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => php_compare(a, b).then_with(|| a.cmp(b)),
    }
}

/// Compare two normalized versions with an operator, the way constraints do.
///
/// Branch names are only comparable for (in)equality.
pub fn version_compare(a: &str, b: &str, operator: Operator) -> bool {
    let a_branch = a.starts_with("dev-");
    let b_branch = b.starts_with("dev-");

    if operator == Operator::NotEqual && (a_branch || b_branch) {
        return a != b;
    }
    if a_branch && b_branch {
        return operator == Operator::Equal && a == b;
    }
    if a_branch || b_branch {
        return false;
    }

    let cmp = php_compare(a, b);
    match operator {
        Operator::Equal => cmp == Ordering::Equal,
        Operator::NotEqual => cmp != Ordering::Equal,
        Operator::LessThan => cmp == Ordering::Less,
        Operator::LessThanOrEqual => cmp != Ordering::Greater,
        Operator::GreaterThan => cmp == Ordering::Greater,
        Operator::GreaterThanOrEqual => cmp != Ordering::Less,
    }
}

fn php_compare(a: &str, b: &str) -> Ordering {
    let a_parts = split_version(a);
    let b_parts = split_version(b);

    for i in 0..a_parts.len().max(b_parts.len()) {
        let a_part = a_parts.get(i).map(String::as_str).unwrap_or("");
        let b_part = b_parts.get(i).map(String::as_str).unwrap_or("");

        let cmp = compare_part(a_part, b_part);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    Ordering::Equal
}

#[derive(Clone, Copy, PartialEq)]
enum CharType {
    Digit,
    Alpha,
}

fn split_version(version: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev: Option<CharType> = None;

    for c in version.chars() {
        let kind = if c.is_ascii_digit() {
            CharType::Digit
        } else if c.is_alphabetic() {
            CharType::Alpha
        } else {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        };

        if prev.is_some_and(|p| p != kind) && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev = Some(kind);
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn compare_part(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(an), Ok(bn)) => an.cmp(&bn),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => special_order(a).cmp(&special_order(b)),
    }
}

fn special_order(s: &str) -> u8 {
    match s.to_lowercase().as_str() {
        "dev" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "rc" => 3,
        "patch" | "pl" | "p" => 5,
        _ => 4,
    }
}
