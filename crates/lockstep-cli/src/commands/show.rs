//! Show command - list locked packages or the details of one.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::Value;

use lockstep_pm::json::{LockFile, LockedPackage};
use lockstep_pm::{Error, InvariantViolation};

use super::Project;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Package name to show details for
    #[arg(value_name = "PACKAGE")]
    pub package: Option<String>,

    /// Leave out packages only needed for development
    #[arg(long)]
    pub no_dev: bool,

    /// Only show direct dependencies
    #[arg(short = 'D', long)]
    pub direct: bool,

    /// Output as JSON
    #[arg(long)]
    pub format_json: bool,

    /// Working directory
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

pub async fn execute(args: ShowArgs) -> Result<i32> {
    let project = Project::load(&args.working_dir)?;
    let locker = project.locker();

    let lock = match locker.get_lock_data() {
        Ok(lock) => lock,
        Err(Error::InputInvariant(InvariantViolation::NotLocked)) => {
            println!(
                "{} No lock file found. Run 'lockstep resolve' first.",
                style("Info:").cyan()
            );
            return Ok(0);
        }
        Err(e) => return Err(e).context("Failed to read the lock file"),
    };

    if !locker.is_fresh()? {
        println!(
            "{} The lock file is not up to date with {}",
            style("Warning:").yellow().bold(),
            super::MANIFEST_FILE
        );
    }

    if let Some(ref name) = args.package {
        return show_package_details(name, &lock, args.format_json);
    }

    let direct: HashSet<String> = project
        .manifest
        .require
        .keys()
        .chain(project.manifest.require_dev.keys())
        .map(|name| name.to_lowercase())
        .collect();

    show_locked_packages(&lock, &direct, &args)
}

fn find_package<'a>(lock: &'a LockFile, name: &str) -> Option<&'a LockedPackage> {
    lock.all_packages().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn show_package_details(name: &str, lock: &LockFile, as_json: bool) -> Result<i32> {
    let Some(pkg) = find_package(lock, name) else {
        eprintln!("{} Package '{}' not found", style("Error:").red().bold(), name);
        return Ok(1);
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(pkg)?);
        return Ok(0);
    }

    println!("{} {}", style("name").cyan(), style(&pkg.name).white().bold());
    println!("{} {}", style("version").cyan(), style(&pkg.version).yellow());

    if let Some(package_type) = &pkg.package_type {
        println!("{} {}", style("type").cyan(), package_type);
    }

    if let Some(Value::String(desc)) = pkg.extra.get("description") {
        println!("{} {}", style("description").cyan(), desc);
    }

    let is_dev = lock
        .packages_dev
        .iter()
        .flatten()
        .any(|p| p.name == pkg.name);
    if is_dev {
        println!("{} yes", style("dev").cyan());
    }

    let links = [
        ("requires", &pkg.require),
        ("requires (dev)", &pkg.require_dev),
        ("provides", &pkg.provide),
        ("replaces", &pkg.replace),
        ("conflicts", &pkg.conflict),
    ];
    for (label, map) in links {
        if map.is_empty() {
            continue;
        }
        println!("{}", style(label).cyan());
        for (dep, constraint) in map {
            println!("  {} {}", dep, style(constraint).dim());
        }
    }

    Ok(0)
}

fn show_locked_packages(lock: &LockFile, direct: &HashSet<String>, args: &ShowArgs) -> Result<i32> {
    let packages = select_packages(lock, direct, args.no_dev, args.direct);

    if args.format_json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(0);
    }

    if packages.is_empty() {
        println!("{} No packages locked", style("Info:").cyan());
        return Ok(0);
    }

    let max_name_len = packages.iter().map(|p| p.name.len()).max().unwrap_or(20);
    let max_version_len = packages.iter().map(|p| p.version.len()).max().unwrap_or(10);

    for pkg in packages {
        let description = match pkg.extra.get("description") {
            Some(Value::String(desc)) => desc.as_str(),
            _ => "",
        };
        println!(
            "{:<name_width$} {:<version_width$} {}",
            style(&pkg.name).green(),
            style(&pkg.version).yellow(),
            description,
            name_width = max_name_len,
            version_width = max_version_len,
        );
    }

    Ok(0)
}

fn select_packages<'a>(
    lock: &'a LockFile,
    direct: &HashSet<String>,
    no_dev: bool,
    only_direct: bool,
) -> Vec<&'a LockedPackage> {
    let dev = if no_dev { None } else { lock.packages_dev.as_ref() };

    lock.packages
        .iter()
        .flatten()
        .chain(dev.into_iter().flatten())
        .filter(|p| !only_direct || direct.contains(&p.name.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK: &str = r#"{
        "content-hash": "abc",
        "packages": [
            {"name": "vendor/a", "version": "1.1.0", "require": {"vendor/b": "^1.0"}, "description": "A"},
            {"name": "vendor/b", "version": "1.2.0"}
        ],
        "packages-dev": [
            {"name": "vendor/test", "version": "1.0.0"}
        ],
        "aliases": [],
        "minimum-stability": "stable",
        "stability-flags": [],
        "prefer-stable": false,
        "prefer-lowest": false,
        "platform": [],
        "platform-dev": []
    }"#;

    fn names(packages: &[&LockedPackage]) -> Vec<String> {
        packages.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_select_packages() {
        let lock = LockFile::from_str(LOCK).unwrap();
        let direct: HashSet<String> = ["vendor/a".to_string(), "vendor/test".to_string()].into();

        assert_eq!(
            names(&select_packages(&lock, &direct, false, false)),
            vec!["vendor/a", "vendor/b", "vendor/test"]
        );
        assert_eq!(
            names(&select_packages(&lock, &direct, true, false)),
            vec!["vendor/a", "vendor/b"]
        );
        assert_eq!(
            names(&select_packages(&lock, &direct, false, true)),
            vec!["vendor/a", "vendor/test"]
        );
    }

    #[test]
    fn test_find_package_ignores_case() {
        let lock = LockFile::from_str(LOCK).unwrap();
        let pkg = find_package(&lock, "Vendor/A").unwrap();
        assert_eq!(pkg.version, "1.1.0");
        assert_eq!(pkg.extra.get("description"), Some(&Value::String("A".to_string())));
        assert!(find_package(&lock, "vendor/missing").is_none());
    }
}
