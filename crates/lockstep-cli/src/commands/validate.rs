//! Validate command - check the manifest and whether the lock file matches it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use lockstep_pm::json::{LockFile, RootManifest};
use lockstep_pm::util::is_platform_package;
use lockstep_pm::{Config, JsonFile, LockStorage, Locker};
use lockstep_semver::VersionParser;

use super::MANIFEST_FILE;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Only validate the manifest, don't check the lock file
    #[arg(long)]
    pub no_check_lock: bool,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// Output as JSON
    #[arg(long)]
    pub format_json: bool,

    /// Working directory
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

#[derive(Debug, Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
}

pub async fn execute(args: ValidateArgs) -> Result<i32> {
    let working_dir = args
        .working_dir
        .canonicalize()
        .context("Failed to resolve working directory")?;

    let manifest_path = working_dir.join(MANIFEST_FILE);
    let mut report = Report::default();

    if !manifest_path.exists() {
        report
            .errors
            .push(format!("{} not found in {}", MANIFEST_FILE, working_dir.display()));
        return print_results(&report, args.format_json, args.strict);
    }

    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    let manifest = match RootManifest::from_str(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            report
                .errors
                .push(format!("{} is not valid: {}", MANIFEST_FILE, e));
            return print_results(&report, args.format_json, args.strict);
        }
    };

    validate_manifest(&manifest, &mut report);

    if !args.no_check_lock {
        let lock_file = match serde_json::to_value(&manifest.config)
            .ok()
            .and_then(|value| Config::from_manifest_value(&value).ok())
        {
            Some(config) => config.lock_file,
            None => Config::default().lock_file,
        };
        let lock_path = working_dir.join(lock_file);

        if lock_path.exists() {
            let locker = Locker::new(JsonFile::new(&lock_path), content.as_str());
            validate_lock(&locker, &mut report);
        } else if !manifest.require.is_empty() {
            report.warnings.push(format!(
                "{} is not present. Run 'lockstep resolve' to generate it.",
                lock_path.display()
            ));
        }
    }

    print_results(&report, args.format_json, args.strict)
}

fn validate_manifest(manifest: &RootManifest, report: &mut Report) {
    if manifest.name.is_none() {
        report.warnings.push("No 'name' property defined".to_string());
    }

    if let Err(e) = manifest.to_request() {
        report.errors.push(format!("Invalid manifest: {}", e));
    }

    let parser = VersionParser::new();
    let sections = [("require", &manifest.require), ("require-dev", &manifest.require_dev)];
    for (section, requires) in sections {
        for (name, constraint) in requires {
            if !is_valid_package_name(name) && !is_platform_package(name) {
                report
                    .warnings
                    .push(format!("Invalid package name '{}' in {}", name, section));
            }
            if let Err(e) = parser.parse_constraints(constraint) {
                report
                    .errors
                    .push(format!("Invalid constraint '{}' for {} in {}: {}", constraint, name, section, e));
            }
        }
    }

    for name in manifest.require.keys() {
        if manifest.require_dev.contains_key(name) {
            report
                .warnings
                .push(format!("{} is required both in require and require-dev", name));
        }
    }
}

fn validate_lock<S: LockStorage>(locker: &Locker<S>, report: &mut Report) {
    let lock: LockFile = match locker.get_lock_data() {
        Ok(lock) => lock,
        Err(e) => {
            report.errors.push(format!("The lock file is not valid: {}", e));
            return;
        }
    };

    if !lock.has_packages() {
        report
            .errors
            .push("The lock file has no packages section".to_string());
    }

    match locker.is_fresh() {
        Ok(true) => {}
        Ok(false) => report.errors.push(format!(
            "The lock file is not up to date with the latest changes in {}. Run 'lockstep resolve' to update it.",
            MANIFEST_FILE
        )),
        Err(e) => report
            .errors
            .push(format!("Could not check the lock file: {}", e)),
    }
}

fn print_results(report: &Report, as_json: bool, strict: bool) -> Result<i32> {
    if as_json {
        let result = serde_json::json!({
            "valid": report.errors.is_empty() && (!strict || report.warnings.is_empty()),
            "errors": report.errors,
            "warnings": report.warnings
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for error in &report.errors {
            eprintln!("{} {}", style("Error:").red().bold(), error);
        }

        for warning in &report.warnings {
            println!("{} {}", style("Warning:").yellow().bold(), warning);
        }

        if report.errors.is_empty() && report.warnings.is_empty() {
            println!("{} {} is valid", style("Success:").green().bold(), MANIFEST_FILE);
        } else if report.errors.is_empty() {
            println!(
                "{} {} is valid with {} warning(s)",
                style("Success:").green().bold(),
                MANIFEST_FILE,
                report.warnings.len()
            );
        }
    }

    if !report.errors.is_empty() {
        return Ok(2);
    }

    if strict && !report.warnings.is_empty() {
        return Ok(1);
    }

    Ok(0)
}

fn is_valid_package_name(name: &str) -> bool {
    let Some((vendor, package)) = name.split_once('/') else {
        return false;
    };

    !vendor.is_empty()
        && !package.is_empty()
        && vendor
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
