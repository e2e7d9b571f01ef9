//! Resolve command - solve the manifest against local repository dumps and
//! write the lock file.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use console::style;
use indexmap::IndexMap;

use lockstep_pm::solver::Operation;
use lockstep_pm::{
    ArrayRepository, Error, PlatformRepository, RepositorySet, Resolver, UpdateMode,
};

use super::Project;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Keep every locked package as it is
    Install,
    /// Only move locked packages when a requirement forces it
    Minimal,
    /// Re-resolve everything
    Full,
}

impl From<Mode> for UpdateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Install => UpdateMode::Install,
            Mode::Minimal => UpdateMode::Minimal,
            Mode::Full => UpdateMode::Full,
        }
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Repository dump (JSON array of package records). Earlier files take
    /// priority.
    #[arg(short = 'r', long = "repository", value_name = "FILE")]
    pub repositories: Vec<PathBuf>,

    /// How the existing lock constrains the result
    #[arg(long, value_enum, default_value = "minimal")]
    pub mode: Mode,

    /// Platform fact, e.g. `php=8.2.0` or `ext-intl=8.2.0`
    #[arg(short = 'p', long = "platform", value_name = "NAME=VERSION")]
    pub platform: Vec<String>,

    /// Fail if the lock file does not match the manifest
    #[arg(long)]
    pub locked: bool,

    /// Do not write the lock file
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore platform requirements
    #[arg(long)]
    pub ignore_platform_reqs: bool,

    /// Prefer lowest versions
    #[arg(long)]
    pub prefer_lowest: bool,

    /// Working directory
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

pub async fn execute(args: ResolveArgs) -> Result<i32> {
    let project = Project::load(&args.working_dir)?;

    let mut config = project.config.clone();
    if args.ignore_platform_reqs {
        config.ignore_platform_reqs = true;
    }
    if args.prefer_lowest {
        config.prefer_lowest = Some(true);
    }

    let facts = parse_platform_facts(&args.platform)?;
    let platform = PlatformRepository::with_overrides(&facts, &project.manifest.platform_overrides())
        .context("Invalid platform configuration")?;

    let mut locker = project.locker();
    // Nobody else may touch the lock between reading and writing it
    let _guard = locker.lock_guard().context("Failed to lock the lock file")?;

    let resolver = Arc::new(Resolver::new(config));

    if args.locked {
        match resolver.check_fresh(&locker) {
            Ok(()) => {}
            Err(Error::StaleLock) => {
                eprintln!(
                    "{} The lock file is not up to date with {}",
                    style("Error:").red().bold(),
                    super::MANIFEST_FILE
                );
                return Ok(1);
            }
            Err(e) => return Err(e).context("Failed to check the lock file"),
        }
    }

    let mut request = resolver
        .request_from_lock(&locker, &project.manifest, args.mode.into())
        .context("Failed to build the request")?;
    platform.apply_to(&mut request);

    let mut repositories = RepositorySet::new();
    for path in &args.repositories {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read repository {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        repositories.add(Arc::new(ArrayRepository::from_json(name, &content)?));
    }

    println!("{}", style("Loading package metadata").green());
    let pool = repositories.load_pool(&request).await?;
    log::info!("Pool contains {} packages", pool.len());

    // Ctrl-C stops the search without touching the lock file
    let cancel = resolver.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    println!("{}", style("Resolving dependencies").green());
    let solver = Arc::clone(&resolver);
    let (result, request) = tokio::task::spawn_blocking(move || {
        let result = solver.resolve(&pool, &request);
        (result, request)
    })
    .await
    .context("Resolver task failed")?;

    let resolution = match result {
        Ok(resolution) => resolution,
        Err(Error::Unsatisfiable(problems)) => {
            eprintln!(
                "{} Your requirements could not be resolved to an installable set of packages.\n",
                style("Error:").red().bold()
            );
            eprintln!("{}", problems.describe());
            return Ok(2);
        }
        Err(Error::SearchExhausted { steps, elapsed }) => {
            eprintln!(
                "{} Gave up after {} steps ({:.1}s). Raise LOCKSTEP_MAX_STEPS or LOCKSTEP_TIMEOUT to search longer.",
                style("Error:").red().bold(),
                steps,
                elapsed.as_secs_f64()
            );
            return Ok(3);
        }
        Err(Error::Cancelled) => {
            eprintln!("{} Resolution cancelled, lock file left unchanged", style("Warning:").yellow().bold());
            return Ok(130);
        }
        Err(e) => return Err(e).context("Resolution failed"),
    };

    print_operations(&resolution.transaction.operations);

    if args.dry_run {
        println!("{}", style("Dry run, lock file not written").dim());
        return Ok(0);
    }

    let snapshot = resolver.lock_snapshot(&resolution, &request);
    if locker.set_lock_data(snapshot).context("Failed to write the lock file")? {
        println!("{} {}", style("Writing lock file").green(), project.lock_path().display());
    } else {
        println!("{}", style("Lock file is already up to date").dim());
    }

    Ok(0)
}

fn parse_platform_facts(facts: &[String]) -> Result<IndexMap<String, String>> {
    let mut parsed = IndexMap::new();
    for fact in facts {
        let (name, version) = fact
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid platform fact '{}', expected NAME=VERSION", fact))?;
        parsed.insert(name.trim().to_string(), version.trim().to_string());
    }
    Ok(parsed)
}

fn print_operations(operations: &[Operation]) {
    if operations.is_empty() {
        println!("Nothing to install, update or remove");
        return;
    }

    let installs = operations.iter().filter(|op| matches!(op, Operation::Install(_))).count();
    let updates = operations.iter().filter(|op| matches!(op, Operation::Update { .. })).count();
    let removals = operations.iter().filter(|op| matches!(op, Operation::Uninstall(_))).count();
    println!(
        "Lock file operations: {} install(s), {} update(s), {} removal(s)",
        installs, updates, removals
    );

    for op in operations {
        let line = match op {
            Operation::Install(_) => style(op.to_string()).green(),
            Operation::Update { .. } => style(op.to_string()).cyan(),
            Operation::Uninstall(_) => style(op.to_string()).red(),
        };
        println!("  - {}", line);
    }
}
