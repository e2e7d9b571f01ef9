//! Subcommands.

mod resolve;
mod show;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use lockstep_pm::json::RootManifest;
use lockstep_pm::{Config, JsonFile, Locker};

pub use resolve::ResolveArgs;
pub use show::ShowArgs;
pub use validate::ValidateArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve dependencies and write the lock file
    Resolve(ResolveArgs),

    /// Validate the manifest and check the lock file
    Validate(ValidateArgs),

    /// Show locked packages
    Show(ShowArgs),
}

pub async fn execute(command: Commands) -> Result<i32> {
    match command {
        Commands::Resolve(args) => resolve::execute(args).await,
        Commands::Validate(args) => validate::execute(args).await,
        Commands::Show(args) => show::execute(args).await,
    }
}

pub const MANIFEST_FILE: &str = "composer.json";

/// A project directory: its manifest and where its lock lives.
pub struct Project {
    pub dir: PathBuf,
    /// Raw manifest content, hashed for lock freshness
    pub manifest_content: String,
    pub manifest: RootManifest,
    pub config: Config,
}

impl Project {
    pub fn load(working_dir: &Path) -> Result<Self> {
        let dir = working_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve working directory {}", working_dir.display()))?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest = RootManifest::from_str(&manifest_content)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        let config_value = serde_json::to_value(&manifest.config)?;
        let config = Config::from_manifest_value(&config_value)
            .context("Invalid config section in manifest")?
            .with_env_overrides();

        Ok(Self {
            dir,
            manifest_content,
            manifest,
            config,
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(&self.config.lock_file)
    }

    pub fn locker(&self) -> Locker<JsonFile> {
        Locker::new(JsonFile::new(self.lock_path()), self.manifest_content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_pm::LockStorage;

    #[test]
    fn test_project_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"name": "acme/app", "require": {"vendor/a": "^1.0"}, "config": {"lock-file": "deps.lock"}}"#,
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.manifest.name.as_deref(), Some("acme/app"));
        assert!(project.lock_path().ends_with("deps.lock"));
        assert!(!project.locker().storage().exists());
    }

    #[test]
    fn test_project_load_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Project::load(dir.path()).is_err());
    }
}
