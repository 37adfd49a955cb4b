//! Canonical `.boulder/` paths and scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::config::{BoulderConfig, write_config};

const BOULDER_GITIGNORE: &str = "session_agents.json\n*.tmp\n";

/// All canonical paths within `.boulder/` for a project root.
#[derive(Debug, Clone)]
pub struct BoulderPaths {
    pub root: PathBuf,
    pub boulder_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub state_path: PathBuf,
    pub config_path: PathBuf,
    pub session_agents_path: PathBuf,
}

impl BoulderPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let boulder_dir = root.join(".boulder");
        Self {
            root: root.clone(),
            boulder_dir: boulder_dir.clone(),
            plans_dir: boulder_dir.join("plans"),
            gitignore_path: boulder_dir.join(".gitignore"),
            state_path: boulder_dir.join("boulder.json"),
            config_path: boulder_dir.join("config.toml"),
            session_agents_path: boulder_dir.join("session_agents.json"),
        }
    }

    /// Resolve a plan path recorded in the execution state against the root.
    pub fn resolve_plan(&self, active_plan: &str) -> PathBuf {
        self.root.join(active_plan)
    }
}

/// Options for `init_boulder`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing engine-owned files.
    pub force: bool,
}

/// Create `.boulder/` scaffolding in `root`.
///
/// Fails if `.boulder/` already exists unless `options.force` is set. Plans
/// and the execution state are never touched.
pub fn init_boulder(root: &Path, options: &InitOptions) -> Result<BoulderPaths> {
    let paths = BoulderPaths::new(root);
    if paths.boulder_dir.exists() && !options.force {
        return Err(anyhow!(
            "boulder init: .boulder already exists (use --force to overwrite)"
        ));
    }
    if paths.boulder_dir.exists() && !paths.boulder_dir.is_dir() {
        return Err(anyhow!(
            "boulder init: .boulder exists but is not a directory"
        ));
    }
    debug!(root = %root.display(), force = options.force, "initializing .boulder");

    create_dir(&paths.boulder_dir)?;
    create_dir(&paths.plans_dir)?;
    fs::write(&paths.gitignore_path, BOULDER_GITIGNORE)
        .with_context(|| format!("write {}", paths.gitignore_path.display()))?;
    write_config(&paths.config_path, &BoulderConfig::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_creates_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_boulder(temp.path(), &InitOptions { force: false }).expect("init");
        assert!(paths.plans_dir.is_dir());
        assert!(paths.gitignore_path.is_file());
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            BoulderConfig::default()
        );
    }

    #[test]
    fn init_refuses_existing_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_boulder(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_boulder(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        init_boulder(temp.path(), &InitOptions { force: true }).expect("forced init");
    }

    #[test]
    fn resolve_plan_keeps_absolute_paths() {
        let paths = BoulderPaths::new("/work/project");
        assert_eq!(
            paths.resolve_plan(".boulder/plans/a.md"),
            PathBuf::from("/work/project/.boulder/plans/a.md")
        );
        assert_eq!(
            paths.resolve_plan("/elsewhere/b.md"),
            PathBuf::from("/elsewhere/b.md")
        );
    }
}
