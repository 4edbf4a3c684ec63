//! Git operations using command-line git
//!
//! Every call goes through the process launcher so the caller's environment
//! overlay (SSH command, author identity, `GIT_DIR`) reaches git.

use crate::error::{Error, Result};
use crate::process::{launch, EnvOverlay, LaunchSpec};
use std::path::{Path, PathBuf};

/// Identity used for automated commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    /// Author and committer name
    pub name: String,
    /// Author and committer email
    pub email: String,
}

impl GitIdentity {
    /// Author and committer variables for this identity
    #[must_use]
    pub fn env(&self) -> EnvOverlay {
        EnvOverlay::new()
            .with("GIT_AUTHOR_NAME", &self.name)
            .with("GIT_COMMITTER_NAME", &self.name)
            .with("GIT_AUTHOR_EMAIL", &self.email)
            .with("GIT_COMMITTER_EMAIL", &self.email)
    }
}

fn git(env: &EnvOverlay) -> LaunchSpec {
    LaunchSpec::new("git").append_env(env)
}

/// Shallow-clone a single branch of `url` into `dest`
pub fn clone_shallow(url: &str, branch: &str, dest: &Path, env: &EnvOverlay) -> Result<GitWorkTree> {
    let spec = git(env).args([
        "clone",
        "--branch",
        branch,
        "--depth",
        "1",
        url,
        &dest.to_string_lossy(),
    ]);
    launch(&spec)?;
    Ok(GitWorkTree::new(dest, env.clone()))
}

/// A checked-out working tree addressed through `GIT_DIR`/`GIT_WORK_TREE`
#[derive(Debug, Clone)]
pub struct GitWorkTree {
    workdir: PathBuf,
    env: EnvOverlay,
}

impl GitWorkTree {
    /// Wrap an existing checkout; `env` is applied to every git call
    #[must_use]
    pub fn new(workdir: &Path, env: EnvOverlay) -> Self {
        let mut env = env;
        env.set("GIT_DIR", workdir.join(".git").to_string_lossy())
            .set("GIT_WORK_TREE", workdir.to_string_lossy());
        Self {
            workdir: workdir.to_path_buf(),
            env,
        }
    }

    /// Get the repository working directory
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Environment passed to git
    #[must_use]
    pub fn env(&self) -> &EnvOverlay {
        &self.env
    }

    fn spec(&self) -> LaunchSpec {
        git(&self.env).current_dir(&self.workdir)
    }

    /// Stage every change, including deletions
    pub fn stage_all(&self) -> Result<()> {
        launch(&self.spec().args(["add", "--all"]))?;
        Ok(())
    }

    /// Whether the index differs from HEAD
    pub fn has_staged_changes(&self) -> Result<bool> {
        let code = launch(
            &self
                .spec()
                .args(["diff", "--cached", "--quiet"])
                .fail_on_nonzero_exit(false),
        )?;
        match code {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::command_failed("git diff", other)),
        }
    }

    /// Commit the index
    pub fn commit(&self, message: &str) -> Result<()> {
        launch(&self.spec().args(["commit", "--message", message]))?;
        Ok(())
    }

    /// Push `branch` to `remote`
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        launch(&self.spec().args(["push", remote, branch]))?;
        Ok(())
    }
}
