//! GeckoView javadoc publishing
//!
//! Builds the javadoc with gradle and, when an upload target is given,
//! commits the extracted archive to a branch of a GitHub repository.
//! Every file created along the way (deploy key, clone) is removed when the
//! publish finishes, whether it succeeded or not.

use crate::avd::extract_zip;
use crate::gradle::Gradle;
use crate::secrets::{HttpSecretStore, SecretStore};
use andromach_cli::output::Status;
use andromach_core::config::ConfigSchema;
use andromach_core::error::{Error, ErrorCode, Result, ResultExt};
use andromach_core::git::{clone_shallow, GitIdentity, GitWorkTree};
use andromach_core::process::EnvOverlay;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Default `--upload-branch`
pub const DEFAULT_UPLOAD_BRANCH: &str = "gh-pages/javadoc";

/// Default `--upload-message`
pub const DEFAULT_UPLOAD_MESSAGE: &str = "GeckoView docs upload";

/// File name of the deploy key written next to the build
pub const KEY_FILE: &str = "gv-docs-upload-key";

/// Directory name of the docs repository clone
pub const REPO_DIR: &str = "gv-docs-repo";

/// Environment variable naming the secret that holds the deploy key
pub const UPLOAD_SECRET_VAR: &str = "GECKOVIEW_DOCS_UPLOAD_SECRET";

/// Flags of `android geckoview-docs`
#[derive(Debug, Clone)]
pub struct DocsOptions {
    /// Build the javadoc archive
    pub archive: bool,
    /// `USER/REPO` to upload to
    pub upload: Option<String>,
    /// `BRANCH[/PATH]`; `{level}`, `{project}` and `{revision}` are substituted in the path
    pub upload_branch: String,
    /// Commit message template
    pub upload_message: String,
}

impl Default for DocsOptions {
    fn default() -> Self {
        Self {
            archive: false,
            upload: None,
            upload_branch: DEFAULT_UPLOAD_BRANCH.to_string(),
            upload_message: DEFAULT_UPLOAD_MESSAGE.to_string(),
        }
    }
}

/// Values substituted for `{level}`, `{project}` and `{revision}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    /// `MOZ_SCM_LEVEL`
    pub level: String,
    /// `MH_BRANCH`
    pub project: String,
    /// `GECKO_HEAD_REV`
    pub revision: String,
}

impl TemplateValues {
    /// Read `MOZ_SCM_LEVEL`, `MH_BRANCH` and `GECKO_HEAD_REV`
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let get = |key: &str, default: &str| {
            env.get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            level: get("MOZ_SCM_LEVEL", "0"),
            project: get("MH_BRANCH", "unknown"),
            revision: get("GECKO_HEAD_REV", "tip"),
        }
    }

    /// Substitute the placeholders in `template`
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{level}", &self.level)
            .replace("{project}", &self.project)
            .replace("{revision}", &self.revision)
    }
}

/// Split `branch/path/inside` at the first `/`
pub fn split_upload_branch(raw: &str) -> (&str, &str) {
    raw.split_once('/').unwrap_or((raw, ""))
}

/// Directory inside the clone that receives the javadoc
///
/// Only plain components are accepted, so the result always stays inside the
/// clone and never names its `.git` directory. An empty path means the root.
pub fn docs_subdir(path: &str) -> Result<PathBuf> {
    let mut subdir = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) if part != ".git" => subdir.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::new(
                    ErrorCode::InvalidPath,
                    format!("Upload path escapes the docs repository: {path}"),
                )
                .with_suggestion("Use --upload-branch BRANCH[/PATH] with a relative PATH"));
            }
        }
    }
    Ok(subdir)
}

/// Empty a clone's work tree, keeping `.git`
fn clear_work_tree(root: &Path) -> Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Git operations the publisher needs
pub trait DocsRepo {
    /// Shallow-clone `branch` of `url` into `dest`
    fn clone_branch(&mut self, url: &str, branch: &str, dest: &Path, env: &EnvOverlay) -> Result<()>;

    /// `git add --all`
    fn stage_all(&self) -> Result<()>;

    /// Whether `git diff --cached --quiet` reports changes
    fn has_staged_changes(&self) -> Result<bool>;

    /// Commit the staged changes
    fn commit(&self, message: &str) -> Result<()>;

    /// Push `branch` to `remote`
    fn push(&self, remote: &str, branch: &str) -> Result<()>;
}

/// [`DocsRepo`] driving the git CLI as the docs bot
#[derive(Debug)]
pub struct GitDocsRepo {
    identity: GitIdentity,
    tree: Option<GitWorkTree>,
}

impl GitDocsRepo {
    /// Repository committing as `identity`
    pub fn new(identity: GitIdentity) -> Self {
        Self { identity, tree: None }
    }

    fn tree(&self) -> Result<&GitWorkTree> {
        self.tree
            .as_ref()
            .ok_or_else(|| Error::process("Docs repository has not been cloned"))
    }
}

impl Default for GitDocsRepo {
    fn default() -> Self {
        Self::new(GitIdentity {
            name: "GeckoView Docs Bot".to_string(),
            email: "nobody@mozilla.com".to_string(),
        })
    }
}

impl DocsRepo for GitDocsRepo {
    fn clone_branch(&mut self, url: &str, branch: &str, dest: &Path, env: &EnvOverlay) -> Result<()> {
        let mut env = env.clone();
        env.extend(&self.identity.env());
        self.tree = Some(clone_shallow(url, branch, dest, &env)?);
        Ok(())
    }

    fn stage_all(&self) -> Result<()> {
        self.tree()?.stage_all()
    }

    fn has_staged_changes(&self) -> Result<bool> {
        self.tree()?.has_staged_changes()
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.tree()?.commit(message)
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.tree()?.push(remote, branch)
    }
}

/// Paths removed in reverse order of registration when dropped
#[derive(Debug, Default)]
pub struct Cleanup {
    paths: Vec<PathBuf>,
}

impl Cleanup {
    /// Remove `path` when the guard drops
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        while let Some(path) = self.paths.pop() {
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else if path.exists() {
                fs::remove_file(&path)
            } else {
                continue;
            };
            match removed {
                Ok(()) => tracing::debug!(path = %path.display(), "removed"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cleanup failed"),
            }
        }
    }
}

/// Where the publish happens and what it publishes
#[derive(Debug, Clone)]
pub struct PublishContext {
    /// Directory receiving the key file and the clone
    pub workdir: PathBuf,
    /// Archive produced by gradle
    pub javadoc_jar: PathBuf,
    /// SSH host prefix, e.g. `git@github.com`
    pub git_host: String,
    /// Placeholder values
    pub values: TemplateValues,
    /// Untemplated secret name, if a deploy key should be fetched
    pub upload_secret: Option<String>,
}

/// Write the deploy key readable only by the owner
fn write_key_file(path: &Path, content: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        // the creation mode does not apply to a file left by an earlier run
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Upload the javadoc archive to `repo` on `branch[/path]`
///
/// Returns 0 whether or not anything changed; a commit and push happen only
/// when the extracted docs differ from the branch.
pub fn publish<S: SecretStore, R: DocsRepo>(
    ctx: &PublishContext,
    opts: &DocsOptions,
    secrets: &S,
    repo: &mut R,
) -> Result<i32> {
    let Some(target) = opts.upload.as_deref() else {
        return Ok(0);
    };
    if !ctx.javadoc_jar.is_file() {
        return Err(Error::file_not_found(&ctx.javadoc_jar));
    }
    let (branch, branch_path) = split_upload_branch(&opts.upload_branch);
    let subdir = docs_subdir(&ctx.values.fill(branch_path))?;
    fs::create_dir_all(&ctx.workdir)?;

    let mut cleanup = Cleanup::default();
    let mut env = EnvOverlay::new();

    let secret = ctx
        .upload_secret
        .as_deref()
        .map(|s| ctx.values.fill(s))
        .filter(|s| !s.is_empty());
    if let Some(secret) = secret {
        let key = secrets.get_secret(&secret)?;
        let keyfile = ctx.workdir.join(KEY_FILE);
        cleanup.register(&keyfile);
        write_key_file(&keyfile, &key)?;
        env.set(
            "GIT_SSH_COMMAND",
            format!(
                "ssh -i \"{}\" -o StrictHostKeyChecking=no",
                keyfile.display()
            ),
        );
    }

    let url = format!("{}:{}.git", ctx.git_host, target);
    let repo_path = ctx.workdir.join(REPO_DIR);
    cleanup.register(&repo_path);
    tracing::info!(%url, branch, "cloning docs repository");
    repo.clone_branch(&url, branch, &repo_path, &env)
        .context(format!("Cloning {url}"))?;

    let dest = repo_path.join(&subdir);
    if subdir.as_os_str().is_empty() {
        clear_work_tree(&repo_path)?;
    } else if dest.is_dir() {
        fs::remove_dir_all(&dest)?;
    } else if dest.exists() {
        fs::remove_file(&dest)?;
    }
    extract_zip(&ctx.javadoc_jar, &dest)?;

    repo.stage_all()?;
    if repo.has_staged_changes()? {
        repo.commit(&ctx.values.fill(&opts.upload_message))?;
        repo.push("origin", branch)?;
        Status::success(&format!("Uploaded javadoc to {target} ({branch})"));
    } else {
        Status::info("Javadoc unchanged; nothing to upload");
    }
    Ok(0)
}

/// `android geckoview-docs`
pub fn geckoview_docs(
    schema: &ConfigSchema,
    gradle: &Gradle,
    opts: &DocsOptions,
    env: &HashMap<String, String>,
) -> Result<i32> {
    let tasks = if opts.archive || opts.upload.is_some() {
        &schema.gradle.tasks.geckoview_docs_archive
    } else {
        &schema.gradle.tasks.geckoview_docs
    };
    let code = gradle.run(tasks.as_slice(), true)?;
    if code != 0 || opts.upload.is_none() {
        return Ok(code);
    }

    let workdir = match &schema.build.topobjdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let javadoc_jar = match (&schema.docs.javadoc_jar, &schema.build.topobjdir) {
        (Some(jar), _) => jar.clone(),
        (None, Some(objdir)) => default_javadoc_jar(objdir),
        (None, None) => return Err(Error::missing_config("build.topobjdir")),
    };
    let ctx = PublishContext {
        workdir,
        javadoc_jar,
        git_host: schema.docs.git_host.clone(),
        values: TemplateValues::from_env(env),
        upload_secret: env.get(UPLOAD_SECRET_VAR).cloned(),
    };
    let secrets = HttpSecretStore::from_config(&schema.docs)?;
    publish(&ctx, opts, &secrets, &mut GitDocsRepo::default())
}

/// Javadoc archive produced by the gradle docs tasks
pub fn default_javadoc_jar(topobjdir: &Path) -> PathBuf {
    topobjdir
        .join("gradle")
        .join("build")
        .join("mobile")
        .join("android")
        .join("geckoview")
        .join("libs")
        .join("geckoview-javadoc.jar")
}
