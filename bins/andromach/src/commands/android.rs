//! `android` subcommands
//!
//! Most subcommands run a configured list of gradle tasks followed by the
//! user's arguments.

use super::Context;
use andromach_android::docs::{self, DocsOptions};
use andromach_android::gradle::{sdk_bindings_arg, Gradle};
use andromach_cli::output::Status;
use andromach_core::error::{exit_codes, Result};

/// Printed by the removed lint subcommands
pub const LINT_DEPRECATION_MESSAGE: &str = "
Android lints are now integrated with mozlint.  Instead of
`andromach android {api-lint,checkstyle,findbugs,lint,test}`, run
`andromach lint --linter android-{api-lint,checkstyle,findbugs,lint,test}`.
Or run `andromach lint`.
";

/// `tasks`, then `extra`, then the user's `args`
pub fn gradle_args(tasks: &[String], extra: &[&str], args: &[String]) -> Vec<String> {
    tasks
        .iter()
        .cloned()
        .chain(extra.iter().map(|s| (*s).to_string()))
        .chain(args.iter().cloned())
        .collect()
}

fn gradle(ctx: &Context, args: &[String]) -> Result<i32> {
    Gradle::from_config(&ctx.config.schema)?.run(args, true)
}

/// Run a task list with the user's arguments
pub fn gradle_tasks(ctx: &Context, tasks: &[String], args: &[String]) -> Result<i32> {
    gradle(ctx, &gradle_args(tasks, &[], args))
}

pub fn assemble_app(ctx: &Context, args: &[String]) -> Result<i32> {
    let tasks = &ctx.config.schema.gradle.tasks.assemble_app;
    gradle(ctx, &gradle_args(tasks, &["-x", "lint"], args))
}

pub fn generate_sdk_bindings(ctx: &Context, inputs: &[String], args: &[String]) -> Result<i32> {
    let tasks = &ctx.config.schema.gradle.tasks.generate_sdk_bindings;
    let bindings = sdk_bindings_arg(inputs);
    gradle(ctx, &gradle_args(tasks, &[bindings.as_str()], args))
}

/// Always succeeds; unresolved dependencies are reported by gradle itself
pub fn gradle_dependencies(ctx: &Context, args: &[String]) -> Result<i32> {
    let tasks = &ctx.config.schema.gradle.tasks.dependencies;
    let code = gradle(ctx, &gradle_args(tasks, &["--continue"], args))?;
    tracing::debug!(code, "gradle dependencies finished");
    Ok(exit_codes::SUCCESS)
}

pub fn build_geckoview_example(ctx: &Context, args: &[String]) -> Result<i32> {
    let tasks = &ctx.config.schema.gradle.tasks.build_geckoview_example;
    gradle(ctx, &gradle_args(tasks, &[], args))?;
    Status::hint(
        "Execute `andromach android install-geckoview_example` \
         to push the geckoview_example and test APKs to a device.",
    );
    Ok(exit_codes::SUCCESS)
}

pub fn install_geckoview_example(ctx: &Context, args: &[String]) -> Result<i32> {
    let tasks = &ctx.config.schema.gradle.tasks.install_geckoview_example;
    gradle(ctx, &gradle_args(tasks, &[], args))?;
    Status::hint(
        "Execute `andromach android build-geckoview_example` \
         to just build the geckoview_example and test APKs.",
    );
    Ok(exit_codes::SUCCESS)
}

pub fn geckoview_docs(ctx: &Context, opts: &DocsOptions) -> Result<i32> {
    let gradle = Gradle::from_config(&ctx.config.schema)?;
    docs::geckoview_docs(&ctx.config.schema, &gradle, opts, &ctx.env)
}

/// `api-lint`, `checkstyle`, `findbugs`, `lint` and `test` moved to the linter
pub fn lint_removed() -> i32 {
    Status::notice(LINT_DEPRECATION_MESSAGE);
    exit_codes::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use andromach_core::config::{Config, ConfigSchema};
    use std::path::{Path, PathBuf};

    /// Context whose gradle is `sh` running in `dir`
    fn sh_context(dir: &Path) -> Context {
        let mut schema = ConfigSchema::default();
        schema.build.java = Some(PathBuf::from("/opt/jdk/bin/java"));
        schema.build.gradle = "sh".to_string();
        schema.build.topsrcdir = dir.to_path_buf();
        Context::new(Config { schema, path: None }, false)
    }

    /// Task list running `script`; later gradle arguments become `$0`, `$1`...
    fn script(script: &str) -> Vec<String> {
        strings(&["-c", script])
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_gradle_args_order() {
        let args = gradle_args(
            &strings(&["app:assembleDebug"]),
            &["-x", "lint"],
            &strings(&["--offline"]),
        );
        assert_eq!(args, ["app:assembleDebug", "-x", "lint", "--offline"]);
    }

    #[test]
    fn test_gradle_args_without_extra() {
        assert_eq!(
            gradle_args(&strings(&["a", "b"]), &[], &[]),
            ["a", "b"]
        );
    }

    #[test]
    fn test_lint_removed_fails() {
        assert_eq!(lint_removed(), 1);
    }

    #[test]
    fn test_gradle_tasks_pass_exit_code_through() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = sh_context(dir.path());
        assert_eq!(gradle_tasks(&ctx, &script("exit 5"), &[]).unwrap(), 5);
    }

    #[test]
    fn test_assemble_app_skips_lint() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = sh_context(dir.path());
        ctx.config.schema.gradle.tasks.assemble_app = script("echo \"$0 $1 $2\" > args; exit 3");
        assert_eq!(assemble_app(&ctx, &strings(&["--offline"])).unwrap(), 3);
        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(args.trim(), "-x lint --offline");
    }

    #[test]
    fn test_gradle_dependencies_always_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = sh_context(dir.path());
        ctx.config.schema.gradle.tasks.dependencies = script("echo \"$0\" > args; exit 6");
        assert_eq!(gradle_dependencies(&ctx, &[]).unwrap(), 0);
        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(args.trim(), "--continue");
    }

    #[test]
    fn test_geckoview_example_commands_succeed_after_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = sh_context(dir.path());
        ctx.config.schema.gradle.tasks.build_geckoview_example = script("exit 2");
        ctx.config.schema.gradle.tasks.install_geckoview_example = script("exit 9");
        assert_eq!(build_geckoview_example(&ctx, &[]).unwrap(), 0);
        assert_eq!(install_geckoview_example(&ctx, &[]).unwrap(), 0);
    }

    #[test]
    fn test_gradle_tasks_require_java() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = sh_context(dir.path());
        ctx.config.schema.build.java = None;
        assert!(gradle_tasks(&ctx, &script("exit 0"), &[]).is_err());
    }
}
