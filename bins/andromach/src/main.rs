//! andromach CLI
//!
//! Build, run and debug Gecko on Android: gradle tasks, device installs and
//! launches, the test-automation emulator, and javadoc publishing.

use andromach_cli::output::Status;
use andromach_core::config::Config;
use andromach_core::error::exit_codes;
use andromach_telemetry::{TelemetryConfig, Timer};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "andromach")]
#[command(about = "Build, run and debug Gecko on Android")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Android-specific commands
    Android {
        #[command(subcommand)]
        command: AndroidCommand,
    },

    /// Run gradle
    Gradle {
        /// Arguments passed to gradle
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install an Android package on a device or an emulator
    Install,

    /// Run an application on an Android device or an emulator
    Run {
        /// Android package to run
        #[arg(long, default_value = andromach_android::run::DEFAULT_APP)]
        app: String,
        /// Android intent action to launch with
        #[arg(long, default_value = andromach_android::run::DEFAULT_INTENT)]
        intent: String,
        /// Set target environment variable, like FOO=BAR
        #[arg(long = "setenv", value_name = "FOO=BAR")]
        env: Vec<String>,
        /// Path to Gecko profile, like /path/to/host/profile or /path/to/target/profile
        #[arg(short = 'P', long)]
        profile: Option<String>,
        /// URL to open
        #[arg(long)]
        url: Option<String>,
        /// Do not check that the application is installed before running
        #[arg(long)]
        no_install: bool,
        /// Do not wait for the application to start before returning
        #[arg(long)]
        no_wait: bool,
        /// Fail if the application is already running
        #[arg(long)]
        fail_if_running: bool,
        /// Stop the application if it is already running
        #[arg(long)]
        restart: bool,
    },

    /// Run the Android emulator with an AVD from test automation
    #[command(name = "android-emulator")]
    AndroidEmulator {
        /// Android version to run in the emulator
        #[arg(long = "version", value_name = "VERSION", default_value = andromach_android::avd::DEFAULT_VERSION,
              value_parser = ["4.3", "x86", "x86-7.0"])]
        avd_version: String,
        /// Wait for the emulator to be closed
        #[arg(long)]
        wait: bool,
        /// Update the AVD definition even when it is already installed
        #[arg(long)]
        force_update: bool,
    },
}

#[derive(Subcommand)]
enum AndroidCommand {
    /// Assemble Firefox for Android
    AssembleApp {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Generate SDK bindings used when building GeckoView
    GenerateSdkBindings {
        /// Config files, like /path/to/ClassName-classes.txt
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Arguments passed to gradle
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Generate GeckoView JNI wrappers used when building GeckoView
    GenerateGeneratedJniWrappers {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Generate Fennec-specific JNI wrappers used when building Firefox for Android
    GenerateFennecJniWrappers {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Collect gradle dependencies
    GradleDependencies {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Create GeckoView archives
    ArchiveGeckoview {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Build geckoview_example
    #[command(name = "build-geckoview_example")]
    BuildGeckoviewExample {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install geckoview_example
    #[command(name = "install-geckoview_example")]
    InstallGeckoviewExample {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Create GeckoView javadoc and optionally upload it to GitHub
    GeckoviewDocs {
        /// Generate a javadoc archive
        #[arg(long)]
        archive: bool,
        /// Upload generated javadoc to GitHub, using the specified USER/REPO
        #[arg(long, value_name = "USER/REPO")]
        upload: Option<String>,
        /// Destination branch in the upload repository, optionally followed by a path
        #[arg(long, value_name = "BRANCH[/PATH]", default_value = andromach_android::docs::DEFAULT_UPLOAD_BRANCH)]
        upload_branch: String,
        /// Commit message to use for the upload
        #[arg(long, value_name = "MSG", default_value = andromach_android::docs::DEFAULT_UPLOAD_MESSAGE)]
        upload_message: String,
    },

    /// Removed: use `lint --linter android-api-lint`
    #[command(name = "api-lint")]
    ApiLint {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        args: Vec<String>,
    },

    /// Removed: use `lint --linter android-test`
    Test {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        args: Vec<String>,
    },

    /// Removed: use `lint --linter android-lint`
    Lint {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        args: Vec<String>,
    },

    /// Removed: use `lint --linter android-checkstyle`
    Checkstyle {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        args: Vec<String>,
    },

    /// Removed: use `lint --linter android-findbugs`
    Findbugs {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
        args: Vec<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Android { .. } => "android",
            Self::Gradle { .. } => "gradle",
            Self::Install => "install",
            Self::Run { .. } => "run",
            Self::AndroidEmulator { .. } => "android-emulator",
        }
    }
}

fn main() {
    let code = match Cli::try_parse() {
        Ok(cli) => run(cli),
        Err(err) => parse_failure(&err),
    };
    std::process::exit(code);
}

/// clap exits with 2 on usage errors, which collides with "emulator binary
/// not found"; every usage error here exits 1.
fn parse_failure(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            exit_codes::SUCCESS
        }
        ErrorKind::InvalidSubcommand => {
            let name = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(name)) => name.clone(),
                _ => String::new(),
            };
            Status::error(&format!("no such command: {name}"));
            Status::hint("Run 'andromach --help' to list commands.");
            exit_codes::FAILURE
        }
        _ => {
            let _ = err.print();
            exit_codes::FAILURE
        }
    }
}

fn run(cli: Cli) -> i32 {
    if cli.no_color {
        owo_colors::set_override(false);
    }

    let mut telemetry = TelemetryConfig::from_verbosity(cli.verbose, cli.quiet);
    if cli.no_color {
        telemetry = telemetry.without_ansi();
    }
    if let Err(e) = andromach_telemetry::init_with_config(&telemetry) {
        eprintln!("warning: {e}");
    }

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<andromach_core::Error>() {
                Some(err) => {
                    tracing::debug!(code = %err.code, category = err.code.category(), "command failed");
                    Status::report(err);
                    err.exit_code()
                }
                None => {
                    Status::error(&format!("{e:#}"));
                    exit_codes::FAILURE
                }
            }
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    if let Some(path) = &config.path {
        tracing::debug!(path = %path, "loaded config");
    }
    let ctx = Context::new(config, cli.verbose > 0);
    let timer = Timer::start(cli.command.name());

    let code = match cli.command {
        Commands::Android { command } => android(&ctx, command)?,
        Commands::Gradle { args } => commands::gradle::run(&ctx, &args)?,
        Commands::Install => commands::install::run(&ctx)?,
        Commands::Run {
            app,
            intent,
            env,
            profile,
            url,
            no_install,
            no_wait,
            fail_if_running,
            restart,
        } => {
            let opts = andromach_android::run::RunOptions {
                app,
                intent,
                env,
                profile,
                url,
                no_install,
                no_wait,
                fail_if_running,
                restart,
            };
            commands::run::run(&ctx, &opts)?
        }
        Commands::AndroidEmulator {
            avd_version,
            wait,
            force_update,
        } => {
            let opts = andromach_android::emulator::EmulatorOptions {
                version: avd_version,
                wait,
                force_update,
                verbose: ctx.verbose,
            };
            commands::emulator::run(&ctx, &opts)?
        }
    };
    timer.stop();
    Ok(code)
}

fn android(ctx: &Context, command: AndroidCommand) -> andromach_core::Result<i32> {
    use commands::android as cmd;

    let tasks = &ctx.config.schema.gradle.tasks;
    match command {
        AndroidCommand::AssembleApp { args } => cmd::assemble_app(ctx, &args),
        AndroidCommand::GenerateSdkBindings { inputs, args } => {
            cmd::generate_sdk_bindings(ctx, &inputs, &args)
        }
        AndroidCommand::GenerateGeneratedJniWrappers { args } => {
            cmd::gradle_tasks(ctx, &tasks.generate_generated_jni_wrappers, &args)
        }
        AndroidCommand::GenerateFennecJniWrappers { args } => {
            cmd::gradle_tasks(ctx, &tasks.generate_fennec_jni_wrappers, &args)
        }
        AndroidCommand::GradleDependencies { args } => cmd::gradle_dependencies(ctx, &args),
        AndroidCommand::ArchiveGeckoview { args } => {
            cmd::gradle_tasks(ctx, &tasks.archive_geckoview, &args)
        }
        AndroidCommand::BuildGeckoviewExample { args } => cmd::build_geckoview_example(ctx, &args),
        AndroidCommand::InstallGeckoviewExample { args } => {
            cmd::install_geckoview_example(ctx, &args)
        }
        AndroidCommand::GeckoviewDocs {
            archive,
            upload,
            upload_branch,
            upload_message,
        } => {
            let opts = andromach_android::docs::DocsOptions {
                archive,
                upload,
                upload_branch,
                upload_message,
            };
            cmd::geckoview_docs(ctx, &opts)
        }
        AndroidCommand::ApiLint { .. }
        | AndroidCommand::Test { .. }
        | AndroidCommand::Lint { .. }
        | AndroidCommand::Checkstyle { .. }
        | AndroidCommand::Findbugs { .. } => Ok(cmd::lint_removed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_unknown_command_exits_one() {
        let err = Cli::try_parse_from(["andromach", "frobnicate"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        assert_eq!(parse_failure(&err), 1);
    }

    #[test]
    fn test_unknown_emulator_version_rejected() {
        let err = Cli::try_parse_from(["andromach", "android-emulator", "--version", "9.0"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(parse_failure(&err), 1);
    }

    #[test]
    fn test_gradle_args_pass_through() {
        let cli = Cli::try_parse_from(["andromach", "gradle", "app:assemble", "--offline"]).unwrap();
        match cli.command {
            Commands::Gradle { args } => assert_eq!(args, ["app:assemble", "--offline"]),
            _ => panic!("expected gradle"),
        }
    }

    #[test]
    fn test_sdk_bindings_inputs_and_args() {
        let cli = Cli::try_parse_from([
            "andromach",
            "android",
            "generate-sdk-bindings",
            "/a/AudioFormat-classes.txt",
            "/b/Surface-classes.txt",
            "--",
            "--offline",
        ])
        .unwrap();
        match cli.command {
            Commands::Android {
                command: AndroidCommand::GenerateSdkBindings { inputs, args },
            } => {
                assert_eq!(inputs, ["/a/AudioFormat-classes.txt", "/b/Surface-classes.txt"]);
                assert_eq!(args, ["--offline"]);
            }
            _ => panic!("expected generate-sdk-bindings"),
        }
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "andromach",
            "run",
            "--setenv",
            "MOZ_LOG=all:5",
            "--setenv",
            "A=B",
            "-P",
            "/tmp/profile",
            "--restart",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                app,
                env,
                profile,
                restart,
                ..
            } => {
                assert_eq!(app, "org.mozilla.geckoview_example");
                assert_eq!(env, ["MOZ_LOG=all:5", "A=B"]);
                assert_eq!(profile.as_deref(), Some("/tmp/profile"));
                assert!(restart);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_docs_defaults() {
        let cli = Cli::try_parse_from(["andromach", "android", "geckoview-docs"]).unwrap();
        match cli.command {
            Commands::Android {
                command:
                    AndroidCommand::GeckoviewDocs {
                        archive,
                        upload,
                        upload_branch,
                        upload_message,
                    },
            } => {
                assert!(!archive);
                assert_eq!(upload, None);
                assert_eq!(upload_branch, "gh-pages/javadoc");
                assert_eq!(upload_message, "GeckoView docs upload");
            }
            _ => panic!("expected geckoview-docs"),
        }
    }
}
