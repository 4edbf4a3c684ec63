//! `install`: push the current build to a connected device

use andromach_cli::output::Status;
use andromach_core::config::BuildConfig;
use andromach_core::error::{exit_codes, Error, Result};
use andromach_core::process::{launch, LaunchSpec};

/// `make -C <topobjdir> install`
pub fn make_install_command(build: &BuildConfig) -> Result<LaunchSpec> {
    let objdir = build
        .topobjdir
        .as_ref()
        .ok_or_else(|| Error::missing_config("build.topobjdir"))?;
    Ok(LaunchSpec::new(&build.make)
        .arg("-C")
        .arg(objdir.to_string_lossy())
        .arg("install")
        .stream_output(true)
        .fail_on_nonzero_exit(false))
}

/// Install the build, returning make's exit code
///
/// `has_device` is asked first; with nothing connected this returns 1
/// without running make.
pub fn install<F>(build: &BuildConfig, verbose: bool, has_device: F) -> Result<i32>
where
    F: FnOnce() -> Result<bool>,
{
    let spec = make_install_command(build)?;
    if !has_device()? {
        Status::error("No ADB devices connected.");
        return Ok(exit_codes::FAILURE);
    }

    if verbose {
        tracing::info!(command = %spec.display(), "installing");
    } else {
        tracing::debug!(command = %spec.display(), "installing");
    }
    let code = launch(&spec)?;
    if code == 0 {
        Status::success("Install complete");
    }
    Ok(code)
}
