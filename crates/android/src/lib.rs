//! Android tooling for andromach
//!
//! This crate provides the handlers behind the command line:
//! - Gradle build system integration
//! - Device control over adb and the `run` command
//! - Emulator management and AVD installation
//! - GeckoView javadoc publishing
//! - `install` of the current build

#![warn(missing_docs)]

pub mod avd;
pub mod device;
pub mod docs;
pub mod emulator;
pub mod gradle;
pub mod install;
pub mod run;
pub mod secrets;
