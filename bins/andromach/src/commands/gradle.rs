//! `gradle`

use super::Context;
use andromach_android::gradle::Gradle;
use andromach_core::error::Result;

/// Run gradle with `args` and return its exit code
pub fn run(ctx: &Context, args: &[String]) -> Result<i32> {
    let gradle = Gradle::from_config(&ctx.config.schema)?;
    gradle.run(args, ctx.verbose)
}
