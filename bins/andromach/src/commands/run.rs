//! `run`

use super::Context;
use andromach_android::device::Adb;
use andromach_android::run::RunOptions;
use andromach_core::error::Result;

pub fn run(ctx: &Context, opts: &RunOptions) -> Result<i32> {
    andromach_android::run::run(opts, || Adb::connect(&ctx.config.schema.device))
}
