//! `install`

use super::Context;
use andromach_android::device::Adb;
use andromach_core::error::Result;

pub fn run(ctx: &Context) -> Result<i32> {
    let schema = &ctx.config.schema;
    andromach_android::install::install(&schema.build, ctx.verbose, || {
        Ok(Adb::connect(&schema.device)?.is_some())
    })
}
