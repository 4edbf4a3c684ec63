//! `android-emulator`

use super::Context;
use andromach_android::emulator::{run_emulator, AndroidEmulator, EmulatorOptions};
use andromach_core::error::Result;

pub fn run(ctx: &Context, opts: &EmulatorOptions) -> Result<i32> {
    let mut emulator = AndroidEmulator::new(&ctx.config.schema, opts)?;
    run_emulator(&mut emulator, opts, ctx.has_build())
}
