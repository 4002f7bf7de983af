use argh::FromArgs;
use xshell::cmd;

use crate::Flag;
use crate::Prepare;
use crate::PreparedCommand;

/// Runs the miri test suite. Requires a nightly toolchain with miri installed.
#[derive(FromArgs, Default)]
#[argh(subcommand, name = "miri")]
pub struct MiriCommand {}

impl Prepare for MiriCommand {
    fn prepare<'a>(&self, sh: &'a xshell::Shell, _flags: Flag) -> Vec<PreparedCommand<'a>> {
        vec![PreparedCommand::new::<Self>(
            cmd!(sh, "cargo +nightly miri test --test miri"),
            "Please fix undefined behavior reported above.",
        )
        .with_env_var("MIRIFLAGS", "-Zmiri-disable-isolation")]
    }
}
