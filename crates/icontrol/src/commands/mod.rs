//! Command dispatch: bridges CLI args -> resource tree -> output formatting.

pub mod config_cmd;
pub mod describe;
pub mod resources;

use icontrol_core::ManagementRoot;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    root: &ManagementRoot,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::List(args) => resources::list(root, &args, global).await,
        Command::Show(args) => resources::show(root, &args, global).await,
        Command::Exists(args) => resources::exists(root, &args, global).await,
        Command::Create(args) => resources::create(root, &args, global).await,
        Command::Modify(args) => resources::modify(root, &args, global).await,
        Command::Delete(args) => resources::delete(root, &args, global).await,
        Command::Stats(args) => resources::stats(root, &args, global).await,
        Command::Version => resources::version(root, global),
        // Offline commands are handled before a connection is opened
        Command::Describe(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
