mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use icontrol_api::{Credentials, HttpTransport};
use icontrol_config::Connection;
use icontrol_core::ManagementRoot;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Offline commands never open a connection
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),
        Command::Describe(ref args) => commands::describe::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "icontrol", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = config::load_config_or_default();
            let connection = config::resolve_connection(&cli.global, &cfg)?;
            let root = connect(connection).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &root, &cli.global).await
        }
    }
}

/// Open a session: build the transport, optionally trade the password for
/// a token, then discover the device version.
async fn connect(connection: Connection) -> Result<ManagementRoot, CliError> {
    let Connection {
        base_url,
        credentials,
        transport,
        token_auth,
        login_provider,
    } = connection;

    let login = match (&credentials, token_auth) {
        (Credentials::Basic { username, password }, true) => {
            Some((username.clone(), password.clone()))
        }
        _ => None,
    };

    let http = HttpTransport::new(base_url.clone(), credentials, transport)?;
    if let Some((username, password)) = login {
        http.login(&username, &password, &login_provider).await?;
    }

    Ok(ManagementRoot::connect(Arc::new(http), base_url).await?)
}
