//! Clap derive structures for the `icontrol` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// icontrol -- resource-oriented CLI for the iControl REST API
#[derive(Debug, Parser)]
#[command(
    name = "icontrol",
    version,
    about = "Browse and edit iControl REST resources from the command line",
    long_about = "Browse and edit iControl REST resources from the command line.\n\n\
        Resources are addressed by dotted attribute paths from the management\n\
        root, e.g. `tm.ltm.pools` for the pool collection or `tm.sys.dns` for\n\
        the DNS singleton.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "ICONTROL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Management address (overrides profile)
    #[arg(long, short = 'H', env = "ICONTROL_HOST", global = true)]
    pub host: Option<String>,

    /// Username (overrides profile)
    #[arg(long, short = 'u', env = "ICONTROL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password (overrides profile and keyring)
    #[arg(long, env = "ICONTROL_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Exchange the password for an auth token before the first request
    #[arg(long, global = true)]
    pub token_auth: bool,

    /// Pin the REST API version sent as `ver=`
    #[arg(long, global = true)]
    pub api_version: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ICONTROL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ICONTROL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ICONTROL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the members of a collection
    #[command(alias = "ls")]
    List(ListArgs),

    /// Load one resource and print its fields
    #[command(alias = "get")]
    Show(TargetArgs),

    /// Check whether a resource exists (exit code 4 when absent)
    Exists(TargetArgs),

    /// Create a resource from a JSON document
    Create(CreateArgs),

    /// Patch selected fields of a resource
    #[command(alias = "patch")]
    Modify(ModifyArgs),

    /// Delete a resource
    #[command(alias = "rm")]
    Delete(TargetArgs),

    /// Print the statistics endpoint of a resource
    Stats(TargetArgs),

    /// Show the device software version
    Version,

    /// Describe a resource type without contacting the device
    Describe(DescribeArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Collection path, e.g. `tm.ltm.pools`
    pub path: String,

    /// Extra query parameter (repeatable), e.g. `--query expandSubcollections=true`
    #[arg(long = "query", short = 'Q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

/// Address of one resource under a collection or singleton path.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Collection, resource or singleton path, e.g. `tm.ltm.pools`
    pub path: String,

    /// Resource name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Partition (folder) of the resource
    #[arg(long, short = 'P')]
    pub partition: Option<String>,

    /// Sub-path inside the partition (e.g. an application folder)
    #[arg(long)]
    pub sub_path: Option<String>,

    /// Device-generated id, for id-keyed resources
    #[arg(long)]
    pub id: Option<String>,

    /// Extra query parameter passed on load (repeatable)
    #[arg(long = "query", short = 'Q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Resource path, e.g. `tm.ltm.pools.pool`
    pub path: String,

    /// JSON document with the creation parameters
    #[arg(long, short = 'd', conflicts_with = "file")]
    pub data: Option<String>,

    /// Read the JSON document from a file
    #[arg(long, short = 'f')]
    pub file: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
pub struct ModifyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// JSON document with the fields to change
    #[arg(long, short = 'd')]
    pub data: String,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Attribute path; the management root when omitted
    #[arg(default_value = "")]
    pub path: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (passwords redacted)
    Show,
    /// Print the configuration file path
    Path,
    /// Store the profile password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
