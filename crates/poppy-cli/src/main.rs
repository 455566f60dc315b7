mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, exec::ExecSubcommand, query::QueryArgs, Overrides,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "poppy",
    about = "Query and drive Poppy robots through the pypot REST API",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory holding the .poppyrc file (default: auto-detect)
    #[arg(long, global = true, env = "POPPY_ROOT")]
    rc: Option<PathBuf>,

    /// Robot host name or address (default: poppy.local)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port of the robot http server (default: 8080)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Request timeout in milliseconds (default: 500)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Robot descriptor file, used instead of live discovery
    #[arg(long, global = true)]
    descriptor: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log progress to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .poppyrc in the settings directory
    Init,

    /// Read motor registers
    Query(QueryArgs),

    /// Send commands to motors
    Exec {
        #[command(subcommand)]
        subcommand: ExecSubcommand,
    },

    /// Inspect, discover and persist the robot configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.rc.as_deref());
    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        timeout_ms: cli.timeout,
        descriptor: cli.descriptor,
    };

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Query(args) => cmd::query::run(&root, overrides, args, cli.json),
        Commands::Exec { subcommand } => cmd::exec::run(&root, overrides, subcommand, cli.json),
        Commands::Config { subcommand } => {
            cmd::config::run(&root, overrides, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
