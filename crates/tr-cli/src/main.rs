mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trellis", version, about = "Trellis task tracking backend")]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = "~/.trellis/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the REST server.
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Show the resolved configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Start the REST server.
    Start {
        /// Override the REST port from config.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check bind safety before starting on a non-loopback host.
    Preflight,
    /// Probe the health endpoint of a running server.
    Status,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Print the database file path.
    Path,
    /// Print row counts per table.
    Stats,
    /// Run a sqlite integrity check.
    Check,
    /// Vacuum the database to reclaim space.
    Vacuum,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the config file and the resolved runtime values.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tr_server=debug,tr_engine=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Server { command } => match command {
            ServerCommand::Start { port } => commands::server::start(port, &cli.config).await,
            ServerCommand::Preflight => commands::server::preflight(&cli.config).await,
            ServerCommand::Status => commands::server::status(&cli.config).await,
        },
        Command::Db { command } => match command {
            DbCommand::Path => commands::db::path(&cli.config),
            DbCommand::Stats => commands::db::stats(&cli.config),
            DbCommand::Check => commands::db::check(&cli.config),
            DbCommand::Vacuum => commands::db::vacuum(&cli.config),
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => commands::config::show(&cli.config),
        },
    }
}
