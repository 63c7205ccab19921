use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// ndnfw: a Named Data Networking forwarder
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forwarding daemon
    Run {
        /// Path to the daemon configuration file
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Override the listen address from the configuration
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Send one Interest and print the Data or Nack that comes back
    Get {
        /// Name to request (NDN URI format)
        name: String,

        /// Forwarder to connect to
        #[clap(short, long, default_value = "127.0.0.1:6367")]
        forwarder: String,

        /// Timeout in milliseconds
        #[clap(short, long, default_value = "4000")]
        timeout: u64,

        /// Accept Data under the requested name, not just an exact match
        #[clap(long)]
        prefix: bool,

        /// Require fresh Data
        #[clap(long)]
        fresh: bool,
    },

    /// Answer Interests under a prefix with fixed content
    Serve {
        /// Prefix to serve (NDN URI format)
        prefix: String,

        /// Content to answer with (string)
        content: String,

        /// Address to listen on
        #[clap(short, long, default_value = "0.0.0.0:6368")]
        listen: String,

        /// Freshness period in milliseconds
        #[clap(long, default_value = "10000")]
        freshness: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    match cli.command {
        Commands::Run { config, listen } => {
            commands::run::run(config, listen).await?;
        }
        Commands::Get {
            name,
            forwarder,
            timeout,
            prefix,
            fresh,
        } => {
            commands::get::get(name, forwarder, timeout, prefix, fresh).await?;
        }
        Commands::Serve {
            prefix,
            content,
            listen,
            freshness,
        } => {
            commands::serve::serve(prefix, content, listen, freshness).await?;
        }
    }

    Ok(())
}
