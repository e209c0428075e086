//! vpnshell - OpenVPN supervisor shell
//!
//! Launches an OpenVPN client, follows its connection state and traffic
//! counters, and disconnects it on request.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vpnshell_core::{
    error::{StartError, VpnShellError},
    init_logging,
};

mod cli;

#[derive(Parser)]
#[command(name = "vpnshell")]
#[command(about = "Supervise an OpenVPN client and report its status and traffic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the VPN and follow the session until it ends
    Connect {
        /// Username (prompted for when omitted)
        #[arg(short, long)]
        username: Option<String>,

        /// Profile to use instead of the configured one
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the traffic counters found in an OpenVPN status file
    Stats {
        /// Status file to read
        path: PathBuf,

        /// Print the counters as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Connect {
            username,
            profile,
            json,
        } => cli::connect::run_connect(username, profile, json),
        Commands::Stats { path, json } => cli::stats::run_stats(&path, json),
        Commands::Config { init } => cli::config::run_config(init),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                VpnShellError::Config(_)
                | VpnShellError::Toml(_)
                | VpnShellError::TomlSerialize(_) => 2,
                // A missing profile is a setup problem, other start errors are runtime
                VpnShellError::Start(StartError::ConfigMissing { .. }) => 2,
                VpnShellError::Start(_) => 1,
                VpnShellError::SessionFailed(_) => 1,
                VpnShellError::Poll(_) => 1,
                VpnShellError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
