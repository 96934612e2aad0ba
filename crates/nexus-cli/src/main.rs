//! Nexus CLI - Command-line interface for Nexus
//!
//! Imports rosters, drives the friendship lifecycle, answers graph queries
//! and serves the graph over WebSocket.

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::Transition;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "nexus")]
#[command(author = "Nexus Contributors")]
#[command(version)]
#[command(about = "Campus social graph and friend recommendations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory containing the .nexus workspace
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a Nexus workspace
    Init,

    /// Import accounts from a roster CSV (name,key,department)
    Import {
        /// Roster file
        csv: PathBuf,
    },

    /// Send a friend request
    Request {
        /// Account sending the request
        actor: String,
        /// Account receiving it
        other: String,
    },

    /// Accept a pending friend request
    Accept {
        /// Account that received the request
        actor: String,
        /// Account that sent it
        other: String,
    },

    /// Decline a pending friend request
    Reject {
        /// Account that received the request
        actor: String,
        /// Account that sent it
        other: String,
    },

    /// Remove an accepted friendship
    Unfriend { actor: String, other: String },

    /// List an account's friends
    Friends { key: String },

    /// List the friends two accounts share
    Mutual { a: String, b: String },

    /// Suggest new connections
    Recommend {
        key: String,

        /// Maximum suggestions (defaults to the configured limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show pending requests for an account
    Requests { key: String },

    /// Show graph statistics, or an account's summary
    Status { key: Option<String> },

    /// Export the graph to JSON
    Export {
        /// Output file
        #[arg(short, long, default_value = "nexus-graph.json")]
        output: PathBuf,

        /// Mark node roles relative to this account
        #[arg(long)]
        viewer: Option<String>,
    },

    /// Start the Nexus server
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Headless mode: bind to 0.0.0.0 for remote access
        #[arg(long)]
        headless: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let root = cli.root.as_path();
    let result = match cli.command {
        Commands::Init => commands::init(root),
        Commands::Import { csv } => commands::import(root, &csv),
        Commands::Request { actor, other } => {
            commands::transition(root, Transition::Request, &actor, &other)
        }
        Commands::Accept { actor, other } => {
            commands::transition(root, Transition::Accept, &actor, &other)
        }
        Commands::Reject { actor, other } => {
            commands::transition(root, Transition::Reject, &actor, &other)
        }
        Commands::Unfriend { actor, other } => {
            commands::transition(root, Transition::Unfriend, &actor, &other)
        }
        Commands::Friends { key } => commands::friends(root, &key),
        Commands::Mutual { a, b } => commands::mutual(root, &a, &b),
        Commands::Recommend { key, limit, json } => commands::recommend(root, &key, limit, json),
        Commands::Requests { key } => commands::requests(root, &key),
        Commands::Status { key } => commands::status(root, key.as_deref()),
        Commands::Export { output, viewer } => commands::export(root, &output, viewer.as_deref()),
        Commands::Serve { port, headless } => commands::serve(root, port, headless).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
