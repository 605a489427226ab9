// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockutil")]
#[command(about = "Query a Docker daemon through a cached, deadline-bounded client")]
#[command(version)]
pub struct Cli {
    /// Path to a dockutil.yml (defaults to the one in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List images
    Images {
        /// Include intermediate images
        #[arg(short, long)]
        all: bool,
    },

    /// Count attached and dangling volumes
    Volumes,

    /// List containers
    Containers {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// Labels of every running container
    Labels,

    /// Daemon host name
    Hostname,

    /// Storage driver space statistics
    Storage,

    /// Resolve an image reference to a repository name
    Resolve {
        /// Image ID, repo digest or tagged name
        reference: String,
    },

    /// Inspect a container
    Inspect {
        /// Container ID or name
        id: String,

        /// Include SizeRw and SizeRootFs
        #[arg(short, long)]
        size: bool,

        /// Bypass the inspect cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect the container dockutil runs in
    InspectSelf,

    /// One stats sample for a container
    Stats {
        /// Container ID or name
        id: String,
    },
}
