//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resolve and lock Minecraft content from Modrinth and CurseForge
#[derive(Debug, Parser)]
#[command(name = "packlock", version)]
#[command(about = "Resolve and lock Minecraft content from Modrinth and CurseForge", long_about = None)]
pub struct Cli {
    /// Lock file to read and update
    #[arg(long, global = true, default_value = packlock_core::LOCK_FILE_NAME)]
    pub lock: PathBuf,

    /// JSON config file (HTTP, cache and provider settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// CurseForge API key; overrides the config file
    #[arg(long, global = true, env = crate::config::CURSEFORGE_API_KEY_ENV, hide_env_values = true)]
    pub curseforge_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add projects and their required dependencies to the lock file
    Add {
        /// Project slugs or ids
        #[arg(required = true)]
        projects: Vec<String>,

        /// Accept recommended matches without asking; skip ambiguous ones
        #[arg(short, long)]
        yes: bool,
    },
}
