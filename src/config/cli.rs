use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "workshop")]
#[command(about = "Resolve, record and fetch external modules for a workspace")]
pub struct CliConfig {
    /// Workspace root
    #[arg(long, default_value = ".")]
    pub root: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Add or upgrade a requirement: domain/owner/repo[/path][@version]
    Get {
        address: String,

        #[arg(short, long)]
        alias: Option<String>,

        /// Re-query the highest released version
        #[arg(long)]
        latest: bool,

        /// Record the requirement without downloading it
        #[arg(long)]
        no_fetch: bool,
    },

    /// Remove a requirement by alias, name or address
    Remove { key: String },

    /// List declared requirements
    List {
        #[arg(long)]
        json: bool,
    },

    /// Download every pending requirement
    Download,

    /// Point an address at a local source location
    Replace { key: String, location: String },

    /// Drop a local override
    Unreplace { key: String },
}
