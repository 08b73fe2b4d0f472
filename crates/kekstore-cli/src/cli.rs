use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "kekstore",
    about = "Encrypted filesystem keystore for key-encryption-keys",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Give up on the operation after this many seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate a master key at the configured path (never overwrites).
    Keygen {
        /// Cipher identifier; defaults to the configured one.
        #[arg(long)]
        cipher: Option<String>,
    },
    /// Check that the keystore directory is reachable and writable.
    Status,
    /// Store a new key-encryption-key.
    Create {
        name: String,
        /// Value to store; read from stdin when omitted.
        #[arg(long)]
        value: Option<String>,
    },
    /// Print a key-encryption-key to stdout.
    Get { name: String },
    /// Remove a key-encryption-key.
    Delete { name: String },
    /// List key-encryption-key names.
    List {
        /// Only list names starting with this prefix.
        #[arg(default_value = "")]
        prefix: String,
        /// Maximum number of names (0 for all).
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Continue a previous listing.
        #[arg(long)]
        cursor: Option<String>,
        /// Emit JSON instead of one name per line.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
