//! CLI module for oceanrag
//!
//! Provides command-line interface parsing for the oceanrag-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// oceanrag - Ocean policy question answering
///
/// Ingests policy documents, retrieves relevant passages and answers
/// questions grounded in them.
#[derive(Parser, Debug)]
#[command(
    name = "oceanrag-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "oceanrag - Retrieval-augmented question answering over ocean policy documents",
    long_about = "Retrieval-augmented question answering over ocean policy documents.\n\n\
                  Run without arguments to start the HTTP server, or use a subcommand to\n\
                  ingest documents, ask a question or manage snapshots from the shell.",
    after_help = "EXAMPLES:\n    \
                  oceanrag-server init                       # Scaffold oceanrag.toml\n    \
                  oceanrag-server ingest corpus.toml         # Ingest documents from a manifest\n    \
                  oceanrag-server query \"What is a BBNJ?\"    # Ask a question\n    \
                  oceanrag-server backup nightly             # Snapshot index and documents\n    \
                  oceanrag-server                            # Start the server"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "oceanrag.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Reload the config file when it changes
        #[arg(long)]
        watch: bool,
    },

    /// Write an oceanrag.toml and the data directories
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Provider to configure for embeddings and generation (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Ingest the documents listed in a TOML manifest
    ///
    /// Paths in the manifest are resolved relative to the manifest file.
    Ingest {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Ask a question against the ingested corpus
    Query {
        /// The question
        question: String,

        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the retrieved passages
        #[arg(long)]
        show_passages: bool,
    },

    /// Snapshot the index and document store
    Backup {
        /// Snapshot id
        #[arg(default_value = "1")]
        id: String,
    },

    /// Replace the index and document store with a snapshot
    Restore {
        /// Snapshot id
        #[arg(default_value = "1")]
        id: String,
    },

    /// List snapshots
    Backups,

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["oceanrag-server"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("oceanrag.toml"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_backup_default_id() {
        let cli = Cli::try_parse_from(["oceanrag-server", "backup"]).unwrap();
        match cli.command {
            Some(Commands::Backup { id }) => assert_eq!(id, "1"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_query_args() {
        let cli = Cli::try_parse_from([
            "oceanrag-server",
            "--config",
            "custom.toml",
            "query",
            "What is agreed?",
            "-k",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Some(Commands::Query { question, k, .. }) => {
                assert_eq!(question, "What is agreed?");
                assert_eq!(k, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
