use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Browse and edit a filesystem kept in a shared key/value cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,

    /// The directory holding cachefs.yaml and the store snapshot
    #[clap(long, short, default_value = ".", global = true)]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the children of a directory
    Ls {
        #[clap(default_value = "/")]
        path: String,
    },
    /// Show the metadata entry of a path
    Stat { path: String },
    /// Print the contents of a file
    Cat { path: String },
    /// Create an empty file
    Touch { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Replace the contents of a file, refusing if someone else changed them
    Write {
        path: String,
        contents: String,
        /// Contents the file is expected to hold; read from the store when omitted
        #[clap(long)]
        expected: Option<String>,
    },
    /// Print a directory and everything below it
    Tree {
        #[clap(default_value = "/")]
        path: String,
    },
    /// Populate the store with the configured seed tree
    Seed,
    /// Let concurrent clients create files in one directory and check they all got listed
    Contend {
        #[clap(default_value = "/contention")]
        directory: String,
        #[clap(long, default_value_t = 8)]
        clients: usize,
        #[clap(long, default_value_t = 16)]
        files: usize,
    },
}

impl Command {
    /// The store path the command operates on, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Command::Ls { path }
            | Command::Stat { path }
            | Command::Cat { path }
            | Command::Touch { path }
            | Command::Mkdir { path }
            | Command::Write { path, .. }
            | Command::Tree { path } => Some(path.as_str()),
            Command::Contend { directory, .. } => Some(directory.as_str()),
            Command::Seed => None,
        }
    }
}
