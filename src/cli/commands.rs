//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the HTTP server
//! - counts/bump/set: read and write like counters
//! - annotate/annotations: write and list notes
//! - summary: per-duration rollup of notes
//! - backend: show which storage backend is active

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Planboard - design-process planner backend
#[derive(Parser, Debug)]
#[command(name = "planboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the storage directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print counts for a duration
    Counts {
        /// Duration label (8, 4, 2, 1, 2days)
        duration: String,

        /// Comma-separated ids to seed first
        #[arg(long)]
        ids: Option<String>,
    },

    /// Add or remove one like
    Bump {
        /// Item or detail id
        item_id: String,

        /// Duration label
        duration: String,

        /// Remove a like instead of adding one
        #[arg(long)]
        dec: bool,
    },

    /// Set a counter to an absolute value
    Set {
        /// Item or detail id
        item_id: String,

        /// Duration label
        duration: String,

        /// New count (negative values store 0)
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Create or replace a note on an item
    Annotate {
        /// Owning checklist item
        #[arg(long)]
        item_id: String,

        /// Section tag (actions, deliverables, aiBoosts)
        #[arg(long)]
        section: String,

        /// Note text
        #[arg(long)]
        text: String,

        /// Note id; generated from the item id when omitted
        #[arg(long)]
        detail_id: Option<String>,

        #[arg(long)]
        parent_title: Option<String>,

        #[arg(long)]
        phase_title: Option<String>,

        /// Comma-separated duration labels the note applies to
        #[arg(long, value_delimiter = ',')]
        durations: Option<Vec<String>>,

        #[arg(long)]
        author: Option<String>,
    },

    /// List notes, newest first
    Annotations,

    /// Per-duration rollup of notes
    Summary,

    /// Show the active storage backend
    Backend,
}
