use std::path::PathBuf;

use clap::{Parser, Subcommand};
use evidence_core::{JobId, Msg};

use super::config::TransportMode;
use super::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "evidence")]
#[command(about = "Start, steer and follow document processing on an evidence backend")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./evidence.ron when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend API base URL, e.g. http://localhost:8000/api
    #[arg(long)]
    pub backend: Option<String>,

    /// Project whose documents are processed
    #[arg(short, long)]
    pub project: Option<String>,

    /// Progress transport
    #[arg(long, value_enum)]
    pub transport: Option<TransportMode>,

    /// Where log output goes
    #[arg(long, value_enum)]
    pub log: Option<LogDestination>,

    /// Raise the log level (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the project's documents and exit
    Status,

    /// Follow processing until the project has no active documents
    Watch,

    /// Process the given documents
    Start {
        /// Document ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Process every pending document, or only the given ones
    StartAll {
        /// Restrict the batch to these document ids
        #[arg(long, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Pause the document currently being processed
    Pause { id: String },

    /// Cancel the document currently being processed
    Cancel { id: String },

    /// Resume a paused or partially processed document
    Resume { id: String },
}

impl Command {
    /// Messages dispatched once the job list has loaded.
    pub fn messages(&self) -> Vec<Msg> {
        match self {
            Command::Status => Vec::new(),
            Command::Watch => vec![Msg::Watch],
            Command::Start { ids } => ids
                .iter()
                .map(|id| Msg::StartSingle(JobId::new(id.as_str())))
                .collect(),
            Command::StartAll { ids } => {
                let selected = (!ids.is_empty())
                    .then(|| ids.iter().map(|id| JobId::new(id.as_str())).collect());
                vec![Msg::StartAll { selected }]
            }
            Command::Pause { id } => vec![Msg::Pause(JobId::new(id.as_str()))],
            Command::Cancel { id } => vec![Msg::Cancel(JobId::new(id.as_str()))],
            Command::Resume { id } => vec![Msg::Resume(JobId::new(id.as_str()))],
        }
    }
}
