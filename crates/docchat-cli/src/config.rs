use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docchat_core::ProjectState;
use docchat_service::ClientConfig;
use docchat_store::StoreConfig;

#[derive(Debug, Parser)]
#[command(name = "docchat", about = "Projects, documents and project-scoped chat")]
pub struct Cli {
    /// Directory holding the local store
    #[arg(long, env = "DOCCHAT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep everything in memory for this invocation
    #[arg(
        long,
        env = "DOCCHAT_IN_MEMORY",
        global = true,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub ephemeral: bool,

    /// Base URL of the remote API
    #[arg(long, env = "DOCCHAT_API_URL", default_value = "http://127.0.0.1:8000", global = true)]
    pub api_url: String,

    /// Bearer token; defaults to the one saved by `login`
    #[arg(long, env = "DOCCHAT_API_TOKEN", global = true)]
    pub api_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            local_data_dir: self
                .data_dir
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            in_memory: self.ephemeral,
        }
    }

    pub fn client_config(&self, saved_token: Option<String>) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url.clone(),
            token: self.api_token.clone().or(saved_token),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and save the bearer token
    Login {
        email: String,
        #[arg(long, default_value = "user")]
        user_type: String,
    },
    /// Forget the saved token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage local projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Converse within a project
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Talk to the remote project API directly
    #[command(subcommand)]
    Remote(RemoteCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Show {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        access_type: Option<String>,
        #[arg(long)]
        state: Option<ProjectState>,
    },
    Publish {
        id: String,
    },
    Archive {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Attach a file to a project
    Attach {
        id: String,
        path: PathBuf,
        #[arg(long = "type", default_value = "general")]
        document_type: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChatCommand {
    /// Record a message; with --remote, also ask the assistant
    Send {
        project: String,
        content: String,
        #[arg(long)]
        remote: bool,
        /// User id sent to the chat endpoint; defaults to the logged-in user
        #[arg(long)]
        user: Option<String>,
    },
    /// Show a project's messages grouped by day
    History {
        project: String,
    },
    /// Most recent user messages across all projects
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    Delete {
        project: String,
        message_id: String,
    },
    Read {
        project: String,
        message_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    Groups,
    Projects {
        #[arg(long)]
        user: Option<String>,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        files: Vec<PathBuf>,
    },
    Publish {
        id: String,
    },
    Delete {
        id: String,
    },
    Messages {
        project: String,
        user: String,
    },
}
