//! Command-line support for sift-chain
//!
//! Each invocation opens one explorer session over a SQLite database and a
//! state directory, runs one command against it and exits. The tree and
//! filters live in the state directory between invocations.

mod propose;
mod tree;
mod view;

pub use propose::{ProposeOptions, ProposeResult, execute_propose};
pub use tree::render_tree;
pub use view::ViewArgs;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;

use crate::compose::DEFAULT_PAGE_SIZE;
use crate::engine::{EngineError, SqliteEngine};
use crate::explorer::{Explorer, ExplorerConfig, ExplorerError};
use crate::node::InvalidNodeId;
use crate::persist::FileStore;
use crate::store::{Limits, MAX_TOTAL_NODES, MAX_TREE_DEPTH};
use crate::translate::{TranslateError, Translation, Translator};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Session operation failed
    Explorer(ExplorerError),
    /// Database could not be opened or prepared
    Engine(EngineError),
    /// Malformed node id argument
    NodeId(InvalidNodeId),
    /// IO error
    Io(io::Error),
    /// No collaborator response provided
    NoResponse,
    /// The proposed step returns no rows and was not kept
    EmptyResult,
    /// Delete or activate named a node that cannot take the action
    Rejected(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Explorer(e) => write!(f, "{}", e),
            CliError::Engine(e) => write!(f, "Database error: {}", e),
            CliError::NodeId(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoResponse => write!(
                f,
                "No translator response provided. Use --response or pipe the response JSON to stdin."
            ),
            CliError::EmptyResult => write!(
                f,
                "Query returns no results. Rerun with --keep-empty to add it anyway."
            ),
            CliError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Explorer(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::NodeId(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExplorerError> for CliError {
    fn from(e: ExplorerError) -> Self {
        CliError::Explorer(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<InvalidNodeId> for CliError {
    fn from(e: InvalidNodeId) -> Self {
        CliError::NodeId(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct SessionOptions {
    /// Directory holding the persisted tree and filters
    #[arg(long, global = true, env = "SIFT_STATE_DIR", default_value = ".sift")]
    pub state_dir: PathBuf,

    /// SQLite database holding the h1b table (in-memory when omitted)
    #[arg(long, global = true, env = "SIFT_DATABASE")]
    pub database: Option<PathBuf>,

    /// Maximum number of steps in the tree
    #[arg(long, global = true, default_value_t = MAX_TOTAL_NODES)]
    pub max_nodes: usize,

    /// Maximum chain depth
    #[arg(long, global = true, default_value_t = MAX_TREE_DEPTH)]
    pub max_depth: usize,

    /// Rows per page
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Log debug output (including composed queries) to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl SessionOptions {
    pub fn config(&self) -> ExplorerConfig {
        ExplorerConfig {
            limits: Limits {
                max_nodes: self.max_nodes,
                max_depth: self.max_depth,
            },
            page_size: self.page_size.max(1),
        }
    }

    /// Open the database and state directory and start a session.
    ///
    /// Without a translator, proposals fail with a service error.
    pub fn open(&self, translator: Option<Arc<dyn Translator>>) -> Result<Explorer, CliError> {
        let engine = match &self.database {
            Some(path) => SqliteEngine::open(path)?,
            None => SqliteEngine::in_memory()?,
        };
        engine.ensure_base_table()?;

        let translator = translator.unwrap_or_else(|| Arc::new(Offline) as Arc<dyn Translator>);
        let blobs = Arc::new(FileStore::new(&self.state_dir));
        Ok(Explorer::open(Arc::new(engine), translator, blobs, self.config()))
    }
}

struct Offline;

#[async_trait]
impl Translator for Offline {
    async fn translate(&self, _prompt: &str, _parent_shape: &str) -> Result<Translation, TranslateError> {
        Err(TranslateError::Service("no translator configured".to_string()))
    }
}
