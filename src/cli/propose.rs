//! Add or edit a step from a prompt and a translator response

use super::CliError;
use crate::explorer::{DraftTarget, Explorer, Proposal};
use crate::node::NodeId;

/// Options for the add and edit commands
#[derive(Debug, Clone)]
pub struct ProposeOptions {
    /// New step's parent, or the step being replaced
    pub target: DraftTarget,
    /// The natural-language request
    pub prompt: String,
    /// Commit even if the step returns no rows
    pub keep_empty: bool,
}

/// Result of a propose operation
#[derive(Debug, PartialEq)]
pub enum ProposeResult {
    /// Validated and committed
    Committed(NodeId),
    /// Returned no rows, committed because `keep_empty` was set
    KeptEmpty(NodeId),
    /// The translator needs more detail before it can produce a step
    Clarification(String),
}

/// Execute an add or edit through the session
pub async fn execute_propose(
    explorer: &mut Explorer,
    options: ProposeOptions,
) -> Result<ProposeResult, CliError> {
    let proposal = match &options.target {
        DraftTarget::Add { parent } => explorer.propose_add(parent.as_ref(), &options.prompt).await?,
        DraftTarget::Edit { node } => explorer.propose_edit(node, &options.prompt).await?,
    };

    match proposal {
        Proposal::Committed(id) => Ok(ProposeResult::Committed(id)),
        Proposal::NeedsClarification(question) => Ok(ProposeResult::Clarification(question)),
        Proposal::EmptyResult(draft) if options.keep_empty => {
            let id = explorer.commit_draft(draft)?;
            Ok(ProposeResult::KeptEmpty(id))
        }
        Proposal::EmptyResult(_) => Err(CliError::EmptyResult),
    }
}
