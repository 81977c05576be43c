//! Orchestrator lifecycle.

use std::fmt;

/// Lifecycle of a [`MosaicOrchestrator`](super::MosaicOrchestrator) run.
///
/// ```text
/// Created → ProfileComputed → DatasetOpen → Writing → Closed
///     └──────────────┴──────────────┴──────────┴────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Created,
    ProfileComputed,
    DatasetOpen,
    Writing,
    Closed,
    /// A fatal error occurred; the output must be treated as invalid.
    Failed,
}

impl OrchestratorState {
    /// Whether the run has ended, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Closed | OrchestratorState::Failed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Created => "created",
            OrchestratorState::ProfileComputed => "profile-computed",
            OrchestratorState::DatasetOpen => "dataset-open",
            OrchestratorState::Writing => "writing",
            OrchestratorState::Closed => "closed",
            OrchestratorState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
