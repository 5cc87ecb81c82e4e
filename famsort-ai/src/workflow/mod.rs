//! End-to-end sorting workflow
//!
//! Runs the stages in order over one respondent table:
//! - **Anonymize**: deduplicate, pseudonymize, translate list fields, vault
//!   free text, persist the identifier maps
//! - **Classify**: summarize respondents, batch them through the oracle
//! - **Reverse**: restore names from the persisted maps
//!
//! Progress can be observed through an optional [`PipelineEvent`] channel.

pub mod pipeline;

pub use pipeline::{Pipeline, RunDiagnostics, RunOutput, SortRequest};

use serde::Serialize;
use uuid::Uuid;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Deduplicate,
    Pseudonymize,
    TranslateLists,
    VaultFreeText,
    PersistMaps,
    Summarize,
    Classify,
    Reverse,
}

/// Progress events emitted during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Run accepted its input table
    RunStarted {
        run_id: Uuid,
        /// Rows before deduplication
        rows: usize,
    },

    /// A stage finished
    StageCompleted {
        stage: Stage,
        /// Rows in the stage's output table
        rows: usize,
    },

    /// Run produced its output table
    RunCompleted {
        run_id: Uuid,
        /// Respondents with a group assignment
        assigned: usize,
    },
}
