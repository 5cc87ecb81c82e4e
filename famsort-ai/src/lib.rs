//! famsort-ai library interface
//!
//! Anonymizes survey responses, groups respondents through an external
//! language-model service and restores names in the output. The binary in
//! `main.rs` is a thin CLI over [`workflow::Pipeline`].

pub mod config;
pub mod error;
pub mod services;
pub mod spreadsheet;
pub mod types;
pub mod workflow;

pub use crate::error::{OracleError, PipelineError, PipelineResult};
pub use crate::types::{ClassificationOracle, GroupAssignment, Profile, ProfileSummarizer};
pub use crate::workflow::{Pipeline, PipelineEvent, RunDiagnostics, SortRequest, Stage};
