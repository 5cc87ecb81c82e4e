//! Core types and trait seams for famsort-ai
//!
//! The two external collaborators are traits so a run can be handed a real
//! HTTP client or a test double:
//! - [`ProfileSummarizer`]: respondent fields → short profile text
//! - [`ClassificationOracle`]: instruction + profiles → raw JSON-ish text
//!
//! Neither trait promises structured output; validation happens in the
//! stages that call them.

use crate::error::OracleError;
use serde::{Deserialize, Serialize};

/// Summary recorded for a respondent whose summarization call failed
pub const SUMMARY_FAILED: &str = "[summary failed]";

/// One respondent's profile as sent to classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: String,
    pub text: String,
}

impl Profile {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
        }
    }

    /// Eligible for classification (non-empty, not a failure marker)
    pub fn is_classifiable(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty() && text != SUMMARY_FAILED
    }
}

/// Group assignment for one respondent, as the oracle phrases it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    #[serde(rename = "family")]
    pub group_label: String,
    #[serde(rename = "notes", default)]
    pub rationale_note: String,
}

/// Profile summarization service
#[async_trait::async_trait]
pub trait ProfileSummarizer: Send + Sync {
    /// Summarize one respondent's `(field, answer)` pairs
    async fn summarize(&self, fields: &[(String, String)]) -> Result<String, OracleError>;
}

/// Group classification service
#[async_trait::async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Classify one batch of profiles, returning the service's raw reply
    async fn classify(
        &self,
        instruction: &str,
        participants: &[Profile],
    ) -> Result<String, OracleError>;
}
