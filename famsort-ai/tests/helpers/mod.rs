//! Test Helper Utilities
//!
//! Shared doubles and builders for famsort-ai integration tests

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use async_trait::async_trait;
use famsort_ai::config::PipelineConfig;
use famsort_ai::{ClassificationOracle, OracleError, Profile, ProfileSummarizer};
use famsort_common::config::{FREE_TEXT_COLUMN, IDENTITY_COLUMN, TIMESTAMP_COLUMN};
use famsort_common::RespondentTable;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Summarizer that joins the answers it is given
///
/// Any answer containing `fail` makes the call error.
#[derive(Default)]
pub struct EchoSummarizer {
    pub calls: Mutex<Vec<Vec<(String, String)>>>,
}

#[async_trait]
impl ProfileSummarizer for EchoSummarizer {
    async fn summarize(&self, fields: &[(String, String)]) -> Result<String, OracleError> {
        self.calls.lock().unwrap().push(fields.to_vec());
        if fields.iter().any(|(_, v)| v.contains("fail")) {
            return Err(OracleError::Api {
                status: 500,
                body: "upstream error".to_string(),
            });
        }
        Ok(fields
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("; "))
    }
}

/// Oracle assigning participants round-robin over fixed labels
///
/// Each note mentions the next participant's user_id. Users in `skip` are
/// left out of the reply, users in `off_label` get "Group Zeta".
pub struct RoundRobinOracle {
    pub labels: Vec<String>,
    pub skip: HashSet<String>,
    pub off_label: HashSet<String>,
    pub fenced: bool,
    pub instructions: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl RoundRobinOracle {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            skip: HashSet::new(),
            off_label: HashSet::new(),
            fenced: false,
            instructions: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn skipping<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.skip.extend(ids);
        self
    }

    pub fn off_label<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.off_label.extend(ids);
        self
    }

    pub fn fenced(mut self) -> Self {
        self.fenced = true;
        self
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassificationOracle for RoundRobinOracle {
    async fn classify(
        &self,
        instruction: &str,
        participants: &[Profile],
    ) -> Result<String, OracleError> {
        self.instructions.lock().unwrap().push(instruction.to_string());
        self.batches
            .lock()
            .unwrap()
            .push(participants.iter().map(|p| p.user_id.clone()).collect());

        let mut reply = Map::new();
        for (i, p) in participants.iter().enumerate() {
            if self.skip.contains(&p.user_id) {
                continue;
            }
            let label = if self.off_label.contains(&p.user_id) {
                "Group Zeta".to_string()
            } else {
                self.labels[i % self.labels.len()].clone()
            };
            let buddy = &participants[(i + 1) % participants.len()].user_id;
            reply.insert(
                p.user_id.clone(),
                json!({ "family": label, "notes": format!("Matched with {} over shared hobbies.", buddy) }),
            );
        }

        let body = Value::Object(reply).to_string();
        Ok(if self.fenced {
            format!("```json\n{}\n```", body)
        } else {
            body
        })
    }
}

/// Oracle returning the same raw text for every batch
pub struct CannedOracle(pub String);

#[async_trait]
impl ClassificationOracle for CannedOracle {
    async fn classify(&self, _: &str, _: &[Profile]) -> Result<String, OracleError> {
        Ok(self.0.clone())
    }
}

/// Oracle whose calls always fail
pub struct DownOracle;

#[async_trait]
impl ClassificationOracle for DownOracle {
    async fn classify(&self, _: &str, _: &[Profile]) -> Result<String, OracleError> {
        Err(OracleError::Network("connection refused".to_string()))
    }
}

/// Survey row: timestamp, name, email, roommate list, hobby, anything else
pub type SurveyRow<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, &'a str);

pub const EMAIL_COLUMN: &str = "Email Address";
pub const ROOMMATE_COLUMN: &str = "roommate";
pub const HOBBY_COLUMN: &str = "Favorite hobby";

/// Table shaped like the deployed form
pub fn survey_table(rows: &[SurveyRow<'_>]) -> RespondentTable {
    RespondentTable::from_rows(
        [
            TIMESTAMP_COLUMN,
            IDENTITY_COLUMN,
            EMAIL_COLUMN,
            ROOMMATE_COLUMN,
            HOBBY_COLUMN,
            FREE_TEXT_COLUMN,
        ],
        rows.iter()
            .map(|(ts, name, email, roommate, hobby, extra)| {
                vec![
                    ts.to_string(),
                    name.to_string(),
                    email.to_string(),
                    roommate.to_string(),
                    hobby.to_string(),
                    extra.to_string(),
                ]
            })
            .collect(),
    )
}

/// Default pipeline config writing maps under `artifact_dir`
pub fn test_config(artifact_dir: &Path) -> PipelineConfig {
    PipelineConfig::default().with_artifact_dir(artifact_dir)
}

/// `count` profiles with ids `user-000`, `user-001`, ...
pub fn synthetic_profiles(count: usize) -> Vec<Profile> {
    (0..count)
        .map(|i| Profile::new(format!("user-{:03}", i), format!("enjoys activity {}", i)))
        .collect()
}
