//! Batch classification coordinator
//!
//! Splits respondents into fixed-size batches, sends each to the
//! classification oracle and merges the replies into one assignment table.
//!
//! # Group vocabulary
//! The oracle keeps no memory between calls, so a label like "Group B"
//! would mean something different in every batch unless the label set is
//! pinned. The vocabulary is fixed before the first call whenever a group
//! count is known:
//! - instruction says "N groups" → N lettered labels
//! - no count but more than one batch → the default count
//! - no count and a single batch → unfixed; the oracle picks its own labels
//!
//! # Error Handling
//! - A failed call or an unparsable reply voids that batch only
//! - Users absent from a reply, or given a label outside a fixed vocabulary,
//!   are reported missing
//! - Failed batches are not retried

use crate::types::{ClassificationOracle, GroupAssignment, Profile};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Group count used when the instruction does not name one
pub const DEFAULT_GROUP_COUNT: usize = 5;

/// Lettered labels run from "Group A" to "Group Z"
pub const MAX_GROUP_COUNT: usize = 26;

/// Respondents per oracle call
pub const DEFAULT_BATCH_SIZE: usize = 40;

static GROUP_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+groups?\b").expect("group count pattern"));

/// Ordered group labels shared by every batch of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVocabulary(Vec<String>);

impl GroupVocabulary {
    /// `count` lettered labels: "Group A", "Group B", ...
    pub fn lettered(count: usize) -> Self {
        Self(
            (0..count.min(MAX_GROUP_COUNT))
                .map(|i| format!("Group {}", (b'A' + i as u8) as char))
                .collect(),
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical spelling of `label` if it belongs to the vocabulary
    ///
    /// Matching ignores case and surrounding whitespace.
    pub fn canonical(&self, label: &str) -> Option<&str> {
        let label = label.trim();
        self.0
            .iter()
            .find(|l| l.eq_ignore_ascii_case(label))
            .map(String::as_str)
    }
}

/// Explicit "N groups" request in the instruction, if any
///
/// Only counts from 1 to [`MAX_GROUP_COUNT`] qualify; "100 groups" is not a
/// usable request and is ignored.
pub fn requested_group_count(instruction: &str) -> Option<usize> {
    GROUP_COUNT_RE
        .captures_iter(instruction)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        .find(|n| (1..=MAX_GROUP_COUNT).contains(n))
}

/// Instruction text with a default group count when none usable is given
///
/// Without any count the default is appended; an out-of-range count such as
/// "0 groups" is rewritten to the default so the prompt names one number.
pub fn with_default_group_count(instruction: &str, default_count: usize) -> String {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return format!(
            "Group people into {} meaningful families based on similar vibes, energy, or shared interests.",
            default_count
        );
    }
    if requested_group_count(instruction).is_some() {
        return instruction.to_string();
    }
    if GROUP_COUNT_RE.is_match(instruction) {
        return GROUP_COUNT_RE
            .replace_all(instruction, format!("{} groups", default_count))
            .into_owned();
    }
    format!(
        "{} Group everyone into {} total families unless otherwise specified.",
        instruction, default_count
    )
}

/// Per-batch instruction
///
/// With a fixed vocabulary every batch, the first included, is told its
/// position and the exact labels it may use.
pub fn batch_instruction(
    instruction: &str,
    vocabulary: Option<&GroupVocabulary>,
    batch_index: usize,
    batch_count: usize,
) -> String {
    match vocabulary {
        None => instruction.to_string(),
        Some(vocabulary) => format!(
            "{}\n\nYou are sorting batch {} of {}. The total number of groups across all batches must be exactly {}.\n\
             Do not create new group names. Only assign participants to the following:\n{}.",
            instruction.trim(),
            batch_index + 1,
            batch_count,
            vocabulary.len(),
            vocabulary.labels().join(", ")
        ),
    }
}

/// Decoded oracle reply
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// `{user_id: {"family": ..., "notes": ...}}`
    Parsed(HashMap<String, GroupAssignment>),
    /// Anything else; the reason is the decoder's message
    Malformed(String),
}

/// Strip an optional Markdown code fence around the reply
fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
        if text.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            text = &text[4..];
        }
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Strictly decode an oracle reply
pub fn decode_reply(raw: &str) -> OracleReply {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return OracleReply::Malformed("empty reply".to_string());
    }
    match serde_json::from_str::<HashMap<String, GroupAssignment>>(body) {
        Ok(map) => OracleReply::Parsed(map),
        Err(e) => OracleReply::Malformed(e.to_string()),
    }
}

/// A batch that contributed no assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Zero-based batch position
    pub index: usize,
    pub user_ids: Vec<String>,
    pub reason: String,
}

/// Result of [`BatchCoordinator::classify_all`]
#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub assignments: HashMap<String, GroupAssignment>,
    /// Labels enforced for this run, when fixed
    pub vocabulary: Option<GroupVocabulary>,
    pub batch_count: usize,
    pub failed_batches: Vec<BatchFailure>,
    /// Eligible users with no accepted assignment, in input order
    pub missing: Vec<String>,
    /// Users whose reply used a label outside the fixed vocabulary
    pub rejected: Vec<String>,
    /// Users left out before batching (empty or failed summary)
    pub excluded: Vec<String>,
}

/// Coordinator tuning
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub batch_size: usize,
    pub default_group_count: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_group_count: DEFAULT_GROUP_COUNT,
        }
    }
}

/// Drives batched classification against one oracle
pub struct BatchCoordinator {
    oracle: Arc<dyn ClassificationOracle>,
    config: CoordinatorConfig,
}

impl BatchCoordinator {
    pub fn new(oracle: Arc<dyn ClassificationOracle>, config: CoordinatorConfig) -> Self {
        Self {
            oracle,
            config: CoordinatorConfig {
                batch_size: config.batch_size.max(1),
                default_group_count: config.default_group_count.clamp(1, MAX_GROUP_COUNT),
            },
        }
    }

    /// Classify every eligible profile
    ///
    /// **Algorithm:**
    /// 1. Drop profiles with empty or failed summaries
    /// 2. Resolve the group count and, if known, fix the vocabulary
    /// 3. Chunk profiles in input order and call the oracle per chunk
    /// 4. Decode each reply strictly; a malformed reply voids its batch
    /// 5. Accept only users of that batch, with in-vocabulary labels
    /// 6. Report every eligible user without an accepted assignment
    pub async fn classify_all(&self, profiles: &[Profile], instruction: &str) -> ClassificationOutcome {
        let mut outcome = ClassificationOutcome::default();

        let (eligible, excluded): (Vec<&Profile>, Vec<&Profile>) =
            profiles.iter().partition(|p| p.is_classifiable());
        outcome.excluded = excluded.iter().map(|p| p.user_id.clone()).collect();

        if eligible.is_empty() {
            tracing::warn!("No respondents eligible for classification");
            return outcome;
        }

        let batch_size = self.config.batch_size;
        let explicit = requested_group_count(instruction);
        let single_batch = eligible.len() <= batch_size;
        let prompt_instruction = with_default_group_count(instruction, self.config.default_group_count);

        outcome.vocabulary = match explicit {
            Some(n) => Some(GroupVocabulary::lettered(n)),
            None if !single_batch => Some(GroupVocabulary::lettered(self.config.default_group_count)),
            None => None,
        };

        let batches: Vec<Vec<Profile>> = eligible
            .chunks(batch_size)
            .map(|chunk| chunk.iter().map(|p| (*p).clone()).collect())
            .collect();
        outcome.batch_count = batches.len();

        tracing::info!(
            eligible = eligible.len(),
            excluded = outcome.excluded.len(),
            batches = batches.len(),
            batch_size,
            groups = outcome.vocabulary.as_ref().map(|v| v.len()),
            "Classifying respondents"
        );

        for (index, batch) in batches.iter().enumerate() {
            let instruction = batch_instruction(
                &prompt_instruction,
                outcome.vocabulary.as_ref(),
                index,
                batches.len(),
            );
            tracing::info!(batch = index + 1, of = batches.len(), users = batch.len(), "Sorting batch");

            match self.run_batch(index, batch, &instruction, outcome.vocabulary.as_ref()).await {
                Ok(accepted) => {
                    let BatchAccepted { assignments, rejected } = accepted;
                    let missing: Vec<&str> = batch
                        .iter()
                        .map(|p| p.user_id.as_str())
                        .filter(|id| !assignments.contains_key(*id))
                        .collect();
                    if !missing.is_empty() {
                        tracing::warn!(
                            batch = index + 1,
                            missing = missing.len(),
                            users = ?missing,
                            "Oracle skipped users in batch"
                        );
                    }
                    outcome.rejected.extend(rejected);
                    outcome.assignments.extend(assignments);
                }
                Err(failure) => {
                    tracing::error!(
                        batch = index + 1,
                        users = failure.user_ids.len(),
                        reason = %failure.reason,
                        "Batch produced no assignments"
                    );
                    outcome.failed_batches.push(failure);
                }
            }
        }

        outcome.missing = eligible
            .iter()
            .filter(|p| !outcome.assignments.contains_key(&p.user_id))
            .map(|p| p.user_id.clone())
            .collect();

        if !outcome.missing.is_empty() {
            tracing::warn!(
                missing = outcome.missing.len(),
                "Users left unsorted after all batches"
            );
        }
        tracing::info!(
            assigned = outcome.assignments.len(),
            failed_batches = outcome.failed_batches.len(),
            "Classification complete"
        );

        outcome
    }

    async fn run_batch(
        &self,
        index: usize,
        batch: &[Profile],
        instruction: &str,
        vocabulary: Option<&GroupVocabulary>,
    ) -> Result<BatchAccepted, BatchFailure> {
        let failure = |reason: String| BatchFailure {
            index,
            user_ids: batch.iter().map(|p| p.user_id.clone()).collect(),
            reason,
        };

        let raw = self
            .oracle
            .classify(instruction, batch)
            .await
            .map_err(|e| failure(e.to_string()))?;
        tracing::debug!(batch = index + 1, bytes = raw.len(), "Oracle replied");

        let reply = match decode_reply(&raw) {
            OracleReply::Parsed(reply) => reply,
            OracleReply::Malformed(reason) => {
                return Err(failure(format!("malformed reply: {}", reason)))
            }
        };

        Ok(accept_reply(index, batch, reply, vocabulary))
    }
}

struct BatchAccepted {
    assignments: HashMap<String, GroupAssignment>,
    rejected: Vec<String>,
}

/// Keep the reply entries that belong to this batch and use valid labels
fn accept_reply(
    index: usize,
    batch: &[Profile],
    reply: HashMap<String, GroupAssignment>,
    vocabulary: Option<&GroupVocabulary>,
) -> BatchAccepted {
    let members: HashSet<&str> = batch.iter().map(|p| p.user_id.as_str()).collect();
    let mut assignments = HashMap::new();
    let mut rejected = Vec::new();
    let mut foreign = 0usize;

    for (user_id, assignment) in reply {
        let user_id = user_id.trim().to_string();
        if !members.contains(user_id.as_str()) {
            foreign += 1;
            continue;
        }
        let label = match vocabulary {
            Some(vocabulary) => match vocabulary.canonical(&assignment.group_label) {
                Some(label) => label.to_string(),
                None => {
                    tracing::warn!(
                        batch = index + 1,
                        user_id = %user_id,
                        label = %assignment.group_label,
                        "Rejecting label outside the group vocabulary"
                    );
                    rejected.push(user_id);
                    continue;
                }
            },
            None => assignment.group_label.trim().to_string(),
        };
        if label.is_empty() {
            rejected.push(user_id);
            continue;
        }
        assignments.insert(
            user_id,
            GroupAssignment {
                group_label: label,
                rationale_note: assignment.rationale_note.trim().to_string(),
            },
        );
    }

    // Foreign keys are oracle text and may be names; only the count is logged
    if foreign > 0 {
        tracing::warn!(batch = index + 1, ignored = foreign, "Ignoring reply keys not in this batch");
    }

    rejected.sort_by_key(|id| batch.iter().position(|p| &p.user_id == id));

    BatchAccepted {
        assignments,
        rejected,
    }
}
