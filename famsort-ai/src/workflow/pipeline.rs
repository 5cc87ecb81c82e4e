//! Pipeline Orchestrator
//!
//! Coordinates one sorting run from raw responses to the reversed,
//! classified output table.
//!
//! # Architecture
//! - **Phase 1**: Anonymize (dedupe, pseudonymize, list translation, vault)
//! - **Phase 2**: Persist identifier maps to `<artifact_dir>/<run_id>/`
//! - **Phase 3**: Summarize and classify through the injected collaborators
//! - **Phase 4**: Write the classified table to a scoped temp dir, reload it
//!   with the persisted maps and reverse it
//!
//! # Error Handling
//! - Input problems (missing column, unsupported format) abort before any
//!   output is written
//! - Per-respondent and per-batch failures become [`RunDiagnostics`]
//! - The temp dir is removed on every exit path
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(config, client.clone(), client);
//! let diagnostics = pipeline.run(&request).await?;
//! ```

use super::{PipelineEvent, Stage};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::services::classifier::{BatchCoordinator, BatchFailure};
use crate::services::deduplicator::dedupe;
use crate::services::list_translator::ListFieldTranslator;
use crate::services::pseudonymizer::Pseudonymizer;
use crate::services::reverse_translator::{ReverseTranslator, NAME_COLUMN};
use crate::services::summarizer::summarize_respondents;
use crate::services::text_vault::vault;
use crate::spreadsheet::{read_csv_all_rows, read_table, write_table_csv};
use crate::types::{ClassificationOracle, ProfileSummarizer};
use anyhow::Context;
use famsort_common::config::USER_ID_COLUMN;
use famsort_common::maps::{MANUAL_MAP_FILE, NAME_MAP_FILE};
use famsort_common::{Error, ManualMap, NameMap, RespondentTable};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Column holding each respondent's profile summary
pub const SUMMARY_COLUMN: &str = "summary";

/// Column holding the assigned group label
pub const FAMILY_COLUMN: &str = "family";

/// Column holding the oracle's one-sentence rationale
pub const NOTES_COLUMN: &str = "notes";

const INTERMEDIATE_FILE: &str = "classified.csv";

/// Columns the pipeline writes into the output table
pub const RESERVED_COLUMNS: &[&str] = &[
    NAME_COLUMN,
    USER_ID_COLUMN,
    SUMMARY_COLUMN,
    FAMILY_COLUMN,
    NOTES_COLUMN,
];

/// File-to-file run request
#[derive(Debug, Clone)]
pub struct SortRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Free-text grouping instruction; blank means the configured default
    pub instruction: Option<String>,
}

/// Non-fatal findings of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDiagnostics {
    pub run_id: Uuid,
    /// Directory holding this run's persisted identifier maps
    pub map_dir: PathBuf,
    pub input_rows: usize,
    pub output_rows: usize,
    pub suppressed_columns: Vec<String>,
    /// Configured list columns absent from the input
    pub skipped_columns: Vec<String>,
    pub failed_summaries: Vec<String>,
    pub failed_batches: Vec<BatchFailure>,
    /// Eligible respondents left without a group
    pub missing_users: Vec<String>,
    /// Respondents whose assigned label was outside the fixed vocabulary
    pub rejected_users: Vec<String>,
    /// Respondents never sent to classification
    pub excluded_users: Vec<String>,
    pub group_labels: Option<Vec<String>>,
    pub unknown_identifiers: Vec<String>,
}

/// Output of [`Pipeline::run_table`]
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: RespondentTable,
    pub diagnostics: RunDiagnostics,
}

/// Sorting pipeline with explicitly supplied collaborators
pub struct Pipeline {
    config: PipelineConfig,
    summarizer: Arc<dyn ProfileSummarizer>,
    oracle: Arc<dyn ClassificationOracle>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    /// Create new pipeline with configuration and service handles
    pub fn new(
        config: PipelineConfig,
        summarizer: Arc<dyn ProfileSummarizer>,
        oracle: Arc<dyn ClassificationOracle>,
    ) -> Self {
        Self {
            config,
            summarizer,
            oracle,
            event_tx: None,
        }
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read `request.input`, run every stage, write `request.output`
    ///
    /// The output file is written only after the whole run succeeded.
    pub async fn run(&self, request: &SortRequest) -> PipelineResult<RunDiagnostics> {
        info!(input = %request.input.display(), "Pipeline processing file");

        let table = read_table(&request.input)?;
        let output = self.run_table(table, request.instruction.as_deref()).await?;

        write_table_csv(&output.table, &request.output)
            .with_context(|| format!("Failed to write output {}", request.output.display()))?;
        info!(output = %request.output.display(), rows = output.table.len(), "Output written");

        Ok(output.diagnostics)
    }

    /// Run every stage over an in-memory table
    pub async fn run_table(
        &self,
        table: RespondentTable,
        instruction: Option<&str>,
    ) -> PipelineResult<RunOutput> {
        let settings = &self.config.settings;
        let run_id = Uuid::new_v4();
        let mut diagnostics = RunDiagnostics {
            run_id,
            input_rows: table.len(),
            ..RunDiagnostics::default()
        };

        info!(run_id = %run_id, rows = table.len(), "Starting sorting run");
        self.emit_event(PipelineEvent::RunStarted {
            run_id,
            rows: table.len(),
        })
        .await;

        self.check_reserved_columns(&table)?;

        // Phase 1: Anonymize
        let deduped = dedupe(&table, &settings.timestamp_column, &settings.identity_column)?;
        self.stage_completed(Stage::Deduplicate, &deduped).await;

        let pseudonymized = Pseudonymizer::new(self.config.redactor())
            .pseudonymize(&deduped, &settings.identity_column)?;
        diagnostics.suppressed_columns = pseudonymized.suppressed_columns;
        let name_map = pseudonymized.name_map;
        self.stage_completed(Stage::Pseudonymize, &pseudonymized.table).await;

        let translated = ListFieldTranslator::new(settings.reference_columns.clone()).translate(
            &pseudonymized.table,
            &name_map,
            ManualMap::new(),
        )?;
        diagnostics.skipped_columns = translated.skipped_columns;
        let mut manual_map = translated.manual_map;
        self.stage_completed(Stage::TranslateLists, &translated.table).await;

        let vaulted = vault(&translated.table, &settings.free_text_column)?;
        manual_map.merge(vaulted.manual_map);
        let anonymized = vaulted.table;
        self.stage_completed(Stage::VaultFreeText, &anonymized).await;

        // Phase 2: Persist maps
        let map_dir = self.persist_maps(run_id, &name_map, &manual_map)?;
        diagnostics.map_dir = map_dir.clone();
        self.stage_completed(Stage::PersistMaps, &anonymized).await;

        // Phase 3: Summarize and classify
        let summaries = summarize_respondents(&anonymized, self.summarizer.as_ref()).await?;
        diagnostics.failed_summaries = summaries.failed.clone();
        self.stage_completed(Stage::Summarize, &anonymized).await;

        let instruction = self.config.effective_instruction(instruction);
        let outcome = BatchCoordinator::new(self.oracle.clone(), self.config.coordinator())
            .classify_all(&summaries.profiles, &instruction)
            .await;

        let summary_by_user: HashMap<&str, &str> = summaries
            .profiles
            .iter()
            .map(|p| (p.user_id.as_str(), p.text.as_str()))
            .collect();
        let user_ids = anonymized.column_values(USER_ID_COLUMN)?;
        let mut summary_values = Vec::with_capacity(user_ids.len());
        let mut family_values = Vec::with_capacity(user_ids.len());
        let mut notes_values = Vec::with_capacity(user_ids.len());
        for id in &user_ids {
            summary_values.push(summary_by_user.get(id).map(|s| s.to_string()).unwrap_or_default());
            match outcome.assignments.get(*id) {
                Some(assignment) => {
                    family_values.push(assignment.group_label.clone());
                    notes_values.push(assignment.rationale_note.clone());
                }
                None => {
                    family_values.push(String::new());
                    notes_values.push(String::new());
                }
            }
        }

        let classified = anonymized
            .with_column(SUMMARY_COLUMN, summary_values)?
            .with_column(FAMILY_COLUMN, family_values)?
            .with_column(NOTES_COLUMN, notes_values)?;

        diagnostics.failed_batches = outcome.failed_batches;
        diagnostics.missing_users = outcome.missing;
        diagnostics.rejected_users = outcome.rejected;
        diagnostics.excluded_users = outcome.excluded;
        diagnostics.group_labels = outcome.vocabulary.map(|v| v.labels().to_vec());
        let assigned = outcome.assignments.len();
        self.stage_completed(Stage::Classify, &classified).await;

        // Phase 4: Reverse through a scoped intermediate
        let reversed = self.reverse_via_intermediate(&classified, &map_dir)?;
        diagnostics.unknown_identifiers = reversed.unknown_identifiers;
        diagnostics.output_rows = reversed.table.len();
        self.stage_completed(Stage::Reverse, &reversed.table).await;

        info!(
            run_id = %run_id,
            assigned,
            missing = diagnostics.missing_users.len(),
            failed_batches = diagnostics.failed_batches.len(),
            failed_summaries = diagnostics.failed_summaries.len(),
            unknown_identifiers = diagnostics.unknown_identifiers.len(),
            "Sorting run complete"
        );
        self.emit_event(PipelineEvent::RunCompleted { run_id, assigned })
            .await;

        Ok(RunOutput {
            table: reversed.table,
            diagnostics,
        })
    }

    /// Reject inputs whose retained columns would be overwritten by output
    /// columns
    ///
    /// The identity column and suppressed columns never reach the output,
    /// so they may carry any name.
    fn check_reserved_columns(&self, table: &RespondentTable) -> PipelineResult<()> {
        let identity = &self.config.settings.identity_column;
        let candidates: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| *c != identity)
            .cloned()
            .collect();
        let suppressed = self.config.redactor().suppressed_columns(&candidates);

        let clash = candidates
            .iter()
            .find(|c| RESERVED_COLUMNS.contains(&c.as_str()) && !suppressed.contains(*c));
        match clash {
            Some(column) => Err(Error::InvalidInput(format!(
                "Input column '{}' collides with a column written by the pipeline; rename it",
                column
            ))
            .into()),
            None => Ok(()),
        }
    }

    /// Write both maps into a directory owned by this run
    fn persist_maps(
        &self,
        run_id: Uuid,
        name_map: &NameMap,
        manual_map: &ManualMap,
    ) -> PipelineResult<PathBuf> {
        let map_dir = self.config.artifact_dir.join(run_id.to_string());
        std::fs::create_dir_all(&map_dir)
            .with_context(|| format!("Failed to create artifact dir {}", map_dir.display()))?;

        name_map
            .save(&map_dir.join(NAME_MAP_FILE))
            .context("Failed to persist name map")?;
        manual_map
            .save(&map_dir.join(MANUAL_MAP_FILE))
            .context("Failed to persist manual map")?;

        info!(
            map_dir = %map_dir.display(),
            names = name_map.len(),
            manual = manual_map.len(),
            "Identifier maps persisted"
        );
        Ok(map_dir)
    }

    /// Round-trip the classified table through a temp file and reverse it
    /// with maps loaded back from `map_dir`
    fn reverse_via_intermediate(
        &self,
        classified: &RespondentTable,
        map_dir: &Path,
    ) -> PipelineResult<crate::services::reverse_translator::Reversed> {
        let scratch = tempfile::TempDir::new().context("Failed to create temp dir")?;
        let intermediate = scratch.path().join(INTERMEDIATE_FILE);
        write_table_csv(classified, &intermediate).context("Failed to write intermediate")?;
        debug!(path = %intermediate.display(), "Intermediate written");

        let reloaded = read_csv_all_rows(&intermediate).context("Failed to read intermediate")?;
        let name_map =
            NameMap::load(&map_dir.join(NAME_MAP_FILE)).context("Failed to reload name map")?;
        let manual_map = ManualMap::load(&map_dir.join(MANUAL_MAP_FILE))
            .context("Failed to reload manual map")?;

        let settings = &self.config.settings;
        let mut list_columns = settings.reference_columns.clone();
        list_columns.push(settings.free_text_column.clone());

        let reversed = ReverseTranslator::new(&name_map, &manual_map)
            .reverse(&reloaded, &list_columns, &[NOTES_COLUMN.to_string()])
            .map_err(|e| PipelineError::Processing(anyhow::Error::new(e)))?;

        if !reversed.unknown_identifiers.is_empty() {
            warn!(
                count = reversed.unknown_identifiers.len(),
                "Output carries unresolved identifiers"
            );
        }

        // `scratch` drops here, on success and on every `?` above
        Ok(reversed)
    }

    async fn stage_completed(&self, stage: Stage, table: &RespondentTable) {
        debug!(stage = ?stage, rows = table.len(), "Stage completed");
        self.emit_event(PipelineEvent::StageCompleted {
            stage,
            rows: table.len(),
        })
        .await;
    }

    async fn emit_event(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Reverse a classified CSV using persisted maps, outside a full run
///
/// Returns the unresolved identifiers.
pub fn reverse_file(
    input: &Path,
    name_map_path: &Path,
    manual_map_path: &Path,
    list_columns: &[String],
    output: &Path,
) -> PipelineResult<Vec<String>> {
    let table = read_table(input)?;
    let name_map = NameMap::load(name_map_path)?;
    let manual_map = ManualMap::load(manual_map_path)?;

    let reversed = ReverseTranslator::new(&name_map, &manual_map).reverse(
        &table,
        list_columns,
        &[NOTES_COLUMN.to_string()],
    )?;

    write_table_csv(&reversed.table, output)
        .with_context(|| format!("Failed to write output {}", output.display()))?;
    info!(
        output = %output.display(),
        rows = reversed.table.len(),
        unknown = reversed.unknown_identifiers.len(),
        "Reverse translation written"
    );
    Ok(reversed.unknown_identifiers)
}
