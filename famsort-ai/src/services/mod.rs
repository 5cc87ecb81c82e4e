//! Pipeline stage implementations
//!
//! Local stages (redaction, deduplication, pseudonymization, list
//! translation, vaulting, reversal) are pure table transforms. The
//! summarizer and classifier drive the external service through the trait
//! seams in [`crate::types`].

pub mod classifier;
pub mod deduplicator;
pub mod list_translator;
pub mod openai_client;
pub mod pii_redactor;
pub mod prompts;
pub mod pseudonymizer;
pub mod reverse_translator;
pub mod summarizer;
pub mod text_vault;

pub use classifier::{
    BatchCoordinator, BatchFailure, ClassificationOutcome, CoordinatorConfig, GroupVocabulary,
};
pub use deduplicator::dedupe;
pub use list_translator::{ListFieldTranslator, ListTranslation};
pub use openai_client::OpenAiClient;
pub use pii_redactor::{ColumnClass, PiiRedactor};
pub use pseudonymizer::{Pseudonymized, Pseudonymizer};
pub use reverse_translator::{Reversed, ReverseTranslator, NAME_COLUMN};
pub use summarizer::{summarize_respondents, SummaryReport};
pub use text_vault::{vault, VaultResult};
