//! Prompt text sent to the language-model service

use crate::types::Profile;

/// System message for classification calls
pub const CLASSIFICATION_SYSTEM_MESSAGE: &str =
    "You are a friendly, intuitive and reliable AI sorting assistant.";

/// Summary prompt for one respondent's `(field, answer)` pairs
pub fn summary_prompt(fields: &[(String, String)]) -> String {
    let answers = fields
        .iter()
        .map(|(field, value)| format!("{}: {}", field, value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are summarizing a user's form responses.\n\
         Compress the content into 1-2 bullet points without losing emotional tone or subtle personal preferences.\n\
         Preserve important feelings, intentions, and context even if they seem casual or emotional.\n\
         Do not over-formalize or flatten the voice.\n\n\
         {}",
        answers
    )
}

/// Classification prompt for one batch
///
/// `instruction` is the per-batch instruction, already carrying the group
/// count and, when fixed, the label list and batch position.
pub fn classification_prompt(instruction: &str, participants: &[Profile]) -> String {
    let entries = participants
        .iter()
        .map(|p| format!("- {}: {}", p.user_id, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a personality-based group formation expert.\n\
         Create meaningful, compatible groups of people based solely on their summaries and the instruction provided.\n\
         You are clustering people like a social matchmaker, not distributing them evenly or rotating group names.\n\
         Avoid repetitive or modulo-like assignment patterns. Let compatibility guide you.\n\n\
         Unless otherwise instructed, use lettered group names: 'Group A', 'Group B', etc.\n\
         Use consistent naming and do not invent creative group names unless explicitly told to.\n\n\
         Instruction:\n{instruction}\n\n\
         Participants:\n{entries}\n\n\
         Return the result as a JSON object with the format:\n\
         {{\n  \"user_id\": {{\n    \"family\": \"Group A\",\n    \"notes\": \"One sentence explaining the assignment.\"\n  }}\n}}\n\
         Return valid JSON only, with no explanation.\n\
         Every user_id listed above must be assigned to one of the group names you use.\n\
         If you reference other users in the notes, use their user_id exactly as written.",
    )
}
