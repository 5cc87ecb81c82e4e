//! Anonymize → reverse round-trip tests
//!
//! Runs pseudonymization and list translation, persists the maps, loads
//! them back and reverses, the way a later process would.

mod helpers;

use famsort_ai::services::list_translator::ListFieldTranslator;
use famsort_ai::services::pii_redactor::PiiRedactor;
use famsort_ai::services::pseudonymizer::Pseudonymizer;
use famsort_ai::services::reverse_translator::ReverseTranslator;
use famsort_common::config::{DEFAULT_PII_KEYWORDS, IDENTITY_COLUMN};
use famsort_common::identifier::{is_manual_identifier, is_name_identifier};
use famsort_common::{normalize_name, ManualMap, NameMap};
use helpers::{survey_table, EMAIL_COLUMN, HOBBY_COLUMN, ROOMMATE_COLUMN};
use tempfile::TempDir;

fn pseudonymizer() -> Pseudonymizer {
    Pseudonymizer::new(PiiRedactor::new(
        DEFAULT_PII_KEYWORDS.iter(),
        ["user_id", ROOMMATE_COLUMN].iter().map(|s| s.to_string()),
    ))
}

#[test]
fn test_reverse_restores_identity_and_references() {
    // Given: respondents referencing each other and someone unknown
    let input = survey_table(&[
        ("1", "Jane Doe", "jane@x.edu", "Sam Lee, My Cousin", "chess", ""),
        ("2", "Sam Lee", "sam@x.edu", "jane doe", "climbing", ""),
        ("3", "Ana Ruiz", "", "", "baking", ""),
    ]);

    // When: anonymized, maps persisted and reloaded, then reversed
    let pseudo = pseudonymizer().pseudonymize(&input, IDENTITY_COLUMN).unwrap();
    let translator = ListFieldTranslator::new(vec![ROOMMATE_COLUMN.to_string()]);
    let translated = translator
        .translate(&pseudo.table, &pseudo.name_map, ManualMap::new())
        .unwrap();

    let dir = TempDir::new().unwrap();
    pseudo.name_map.save(&dir.path().join("names.csv")).unwrap();
    translated.manual_map.save(&dir.path().join("manual.csv")).unwrap();
    let names = NameMap::load(&dir.path().join("names.csv")).unwrap();
    let manual = ManualMap::load(&dir.path().join("manual.csv")).unwrap();

    let reversed = ReverseTranslator::new(&names, &manual)
        .reverse(&translated.table, &[ROOMMATE_COLUMN.to_string()], &[])
        .unwrap();

    // Then: every name and reference comes back, normalized
    let out = reversed.table;
    assert_eq!(out.len(), 3);
    for (row, original) in ["Jane Doe", "Sam Lee", "Ana Ruiz"].iter().enumerate() {
        assert_eq!(out.cell(row, "name"), Some(normalize_name(original).as_str()));
    }
    assert_eq!(out.cell(0, ROOMMATE_COLUMN), Some("sam_lee, [manual:my_cousin]"));
    assert_eq!(out.cell(1, ROOMMATE_COLUMN), Some("jane_doe"));
    assert_eq!(out.cell(2, ROOMMATE_COLUMN), Some(""));
    assert!(reversed.unknown_identifiers.is_empty());
    assert!(!out.has_column(EMAIL_COLUMN));
    assert_eq!(out.cell(2, HOBBY_COLUMN), Some("baking"));
}

#[test]
fn test_spacing_and_case_variants_share_user_id() {
    let input = survey_table(&[
        ("1", "Jane Doe", "", "", "", ""),
        ("2", " jane  doe ", "", "", "", ""),
        ("3", "JANE DOE", "", "", "", ""),
    ]);
    let pseudo = pseudonymizer().pseudonymize(&input, IDENTITY_COLUMN).unwrap();

    let ids = pseudo.table.column_values("user_id").unwrap();
    assert!(is_name_identifier(ids[0]));
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(pseudo.name_map.len(), 1);
}

#[test]
fn test_unmatched_reference_reuses_manual_identifier_across_rows() {
    let input = survey_table(&[
        ("1", "Jane Doe", "", "Coach Taylor", "", ""),
        ("2", "Sam Lee", "", "jane doe,  coach   taylor", "", ""),
    ]);
    let pseudo = pseudonymizer().pseudonymize(&input, IDENTITY_COLUMN).unwrap();
    let translated = ListFieldTranslator::new(vec![ROOMMATE_COLUMN.to_string()])
        .translate(&pseudo.table, &pseudo.name_map, ManualMap::new())
        .unwrap();

    let first = translated.table.cell(0, ROOMMATE_COLUMN).unwrap();
    let second: Vec<&str> = translated
        .table
        .cell(1, ROOMMATE_COLUMN)
        .unwrap()
        .split(", ")
        .collect();
    assert!(is_manual_identifier(first));
    assert_eq!(second[1], first);
    assert_eq!(translated.manual_map.len(), 1);
}

#[test]
fn test_translating_translated_table_is_noop() {
    let input = survey_table(&[
        ("1", "Jane Doe", "", "Sam Lee, stranger danger", "", ""),
        ("2", "Sam Lee", "", "", "", ""),
    ]);
    let pseudo = pseudonymizer().pseudonymize(&input, IDENTITY_COLUMN).unwrap();
    let translator = ListFieldTranslator::new(vec![ROOMMATE_COLUMN.to_string()]);

    let once = translator
        .translate(&pseudo.table, &pseudo.name_map, ManualMap::new())
        .unwrap();
    let twice = translator
        .translate(&once.table, &pseudo.name_map, once.manual_map.clone())
        .unwrap();

    assert_eq!(twice.table, once.table);
    assert_eq!(twice.manual_map.len(), once.manual_map.len());
}

#[test]
fn test_allow_listed_columns_survive_keyword_match() {
    // "Discord username" and "Email Address" match keywords; the allow-listed
    // "Preferred name tag" would too, but is kept
    let table = famsort_common::RespondentTable::from_rows(
        [
            IDENTITY_COLUMN,
            "Email Address",
            "favorite_color",
            "roommate",
            "Discord username",
            "Preferred name tag",
        ],
        vec![vec![
            "Jane Doe".into(),
            "j@x.edu".into(),
            "green".into(),
            "Sam Lee".into(),
            "jd#1234".into(),
            "JD".into(),
        ]],
    );
    let redactor = PiiRedactor::new(
        DEFAULT_PII_KEYWORDS.iter(),
        ["user_id", "roommate", "Preferred name tag"]
            .iter()
            .map(|s| s.to_string()),
    );

    let pseudo = Pseudonymizer::new(redactor)
        .pseudonymize(&table, IDENTITY_COLUMN)
        .unwrap();

    assert_eq!(
        pseudo.suppressed_columns,
        vec!["Email Address".to_string(), "Discord username".to_string()]
    );
    assert_eq!(
        pseudo.table.columns(),
        &["user_id", "favorite_color", "roommate", "Preferred name tag"]
    );
}
