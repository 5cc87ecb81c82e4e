//! # famsort Common Library
//!
//! Shared code for the famsort pipeline crates:
//! - Error type
//! - TOML configuration and API key resolution
//! - Identifier minting and recognition
//! - Respondent table model
//! - Name/manual identifier maps and their persistence

pub mod config;
pub mod error;
pub mod identifier;
pub mod maps;
pub mod table;

pub use error::{Error, Result};
pub use identifier::Identifier;
pub use maps::{normalize_name, ManualMap, NameMap};
pub use table::RespondentTable;
