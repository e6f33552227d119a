//! Input validation for user-supplied identifiers.
//!
//! Stage and checkpoint ids end up in file path construction, so they are
//! validated before use to rule out path traversal and reserved names.

use anyhow::{bail, Result};

/// Maximum allowed length for ids (stages, producers, checkpoints).
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum allowed length for descriptions and reasons.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Reserved names that cannot be used as ids (case-insensitive).
const RESERVED_NAMES: &[&str] = &[
    ".", "..", "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
    "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Validates that an id is safe for use in file paths.
///
/// An id is valid if it is non-empty, at most MAX_ID_LENGTH characters, made
/// of alphanumerics, dashes, and underscores only, and not a reserved name.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("ID cannot be empty");
    }

    if id.len() > MAX_ID_LENGTH {
        bail!(
            "ID too long: {} characters (max {})",
            id.len(),
            MAX_ID_LENGTH
        );
    }

    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_chars {
        bail!("ID '{id}' contains invalid characters. Use only alphanumeric characters, dashes (-), and underscores (_)");
    }

    let id_lower = id.to_lowercase();
    if RESERVED_NAMES.contains(&id_lower.as_str()) {
        bail!("ID '{id}' uses a reserved name");
    }

    Ok(())
}

/// Validates that a description or reason is within length limits.
pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        bail!(
            "Description too long: {} characters (max {})",
            description.len(),
            MAX_DESCRIPTION_LENGTH
        );
    }
    Ok(())
}

/// Clap value parser for validating id arguments at parse time.
pub fn clap_id_validator(s: &str) -> Result<String, String> {
    validate_id(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

/// Clap value parser for validating description/reason arguments.
pub fn clap_description_validator(s: &str) -> Result<String, String> {
    validate_description(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}
