//! Logical-to-physical column resolution and allow-list validation.

use crate::settings::{PlannerSettings, normalize_identifier};

/// Result of filtering resolved columns against the allow-list. Order is
/// preserved on both sides.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ValidatedColumns {
    pub kept: Vec<String>,
    pub rejected: Vec<String>,
}

impl ValidatedColumns {
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

/// Expands a column token into its physical columns.
///
/// A token that is already a fan-out target anywhere in the alias map is a
/// direct physical reference and never re-expands. A configured logical
/// alias expands to its full ordered target list. Everything else passes
/// through as a single normalized column.
pub fn resolve_columns(token: &str, settings: &PlannerSettings) -> Vec<String> {
    let normalized = normalize_identifier(token);
    if normalized.is_empty() {
        return Vec::new();
    }
    if settings.is_alias_target(&normalized) {
        return vec![normalized];
    }
    if let Some(targets) = settings.alias_targets(&normalized) {
        return targets.to_vec();
    }
    vec![normalized]
}

/// Keeps the allow-listed subset of the resolved columns, recording the
/// rest. An empty `kept` set means the owning clause must be dropped.
pub fn validate_columns(columns: &[String], settings: &PlannerSettings) -> ValidatedColumns {
    let mut validated = ValidatedColumns::default();
    for column in columns {
        if settings.allows(column) {
            validated.kept.push(column.clone());
        } else {
            validated.rejected.push(column.clone());
        }
    }
    validated
}

/// Convenience for the resolve-then-validate sequence every filter clause
/// goes through.
pub fn resolve_and_validate(token: &str, settings: &PlannerSettings) -> ValidatedColumns {
    validate_columns(&resolve_columns(token, settings), settings)
}
