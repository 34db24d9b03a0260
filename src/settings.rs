//! Configuration value objects consumed by the compiler.
//!
//! Every compile receives a point-in-time [`PlannerSettings`] snapshot by
//! reference; the core never reaches into ambient state. [`PlannerSettings::load`]
//! is a convenience that layers the built-in Contract defaults, an optional
//! `commentql` settings file and `COMMENTQL_`-prefixed environment overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CommentqlError, Result};

/// Synonym lists configured for one enum value of one column.
///
/// `equals` entries extend the `IN` list, `prefix` and `contains` entries
/// compile to `LIKE` tests next to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynonymSet {
    #[serde(default)]
    pub equals: Vec<String>,
    #[serde(default)]
    pub prefix: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
}

impl SynonymSet {
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.prefix.is_empty() && self.contains.is_empty()
    }
}

/// Full-text search contract consumed from the configuration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtsSettings {
    /// Ordered columns matched by every search token.
    pub columns: Vec<String>,
    /// Engine identifier; `like` selects plain substring comparison.
    pub engine: String,
    /// Tokens shorter than this are discarded.
    pub min_token_len: usize,
}

impl Default for FtsSettings {
    fn default() -> Self {
        Self {
            columns: default_fts_columns(),
            engine: "like".to_string(),
            min_token_len: 2,
        }
    }
}

/// Read-only configuration snapshot for one compile invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Target table, rendered double-quoted.
    pub table: String,
    /// Physical columns permitted to appear in predicates and groupings.
    pub allow_list: Vec<String>,
    /// Logical column name to ordered physical fan-out columns.
    pub alias_map: BTreeMap<String, Vec<String>>,
    /// Column to lowercase value to synonym lists.
    pub enum_synonyms: BTreeMap<String, BTreeMap<String, SynonymSet>>,
    pub fts: FtsSettings,
    /// ORDER BY fallback when the comment specifies none.
    pub default_order_column: String,
    /// The net measure column; the gross measure derives from it.
    pub net_measure_column: String,
    /// Case-insensitive comparison unless a clause opts out wider.
    pub default_ci: bool,
    /// Trim both operands unless a clause opts out wider.
    pub default_trim: bool,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        let mut alias_map = BTreeMap::new();
        let departments: Vec<String> = (1..=8)
            .map(|n| format!("DEPARTMENT_{n}"))
            .chain(std::iter::once("OWNER_DEPARTMENT".to_string()))
            .collect();
        let stakeholders: Vec<String> = (1..=8)
            .map(|n| format!("CONTRACT_STAKEHOLDER_{n}"))
            .collect();
        alias_map.insert("DEPARTMENT".to_string(), departments.clone());
        alias_map.insert("DEPARTMENTS".to_string(), departments);
        alias_map.insert("STAKEHOLDER".to_string(), stakeholders.clone());
        alias_map.insert("STAKEHOLDERS".to_string(), stakeholders);
        Self {
            table: "Contract".to_string(),
            allow_list: [
                "CONTRACT_STATUS",
                "REQUEST_TYPE",
                "ENTITY",
                "ENTITY_NO",
                "OWNER_DEPARTMENT",
                "DEPARTMENT_OUL",
                "CONTRACT_OWNER",
                "CONTRACT_ID",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            alias_map,
            enum_synonyms: BTreeMap::new(),
            fts: FtsSettings::default(),
            default_order_column: "REQUEST_DATE".to_string(),
            net_measure_column: "CONTRACT_VALUE_NET_OF_VAT".to_string(),
            default_ci: true,
            default_trim: true,
        }
    }
}

fn default_fts_columns() -> Vec<String> {
    [
        "CONTRACT_SUBJECT",
        "CONTRACT_PURPOSE",
        "OWNER_DEPARTMENT",
        "DEPARTMENT_OUL",
        "CONTRACT_OWNER",
        "CONTRACT_STAKEHOLDER_1",
        "CONTRACT_STAKEHOLDER_2",
        "LEGAL_NAME_OF_THE_COMPANY",
        "ENTITY",
        "ENTITY_NO",
        "REPRESENTATIVE_EMAIL",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl PlannerSettings {
    /// Layers built-in defaults, an optional `commentql` settings file in the
    /// working directory and `COMMENTQL_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let loaded = config::Config::builder()
            .add_source(config::File::with_name("commentql").required(false))
            .add_source(config::Environment::with_prefix("COMMENTQL").separator("__"))
            .build()?;
        let mut settings: PlannerSettings = loaded.try_deserialize()?;
        settings.normalize();
        Ok(settings)
    }

    /// Canonicalizes identifiers after external deserialization so that
    /// lookups can rely on upper-cased keys.
    pub fn normalize(&mut self) {
        self.table = self.table.trim().to_string();
        self.allow_list = self
            .allow_list
            .iter()
            .map(|c| normalize_identifier(c))
            .filter(|c| !c.is_empty())
            .collect();
        self.alias_map = self
            .alias_map
            .iter()
            .map(|(alias, targets)| {
                (
                    normalize_identifier(alias),
                    targets.iter().map(|t| normalize_identifier(t)).collect(),
                )
            })
            .collect();
        self.enum_synonyms = self
            .enum_synonyms
            .iter()
            .map(|(column, values)| {
                (
                    normalize_identifier(column),
                    values
                        .iter()
                        .map(|(value, set)| (value.trim().to_lowercase(), set.clone()))
                        .collect(),
                )
            })
            .collect();
        self.fts.columns = self
            .fts
            .columns
            .iter()
            .map(|c| normalize_identifier(c))
            .filter(|c| !c.is_empty())
            .collect();
        if self.fts.min_token_len == 0 {
            self.fts.min_token_len = 1;
        }
    }

    /// The caller contract: compiling without an allow-list or alias map
    /// would expose unbounded columns, so both must be present.
    pub fn validate(&self) -> Result<()> {
        if self.allow_list.is_empty() {
            return Err(CommentqlError::Config(
                "allow_list must not be empty".to_string(),
            ));
        }
        if self.alias_map.is_empty() {
            return Err(CommentqlError::Config(
                "alias_map must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn allows(&self, column: &str) -> bool {
        self.allow_list.iter().any(|c| c == column)
    }

    /// Ordered fan-out targets when the token names a configured alias.
    pub fn alias_targets(&self, token: &str) -> Option<&[String]> {
        self.alias_map
            .get(&token.trim().to_uppercase())
            .map(|v| v.as_slice())
    }

    /// True when the column is itself a fan-out target, which exempts it
    /// from alias expansion.
    pub fn is_alias_target(&self, column: &str) -> bool {
        self.alias_map
            .values()
            .any(|targets| targets.iter().any(|t| t == column))
    }

    pub fn synonyms_for(&self, column: &str, value: &str) -> Option<&SynonymSet> {
        self.enum_synonyms
            .get(column)
            .and_then(|values| values.get(&value.trim().to_lowercase()))
            .filter(|set| !set.is_empty())
    }

    /// Expression ordered and summed by measure-driven clauses.
    pub fn measure_column(&self, gross: bool) -> &str {
        if gross { "TOTAL_GROSS" } else { &self.net_measure_column }
    }
}

/// Upper-cases and underscores an identifier to match the wide table's
/// column naming. Already-quoted identifiers pass through.
pub fn normalize_identifier(name: &str) -> String {
    let text = name.trim();
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        return text.to_string();
    }
    text.to_uppercase().replace(' ', "_")
}
