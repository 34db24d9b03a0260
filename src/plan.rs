//! The compiled plan model.
//!
//! A [`BooleanPlan`] is the immutable result of one compile: OR-ed groups of
//! AND-ed parameterized predicates, the order/group/limit directives and a
//! serializable [`DebugBundle`] describing what was produced. The
//! [`PlanBuilder`] owns an append-only arena of groups while scanning and is
//! finalized exactly once; nothing partially built ever escapes.

use serde::Serialize;

use crate::error::{CommentqlError, Result};

/// One parameterized fragment. The fragment holds only `:named`
/// placeholders; the literal values travel in `bind_params`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompiledPredicate {
    pub sql_fragment: String,
    pub bind_params: Vec<(String, String)>,
}

/// Predicates AND-ed together.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PredicateGroup {
    pub predicates: Vec<CompiledPredicate>,
}

impl PredicateGroup {
    pub fn fragment(&self) -> String {
        if self.predicates.len() == 1 {
            self.predicates[0].sql_fragment.clone()
        } else {
            let joined: Vec<&str> = self
                .predicates
                .iter()
                .map(|p| p.sql_fragment.as_str())
                .collect();
            format!("({})", joined.join(" AND "))
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LimitSpec {
    pub count: u32,
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FtsDebug {
    pub enabled: bool,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One filter inside a debug block, with its post-expansion columns.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldDebug {
    pub field: String,
    pub op: String,
    pub values: Vec<String>,
    pub expanded_columns: Vec<String>,
}

/// Per-group debug block, lettered in plan order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupDebug {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fts_tokens: Vec<String>,
    pub fields: Vec<FieldDebug>,
}

/// Observational output; never feeds back into compiled SQL.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DebugBundle {
    /// WHERE text with literal values inlined, for inspection only.
    pub where_text: String,
    /// The binds actually used for execution, in creation order.
    pub binds_text: Vec<(String, String)>,
    pub fts: FtsDebug,
    pub dropped_columns: Vec<String>,
    pub blocks: Vec<GroupDebug>,
    /// Human summary of the boolean structure.
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub measure: String,
}

/// The compiled two-level AND/OR structure plus its side directives.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BooleanPlan {
    pub groups: Vec<PredicateGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSpec>,
    pub group_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<LimitSpec>,
    pub gross: bool,
    pub debug: DebugBundle,
}

impl BooleanPlan {
    /// Executable WHERE fragment: groups OR-ed, each parenthesized.
    /// Empty when no predicate survived compilation.
    pub fn where_fragment(&self) -> String {
        match self.groups.len() {
            0 => String::new(),
            1 => self.groups[0].fragment(),
            _ => {
                let parts: Vec<String> = self.groups.iter().map(|g| g.fragment()).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    /// All binds in creation order.
    pub fn binds(&self) -> Vec<(String, String)> {
        self.groups
            .iter()
            .flat_map(|g| g.predicates.iter())
            .flat_map(|p| p.bind_params.iter().cloned())
            .collect()
    }
}

fn block_id(index: usize) -> String {
    if index < 26 {
        ((b'A' + index as u8) as char).to_string()
    } else {
        format!("G{}", index + 1)
    }
}

/// Append-only accumulator for groups and their debug blocks. Group
/// markers close the current group only when it holds predicates, so
/// leading, trailing and consecutive markers collapse to nothing.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    groups: Vec<PredicateGroup>,
    blocks: Vec<GroupDebug>,
    current: Vec<CompiledPredicate>,
    current_fts: Vec<String>,
    current_fields: Vec<FieldDebug>,
    order: Option<OrderSpec>,
    group_by: Vec<String>,
    limit: Option<(u32, Option<String>, Direction)>,
    gross: bool,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_field_predicate(&mut self, predicate: CompiledPredicate, field: FieldDebug) {
        self.current.push(predicate);
        self.current_fields.push(field);
    }

    pub fn push_fts_predicate(&mut self, predicate: CompiledPredicate, tokens: Vec<String>) {
        self.current.push(predicate);
        self.current_fts.extend(tokens);
    }

    /// A `group: or` marker.
    pub fn mark_group(&mut self) {
        self.close_current();
    }

    fn close_current(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let predicates = std::mem::take(&mut self.current);
        self.blocks.push(GroupDebug {
            id: block_id(self.groups.len()),
            fts_tokens: std::mem::take(&mut self.current_fts),
            fields: std::mem::take(&mut self.current_fields),
        });
        self.groups.push(PredicateGroup { predicates });
    }

    pub fn set_order(&mut self, order: OrderSpec) {
        self.order = Some(order);
    }

    pub fn set_limit(&mut self, count: u32, by_column: Option<String>, direction: Direction) {
        self.limit = Some((count, by_column, direction));
    }

    pub fn set_gross(&mut self, gross: bool) {
        self.gross = gross;
    }

    pub fn extend_group_by(&mut self, columns: impl IntoIterator<Item = String>) {
        self.group_by.extend(columns);
    }

    pub fn gross(&self) -> bool {
        self.gross
    }

    /// Seals the arena into an immutable plan. The limit column resolves
    /// here because a later `gross:` directive changes the measure it
    /// defaults to. Duplicate bind names are an internal fault.
    pub fn finalize(
        mut self,
        fts: FtsDebug,
        dropped_columns: Vec<String>,
        notes: Vec<String>,
        fallback_measure_column: &str,
    ) -> Result<BooleanPlan> {
        self.close_current();
        let limit = self.limit.map(|(count, by_column, direction)| LimitSpec {
            count,
            column: by_column.unwrap_or_else(|| fallback_measure_column.to_string()),
            direction,
        });
        let summary = summarize_blocks(&self.blocks);
        let mut plan = BooleanPlan {
            groups: self.groups,
            order: self.order,
            group_by: self.group_by,
            limit,
            gross: self.gross,
            debug: DebugBundle {
                where_text: String::new(),
                binds_text: Vec::new(),
                fts,
                dropped_columns,
                blocks: self.blocks,
                summary,
                notes,
                measure: if self.gross { "gross" } else { "net" }.to_string(),
            },
        };
        let binds = plan.binds();
        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in &binds {
            if seen.contains(&name.as_str()) {
                return Err(CommentqlError::Invariant(format!(
                    "duplicate bind name {name}"
                )));
            }
            seen.push(name);
        }
        plan.debug.where_text = inline_binds(&plan.where_fragment(), &binds);
        plan.debug.binds_text = binds;
        Ok(plan)
    }
}

/// Human boolean-structure line, e.g.
/// `(FTS(it OR home care) AND ENTITY = (DSFH)) OR (DEPARTMENT = (AL FARABI))`.
fn summarize_blocks(blocks: &[GroupDebug]) -> String {
    let parts: Vec<String> = blocks
        .iter()
        .map(|block| {
            let mut pieces: Vec<String> = Vec::new();
            if !block.fts_tokens.is_empty() {
                pieces.push(format!("FTS({})", block.fts_tokens.join(" OR ")));
            }
            for field in &block.fields {
                pieces.push(format!(
                    "{} {} ({})",
                    field.field,
                    field.op,
                    field.values.join(" OR ")
                ));
            }
            format!("({})", pieces.join(" AND "))
        })
        .collect();
    parts.join(" OR ")
}

/// Substitutes `:name` placeholders with quoted literals. Inspection only;
/// execution always uses the bind list.
fn inline_binds(fragment: &str, binds: &[(String, String)]) -> String {
    use lazy_static::lazy_static;
    use regex::Regex;
    lazy_static! {
        static ref BIND_RE: Regex = Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    }
    BIND_RE
        .replace_all(fragment, |caps: &regex::Captures| {
            match binds.iter().find(|(name, _)| name == &caps[1]) {
                Some((_, value)) => format!("'{}'", value.replace('\'', "''")),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
