//! The compiler pipeline: clause stream in, immutable [`BooleanPlan`] out.
//!
//! Compilation is a pure function of the comment and a settings snapshot.
//! Individual clauses that cannot be honored are dropped and recorded in
//! the debug bundle; only a missing allow-list or alias map is fatal.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::columns::resolve_and_validate;
use crate::comment::{Clause, ClauseKind, scan_comment};
use crate::error::Result;
use crate::plan::{
    BooleanPlan, CompiledPredicate, Direction, FieldDebug, FtsDebug, OrderSpec, PlanBuilder,
};
use crate::settings::{PlannerSettings, normalize_identifier};

lazy_static! {
    static ref LIMIT_RE: Regex = Regex::new(r"(?i)^(\d+)(?:\s+by\s+(.+))?$").unwrap();
}

/// Compiles one comment against one configuration snapshot.
pub fn compile(comment: &str, settings: &PlannerSettings) -> Result<BooleanPlan> {
    settings.validate()?;
    let parsed = scan_comment(comment);
    let mut ctx = Context {
        builder: PlanBuilder::new(),
        counters: BindCounters::default(),
        dropped_columns: Vec::new(),
        notes: parsed.diagnostics,
        fts: FtsState::default(),
    };
    for clause in &parsed.clauses {
        match clause.kind {
            ClauseKind::Eq => compile_membership(clause, false, settings, &mut ctx),
            ClauseKind::Neq => compile_membership(clause, true, settings, &mut ctx),
            ClauseKind::Like => compile_like(clause, false, settings, &mut ctx),
            ClauseKind::NotLike => compile_like(clause, true, settings, &mut ctx),
            ClauseKind::Empty => compile_empty(clause, false, settings, &mut ctx),
            ClauseKind::NotEmpty => compile_empty(clause, true, settings, &mut ctx),
            ClauseKind::Fts => compile_fts(clause, settings, &mut ctx),
            ClauseKind::GroupMarker => ctx.builder.mark_group(),
            ClauseKind::OrderBy => {
                let token = clause.values.first().map(String::as_str).unwrap_or("");
                ctx.builder.set_order(parse_order(token, settings));
            }
            ClauseKind::Top => compile_limit(clause, Direction::Desc, &mut ctx),
            ClauseKind::Bottom => compile_limit(clause, Direction::Asc, &mut ctx),
            ClauseKind::GroupBy => compile_group_by(clause, settings, &mut ctx),
            ClauseKind::Gross => compile_gross(clause, &mut ctx),
            ClauseKind::Unknown => {
                warn!(clause = %clause.source_text, "unknown directive ignored");
                ctx.notes
                    .push(format!("unknown directive ignored: {}", clause.source_text));
            }
        }
    }
    let fts_debug = ctx.fts.into_debug(settings);
    let fallback = settings.measure_column(ctx.builder.gross()).to_string();
    let plan = ctx
        .builder
        .finalize(fts_debug, ctx.dropped_columns, ctx.notes, &fallback)?;
    info!(
        groups = plan.groups.len(),
        binds = plan.debug.binds_text.len(),
        dropped = plan.debug.dropped_columns.len(),
        "plan compiled"
    );
    Ok(plan)
}

struct Context {
    builder: PlanBuilder,
    counters: BindCounters,
    dropped_columns: Vec<String>,
    notes: Vec<String>,
    fts: FtsState,
}

/// Monotone per-prefix indices keep bind names unique across the plan.
#[derive(Default)]
struct BindCounters {
    eq: usize,
    neq: usize,
    like: usize,
    nlike: usize,
    fts: usize,
}

impl BindCounters {
    fn next_eq(&mut self) -> String {
        let name = format!("eq_bg_{}", self.eq);
        self.eq += 1;
        name
    }
    fn next_neq(&mut self) -> String {
        let name = format!("neq_bg_{}", self.neq);
        self.neq += 1;
        name
    }
    fn next_like(&mut self) -> String {
        let name = format!("like_{}", self.like);
        self.like += 1;
        name
    }
    fn next_nlike(&mut self) -> String {
        let name = format!("nlike_{}", self.nlike);
        self.nlike += 1;
        name
    }
    fn next_fts(&mut self) -> String {
        let name = format!("fts_{}", self.fts);
        self.fts += 1;
        name
    }
}

#[derive(Default)]
struct FtsState {
    success: bool,
    error: Option<String>,
}

impl FtsState {
    fn fail(&mut self, error: &str) {
        if !self.success {
            self.error = Some(error.to_string());
        }
    }
    fn succeed(&mut self) {
        self.success = true;
        self.error = None;
    }
    fn into_debug(self, settings: &PlannerSettings) -> FtsDebug {
        FtsDebug {
            enabled: self.success,
            engine: settings.fts.engine.clone(),
            error: self.error,
        }
    }
}

/// `TRIM` then `UPPER` wrapping, applied alike to columns and binds.
fn apply_flags(expr: &str, ci: bool, trim: bool) -> String {
    let mut sql = expr.to_string();
    if trim {
        sql = format!("TRIM({sql})");
    }
    if ci {
        sql = format!("UPPER({sql})");
    }
    sql
}

fn normalize_value(value: &str, ci: bool, trim: bool) -> String {
    let mut text = if trim {
        value.trim().to_string()
    } else {
        value.to_string()
    };
    if ci {
        text = text.to_uppercase();
    }
    text
}

/// Joins per-column chunks into one parenthesized clause fragment. A
/// single chunk that is already a full paren group is kept as-is.
fn join_chunks(chunks: Vec<String>, joiner: &str) -> String {
    if chunks.len() == 1 {
        let only = chunks.into_iter().next().unwrap_or_default();
        if only.starts_with('(') && only.ends_with(')') {
            only
        } else {
            format!("({only})")
        }
    } else {
        format!("({})", chunks.join(joiner))
    }
}

fn strip_suffix_ci(text: &str, suffix: &str) -> Option<String> {
    if text.len() < suffix.len() {
        return None;
    }
    let split = text.len() - suffix.len();
    let tail = text.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        Some(text[..split].to_string())
    } else {
        None
    }
}

/// Resolves the clause's column and drops the clause when nothing passes
/// the allow-list.
fn resolved_columns(clause: &Clause, settings: &PlannerSettings, ctx: &mut Context) -> Option<Vec<String>> {
    let token = clause.column.as_deref().unwrap_or("");
    let validated = resolve_and_validate(token, settings);
    ctx.dropped_columns.extend(validated.rejected.iter().cloned());
    if validated.is_empty() {
        warn!(clause = %clause.source_text, "dropped, no column passes the allow-list");
        ctx.notes
            .push(format!("clause dropped, no allowed column: {}", clause.source_text));
        return None;
    }
    Some(validated.kept)
}

/// `eq:` and `neq:`. Multi-value lists always compile to one `IN` (or
/// `NOT IN`) per physical column; fan-out columns share the same binds and
/// OR (for `eq`) or AND (for `neq`) together.
fn compile_membership(
    clause: &Clause,
    negated: bool,
    settings: &PlannerSettings,
    ctx: &mut Context,
) {
    let Some(columns) = resolved_columns(clause, settings, ctx) else {
        return;
    };

    // Synonyms are configured per physical enum column, so they only apply
    // to a clause that resolved to exactly one column.
    let mut in_values: Vec<String> = Vec::new();
    let mut like_patterns: Vec<String> = Vec::new();
    let mut synonyms_used = false;
    for value in &clause.values {
        let synonyms = if !negated && columns.len() == 1 {
            settings.synonyms_for(&columns[0], value)
        } else {
            None
        };
        match synonyms {
            Some(set) => {
                synonyms_used = true;
                for equal in &set.equals {
                    push_unique_upper(&mut in_values, equal);
                }
                for prefix in &set.prefix {
                    let text = prefix.trim().to_uppercase();
                    if !text.is_empty() {
                        let pattern = if text.ends_with('%') { text } else { format!("{text}%") };
                        push_unique_upper(&mut like_patterns, &pattern);
                    }
                }
                for contains in &set.contains {
                    let text = contains.trim().to_uppercase();
                    if !text.is_empty() {
                        let mut pattern = text;
                        if !pattern.starts_with('%') {
                            pattern = format!("%{pattern}");
                        }
                        if !pattern.ends_with('%') {
                            pattern = format!("{pattern}%");
                        }
                        push_unique_upper(&mut like_patterns, &pattern);
                    }
                }
            }
            None => push_unique_upper(&mut in_values, value),
        }
    }
    if in_values.is_empty() && like_patterns.is_empty() {
        ctx.notes
            .push(format!("clause dropped, no usable values: {}", clause.source_text));
        return;
    }

    let ci = clause.flags.ci || settings.default_ci || synonyms_used;
    let trim = clause.flags.trim || settings.default_trim || synonyms_used;

    let mut bind_params: Vec<(String, String)> = Vec::new();
    let mut in_bind_exprs: Vec<String> = Vec::new();
    for value in &in_values {
        let name = if negated { ctx.counters.next_neq() } else { ctx.counters.next_eq() };
        bind_params.push((name.clone(), normalize_value(value, ci, trim)));
        in_bind_exprs.push(apply_flags(&format!(":{name}"), ci, trim));
    }
    let mut like_bind_exprs: Vec<String> = Vec::new();
    for pattern in &like_patterns {
        let name = ctx.counters.next_eq();
        bind_params.push((name.clone(), pattern.clone()));
        like_bind_exprs.push(apply_flags(&format!(":{name}"), ci, trim));
    }

    let op = if negated { "NOT IN" } else { "IN" };
    let joiner = if negated { " AND " } else { " OR " };
    let col_chunks: Vec<String> = columns
        .iter()
        .map(|column| {
            let col_expr = apply_flags(column, ci, trim);
            let mut parts: Vec<String> = Vec::new();
            if !in_bind_exprs.is_empty() {
                parts.push(format!("{col_expr} {op} ({})", in_bind_exprs.join(", ")));
            }
            for like_expr in &like_bind_exprs {
                parts.push(format!("{col_expr} LIKE {like_expr}"));
            }
            parts.join(" OR ")
        })
        .collect();

    let predicate = CompiledPredicate {
        sql_fragment: join_chunks(col_chunks, joiner),
        bind_params,
    };
    let field = FieldDebug {
        field: normalize_identifier(clause.column.as_deref().unwrap_or("")),
        op: if negated { "<>" } else { "=" }.to_string(),
        values: clause.values.clone(),
        expanded_columns: columns,
    };
    ctx.builder.push_field_predicate(predicate, field);
}

fn push_unique_upper(values: &mut Vec<String>, value: &str) {
    let text = value.trim();
    if text.is_empty() {
        return;
    }
    if values.iter().any(|v| v.eq_ignore_ascii_case(text)) {
        return;
    }
    values.push(text.to_string());
}

/// `contains:`/`has:`/`have:` and their negations. Values OR together for
/// the positive form and AND together for the negated one; every value is
/// a wildcard-wrapped `LIKE` bind shared across fan-out columns.
fn compile_like(clause: &Clause, negated: bool, settings: &PlannerSettings, ctx: &mut Context) {
    let Some(columns) = resolved_columns(clause, settings, ctx) else {
        return;
    };
    let ci = clause.flags.ci || settings.default_ci;

    let mut bind_params: Vec<(String, String)> = Vec::new();
    let mut bind_exprs: Vec<String> = Vec::new();
    for value in &clause.values {
        let name = if negated { ctx.counters.next_nlike() } else { ctx.counters.next_like() };
        let mut pattern = if value.contains('%') {
            value.clone()
        } else {
            format!("%{value}%")
        };
        if ci {
            pattern = pattern.to_uppercase();
        }
        bind_params.push((name.clone(), pattern));
        let bind_expr = format!(":{name}");
        bind_exprs.push(if ci { format!("UPPER({bind_expr})") } else { bind_expr });
    }

    let op = if negated { "NOT LIKE" } else { "LIKE" };
    let joiner = if negated { " AND " } else { " OR " };
    let col_chunks: Vec<String> = columns
        .iter()
        .map(|column| {
            let col_expr = if ci {
                format!("UPPER(NVL({column},''))")
            } else {
                format!("NVL({column},'')")
            };
            let tests: Vec<String> = bind_exprs
                .iter()
                .map(|bind| format!("{col_expr} {op} {bind}"))
                .collect();
            if tests.len() == 1 {
                tests.into_iter().next().unwrap_or_default()
            } else {
                format!("({})", tests.join(joiner))
            }
        })
        .collect();

    let predicate = CompiledPredicate {
        sql_fragment: join_chunks(col_chunks, joiner),
        bind_params,
    };
    let field = FieldDebug {
        field: normalize_identifier(clause.column.as_deref().unwrap_or("")),
        op: op.to_string(),
        values: clause.values.clone(),
        expanded_columns: columns,
    };
    ctx.builder.push_field_predicate(predicate, field);
}

/// `empty:` matches when any fan-out column is blank; `not_empty:` when
/// every one carries a value. Bind-free.
fn compile_empty(clause: &Clause, negated: bool, settings: &PlannerSettings, ctx: &mut Context) {
    let Some(columns) = resolved_columns(clause, settings, ctx) else {
        return;
    };
    let op = if negated { "<>" } else { "=" };
    let joiner = if negated { " AND " } else { " OR " };
    let checks: Vec<String> = columns
        .iter()
        .map(|column| format!("(TRIM(NVL({column},'')){op}'')"))
        .collect();
    let predicate = CompiledPredicate {
        sql_fragment: join_chunks(checks, joiner),
        bind_params: Vec::new(),
    };
    let field = FieldDebug {
        field: normalize_identifier(clause.column.as_deref().unwrap_or("")),
        op: if negated { "NOT EMPTY" } else { "EMPTY" }.to_string(),
        values: Vec::new(),
        expanded_columns: columns,
    };
    ctx.builder.push_field_predicate(predicate, field);
}

/// `fts:`. Tokens compare against every configured column; token groups
/// AND together, tokens inside a group OR together.
fn compile_fts(clause: &Clause, settings: &PlannerSettings, ctx: &mut Context) {
    if settings.fts.columns.is_empty() {
        warn!(clause = %clause.source_text, "full-text search skipped, no columns configured");
        ctx.fts.fail("no_columns");
        return;
    }
    let term_groups: Vec<Vec<String>> = clause
        .fts_terms
        .iter()
        .map(|group| {
            group
                .iter()
                .filter(|token| token.chars().count() >= settings.fts.min_token_len)
                .cloned()
                .collect::<Vec<String>>()
        })
        .filter(|group| !group.is_empty())
        .collect();
    if term_groups.is_empty() {
        ctx.fts.fail("no_tokens");
        return;
    }

    let mut bind_params: Vec<(String, String)> = Vec::new();
    let mut group_frags: Vec<String> = Vec::new();
    let mut kept_tokens: Vec<String> = Vec::new();
    for group in &term_groups {
        let mut token_frags: Vec<String> = Vec::new();
        for token in group {
            let name = ctx.counters.next_fts();
            bind_params.push((name.clone(), format!("%{token}%")));
            let per_column: Vec<String> = settings
                .fts
                .columns
                .iter()
                .map(|column| format!("UPPER(TRIM({column})) LIKE UPPER(:{name})"))
                .collect();
            token_frags.push(format!("({})", per_column.join(" OR ")));
            kept_tokens.push(token.clone());
        }
        group_frags.push(if token_frags.len() == 1 {
            token_frags.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", token_frags.join(" OR "))
        });
    }
    let fragment = if group_frags.len() == 1 {
        group_frags.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", group_frags.join(" AND "))
    };

    ctx.builder.push_fts_predicate(
        CompiledPredicate {
            sql_fragment: fragment,
            bind_params,
        },
        kept_tokens,
    );
    ctx.fts.succeed();
}

/// `order_by: COLUMN [asc|desc]`, direction defaulting to descending.
/// Trailing ` DESC`, ` ASC` and `_DESC` markers fold into the direction.
fn parse_order(token: &str, settings: &PlannerSettings) -> OrderSpec {
    let mut text = token.trim().to_string();
    let mut direction: Option<Direction> = None;
    if let Some(rest) = strip_suffix_ci(&text, " desc") {
        text = rest;
        direction = Some(Direction::Desc);
    } else if let Some(rest) = strip_suffix_ci(&text, " asc") {
        text = rest;
        direction = Some(Direction::Asc);
    }
    let trimmed = text.trim().to_string();
    let column = match strip_suffix_ci(&trimmed, "_desc") {
        Some(rest) => {
            direction.get_or_insert(Direction::Desc);
            rest
        }
        None => trimmed,
    };
    let column = normalize_identifier(&column);
    OrderSpec {
        column: if column.is_empty() {
            settings.default_order_column.clone()
        } else {
            column
        },
        direction: direction.unwrap_or(Direction::Desc),
    }
}

/// `top: N [by COLUMN]` / `bottom: N [by COLUMN]`. The count must be a
/// positive integer or the clause is dropped with a note.
fn compile_limit(clause: &Clause, direction: Direction, ctx: &mut Context) {
    let token = clause.values.first().map(String::as_str).unwrap_or("");
    let captures = LIMIT_RE.captures(token.trim());
    let count = captures
        .as_ref()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0);
    let Some(count) = count else {
        warn!(clause = %clause.source_text, "limit dropped, count not a positive integer");
        ctx.notes
            .push(format!("limit dropped, bad count: {}", clause.source_text));
        return;
    };
    let by_column = captures
        .as_ref()
        .and_then(|caps| caps.get(2))
        .map(|m| normalize_identifier(m.as_str()))
        .filter(|c| !c.is_empty());
    ctx.builder.set_limit(count, by_column, direction);
}

/// `group_by: COL1, COL2` keeps the literal columns that pass the
/// allow-list; there is no alias fan-out for groupings.
fn compile_group_by(clause: &Clause, settings: &PlannerSettings, ctx: &mut Context) {
    let mut kept: Vec<String> = Vec::new();
    for value in &clause.values {
        let column = normalize_identifier(value);
        if column.is_empty() {
            continue;
        }
        if settings.allows(&column) {
            kept.push(column);
        } else {
            warn!(column = %column, "group_by column rejected by allow-list");
            ctx.dropped_columns.push(column);
        }
    }
    ctx.builder.extend_group_by(kept);
}

/// `gross:` toggles the measure the caller should aggregate; bare or
/// truthy selects gross, falsy selects net.
fn compile_gross(clause: &Clause, ctx: &mut Context) {
    let gross = match clause.values.first().map(|v| v.trim().to_lowercase()) {
        None => true,
        Some(value) => match value.as_str() {
            "true" | "1" | "yes" | "y" => true,
            "false" | "0" | "no" | "n" => false,
            other => {
                ctx.notes
                    .push(format!("gross value not recognized, ignored: {other}"));
                return;
            }
        },
    };
    ctx.builder.set_gross(gross);
}
