//! Lexer and value-list parser for the feedback-comment mini-language.
//!
//! A comment is a stream of `keyword: payload` directives separated by `;`
//! or newlines, optionally surrounded by freeform chatter. Quoted spans are
//! atomic: a `;`, separator word or `=` inside `"..."` never splits. The
//! scanner substitutes quoted spans with numbered strip marks, parses the
//! stripped text and restores the spans into the finished tokens.

use lazy_static::lazy_static;
use regex::Regex;

/// One parsed instruction from the mini-language. Immutable after
/// construction; resolution and validation happen later in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    /// Raw column token for filter kinds, not yet alias-resolved.
    pub column: Option<String>,
    pub values: Vec<String>,
    /// Full-text terms: outer groups AND together, inner tokens OR.
    pub fts_terms: Vec<Vec<String>>,
    pub flags: ClauseFlags,
    pub source_text: String,
}

/// Closed set of clause kinds; the compiler matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Fts,
    Eq,
    Neq,
    Like,
    NotLike,
    Empty,
    NotEmpty,
    GroupBy,
    OrderBy,
    Top,
    Bottom,
    Gross,
    GroupMarker,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClauseFlags {
    pub ci: bool,
    pub trim: bool,
}

/// Lexer output: ordered clauses plus diagnostics for discarded input.
#[derive(Debug, Default)]
pub struct ParsedComment {
    pub clauses: Vec<Clause>,
    pub diagnostics: Vec<String>,
}

const STRIPMARK: char = 15 as char;

lazy_static! {
    static ref DIRECTIVE_RE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap();
    static ref OR_SPLIT_RE: Regex = Regex::new(r"(?i),|\||\bor\b").unwrap();
    static ref AND_SPLIT_RE: Regex = Regex::new(r"(?i)&|\band\b").unwrap();
    static ref NEQ_SEP_RE: Regex = Regex::new(r"!=|<>|=").unwrap();
    static ref FLAGS_RE: Regex = Regex::new(r"\(([^()]*)\)\s*$").unwrap();
    static ref MARK_RE: Regex = Regex::new(r"\x0F(\d+)").unwrap();
}

/// Tokenizes a raw comment into ordered clauses.
pub fn scan_comment(comment: &str) -> ParsedComment {
    let mut parsed = ParsedComment::default();
    for raw in split_clauses(comment, &mut parsed.diagnostics) {
        lex_clause(&raw, &mut parsed);
    }
    parsed
}

/// Splits on `;` and newlines with quote tracking. An unterminated quote
/// discards the clause it opened in and everything after it.
fn split_clauses(comment: &str, diagnostics: &mut Vec<String>) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for c in comment.chars() {
        if c == '"' {
            in_string = !in_string;
            current.push(c);
        } else if (c == ';' || c == '\n') && !in_string {
            if !current.trim().is_empty() {
                clauses.push(current.clone());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    if in_string {
        diagnostics.push(format!(
            "unterminated quote, clause discarded: {}",
            current.trim()
        ));
    } else if !current.trim().is_empty() {
        clauses.push(current);
    }
    clauses
}

/// Replaces each quoted span with a numbered strip mark so that the text
/// can be split without looking inside quotes. Marks are 1-based.
fn strip_quotes(text: &str) -> (String, Vec<String>) {
    let mut stripped = String::new();
    let mut strips: Vec<String> = Vec::new();
    let mut strip = String::new();
    let mut in_string = false;
    for c in text.chars() {
        if c == '"' {
            if in_string {
                strips.push(std::mem::take(&mut strip));
                stripped.push(STRIPMARK);
                stripped.push_str(&strips.len().to_string());
            }
            in_string = !in_string;
        } else if in_string {
            strip.push(c);
        } else {
            stripped.push(c);
        }
    }
    (stripped, strips)
}

/// Substitutes strip marks back with their quoted content.
fn restore_strips(text: &str, strips: &[String]) -> String {
    MARK_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| strips.get(n - 1))
                .cloned()
                .unwrap_or_default()
        })
        .trim()
        .to_string()
}

/// Lexes one raw clause, which may carry several directives back to back
/// the way prose comments embed them.
fn lex_clause(raw: &str, parsed: &mut ParsedComment) {
    let (stripped, strips) = strip_quotes(raw);
    let matches: Vec<(usize, usize, String)> = DIRECTIVE_RE
        .captures_iter(&stripped)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            (whole.start(), whole.end(), caps[1].to_lowercase())
        })
        .collect();
    if matches.is_empty() {
        return;
    }
    for (i, (_, end, keyword)) in matches.iter().enumerate() {
        let rhs_end = matches
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(stripped.len());
        let rhs = stripped[*end..rhs_end].trim();
        build_clause(keyword, rhs, &strips, parsed);
    }
}

fn keyword_kind(keyword: &str, rhs: &str) -> ClauseKind {
    match keyword {
        "fts" => ClauseKind::Fts,
        "eq" => ClauseKind::Eq,
        "neq" | "not_eq" => ClauseKind::Neq,
        "contains" | "has" | "have" => ClauseKind::Like,
        "not_contains" | "not_like" => ClauseKind::NotLike,
        "empty" | "is_empty" => ClauseKind::Empty,
        "not_empty" => ClauseKind::NotEmpty,
        "group_by" => ClauseKind::GroupBy,
        "order_by" | "sort_by" => ClauseKind::OrderBy,
        "top" => ClauseKind::Top,
        "bottom" => ClauseKind::Bottom,
        "gross" => ClauseKind::Gross,
        "group" if rhs.trim().eq_ignore_ascii_case("or") => ClauseKind::GroupMarker,
        _ => ClauseKind::Unknown,
    }
}

fn build_clause(keyword: &str, rhs: &str, strips: &[String], parsed: &mut ParsedComment) {
    let kind = keyword_kind(keyword, rhs);
    let source_text = format!("{keyword}: {}", restore_strips(rhs, strips));
    let (rhs, flags) = extract_flags(rhs);
    match kind {
        ClauseKind::Eq | ClauseKind::Neq => {
            let Some(sep) = NEQ_SEP_RE.find(&rhs) else {
                parsed
                    .diagnostics
                    .push(format!("filter clause missing '=': {source_text}"));
                return;
            };
            // `!=` and `<>` inside an eq directive negate it.
            let kind = if sep.as_str() == "=" { kind } else { ClauseKind::Neq };
            let column = restore_strips(&rhs[..sep.start()], strips);
            let values = split_values(&rhs[sep.end()..], strips);
            if column.is_empty() || values.is_empty() {
                parsed
                    .diagnostics
                    .push(format!("filter clause incomplete: {source_text}"));
                return;
            }
            parsed.clauses.push(Clause {
                kind,
                column: Some(column),
                values,
                fts_terms: Vec::new(),
                flags,
                source_text,
            });
        }
        ClauseKind::Like | ClauseKind::NotLike => {
            let Some(sep) = NEQ_SEP_RE.find(&rhs) else {
                parsed
                    .diagnostics
                    .push(format!("filter clause missing '=': {source_text}"));
                return;
            };
            let column = restore_strips(&rhs[..sep.start()], strips);
            let values = split_values(&rhs[sep.end()..], strips);
            if column.is_empty() || values.is_empty() {
                parsed
                    .diagnostics
                    .push(format!("filter clause incomplete: {source_text}"));
                return;
            }
            parsed.clauses.push(Clause {
                kind,
                column: Some(column),
                values,
                fts_terms: Vec::new(),
                flags,
                source_text,
            });
        }
        ClauseKind::Empty | ClauseKind::NotEmpty => {
            // The payload is the column list itself; one clause per column.
            for column in split_values(&rhs, strips) {
                parsed.clauses.push(Clause {
                    kind,
                    column: Some(column),
                    values: Vec::new(),
                    fts_terms: Vec::new(),
                    flags,
                    source_text: source_text.clone(),
                });
            }
        }
        ClauseKind::Fts => {
            let mut fts_terms: Vec<Vec<String>> = Vec::new();
            for part in AND_SPLIT_RE.split(&rhs) {
                let tokens = split_values(part, strips);
                if !tokens.is_empty() {
                    fts_terms.push(tokens);
                }
            }
            let values = fts_terms.iter().flatten().cloned().collect();
            parsed.clauses.push(Clause {
                kind,
                column: None,
                values,
                fts_terms,
                flags,
                source_text,
            });
        }
        ClauseKind::GroupBy
        | ClauseKind::OrderBy
        | ClauseKind::Top
        | ClauseKind::Bottom
        | ClauseKind::Gross => {
            parsed.clauses.push(Clause {
                kind,
                column: None,
                values: split_values(&rhs, strips),
                fts_terms: Vec::new(),
                flags,
                source_text,
            });
        }
        ClauseKind::GroupMarker => {
            parsed.clauses.push(Clause {
                kind,
                column: None,
                values: Vec::new(),
                fts_terms: Vec::new(),
                flags,
                source_text,
            });
        }
        ClauseKind::Unknown => {
            parsed.clauses.push(Clause {
                kind,
                column: None,
                values: Vec::new(),
                fts_terms: Vec::new(),
                flags,
                source_text,
            });
        }
    }
}

/// Pops a trailing `(ci, trim)` style flag list off the payload. Parens
/// holding anything but flag words are left alone.
fn extract_flags(rhs: &str) -> (String, ClauseFlags) {
    let mut flags = ClauseFlags::default();
    if let Some(caps) = FLAGS_RE.captures(rhs) {
        let inner = &caps[1];
        let words: Vec<&str> = inner
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .collect();
        let all_flags = !words.is_empty()
            && words
                .iter()
                .all(|w| matches!(w.to_lowercase().as_str(), "ci" | "case_insensitive" | "trim"));
        if all_flags {
            for word in words {
                match word.to_lowercase().as_str() {
                    "ci" | "case_insensitive" => flags.ci = true,
                    "trim" => flags.trim = true,
                    _ => {}
                }
            }
            let start = caps.get(0).unwrap().start();
            return (rhs[..start].trim().to_string(), flags);
        }
    }
    (rhs.trim().to_string(), flags)
}

/// Splits a payload into trimmed, deduplicated value tokens on the word
/// `or`, comma and pipe. Dedup is case-insensitive, first occurrence wins.
fn split_values(text: &str, strips: &[String]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for part in OR_SPLIT_RE.split(text) {
        let token = restore_strips(part, strips);
        if token.is_empty() {
            continue;
        }
        let key = token.to_uppercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        values.push(token);
    }
    values
}
