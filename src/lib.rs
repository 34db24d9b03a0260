//! Commentql – compiles a feedback-comment mini-language into parameterized
//! SQL boolean plans over a single wide "Contract"-style table.
//!
//! A comment is a stream of `keyword: payload` directives (`fts:`, `eq:`,
//! `contains:`, `group_by:`, `order_by:`, `top:`, `gross:`, `group: or` and
//! friends) separated by `;` or newlines. Compilation is a pure function of
//! the comment text and a [`settings::PlannerSettings`] snapshot:
//! * The [`comment`] lexer splits clauses and value lists while treating
//!   quoted spans as atomic.
//! * [`columns`] fans logical column names out into their physical columns
//!   and filters them through the configured allow-list.
//! * [`compile`] groups clauses into AND/OR structure (a `group: or` marker
//!   starts a new OR-ed group) and emits parameterized `IN`, `LIKE` and
//!   full-text predicates with deterministic bind names.
//! * The resulting [`plan::BooleanPlan`] is immutable and carries a
//!   serializable [`plan::DebugBundle`] describing what was produced and
//!   what was dropped.
//! * [`sql`] optionally embeds the plan into one executable SELECT with
//!   grouping, ordering and `FETCH FIRST` row limits.
//!
//! ## Modules
//! * [`comment`] – Lexer and value-list parser for the mini-language.
//! * [`columns`] – Alias fan-out and allow-list validation.
//! * [`compile`] – The clause-to-predicate compiler and plan assembly.
//! * [`plan`] – Plan data model, builder and debug bundle.
//! * [`sql`] – SELECT renderer over a compiled plan.
//! * [`settings`] – Configuration value objects and the layered loader.
//! * [`error`] – Crate error type and `Result` alias.
//!
//! ## Safety Model
//! Generated fragments never contain literal values, only `:named`
//! placeholders; literals travel in the bind list. Column names reach the
//! SQL text only after allow-list validation, so a caller-supplied comment
//! cannot smuggle arbitrary identifiers. The debug bundle inlines values
//! for inspection but is never meant to be executed.
//!
//! ## Quick Start
//! ```
//! use commentql::compile::compile;
//! use commentql::settings::PlannerSettings;
//! use commentql::sql::render_select;
//! let settings = PlannerSettings::default();
//! let plan = compile(
//!     "eq: ENTITY = DSFH or AL FARABI; top: 5 by REQUEST_DATE",
//!     &settings,
//! )
//! .unwrap();
//! assert_eq!(plan.groups.len(), 1);
//! let query = render_select(&plan, &settings);
//! assert!(query.sql.contains("FETCH FIRST 5 ROWS ONLY"));
//! ```
//!
//! ## Status
//! The clause grammar tracks the directives observed in real feedback
//! comments; adding a clause kind is a compile-time-checked change to the
//! closed [`comment::ClauseKind`] enum. Malformed input never fails the
//! compilation – broken clauses are dropped and reported through the debug
//! bundle's notes instead.

pub mod columns;
pub mod comment;
pub mod compile;
pub mod error;
pub mod plan;
pub mod settings;
pub mod sql;
