//! The code emitter contract: what a backend must produce from a fully
//! modified `Grammar` to drive the skeleton preprocessor. See spec.md
//! §4.5/§6.4.
//!
//! A backend writes, for each head rule, a dispatcher that tries seed
//! alternatives before grower alternatives, and for each non-head rule
//! a sequential ordered-choice matcher — the exact generation strategy
//! is backend-specific, grounded on how the teacher's `radlr-rust-build`
//! assembles a generated parser file: a header doc-comment naming the
//! generator and its version, followed by the generated body, built up
//! through a writer rather than returned as one opaque blob. This
//! module only defines the seam a backend plugs into; the reference
//! backend lives in the `parsegen-codegen` crate.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Alt, Grammar, Rule};
use crate::error::CompileError;
use crate::preprocessor::Directives;

/// Implemented once per target language/runtime. `emit` receives a
/// `Grammar` that has already run the full modifier pipeline (including
/// `ComputeLR`) and must return the backend-specific skeleton markers:
/// at minimum `body` (the parser's rule-matching code) and, if the
/// grammar has any left-recursive heads, `grow_rules` (the seed/grower
/// dispatch registry).
pub trait Emitter {
  /// Short backend identifier, as selected via `--backend <name>`.
  fn name(&self) -> &'static str;

  fn emit(&self, grammar: &Grammar) -> Result<Directives, CompileError>;
}

/// Fills in the markers every backend needs regardless of target
/// language (`entry`, `parser_name`, `version`, `datetime`), then
/// merges in the backend-specific markers from `backend`. The caller
/// feeds the result to [`crate::preprocessor::process`] against the
/// target skeleton.
pub fn build_directives(grammar: &Grammar, backend: &dyn Emitter, parser_name: &str) -> Result<Directives, CompileError> {
  let mut directives = backend.emit(grammar)?;

  let entry = grammar.entry_rule().ok_or(CompileError::UndefinedEntry)?;
  directives.entry("entry".to_string()).or_insert_with(|| entry.id.as_str().to_string());
  directives.entry("parser_name".to_string()).or_insert_with(|| parser_name.to_string());
  directives.entry("version".to_string()).or_insert_with(|| env!("CARGO_PKG_VERSION").to_string());
  directives.entry("datetime".to_string()).or_insert_with(unix_timestamp);

  Ok(directives)
}

fn unix_timestamp() -> String {
  let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
  secs.to_string()
}

/// Every left-recursion head rule in `grammar`, in declaration order —
/// the set a backend must register in its `grow_rules` dispatch table.
pub fn head_rules(grammar: &Grammar) -> impl Iterator<Item = &Rule> {
  grammar.rules.iter().filter(|r| r.head)
}

/// The seed alternatives of a head rule: those not classified `grower`.
/// Per spec.md §4.6, a head rule with no seed alternatives is invalid —
/// the backend should treat an empty iterator here as an emitter-level
/// error rather than silently emitting a parser that can never match.
pub fn seed_alts(rule: &Rule) -> impl Iterator<Item = &Alt> {
  rule.expr.alts.iter().filter(|a| !a.grower)
}

/// The grower alternatives of a head rule, tried in order on every
/// pass of the seed-growing loop.
pub fn grower_alts(rule: &Rule) -> impl Iterator<Item = &Alt> {
  rule.expr.alts.iter().filter(|a| a.grower)
}
