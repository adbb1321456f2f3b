//! Structured diagnostics for the grammar compiler. Shaped after the
//! teacher's `SherpaError`/`ErrorGroups` split (a flat enum of
//! structured variants, batched by severity), reimplemented with
//! `thiserror` instead of a hand-written `Display` impl. See spec.md §7.

use crate::ast::ParseInfo;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Warning,
  Critical,
}

/// Every diagnostic the compiler pipeline can raise, with source spans
/// where available. One variant per spec.md §7 error kind.
#[derive(Clone, Debug, Error)]
pub enum CompileError {
  #[error("syntax error at {loc:?}: {msg}")]
  SyntaxError { loc: Option<ParseInfo>, msg: String },

  #[error("undefined rule(s) referenced: {}", .ids.join(", "))]
  UndefinedReference { ids: Vec<String> },

  #[error("rule `{id}` is defined more than once")]
  RedefinedRule { id: String },

  #[error("no rule is marked as the entry rule")]
  UndefinedEntry,

  #[error("{count} rules are marked as the entry rule, expected exactly one")]
  RedefinedEntry { count: usize },

  #[error("metarule(s) referenced but never defined: {}", .ids.join(", "))]
  UndefinedMetaRule { ids: Vec<String> },

  #[error("metarule(s) defined more than once: {}", .ids.join(", "))]
  RedefinedMetaRule { ids: Vec<String> },

  #[error("metaname `{name}` is used more than once in rule `{rule}`")]
  MetanameCollision { rule: String, name: String },

  #[error("range or repetition with last < first in rule(s): {}", .rules.join(", "))]
  InvalidRangeOrRepetition { rules: Vec<String> },

  #[error("unknown preprocessor marker `{marker}`")]
  PreprocessorError { marker: String },

  #[error("include cycle detected: {}", .path.join(" -> "))]
  IncludeCycle { path: Vec<String> },

  #[error("included file not found: {path}")]
  IncludeNotFound { path: String },

  #[error("modifier pipeline exceeded its iteration bound; a pass likely never reaches `done`")]
  FixpointOverrun,

  #[error("metaname `{name}` on a lookahead item is meaningless and was downgraded to `_` in rule `{rule}`")]
  LookaheadMetanameWarning { rule: String, name: String },

  #[error("metarule `{id}` is defined but never referenced")]
  UnusedMetaRuleWarning { id: String },
}

impl CompileError {
  pub fn severity(&self) -> Severity {
    match self {
      CompileError::LookaheadMetanameWarning { .. } | CompileError::UnusedMetaRuleWarning { .. } => Severity::Warning,
      _ => Severity::Critical,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub error:    CompileError,
  pub severity: Severity,
}

/// Accumulates warnings and errors across a pipeline run, mirroring the
/// teacher's `ErrorGroups`/`SherpaErrorContainer`.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
  entries: Vec<Diagnostic>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn error(&mut self, error: CompileError) {
    log::error!("{error}");
    self.entries.push(Diagnostic { error, severity: Severity::Critical });
  }

  pub fn warn(&mut self, error: CompileError) {
    log::warn!("{error}");
    self.entries.push(Diagnostic { error, severity: Severity::Warning });
  }

  pub fn errors(&self) -> impl Iterator<Item = &CompileError> {
    self.entries.iter().filter(|d| d.severity == Severity::Critical).map(|d| &d.error)
  }

  pub fn warnings(&self) -> impl Iterator<Item = &CompileError> {
    self.entries.iter().filter(|d| d.severity == Severity::Warning).map(|d| &d.error)
  }

  pub fn have_errors(&self) -> bool {
    self.entries.iter().any(|d| d.severity == Severity::Critical)
  }

  pub fn have_warnings(&self) -> bool {
    self.entries.iter().any(|d| d.severity == Severity::Warning)
  }

  pub fn extend(&mut self, other: Diagnostics) {
    self.entries.extend(other.entries);
  }

  pub fn all(&self) -> &[Diagnostic] {
    &self.entries
  }
}

pub type CResult<T> = Result<T, Diagnostics>;
