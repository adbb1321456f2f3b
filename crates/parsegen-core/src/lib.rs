//! Grammar parser, tree modifier and left-recursion analysis for the
//! parsegen PEG compiler. See spec.md for the full component design;
//! each module doc-comment grounds its piece in the teacher repo and in
//! `polygen`, the reference implementation this crate reimplements.

pub mod ast;
pub mod config;
pub mod dump;
pub mod emitter;
pub mod error;
pub mod modifier;
pub mod parser;
pub mod preprocessor;
pub mod reader;

use ast::Grammar;
use config::ModifierConfig;
use error::{CompileError, Diagnostics};

/// Parses `source` and runs the full modifier pipeline per `config`,
/// producing a finalized `Grammar` ready for a code emitter. `source`
/// must already have its `@include`s resolved (see
/// [`parser::resolve_includes`]) — include resolution is textual and
/// happens before this function is ever called, since it doesn't need
/// the grammar's AST at all.
pub fn compile(source: &str, file: Option<String>, config: &ModifierConfig) -> Result<(Grammar, Diagnostics), CompileError> {
  let mut grammar = parser::Parser::new(source, file).parse()?;
  let mut diags = Diagnostics::new();
  let mut pipeline = modifier::build_pipeline(config);
  modifier::run_pipeline(&mut grammar, &mut pipeline, &mut diags)?;
  Ok((grammar, diags))
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn compiles_a_minimal_grammar_end_to_end() {
    let source = "@entry G <- \"abc\" EOF\nEOF <- !.\n";
    let (grammar, diags) = compile(source, Some("test.peg".to_string()), &ModifierConfig::default()).unwrap();
    assert!(!diags.have_errors());
    assert_eq!(grammar.entry_rule().unwrap().id.as_str(), "G");
  }

  #[test]
  fn left_recursive_arithmetic_grammar_marks_heads() {
    let source = "\
@entry E <- E '+' T / E '-' T / T
T <- T '*' N / T '/' N / N
N <- [0-9]
";
    let (grammar, diags) = compile(source, None, &ModifierConfig::default()).unwrap();
    assert!(!diags.have_errors());
    assert!(grammar.rule(&ast::Id::new("E")).unwrap().head);
    assert!(grammar.rule(&ast::Id::new("T")).unwrap().head);
    assert!(!grammar.rule(&ast::Id::new("N")).unwrap().head);
  }

  #[test]
  fn undefined_reference_aborts_compilation() {
    let source = "@entry G <- Missing\n";
    let err = compile(source, None, &ModifierConfig::default()).unwrap_err();
    assert!(matches!(err, CompileError::UndefinedReference { .. }));
  }
}
