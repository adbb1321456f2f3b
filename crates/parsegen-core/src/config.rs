//! Compiler-wide configuration: which optional modifier passes run, and
//! how `CreateAnyChar`/`GenerateMetanames` behave. See spec.md §4.3.
//!
//! Grounded on the teacher's `ParserConfig`
//! (`radlr-core/types/parser_config.rs`): a plain struct of flags with a
//! `Default` impl and chainable `with_*` builder methods, rather than a
//! config file format.

#[derive(Clone, Debug)]
pub struct ModifierConfig {
  /// `CreateAnyChar`'s strict mode: fold every `Char` literal in the
  /// grammar into a generated `AnyChar__GEN` class and rewrite `.` to
  /// reference it. When `false`, `.` is left for the emitter/runtime to
  /// implement directly as "any character".
  pub strict_any_char: bool,

  /// Target-language reserved words `GenerateMetanames` must avoid
  /// colliding with when lowercasing a rule reference into a metaname.
  pub reserved_words: std::collections::HashSet<String>,

  /// Turns `Class` nodes into an `Expr` of single-`Char` alternatives.
  pub expand_class: bool,

  /// Turns `Repetition(item, n, m)` into `n` copies of `item` followed
  /// by an optional group covering the remaining `m - n`.
  pub replace_rep: bool,

  /// Rewrites `And(item)` lookaheads into `Not(Not(item))`, for back
  /// ends that only want to implement negative lookahead as a
  /// primitive.
  pub eliminate_and: bool,
}

impl Default for ModifierConfig {
  fn default() -> Self {
    Self {
      strict_any_char: false,
      reserved_words: std::collections::HashSet::new(),
      expand_class: false,
      replace_rep: false,
      eliminate_and: false,
    }
  }
}

impl ModifierConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_strict_any_char(mut self, enable: bool) -> Self {
    self.strict_any_char = enable;
    self
  }

  pub fn with_reserved_words(mut self, words: impl IntoIterator<Item = String>) -> Self {
    self.reserved_words = words.into_iter().collect();
    self
  }

  pub fn with_expand_class(mut self, enable: bool) -> Self {
    self.expand_class = enable;
    self
  }

  pub fn with_replace_rep(mut self, enable: bool) -> Self {
    self.replace_rep = enable;
    self
  }

  pub fn with_eliminate_and(mut self, enable: bool) -> Self {
    self.eliminate_and = enable;
    self
  }
}
