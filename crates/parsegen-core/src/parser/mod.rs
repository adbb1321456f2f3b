//! Hand-written recursive-descent parser for the grammar language
//! described in spec.md §6.1. Single-character lookahead, backtracking
//! via [`crate::reader::Reader`] mark/reset. Grounded on
//! `polygen/grammar_parser.py` and `polygen/parsing/bootstrap/parser.py`
//! for the exact escape and whitespace-skipping semantics spec.md
//! leaves informal.

mod grammar_body;
mod include;
mod lexical;

pub use include::{resolve_includes, IncludeLoader, MapLoader};

use crate::ast::*;
use crate::error::CompileError;
use crate::reader::Reader;

pub struct Parser<'l> {
  reader: Reader,
  file:   Option<String>,
  /// `"entry"`/`"ignore"` directives collected since the last rule,
  /// waiting to attach to the next one.
  pending_directives: Vec<String>,
  _marker: std::marker::PhantomData<&'l ()>,
}

impl<'l> Parser<'l> {
  pub fn new(source: &str, file: Option<String>) -> Self {
    Self { reader: Reader::from_str(source), file, pending_directives: Vec::new(), _marker: std::marker::PhantomData }
  }

  pub fn parse(mut self) -> Result<Grammar, CompileError> {
    let mut rules = Vec::new();
    let mut metarules = Vec::new();

    loop {
      self.skip_trivia();
      let Some(c) = self.reader.peek() else { break };
      match c {
        '@' => self.parse_directive()?,
        '$' => metarules.push(self.parse_metadef()?),
        _ => rules.push(self.parse_rule()?),
      }
    }

    Ok(Grammar { rules, metarules, entry: None })
  }

  fn info(&self, start: &crate::reader::Mark) -> Option<ParseInfo> {
    Some(ParseInfo::new(self.file.clone(), start.offset(), self.reader.offset()))
  }

  pub(super) fn syntax_error(&self, msg: &str) -> CompileError {
    CompileError::SyntaxError {
      loc: Some(ParseInfo::new(self.file.clone(), self.reader.offset(), self.reader.offset())),
      msg: format!("{msg} (line {}, column {})", self.reader.line() + 1, self.reader.column() + 1),
    }
  }

  /// Skips whitespace and `#` line comments between tokens.
  fn skip_trivia(&mut self) {
    loop {
      match self.reader.peek() {
        Some(c) if c.is_whitespace() => {
          self.reader.next();
        }
        Some('#') => {
          while let Some(c) = self.reader.peek() {
            if c == '\n' {
              break;
            }
            self.reader.next();
          }
        }
        _ => break,
      }
    }
  }

  fn expect(&mut self, c: char) -> Result<(), CompileError> {
    if self.reader.peek() == Some(c) {
      self.reader.next();
      Ok(())
    } else {
      Err(self.syntax_error(&format!("expected `{c}`")))
    }
  }

  fn expect_str(&mut self, s: &str) -> Result<(), CompileError> {
    let mark = self.reader.mark();
    for expected in s.chars() {
      if self.reader.peek() != Some(expected) {
        self.reader.reset(mark);
        return Err(self.syntax_error(&format!("expected `{s}`")));
      }
      self.reader.next();
    }
    Ok(())
  }

  /// `"@" Identifier`, optionally followed by an (already-resolved, and
  /// here simply skipped) `@include "path"` argument — by the time a
  /// grammar reaches this parser, `resolve_includes` has already spliced
  /// every included file's text in place, so an `@include` surviving to
  /// here is defensively accepted but has no further effect.
  fn parse_directive(&mut self) -> Result<(), CompileError> {
    self.expect('@')?;
    let name = self.parse_identifier()?;
    self.skip_trivia();
    match name.as_str() {
      "entry" | "ignore" => self.pending_directives.push(name),
      "include" => {
        if matches!(self.reader.peek(), Some('"') | Some('\'')) {
          let _ = self.parse_string_literal()?;
        }
      }
      other => return Err(self.syntax_error(&format!("unrecognized directive `@{other}`"))),
    }
    Ok(())
  }

  /// `"$" Identifier "{" balanced-braces "}"`
  fn parse_metadef(&mut self) -> Result<MetaRule, CompileError> {
    let start = self.reader.mark();
    self.expect('$')?;
    let id = Id::new(self.parse_identifier()?);
    self.skip_trivia();
    self.expect('{')?;
    let body = self.parse_balanced_braces()?;
    Ok(MetaRule { id: Some(id), body, info: self.info(&start) })
  }

  /// Scans a `{ ... }` body, already past the opening brace, honoring
  /// nested braces and quoted substrings so action bodies containing
  /// `{`/`}` in string literals don't terminate the scan early.
  fn parse_balanced_braces(&mut self) -> Result<String, CompileError> {
    let mut depth = 1usize;
    let mut out = String::new();
    loop {
      let c = self.reader.next().ok_or_else(|| self.syntax_error("unterminated metarule body"))?;
      match c {
        '{' => {
          depth += 1;
          out.push(c);
        }
        '}' => {
          depth -= 1;
          if depth == 0 {
            return Ok(out);
          }
          out.push(c);
        }
        '"' | '\'' => {
          out.push(c);
          let quote = c;
          loop {
            let c = self.reader.next().ok_or_else(|| self.syntax_error("unterminated string in metarule body"))?;
            out.push(c);
            if c == '\\' {
              if let Some(escaped) = self.reader.next() {
                out.push(escaped);
              }
            } else if c == quote {
              break;
            }
          }
        }
        _ => out.push(c),
      }
    }
  }

  /// `Identifier "<-" Expr`
  fn parse_rule(&mut self) -> Result<Rule, CompileError> {
    let start = self.reader.mark();
    let id = Id::new(self.parse_identifier()?);
    self.skip_trivia();
    self.expect_str("<-")?;
    self.skip_trivia();
    let expr = self.parse_expr()?;

    let mut rule = Rule::new(id, expr);
    rule.info = self.info(&start);
    for directive in self.pending_directives.drain(..) {
      match directive.as_str() {
        "entry" => rule.entry = true,
        "ignore" => rule.ignore = true,
        _ => unreachable!("only entry/ignore are ever queued"),
      }
    }
    Ok(rule)
  }
}
