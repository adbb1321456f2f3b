//! `Expr`/`Alt`/`Item`/`Primary` parsing. The one subtlety worth calling
//! out is disambiguating a bare `Identifier` item from the start of the
//! *next* rule: both begin with an identifier, and only a following
//! `<-` tells them apart. Grounded directly on `polygen/grammar_parser.py`'s
//! `_Primary`, which marks, parses the identifier, and backtracks if a
//! `LEFTARROW` follows.

use super::Parser;
use crate::ast::*;
use crate::error::CompileError;

#[derive(PartialEq, Eq)]
enum Prefix {
  And,
  Not,
  None,
}

impl<'l> Parser<'l> {
  /// `Expr := Alt ("/" Alt)*`
  pub(super) fn parse_expr(&mut self) -> Result<Expr, CompileError> {
    let start = self.reader.mark();
    let mut alts = vec![self.parse_alt()?];
    loop {
      self.skip_trivia();
      if self.reader.peek() == Some('/') {
        self.reader.next();
        self.skip_trivia();
        alts.push(self.parse_alt()?);
      } else {
        break;
      }
    }
    Ok(Expr { alts, info: self.info(&start) })
  }

  /// `Alt := Item* MetaAttach?`. An empty item list is permitted: it
  /// always matches, consuming nothing.
  fn parse_alt(&mut self) -> Result<Alt, CompileError> {
    let start = self.reader.mark();
    let mut items = Vec::new();
    while let Some(item) = self.try_parse_named_item()? {
      items.push(item);
    }
    self.skip_trivia();
    let metarule =
      if self.reader.peek() == Some('$') { Some(self.parse_meta_attach()?) } else { None };
    Ok(Alt { items, metarule, nullable: false, grower: false, info: self.info(&start) })
  }

  /// `"$" Identifier` (a reference) or `"${" balanced-braces "}"` (an
  /// inline, anonymous action body).
  fn parse_meta_attach(&mut self) -> Result<MetaAttach, CompileError> {
    self.expect('$')?;
    if self.reader.peek() == Some('{') {
      self.reader.next();
      let body = self.parse_balanced_braces()?;
      self.skip_trivia();
      Ok(MetaAttach::Inline(body))
    } else {
      let id = self.parse_identifier()?;
      self.skip_trivia();
      Ok(MetaAttach::Ref(Id::new(id)))
    }
  }

  /// `(Identifier ":")? Prefix Primary Quantifier?`, or `None` when the
  /// next tokens don't start an item (end of `Alt`: `/`, `)`, `$`, EOF,
  /// or the start of the grammar's next `Rule`).
  fn try_parse_named_item(&mut self) -> Result<Option<NamedItem>, CompileError> {
    self.skip_trivia();
    let item_start = self.reader.mark();

    if let Some(c) = self.reader.peek() {
      if Self::is_id_start(c) {
        let pre_ident_mark = self.reader.mark();
        let ident = self.parse_identifier()?;
        self.skip_trivia();
        if self.reader.peek() == Some(':') {
          self.reader.next();
          self.skip_trivia();
          return self.finish_item(Some(Id::new(ident)), item_start).map(Some);
        }
        if self.looking_at_leftarrow() {
          self.reader.reset(pre_ident_mark);
          return Ok(None);
        }
        // A bare identifier with no metaname and no following `<-` is a
        // plain rule reference: `Prefix` is empty, `Primary` is the `Id`.
        let item = self.parse_quantifier_suffix(Item::Id(Id::new(ident)))?;
        return Ok(Some(NamedItem { name: None, item, nullable: false, info: self.info(&item_start) }));
      }
    }

    let prefix = self.parse_prefix_symbol();
    match self.try_parse_primary()? {
      Some(primary) => {
        let item = apply_prefix(prefix, primary);
        let item = self.parse_quantifier_suffix(item)?;
        Ok(Some(NamedItem { name: None, item, nullable: false, info: self.info(&item_start) }))
      }
      None if prefix == Prefix::None => {
        self.reader.reset(item_start);
        Ok(None)
      }
      None => Err(self.syntax_error("expected an item after prefix")),
    }
  }

  /// Continuation of `try_parse_named_item` once a metaname's `:` has
  /// been consumed: `Prefix Primary Quantifier?` still has to follow.
  fn finish_item(&mut self, name: Option<Id>, item_start: crate::reader::Mark) -> Result<NamedItem, CompileError> {
    let prefix = self.parse_prefix_symbol();
    let primary = self.try_parse_primary()?.ok_or_else(|| self.syntax_error("expected an item after metaname"))?;
    let item = apply_prefix(prefix, primary);
    let item = self.parse_quantifier_suffix(item)?;
    Ok(NamedItem { name, item, nullable: false, info: self.info(&item_start) })
  }

  fn parse_prefix_symbol(&mut self) -> Prefix {
    self.skip_trivia();
    match self.reader.peek() {
      Some('&') => {
        self.reader.next();
        self.skip_trivia();
        Prefix::And
      }
      Some('!') => {
        self.reader.next();
        self.skip_trivia();
        Prefix::Not
      }
      _ => Prefix::None,
    }
  }

  /// `Identifier | String | Class | "." | "(" Expr ")"`, or `None` if
  /// nothing here starts a `Primary`.
  fn try_parse_primary(&mut self) -> Result<Option<Item>, CompileError> {
    self.skip_trivia();
    match self.reader.peek() {
      Some(c) if Self::is_id_start(c) => Ok(Some(Item::Id(Id::new(self.parse_identifier()?)))),
      Some('"') | Some('\'') => Ok(Some(Item::String(self.parse_string_literal()?))),
      Some('[') => Ok(Some(Item::Class(self.parse_class()?))),
      Some('.') => {
        self.reader.next();
        self.skip_trivia();
        Ok(Some(Item::AnyChar))
      }
      Some('(') => {
        self.reader.next();
        self.skip_trivia();
        let expr = self.parse_expr()?;
        self.skip_trivia();
        self.expect(')')?;
        self.skip_trivia();
        Ok(Some(Item::Nested(Box::new(expr))))
      }
      _ => Ok(None),
    }
  }

  /// `String := '"' Char* '"' | "'" Char* "'"`
  pub(super) fn parse_string_literal(&mut self) -> Result<Vec<Char>, CompileError> {
    let quote = match self.reader.peek() {
      Some(q @ ('"' | '\'')) => q,
      _ => return Err(self.syntax_error("expected a string literal")),
    };
    self.reader.next();
    let mut chars = Vec::new();
    while let Some(c) = self.parse_char_body(quote)? {
      chars.push(c);
    }
    self.expect(quote)?;
    self.skip_trivia();
    Ok(chars)
  }

  /// `Class := "[" Range* "]"`, `Range := Char ("-" Char)?`
  fn parse_class(&mut self) -> Result<Class, CompileError> {
    self.expect('[')?;
    let mut ranges = Vec::new();
    loop {
      if self.reader.peek() == Some(']') {
        break;
      }
      if self.reader.peek().is_none() {
        return Err(self.syntax_error("unterminated character class"));
      }
      let first = self.parse_char_body(']')?.expect("checked not ']' above");
      let dash_mark = self.reader.mark();
      let last = if self.reader.peek() == Some('-') {
        self.reader.next();
        if self.reader.peek() == Some(']') {
          self.reader.reset(dash_mark);
          None
        } else {
          Some(
            self
              .parse_char_body(']')?
              .ok_or_else(|| self.syntax_error("expected a character after `-` in a class range"))?,
          )
        }
      } else {
        None
      };
      ranges.push(Range { first, last, info: None });
    }
    self.expect(']')?;
    self.skip_trivia();
    Ok(Class { ranges })
  }

  fn parse_quantifier_suffix(&mut self, item: Item) -> Result<Item, CompileError> {
    self.skip_trivia();
    match self.reader.peek() {
      Some('?') => {
        self.reader.next();
        self.skip_trivia();
        Ok(Item::ZeroOrOne(Box::new(item)))
      }
      Some('*') => {
        self.reader.next();
        self.skip_trivia();
        Ok(Item::ZeroOrMore(Box::new(item)))
      }
      Some('+') => {
        self.reader.next();
        self.skip_trivia();
        Ok(Item::OneOrMore(Box::new(item)))
      }
      Some('{') => {
        self.reader.next();
        self.skip_trivia();
        let first = self.parse_number()?;
        self.skip_trivia();
        let last = if self.reader.peek() == Some(',') {
          self.reader.next();
          self.skip_trivia();
          Some(self.parse_number()?)
        } else {
          None
        };
        self.skip_trivia();
        self.expect('}')?;
        self.skip_trivia();
        Ok(Item::Repetition(Box::new(item), first, last))
      }
      _ => Ok(item),
    }
  }

  fn parse_number(&mut self) -> Result<u32, CompileError> {
    let mut digits = String::new();
    while let Some(c) = self.reader.peek() {
      if c.is_ascii_digit() {
        digits.push(c);
        self.reader.next();
      } else {
        break;
      }
    }
    digits.parse().map_err(|_| self.syntax_error("expected a number"))
  }

  fn looking_at_leftarrow(&mut self) -> bool {
    let mark = self.reader.mark();
    self.skip_trivia();
    let is_arrow = self.reader.peek() == Some('<') && {
      self.reader.next();
      self.reader.peek() == Some('-')
    };
    self.reader.reset(mark);
    is_arrow
  }
}

fn apply_prefix(prefix: Prefix, item: Item) -> Item {
  match prefix {
    Prefix::And => Item::And(Box::new(item)),
    Prefix::Not => Item::Not(Box::new(item)),
    Prefix::None => item,
  }
}
