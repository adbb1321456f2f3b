//! Identifier, string, class and character-escape lexing shared by the
//! grammar parser. See spec.md §4.2 for the accepted escape set.

use super::Parser;
use crate::ast::Char;
use crate::error::CompileError;

impl<'l> Parser<'l> {
  pub(super) fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
  }

  pub(super) fn is_id_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
  }

  /// `[A-Za-z_][A-Za-z_0-9]*`
  pub(super) fn parse_identifier(&mut self) -> Result<String, CompileError> {
    let start = self.reader.mark();
    match self.reader.peek() {
      Some(c) if Self::is_id_start(c) => {}
      _ => return Err(self.syntax_error("expected an identifier")),
    }
    let mut s = String::new();
    while let Some(c) = self.reader.peek() {
      if Self::is_id_continue(c) {
        s.push(c);
        self.reader.next();
      } else {
        break;
      }
    }
    if s.is_empty() {
      self.reader.reset(start);
      return Err(self.syntax_error("expected an identifier"));
    }
    Ok(s)
  }

  /// Consumes one escaped or literal character inside a string/class
  /// body. Assumes the opening quote/bracket has already been consumed
  /// and that `terminator` has not yet been seen.
  pub(super) fn parse_char_body(&mut self, terminator: char) -> Result<Option<Char>, CompileError> {
    match self.reader.peek() {
      None => Err(self.syntax_error("unexpected end of input inside a literal")),
      Some(c) if c == terminator => Ok(None),
      Some('\\') => {
        self.reader.next();
        self.parse_escape().map(Some)
      }
      Some(c) => {
        self.reader.next();
        Ok(Some(Char::new(c)))
      }
    }
  }

  /// Parses one escape sequence, having already consumed the backslash.
  /// Accepts `\n \r \t \' \" \[ \] \\`, octal `\[0-2][0-7][0-7]` or
  /// `\[0-7][0-7]?`, and `\uXXXX`.
  fn parse_escape(&mut self) -> Result<Char, CompileError> {
    let c = self.reader.next().ok_or_else(|| self.syntax_error("dangling escape at end of input"))?;
    match c {
      'n' => Ok(Char::new('\n')),
      'r' => Ok(Char::new('\r')),
      't' => Ok(Char::new('\t')),
      '\'' => Ok(Char::new('\'')),
      '"' => Ok(Char::new('"')),
      '[' => Ok(Char::new('[')),
      ']' => Ok(Char::new(']')),
      '\\' => Ok(Char::new('\\')),
      'u' => self.parse_unicode_escape(),
      '0'..='7' => self.parse_octal_escape(c),
      other => Err(self.syntax_error(&format!("unknown escape sequence `\\{other}`"))),
    }
  }

  fn parse_unicode_escape(&mut self) -> Result<Char, CompileError> {
    let mut value: u32 = 0;
    for _ in 0..4 {
      let c = self.reader.next().ok_or_else(|| self.syntax_error("incomplete \\u escape"))?;
      let digit = c.to_digit(16).ok_or_else(|| self.syntax_error("\\u escape must be 4 hex digits"))?;
      value = value * 16 + digit;
    }
    Ok(Char(value))
  }

  /// Octal escapes are two disjoint forms, picked by `first` (the digit
  /// already consumed): `\[0-2][0-7][0-7]` (a full 3-digit byte value,
  /// the other two digits mandatory) or `\[0-7][0-7]?` (1 or 2 digits).
  /// A `0-2`-led escape that can't complete its third digit is a hard
  /// parse failure, not a fallback to the shorter form.
  fn parse_octal_escape(&mut self, first: char) -> Result<Char, CompileError> {
    if ('0'..='2').contains(&first) {
      let d1 = self.reader.peek().filter(|c| ('0'..='7').contains(c)).ok_or_else(|| self.syntax_error("malformed octal escape: expected 3 digits"))?;
      self.reader.next();
      let d2 = self.reader.peek().filter(|c| ('0'..='7').contains(c)).ok_or_else(|| self.syntax_error("malformed octal escape: expected 3 digits"))?;
      self.reader.next();
      let s: String = [first, d1, d2].into_iter().collect();
      let value = u32::from_str_radix(&s, 8).map_err(|_| self.syntax_error("malformed octal escape"))?;
      return Ok(Char(value));
    }

    let mut digits = vec![first];
    if let Some(d1) = self.reader.peek().filter(|c| ('0'..='7').contains(c)) {
      self.reader.next();
      digits.push(d1);
    }
    let s: String = digits.into_iter().collect();
    let value = u32::from_str_radix(&s, 8).map_err(|_| self.syntax_error("malformed octal escape"))?;
    Ok(Char(value))
  }
}
