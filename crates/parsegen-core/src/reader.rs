//! A buffered character source over grammar source text, tracking
//! line/column for diagnostics. See spec.md §4.1.
//!
//! Grounded on the teacher's `UTF8StringReader`
//! (`hctk/types/reader_utf8.rs`): a cursor plus running line/column
//! counters, advanced one codepoint at a time, with a cheap
//! mark/restore pair for the grammar parser's backtracking. Unlike the
//! teacher's reader, this one is codepoint- rather than byte-oriented,
//! since it feeds a hand-written recursive-descent parser rather than
//! a bytecode VM.

use std::io::Read;

const REFILL_CHUNK: usize = 4096;

enum Source {
  /// Every character has already been decoded into `buffer`.
  Exhausted,
  /// Bytes remain to be pulled from a stream and decoded as UTF-8.
  Stream { reader: Box<dyn Read>, pending: Vec<u8> },
}

/// A saved reader position, restorable via [`Reader::reset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark {
  index:  usize,
  line:   usize,
  column: usize,
}

impl Mark {
  /// The character offset this mark was taken at.
  pub fn offset(&self) -> usize {
    self.index
  }
}

/// A sequential, backtrackable source of Unicode scalar values. The
/// decoded buffer only ever grows: `reset` rewinds the cursor, it never
/// discards already-decoded characters, so a mark taken at any earlier
/// position stays valid.
pub struct Reader {
  source: Source,
  buffer: Vec<char>,
  cursor: usize,
  line:   usize,
  column: usize,
}

impl Reader {
  pub fn from_str(s: &str) -> Self {
    Self { source: Source::Exhausted, buffer: s.chars().collect(), cursor: 0, line: 0, column: 0 }
  }

  pub fn from_stream(reader: impl Read + 'static) -> Self {
    Self {
      source: Source::Stream { reader: Box::new(reader), pending: Vec::new() },
      buffer: Vec::new(),
      cursor: 0,
      line: 0,
      column: 0,
    }
  }

  /// Pulls more characters into `buffer` if the underlying source is a
  /// stream and the cursor has caught up to what's decoded so far.
  fn refill_if_needed(&mut self) {
    if self.cursor < self.buffer.len() {
      return;
    }
    let Source::Stream { reader, pending } = &mut self.source else { return };

    let mut chunk = vec![0u8; REFILL_CHUNK];
    match reader.read(&mut chunk) {
      Ok(0) => self.source = Source::Exhausted,
      Ok(n) => {
        pending.extend_from_slice(&chunk[..n]);
        // Decode as much valid UTF-8 as is currently available, leaving
        // any incomplete trailing sequence in `pending` for next time.
        let mut consumed = 0;
        loop {
          match std::str::from_utf8(&pending[consumed..]) {
            Ok(s) => {
              self.buffer.extend(s.chars());
              consumed = pending.len();
              break;
            }
            Err(e) => {
              let valid_len = e.valid_up_to();
              if valid_len == 0 && e.error_len().is_some() {
                // Genuinely invalid UTF-8: stop decoding further bytes.
                break;
              }
              self.buffer.extend(std::str::from_utf8(&pending[consumed..consumed + valid_len]).unwrap().chars());
              consumed += valid_len;
              if e.error_len().is_none() {
                // Incomplete sequence at the end of what we've read so far.
                break;
              }
              // A malformed byte: skip it and keep decoding.
              consumed += 1;
            }
          }
        }
        pending.drain(..consumed);
      }
      Err(_) => self.source = Source::Exhausted,
    }
  }

  /// Returns the next character without consuming it.
  pub fn peek(&mut self) -> Option<char> {
    self.refill_if_needed();
    self.buffer.get(self.cursor).copied()
  }

  /// Consumes and returns the next character, advancing line/column.
  /// `\r`, `\n` and `\r\n` each advance the line counter by exactly one.
  pub fn next(&mut self) -> Option<char> {
    self.refill_if_needed();
    let c = self.buffer.get(self.cursor).copied()?;
    self.cursor += 1;
    match c {
      '\n' => {
        self.line += 1;
        self.column = 0;
      }
      '\r' => {
        self.line += 1;
        self.column = 0;
        if self.peek() == Some('\n') {
          self.cursor += 1;
        }
      }
      _ => self.column += 1,
    }
    Some(c)
  }

  pub fn line(&self) -> usize {
    self.line
  }

  pub fn column(&self) -> usize {
    self.column
  }

  pub fn offset(&self) -> usize {
    self.cursor
  }

  pub fn mark(&self) -> Mark {
    Mark { index: self.cursor, line: self.line, column: self.column }
  }

  pub fn reset(&mut self, mark: Mark) {
    self.cursor = mark.index;
    self.line = mark.line;
    self.column = mark.column;
  }

  pub fn at_end(&mut self) -> bool {
    self.peek().is_none()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn reads_and_marks() {
    let mut r = Reader::from_str("ab");
    assert_eq!(r.peek(), Some('a'));
    assert_eq!(r.next(), Some('a'));
    let m = r.mark();
    assert_eq!(r.next(), Some('b'));
    assert_eq!(r.next(), None);
    r.reset(m);
    assert_eq!(r.next(), Some('b'));
  }

  #[test]
  fn counts_newline_variants_as_one_line_each() {
    let mut r = Reader::from_str("a\nb\rc\r\nd");
    let mut lines = vec![r.line()];
    while r.next().is_some() {
      lines.push(r.line());
    }
    assert_eq!(lines, vec![0, 0, 1, 1, 2, 2, 3, 3]);
  }

  #[test]
  fn streams_and_decodes_utf8_across_refills() {
    let text = "héllo wörld".repeat(200);
    let cursor = std::io::Cursor::new(text.clone().into_bytes());
    let mut r = Reader::from_stream(cursor);
    let mut out = String::new();
    while let Some(c) = r.next() {
      out.push(c);
    }
    assert_eq!(out, text);
  }
}
