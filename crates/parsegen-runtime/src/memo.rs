//! The packrat memo table and the left-recursion seed-growing driver.
//! See spec.md §4.6.
//!
//! Grounded on `polygen/parsing/bootstrap/parser.py`'s `memoize` and
//! `memoize_lr` decorators: both key on `(rule, args, start_position)`;
//! a plain rule looks up or evaluates-and-stores once, while a
//! left-recursive head primes the memo with a failure, then
//! repeatedly resets to the start position and re-evaluates, keeping
//! whichever attempt ends furthest, until an iteration fails to make
//! progress.
//!
//! Unlike the bootstrap's decorator (which wraps a whole method call),
//! this table exposes the seed-growing steps individually rather than
//! taking "try seeds"/"try growers" closures: a grower alternative
//! recurses back into its own head rule, and a generated rule function
//! holds the memo table as an ordinary `&mut` parameter, so the
//! recursive call needs to re-borrow it between steps — a closure
//! captured for the whole call wouldn't be able to. The caller (a
//! generated or interpreted rule function) drives the loop; this table
//! just holds the `(rule, position) -> (result, end)` entries.

use std::collections::HashMap;
use std::hash::Hash;

use crate::input::Input;

#[derive(Clone)]
struct Entry<R> {
  result:  Option<R>,
  end_pos: usize,
}

/// What [`MemoTable::lookup`] finds for a given key and position.
pub enum Lookup<R> {
  /// An entry already exists — either an ordinary cache hit, or a
  /// left-recursive re-entry to a head rule currently being grown. The
  /// cursor has already been repositioned to the stored end; use this
  /// result as-is, don't evaluate the rule body again.
  Done(Option<R>),
  /// No entry yet at this position; evaluate the rule body.
  Pending,
}

/// Keyed by `(rule identity, start position)`. `K` is left to the
/// caller — a parser with no rule arguments can use the rule name or
/// an enum discriminant; one with parameterized rules folds `args`
/// into `K` too.
pub struct MemoTable<K, R> {
  entries: HashMap<(K, usize), Entry<R>>,
}

impl<K, R> Default for MemoTable<K, R> {
  fn default() -> Self {
    Self { entries: HashMap::new() }
  }
}

impl<K: Eq + Hash + Clone, R: Clone> MemoTable<K, R> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Clears every memoized result. Must be called at the start of each
  /// parse — see spec.md §5: a memo table's results are only valid for
  /// the parse call that produced them.
  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Checks for an existing entry at `(key, input.pos())`, repositioning
  /// the cursor to its end position on a hit.
  pub fn lookup(&self, key: &K, input: &mut Input) -> Lookup<R> {
    match self.entries.get(&(key.clone(), input.pos())) {
      Some(entry) => {
        input.set_pos(entry.end_pos);
        Lookup::Done(entry.result.clone())
      }
      None => Lookup::Pending,
    }
  }

  /// Records a plain (non-left-recursive) rule's result.
  pub fn commit(&mut self, key: K, pos: usize, result: Option<R>, end_pos: usize) {
    self.entries.insert((key, pos), Entry { result, end_pos });
  }

  /// Drops a single `(key, pos)` entry, forcing the next lookup to
  /// re-evaluate. Needed for indirect left recursion: a grow iteration
  /// on head `H` only re-derives a longer match if the plain rules
  /// between `H` and its own recursive reference (e.g. `H <- M x; M <-
  /// H y`) are re-run against `H`'s newly grown memo instead of
  /// returning their own stale cached result from the previous
  /// iteration. The caller invalidates those intermediate rules' entries
  /// at the head's start position before each grow attempt.
  pub fn invalidate(&mut self, key: &K, pos: usize) {
    self.entries.remove(&(key.clone(), pos));
  }

  /// Step 1 of seed-growing: seeds the memo with "no result" at `pos`,
  /// so a recursive re-entry during the seed attempt itself fails
  /// cleanly rather than recursing forever.
  pub fn begin_left_recursive(&mut self, key: K, pos: usize) {
    self.entries.insert((key, pos), Entry { result: None, end_pos: pos });
  }

  /// The end position of the current best result for `(key, pos)`.
  pub fn current_end(&self, key: &K, pos: usize) -> usize {
    self.entries.get(&(key.clone(), pos)).map(|e| e.end_pos).unwrap_or(pos)
  }

  /// Step 3 of seed-growing: records `result` as the new best iff it
  /// ends strictly past the current best. Returns whether it did, so
  /// the caller knows whether to keep looping.
  pub fn update_if_grown(&mut self, key: K, pos: usize, result: R, end_pos: usize) -> bool {
    if end_pos > self.current_end(&key, pos) {
      self.entries.insert((key, pos), Entry { result: Some(result), end_pos });
      true
    } else {
      false
    }
  }

  /// Restores the cursor to the stored end position and returns the
  /// final memoized result for `(key, pos)`.
  pub fn finish(&self, key: &K, pos: usize, input: &mut Input) -> Option<R> {
    let entry = &self.entries[&(key.clone(), pos)];
    input.set_pos(entry.end_pos);
    entry.result.clone()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::primitives::{expect_char, ranges};

  fn parse_digit(input: &mut Input) -> Option<char> {
    ranges(input, &[('0', '9')])
  }

  /// `E <- E '+' N / N` over input `"1+2+3"`, driven through the memo
  /// table by hand the way a generated rule function would: look the
  /// rule up first, and only run the seed-growing loop on a miss.
  fn parse_e(memo: &mut MemoTable<&'static str, String>, input: &mut Input) -> Option<String> {
    let pos = input.pos();
    if let Lookup::Done(result) = memo.lookup(&"E", input) {
      return result;
    }

    memo.begin_left_recursive("E", pos);

    input.set_pos(pos);
    let seed = parse_digit(input).map(|c| c.to_string())?;
    memo.commit("E", pos, Some(seed), input.pos());

    loop {
      input.set_pos(pos);
      let grown = (|| {
        let left = parse_e(memo, input)?;
        expect_char(input, Some('+'))?;
        let right = parse_digit(input)?;
        Some(format!("({left}+{right})"))
      })();

      match grown {
        Some(result) => {
          let end = input.pos();
          if !memo.update_if_grown("E", pos, result, end) {
            break;
          }
        }
        None => break,
      }
    }

    memo.finish(&"E", pos, input)
  }

  #[test]
  fn seed_growing_parses_a_left_associative_chain() {
    let mut memo = MemoTable::new();
    let mut input = Input::new("1+2+3");
    let result = parse_e(&mut memo, &mut input);
    assert_eq!(result, Some("((1+2)+3)".to_string()));
    assert!(input.at_end());
  }

  #[test]
  fn seed_growing_stops_at_a_non_matching_suffix() {
    let mut memo = MemoTable::new();
    let mut input = Input::new("1+2x");
    let result = parse_e(&mut memo, &mut input);
    assert_eq!(result, Some("(1+2)".to_string()));
    assert_eq!(input.pos(), 3);
  }

  #[test]
  fn plain_memoization_reuses_cached_result_without_reevaluating() {
    let mut memo = MemoTable::new();
    let mut input = Input::new("a");
    let mut calls = 0;
    for _ in 0..3 {
      input.set_pos(0);
      match memo.lookup(&"rule", &mut input) {
        Lookup::Done(r) => assert_eq!(r, Some('a')),
        Lookup::Pending => {
          calls += 1;
          let r = expect_char(&mut input, Some('a'));
          memo.commit("rule", 0, r, input.pos());
        }
      }
    }
    assert_eq!(calls, 1, "a cache hit must not re-invoke eval");
  }
}
