//! Skeleton template preprocessing: `%% name %%` markers in a
//! target-language skeleton are replaced with named content. See
//! spec.md §6.4.
//!
//! Grounded on `polygen/preprocessor.py`'s `Preprocessor`: line-oriented
//! substitution that preserves each line's prefix (the text before the
//! marker) across every line of a multi-line substitution, so an
//! indented or commented marker produces indented/commented output, and
//! appends the marker's postfix only once, after the substitution.
//! Reimplemented as a hand-written scanner instead of a regex, to avoid
//! pulling in a dependency the rest of the parser doesn't use.

use std::collections::HashMap;

use crate::error::CompileError;

/// The named substitutions available to a skeleton. Keys are marker
/// names (`body`, `entry`, `grow_rules`, ...); values are already
/// target-language source text.
pub type Directives = HashMap<String, String>;

/// Expands every `%% name %%` marker in `skeleton` against `directives`.
/// No output is produced unless every marker resolves: the first
/// unrecognized marker aborts the whole expansion.
pub fn process(skeleton: &str, directives: &Directives) -> Result<String, CompileError> {
  let mut out = String::with_capacity(skeleton.len());
  for line in split_lines_keepends(skeleton) {
    match find_last_marker(line) {
      Some((start, end, name)) => {
        let content = directives.get(&name).ok_or_else(|| CompileError::PreprocessorError { marker: name.clone() })?;
        insert(content, &line[..start], &line[end..], &mut out);
      }
      None => out.push_str(line),
    }
  }
  Ok(out)
}

/// Splices `content` in place of a marker, repeating `prefix` on every
/// non-blank line of `content` and appending `postfix` once, after the
/// last line.
fn insert(content: &str, prefix: &str, postfix: &str, out: &mut String) {
  for line in split_lines_keepends(content) {
    let bare = line.trim_end_matches(['\n', '\r']);
    if bare.is_empty() {
      out.push_str(line);
    } else {
      out.push_str(prefix);
      out.push_str(line);
    }
  }
  out.push_str(postfix);
}

fn split_lines_keepends(s: &str) -> impl Iterator<Item = &str> {
  let mut rest = s;
  std::iter::from_fn(move || {
    if rest.is_empty() {
      return None;
    }
    match rest.find('\n') {
      Some(idx) => {
        let (line, tail) = rest.split_at(idx + 1);
        rest = tail;
        Some(line)
      }
      None => {
        let line = rest;
        rest = "";
        Some(line)
      }
    }
  })
}

/// Finds the rightmost well-formed `%% name %%` marker in `line`
/// (rightmost because a greedy `.*` prefix would, in the original regex,
/// consume every earlier occurrence as plain prefix text), skipping any
/// `%%` immediately preceded by a backslash escape. Returns the marker's
/// byte span within `line` and its name.
fn find_last_marker(line: &str) -> Option<(usize, usize, String)> {
  let bytes = line.as_bytes();
  let mut i = 0;
  let mut last = None;

  while let Some(rel) = line[i..].find("%%") {
    let start = i + rel;
    let escaped = start > 0 && bytes[start - 1] == b'\\';
    let mut j = start + 2;

    while bytes.get(j) == Some(&b' ') {
      j += 1;
    }
    let name_start = j;
    while bytes.get(j).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
      j += 1;
    }
    let name_end = j;
    while bytes.get(j) == Some(&b' ') {
      j += 1;
    }

    if !escaped && name_end > name_start && line[j..].starts_with("%%") {
      let end = j + 2;
      last = Some((start, end, line[name_start..name_end].to_string()));
      i = end;
    } else {
      i = start + 2;
    }
  }

  last
}
