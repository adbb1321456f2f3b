//! `@include "path"` resolution: textual substitution of the named
//! file's contents before the grammar is handed to the recursive-
//! descent parser. See spec.md §6.1.
//!
//! Grounded on `polygen`'s search-path based file resolution
//! (`codegen/python/config.py`, `polygen/preprocessor.py`): the first
//! search root that contains the requested path wins, and a file
//! transitively including itself is a fatal `IncludeCycle`.

use crate::error::CompileError;

/// Abstracts over where included grammar files come from, so tests can
/// supply an in-memory map instead of touching the filesystem. The CLI
/// supplies a filesystem-backed implementation.
pub trait IncludeLoader {
  /// Returns the content of `path`, resolved against `search_paths` in
  /// order (first match wins), or `None` if it cannot be found anywhere.
  fn load(&self, path: &str, search_paths: &[String]) -> Option<(String, String)>;
}

/// An [`IncludeLoader`] backed by an in-memory table, keyed by the exact
/// path string a grammar would `@include`.
#[derive(Default, Clone, Debug)]
pub struct MapLoader(pub std::collections::HashMap<String, String>);

impl IncludeLoader for MapLoader {
  fn load(&self, path: &str, _search_paths: &[String]) -> Option<(String, String)> {
    self.0.get(path).map(|content| (path.to_string(), content.clone()))
  }
}

/// Scans `text` for `@include "path"` directives not inside a string or
/// comment, and replaces each with the (recursively resolved) content of
/// the named file. `file` names the file `text` came from, for cycle
/// detection and diagnostics; `visited` is the chain of files already
/// being expanded, to detect include cycles.
pub fn resolve_includes(
  text: &str,
  file: &str,
  search_paths: &[String],
  loader: &dyn IncludeLoader,
  visited: &mut Vec<String>,
) -> Result<String, CompileError> {
  if visited.iter().any(|v| v == file) {
    visited.push(file.to_string());
    return Err(CompileError::IncludeCycle { path: visited.clone() });
  }
  visited.push(file.to_string());

  let mut out = String::with_capacity(text.len());
  let chars: Vec<char> = text.chars().collect();
  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    match c {
      '#' => {
        // Line comment: copy through end of line untouched.
        while i < chars.len() && chars[i] != '\n' {
          out.push(chars[i]);
          i += 1;
        }
      }
      '"' | '\'' => {
        // String literal: copy untouched, respecting backslash escapes.
        let quote = c;
        out.push(c);
        i += 1;
        while i < chars.len() && chars[i] != quote {
          if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
          } else {
            out.push(chars[i]);
            i += 1;
          }
        }
        if i < chars.len() {
          out.push(chars[i]);
          i += 1;
        }
      }
      '@' if chars[i..].starts_with(&['@', 'i', 'n', 'c', 'l', 'u', 'd', 'e']) => {
        let mut j = i + "@include".len();
        while j < chars.len() && chars[j].is_whitespace() {
          j += 1;
        }
        if j < chars.len() && (chars[j] == '"' || chars[j] == '\'') {
          let quote = chars[j];
          let start = j + 1;
          let mut k = start;
          while k < chars.len() && chars[k] != quote {
            k += 1;
          }
          let path: String = chars[start..k].iter().collect();
          let (resolved_name, content) = loader.load(&path, search_paths).ok_or_else(|| CompileError::IncludeNotFound { path: path.clone() })?;
          let expanded = resolve_includes(&content, &resolved_name, search_paths, loader, visited)?;
          out.push_str(&expanded);
          i = k + 1;
        } else {
          // Not actually a well-formed include directive; let the real
          // parser raise the syntax error.
          out.push(c);
          i += 1;
        }
      }
      _ => {
        out.push(c);
        i += 1;
      }
    }
  }

  visited.pop();
  Ok(out)
}

#[cfg(test)]
mod test {
  use super::*;

  fn loader(pairs: &[(&str, &str)]) -> MapLoader {
    MapLoader(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
  }

  #[test]
  fn splices_included_file_in_place() {
    let l = loader(&[("common.peg", "B <- 'b'\n")]);
    let text = "A <- 'a'\n@include \"common.peg\"\n";
    let mut visited = vec![];
    let out = resolve_includes(text, "main.peg", &[], &l, &mut visited).unwrap();
    assert_eq!(out, "A <- 'a'\nB <- 'b'\n\n");
  }

  #[test]
  fn detects_include_cycles() {
    let l = loader(&[("a.peg", "@include \"b.peg\"\n"), ("b.peg", "@include \"a.peg\"\n")]);
    let mut visited = vec![];
    let err = resolve_includes("@include \"a.peg\"\n", "main.peg", &[], &l, &mut visited).unwrap_err();
    assert!(matches!(err, CompileError::IncludeCycle { .. }));
  }

  #[test]
  fn missing_include_is_an_error() {
    let l = loader(&[]);
    let mut visited = vec![];
    let err = resolve_includes("@include \"missing.peg\"\n", "main.peg", &[], &l, &mut visited).unwrap_err();
    assert!(matches!(err, CompileError::IncludeNotFound { .. }));
  }

  #[test]
  fn ignores_include_like_text_inside_strings_and_comments() {
    let l = loader(&[]);
    let text = "A <- '@include' # @include \"x\"\n";
    let mut visited = vec![];
    let out = resolve_includes(text, "main.peg", &[], &l, &mut visited).unwrap();
    assert_eq!(out, text);
  }
}
