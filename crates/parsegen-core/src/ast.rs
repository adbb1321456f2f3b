//! The grammar AST: a tree of tagged variants, optionally carrying a
//! [`ParseInfo`] span for diagnostics. See spec.md §3.
//!
//! Passes navigate parent context through an explicit path stack
//! (see [`crate::modifier::Path`]) rather than parent pointers, so every
//! node here is a plain owned tree with no back references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source span: which file, and the byte offsets the node covers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseInfo {
  pub file:  Option<String>,
  pub start: usize,
  pub end:   usize,
}

impl ParseInfo {
  pub fn new(file: Option<String>, start: usize, end: usize) -> Self {
    Self { file, start, end }
  }
}

/// A grammar identifier. Equality/hashing is by string value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(pub String);

impl Id {
  pub fn new(s: impl Into<String>) -> Self {
    Self(s.into())
  }

  /// The sentinel metaname denoting "this item's result is discarded".
  pub fn ignored() -> Self {
    Self("_".to_string())
  }

  pub fn is_ignored(&self) -> bool {
    self.0 == "_"
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Id {
  fn from(s: &str) -> Self {
    Id::new(s)
  }
}

impl From<String> for Id {
  fn from(s: String) -> Self {
    Id::new(s)
  }
}

/// A single Unicode code point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Char(pub u32);

impl Char {
  pub fn new(c: char) -> Self {
    Self(c as u32)
  }

  pub fn to_char(self) -> Option<char> {
    char::from_u32(self.0)
  }
}

impl From<char> for Char {
  fn from(c: char) -> Self {
    Char::new(c)
  }
}

/// A closed interval `[first, last]` of code points. `last` defaults to
/// `first` when a single character is written in a `Class`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
  pub first: Char,
  pub last:  Option<Char>,
  pub info:  Option<ParseInfo>,
}

impl Range {
  pub fn single(c: Char) -> Self {
    Self { first: c, last: None, info: None }
  }

  pub fn span(first: Char, last: Char) -> Self {
    Self { first, last: Some(last), info: None }
  }

  /// The effective upper bound: `last` if given, else `first`.
  pub fn upper(&self) -> Char {
    self.last.unwrap_or(self.first)
  }

  /// `true` iff the range's `last < first`, violating the spec.md §3 invariant.
  pub fn is_invalid(&self) -> bool {
    self.upper().0 < self.first.0
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
  pub ranges: Vec<Range>,
}

impl Class {
  pub fn is_empty(&self) -> bool {
    self.ranges.is_empty()
  }

  pub fn contains(&self, c: Char) -> bool {
    self.ranges.iter().any(|r| r.first.0 <= c.0 && c.0 <= r.upper().0)
  }
}

/// A reference to either a named metarule (to be resolved by
/// `AssignMetaRules`) or an inline, anonymous action body. After
/// `AssignMetaRules` runs, every surviving `MetaAttach` on an `Alt` is
/// `Inline`, since references have been resolved in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaAttach {
  Ref(Id),
  Inline(String),
}

/// A top-level (named or anonymous) semantic-action definition. Cleared
/// from `Grammar::metarules` once `AssignMetaRules` has distributed each
/// body onto its referencing `Alt`s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRule {
  pub id:   Option<Id>,
  pub body: String,
  pub info: Option<ParseInfo>,
}

/// One item inside an `Alt`, after an optional metaname binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
  pub name:     Option<Id>,
  pub item:     Item,
  /// Set by `ComputeLR`'s nullability sweep.
  pub nullable: bool,
  pub info:     Option<ParseInfo>,
}

impl NamedItem {
  pub fn unnamed(item: Item) -> Self {
    Self { name: None, item, nullable: false, info: None }
  }
}

/// The polymorphic grammar item. `Nested` only ever exists between
/// parsing and `ReplaceNestedExprs`; every other pass sees it replaced
/// by an `Id` reference to a generated rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
  Id(Id),
  String(Vec<Char>),
  Char(Char),
  AnyChar,
  Class(Class),
  ZeroOrOne(Box<Item>),
  ZeroOrMore(Box<Item>),
  OneOrMore(Box<Item>),
  Repetition(Box<Item>, u32, Option<u32>),
  And(Box<Item>),
  Not(Box<Item>),
  /// A parenthesized sub-expression, pre-`ReplaceNestedExprs`.
  Nested(Box<Expr>),
}

impl Item {
  pub fn is_lookahead(&self) -> bool {
    matches!(self, Item::And(_) | Item::Not(_))
  }

  /// `true` for items that never consume text on their own account
  /// (terminal literal/class/any-char items), used by `GenerateMetanames`
  /// to decide whether an `Id` reference names a generated helper rule.
  pub fn is_terminal_like(&self) -> bool {
    matches!(self, Item::String(_) | Item::Char(_) | Item::AnyChar | Item::Class(_))
  }
}

/// One ordered alternative of an `Expr`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alt {
  pub items:    Vec<NamedItem>,
  pub metarule: Option<MetaAttach>,
  pub nullable: bool,
  pub grower:   bool,
  pub info:     Option<ParseInfo>,
}

/// Ordered choice among one or more `Alt`s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
  pub alts: Vec<Alt>,
  pub info: Option<ParseInfo>,
}

/// One SCC a rule participates in, recorded as the ordered list of rule
/// ids Tarjan's algorithm discovered, head first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftRecInfo {
  pub chains: Vec<Vec<Id>>,
}

impl LeftRecInfo {
  pub fn head_id(&self) -> Option<&Id> {
    self.chains.first().and_then(|c| c.first())
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
  pub id:      Id,
  pub expr:    Expr,
  pub entry:   bool,
  pub ignore:  bool,
  pub head:    bool,
  pub leftrec: Option<LeftRecInfo>,
  pub nullable: bool,
  pub info:    Option<ParseInfo>,
}

impl Rule {
  pub fn new(id: Id, expr: Expr) -> Self {
    Self { id, expr, entry: false, ignore: false, head: false, leftrec: None, nullable: false, info: None }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
  pub rules:     Vec<Rule>,
  pub metarules: Vec<MetaRule>,
  pub entry:     Option<Id>,
}

impl Grammar {
  pub fn rule(&self, id: &Id) -> Option<&Rule> {
    self.rules.iter().find(|r| &r.id == id)
  }

  pub fn rule_mut(&mut self, id: &Id) -> Option<&mut Rule> {
    self.rules.iter_mut().find(|r| &r.id == id)
  }

  pub fn entry_rule(&self) -> Option<&Rule> {
    self.entry.as_ref().and_then(|id| self.rule(id))
  }
}
