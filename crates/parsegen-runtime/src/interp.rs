//! A tree-walking interpreter over a normalized grammar, executed
//! directly against this crate's own primitives and memo table instead
//! of through a generated, compiled parser.
//!
//! Grounded on `polygen/parsing/bootstrap/parser.py`: that module is
//! exactly this pattern in the original implementation — a
//! hand-written interpreter used to validate the grammar compiler
//! before any generated parser exists, evaluating metarule bodies as
//! live Python rather than as a second compilation target. This module
//! plays the same role here, except metarule bodies are plain host
//! closures supplied by the caller rather than parsed code, since there
//! is no embedded-language evaluator to run arbitrary Rust snippets at
//! interpretation time.
//!
//! Deliberately defines its own grammar representation
//! ([`Grammar`], [`Rule`], [`Expr`], [`Alt`], [`Item`]) rather than
//! depending on `parsegen-core::ast` — this crate has no dependency on
//! `parsegen-core` at all, so whatever constructs an interpreted
//! grammar (typically a test harness) converts from the compiler's AST
//! into this shape itself.

use std::collections::HashMap;
use std::rc::Rc;

use crate::input::Input;
use crate::memo::{Lookup, MemoTable};
use crate::primitives::{expect_char, expect_string, lookahead, loop_, ranges};

/// The interpreter's result value. Mirrors spec.md §4.5's "store into
/// the Alt's metaname variables... or return a default tuple/array":
/// matched items collect into [`Value::Seq`] when an Alt has no
/// action, and a metarule action receives the named values and
/// produces whatever `Value` it likes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Char(char),
  Str(String),
  Num(f64),
  Seq(Vec<Value>),
  Absent,
  Unit,
}

/// A metarule body. Real generated code would compile the action's
/// source text for its target language; this interpreter instead
/// takes the closure directly, since it has no target language of its
/// own to compile into.
pub type Action = Rc<dyn Fn(&[(Option<String>, Value)]) -> Value>;

#[derive(Clone)]
pub enum Item {
  Ref(String),
  Char(char),
  AnyChar,
  String(String),
  Class(Vec<(char, char)>),
  ZeroOrOne(Box<Item>),
  ZeroOrMore(Box<Item>),
  OneOrMore(Box<Item>),
  And(Box<Item>),
  Not(Box<Item>),
}

#[derive(Clone)]
pub struct NamedItem {
  pub name: Option<String>,
  pub item: Item,
}

impl NamedItem {
  pub fn unnamed(item: Item) -> Self {
    Self { name: None, item }
  }

  pub fn named(name: impl Into<String>, item: Item) -> Self {
    Self { name: Some(name.into()), item }
  }
}

#[derive(Clone, Default)]
pub struct Alt {
  pub items:  Vec<NamedItem>,
  /// Whether this Alt was classified as a grower by the left-recursion
  /// analyzer. Ignored for non-head rules.
  pub grower: bool,
  pub action: Option<Action>,
}

#[derive(Clone, Default)]
pub struct Expr {
  pub alts: Vec<Alt>,
}

#[derive(Clone, Default)]
pub struct Rule {
  pub id:   String,
  pub expr: Expr,
  pub head: bool,
  /// For a head rule, the ids of the other rules on its left-recursion
  /// cycle (empty for direct recursion, where the head calls itself
  /// with nothing in between). Drives memo invalidation during growth —
  /// see `parse_head_rule`. Ignored for non-head rules.
  pub involved: Vec<String>,
}

impl Rule {
  pub fn new(id: impl Into<String>, expr: Expr, head: bool) -> Self {
    Self { id: id.into(), expr, head, involved: Vec::new() }
  }
}

#[derive(Clone, Default)]
pub struct Grammar {
  pub rules: HashMap<String, Rule>,
  pub entry: String,
}

impl Grammar {
  pub fn rule(&self, id: &str) -> &Rule {
    self.rules.get(id).unwrap_or_else(|| panic!("undefined rule {id} referenced at interpretation time"))
  }
}

/// Parses the grammar's entry rule against `source`, failing unless
/// the match also consumes the whole input — matching spec.md §6.3's
/// "the generated parser's `parse` fails on a non-empty leftover
/// suffix the grammar itself didn't account for via an explicit `EOF`
/// item" framing used by the end-to-end scenarios, which each pair
/// their entry rule with an explicit `!.` / EOF item rather than
/// relying on the interpreter to enforce full consumption itself.
pub fn parse(grammar: &Grammar, source: &str) -> Option<Value> {
  let mut memo = MemoTable::new();
  let mut input = Input::new(source);
  parse_rule(grammar, &mut memo, &grammar.entry, &mut input)
}

fn parse_rule(grammar: &Grammar, memo: &mut MemoTable<String, Value>, id: &str, input: &mut Input) -> Option<Value> {
  let rule = grammar.rule(id);
  if rule.head {
    parse_head_rule(grammar, memo, rule, input)
  } else {
    parse_plain_rule(grammar, memo, rule, input)
  }
}

fn parse_plain_rule(grammar: &Grammar, memo: &mut MemoTable<String, Value>, rule: &Rule, input: &mut Input) -> Option<Value> {
  let pos = input.pos();
  if let Lookup::Done(result) = memo.lookup(&rule.id.clone(), input) {
    return result;
  }
  let start = input.pos();
  let result = try_alts(grammar, memo, &rule.expr.alts, input);
  let end = if result.is_some() { input.pos() } else { start };
  memo.commit(rule.id.clone(), pos, result.clone(), end);
  input.set_pos(end);
  result
}

/// Left-recursive head rule. The first pass tries every alternative —
/// not just the ones classified `seed` — because for indirect/mutual
/// recursion a "grower" alt (one whose leading reference falls in the
/// same cycle) can still succeed on the very first attempt: the
/// recursive call it makes hits the freshly-seeded "no result" sentinel
/// and fails, which can fall through to an unrelated escape alt deeper
/// in the cycle rather than failing the whole alt outright. Restricting
/// the first pass to seed-classified alts only (as spec.md's §4.6
/// wording reads most literally) leaves a head rule with zero seed alts
/// — as happens for a cycle like `A <- B 'a'; B <- C 'b'; C <- A 'c' /
/// D 'c'.` — unable to ever produce a base case, even though the
/// grammar is perfectly well-formed. Grounded on
/// `polygen/parsing/bootstrap/parser.py`'s `memoize_lr`, which re-runs
/// the *entire* rule body on every iteration rather than statically
/// partitioning alternatives at all; growth is still bounded to
/// `grower` alts afterward, matching spec.md §4.6 step 3 exactly.
fn parse_head_rule(grammar: &Grammar, memo: &mut MemoTable<String, Value>, rule: &Rule, input: &mut Input) -> Option<Value> {
  let pos = input.pos();
  if let Lookup::Done(result) = memo.lookup(&rule.id.clone(), input) {
    return result;
  }

  memo.begin_left_recursive(rule.id.clone(), pos);

  let all_alts: Vec<&Alt> = rule.expr.alts.iter().collect();
  let grower_alts: Vec<&Alt> = rule.expr.alts.iter().filter(|a| a.grower).collect();

  input.set_pos(pos);
  let seed = try_alt_refs(grammar, memo, &all_alts, input);
  match seed {
    Some(result) => memo.commit(rule.id.clone(), pos, Some(result), input.pos()),
    None => return memo.finish(&rule.id.clone(), pos, input),
  }

  loop {
    // Rules between this head and its own recursive reference (e.g. `B`
    // and `C` in `A <- B 'a'; B <- C 'b'; C <- A 'c' / D 'c'.`) cached
    // their result against the *previous* iteration's memo for `A`.
    // Drop those entries so this iteration re-derives them against the
    // grown value just committed above.
    for id in &rule.involved {
      memo.invalidate(&id.clone(), pos);
    }
    input.set_pos(pos);
    match try_alt_refs(grammar, memo, &grower_alts, input) {
      Some(grown) => {
        let end = input.pos();
        if !memo.update_if_grown(rule.id.clone(), pos, grown, end) {
          break;
        }
      }
      None => break,
    }
  }

  memo.finish(&rule.id.clone(), pos, input)
}

fn try_alts(grammar: &Grammar, memo: &mut MemoTable<String, Value>, alts: &[Alt], input: &mut Input) -> Option<Value> {
  let refs: Vec<&Alt> = alts.iter().collect();
  try_alt_refs(grammar, memo, &refs, input)
}

fn try_alt_refs(grammar: &Grammar, memo: &mut MemoTable<String, Value>, alts: &[&Alt], input: &mut Input) -> Option<Value> {
  let start = input.pos();
  for alt in alts {
    input.set_pos(start);
    if let Some(result) = eval_alt(grammar, memo, alt, input) {
      return Some(result);
    }
  }
  input.set_pos(start);
  None
}

fn eval_alt(grammar: &Grammar, memo: &mut MemoTable<String, Value>, alt: &Alt, input: &mut Input) -> Option<Value> {
  let mut named = Vec::new();
  for ni in &alt.items {
    let value = eval_item(grammar, memo, &ni.item, input)?;
    if ni.name.as_deref() != Some("_") {
      named.push((ni.name.clone(), value));
    }
  }
  match &alt.action {
    Some(action) => Some(action(&named)),
    None => Some(Value::Seq(named.into_iter().map(|(_, v)| v).collect())),
  }
}

fn eval_item(grammar: &Grammar, memo: &mut MemoTable<String, Value>, item: &Item, input: &mut Input) -> Option<Value> {
  match item {
    Item::Ref(id) => parse_rule(grammar, memo, id, input),
    Item::Char(c) => expect_char(input, Some(*c)).map(Value::Char),
    Item::AnyChar => expect_char(input, None).map(Value::Char),
    Item::String(s) => expect_string(input, s).map(|_| Value::Str(s.clone())),
    Item::Class(rs) => ranges(input, rs).map(Value::Char),
    Item::ZeroOrOne(inner) => {
      let pos = input.pos();
      match eval_item(grammar, memo, inner, input) {
        Some(v) => Some(v),
        None => {
          input.set_pos(pos);
          Some(Value::Absent)
        }
      }
    }
    Item::ZeroOrMore(inner) => {
      loop_(false, input, |i| eval_item(grammar, memo, inner, i)).map(Value::Seq)
    }
    Item::OneOrMore(inner) => {
      loop_(true, input, |i| eval_item(grammar, memo, inner, i)).map(Value::Seq)
    }
    Item::And(inner) => {
      lookahead(input, true, |i| eval_item(grammar, memo, inner, i)).map(|_| Value::Unit)
    }
    Item::Not(inner) => {
      lookahead(input, false, |i| eval_item(grammar, memo, inner, i)).map(|_| Value::Unit)
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn char_rule(id: &str, c: char) -> Rule {
    Rule::new(id, Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Char(c))], ..Default::default() }] }, false)
  }

  #[test]
  fn exact_match_with_eof() {
    let mut rules = HashMap::new();
    rules.insert(
      "G".to_string(),
      Rule::new(
        "G",
        Expr {
          alts: vec![Alt {
            items: vec![NamedItem::unnamed(Item::String("abc".to_string())), NamedItem::unnamed(Item::Ref("EOF".to_string()))],
            ..Default::default()
          }],
        },
        false,
      ),
    );
    rules.insert(
      "EOF".to_string(),
      Rule::new("EOF", Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Not(Box::new(Item::AnyChar)))], ..Default::default() }] }, false),
    );
    let grammar = Grammar { rules, entry: "G".to_string() };

    assert!(parse(&grammar, "abc").is_some());
    assert!(parse(&grammar, "ab").is_none());
    assert!(parse(&grammar, "abc ").is_none());
  }

  #[test]
  fn optional_suffix() {
    let mut rules = HashMap::new();
    rules.insert(
      "A".to_string(),
      Rule::new(
        "A",
        Expr {
          alts: vec![Alt {
            items: vec![
              NamedItem::unnamed(Item::Char('a')),
              NamedItem::unnamed(Item::ZeroOrOne(Box::new(Item::Ref("B".to_string())))),
              NamedItem::unnamed(Item::Ref("EOF".to_string())),
            ],
            ..Default::default()
          }],
        },
        false,
      ),
    );
    rules.insert("B".to_string(), char_rule("B", 'b'));
    rules.insert(
      "EOF".to_string(),
      Rule::new("EOF", Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Not(Box::new(Item::AnyChar)))], ..Default::default() }] }, false),
    );
    let grammar = Grammar { rules, entry: "A".to_string() };

    assert!(parse(&grammar, "a").is_some());
    assert!(parse(&grammar, "ab").is_some());
    assert!(parse(&grammar, "abb").is_none());
  }

  #[test]
  fn left_recursive_arithmetic_is_left_associative() {
    // E <- E '+' T / T ; T <- [0-9]
    let mut rules = HashMap::new();
    rules.insert(
      "E".to_string(),
      Rule::new(
        "E",
        Expr {
          alts: vec![
            Alt {
              items:  vec![
                NamedItem::named("l", Item::Ref("E".to_string())),
                NamedItem::unnamed(Item::Char('+')),
                NamedItem::named("r", Item::Ref("T".to_string())),
              ],
              grower: true,
              action: Some(Rc::new(|vals: &[(Option<String>, Value)]| {
                let l = vals.iter().find(|(n, _)| n.as_deref() == Some("l")).unwrap().1.clone();
                let r = vals.iter().find(|(n, _)| n.as_deref() == Some("r")).unwrap().1.clone();
                Value::Seq(vec![l, r])
              })),
            },
            Alt { items: vec![NamedItem::unnamed(Item::Ref("T".to_string()))], grower: false, action: None },
          ],
        },
        true,
      ),
    );
    rules.insert("T".to_string(), Rule::new("T", Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Class(vec![('0', '9')]))], ..Default::default() }] }, false));
    let grammar = Grammar { rules, entry: "E".to_string() };

    let result = parse(&grammar, "1+2+3").unwrap();
    // left-associative: ((1+2)+3)
    assert_eq!(
      result,
      Value::Seq(vec![Value::Seq(vec![Value::Seq(vec![Value::Char('1')]), Value::Seq(vec![Value::Char('2')])]), Value::Seq(vec![Value::Char('3')])])
    );
  }

  #[test]
  fn semantic_action_runs_the_supplied_closure() {
    // Float <- i:[0-9]+ '.' f:[0-9]+
    let mut rules = HashMap::new();
    rules.insert(
      "Float".to_string(),
      Rule::new(
        "Float",
        Expr {
          alts: vec![Alt {
            items:  vec![
              NamedItem::named("i", Item::OneOrMore(Box::new(Item::Class(vec![('0', '9')])))),
              NamedItem::unnamed(Item::Char('.')),
              NamedItem::named("f", Item::OneOrMore(Box::new(Item::Class(vec![('0', '9')])))),
            ],
            grower: false,
            action: Some(Rc::new(|vals: &[(Option<String>, Value)]| {
              let join = |v: &Value| match v {
                Value::Seq(chars) => chars
                  .iter()
                  .map(|c| match c {
                    Value::Char(c) => *c,
                    _ => unreachable!(),
                  })
                  .collect::<String>(),
                _ => unreachable!(),
              };
              let i = join(&vals.iter().find(|(n, _)| n.as_deref() == Some("i")).unwrap().1);
              let f = join(&vals.iter().find(|(n, _)| n.as_deref() == Some("f")).unwrap().1);
              Value::Num(format!("{i}.{f}").parse().unwrap())
            })),
          }],
        },
        false,
      ),
    );
    let grammar = Grammar { rules, entry: "Float".to_string() };

    assert_eq!(parse(&grammar, "3.1415"), Some(Value::Num(3.1415)));
  }

  #[test]
  fn indirect_left_recursion_grows_through_intermediate_rules() {
    // A <- B 'a' ; B <- C 'b' ; C <- A 'c' / D 'c' ; D <- 'd'
    let mut rules = HashMap::new();
    let mut a = Rule::new(
      "A",
      Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Ref("B".to_string())), NamedItem::unnamed(Item::Char('a'))], grower: true, action: None }] },
      true,
    );
    a.involved = vec!["B".to_string(), "C".to_string()];
    rules.insert("A".to_string(), a);
    rules.insert(
      "B".to_string(),
      Rule::new(
        "B",
        Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Ref("C".to_string())), NamedItem::unnamed(Item::Char('b'))], ..Default::default() }] },
        false,
      ),
    );
    rules.insert(
      "C".to_string(),
      Rule::new(
        "C",
        Expr {
          alts: vec![
            Alt { items: vec![NamedItem::unnamed(Item::Ref("A".to_string())), NamedItem::unnamed(Item::Char('c'))], ..Default::default() },
            Alt { items: vec![NamedItem::unnamed(Item::Ref("D".to_string())), NamedItem::unnamed(Item::Char('c'))], ..Default::default() },
          ],
        },
        false,
      ),
    );
    rules.insert("D".to_string(), Rule::new("D", Expr { alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Char('d'))], ..Default::default() }] }, false));
    let grammar = Grammar { rules, entry: "A".to_string() };

    let result = parse(&grammar, "dcba").unwrap();
    assert_eq!(
      result,
      Value::Seq(vec![Value::Seq(vec![Value::Seq(vec![Value::Char('d'), Value::Char('c')]), Value::Char('b')]), Value::Char('a')])
    );

    let mut input = Input::new("dcbacba");
    let mut memo = MemoTable::new();
    let result = parse_rule(&grammar, &mut memo, "A", &mut input);
    assert!(result.is_some(), "three-cycle indirect recursion must fully grow");
    assert!(input.at_end(), "expected all of \"dcbacba\" to be consumed, stopped at {}", input.pos());
  }
}
