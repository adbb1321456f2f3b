//! Optional, default-off rewriting passes for back ends that can't or
//! don't want to implement certain primitives directly. See spec.md
//! §4.3's "optional passes" note; none of these have a counterpart pass
//! class in `polygen/modifier.py` — the original interpreter backend
//! implements classes, bounded repetition and positive lookahead
//! natively, so these exist here only to let a thinner code emitter
//! shed primitives it doesn't want to carry.

use crate::ast::*;
use crate::error::{CompileError, Diagnostics};
use crate::modifier::Pass;

/// Rewrites every `Class` into an `Expr` of single-`Char` alternatives,
/// wrapped in a generated rule the same way `ReplaceNestedExprs` lifts a
/// nested `Expr` out of its parent.
#[derive(Default)]
pub struct ExpandClass {
  counter: u32,
}

impl Pass for ExpandClass {
  fn name(&self) -> &'static str {
    "ExpandClass"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let mut new_rules = Vec::new();
    for rule_idx in 0..grammar.rules.len() {
      let rule_id = grammar.rules[rule_idx].id.clone();
      let mut expr = std::mem::replace(&mut grammar.rules[rule_idx].expr, Expr { alts: vec![], info: None });
      expand_in_expr(&mut expr, &rule_id, &mut self.counter, &mut new_rules);
      grammar.rules[rule_idx].expr = expr;
    }
    grammar.rules.extend(new_rules);
    Ok(true)
  }
}

fn expand_in_expr(expr: &mut Expr, owner: &Id, counter: &mut u32, new_rules: &mut Vec<Rule>) {
  for alt in expr.alts.iter_mut() {
    for ni in alt.items.iter_mut() {
      expand_in_item(&mut ni.item, owner, counter, new_rules);
    }
  }
}

fn expand_in_item(item: &mut Item, owner: &Id, counter: &mut u32, new_rules: &mut Vec<Rule>) {
  match item {
    Item::Class(class) => {
      let gen_id = Id::new(format!("{}__GEN_{}", owner.as_str(), counter));
      *counter += 1;
      let alts = class
        .ranges
        .iter()
        .flat_map(|r| {
          let lo = r.first.0;
          let hi = r.last.map(|l| l.0).unwrap_or(lo);
          (lo..=hi).map(Char)
        })
        .map(|c| Alt { items: vec![NamedItem::unnamed(Item::Char(c))], metarule: None, nullable: false, grower: false, info: None })
        .collect();
      new_rules.push(Rule::new(gen_id.clone(), Expr { alts, info: None }));
      *item = Item::Id(gen_id);
    }
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) | Item::Repetition(i, _, _) => {
      expand_in_item(i, owner, counter, new_rules)
    }
    Item::Nested(e) => expand_in_expr(e, owner, counter, new_rules),
    Item::Id(_) | Item::String(_) | Item::Char(_) | Item::AnyChar => {}
  }
}

/// Rewrites `Repetition(item, n, m)` into `n` copies of `item` in
/// sequence, followed by an optional group covering the remaining
/// `m - n` (or a bare `ZeroOrMore` when the upper bound is unset). A
/// repetition with only a lower bound expands to exactly `n` copies.
#[derive(Default)]
pub struct ReplaceRep;

impl Pass for ReplaceRep {
  fn name(&self) -> &'static str {
    "ReplaceRep"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    for rule in grammar.rules.iter_mut() {
      for alt in rule.expr.alts.iter_mut() {
        let mut rebuilt = Vec::with_capacity(alt.items.len());
        for ni in alt.items.drain(..) {
          rebuilt.extend(replace_rep_named_item(ni));
        }
        alt.items = rebuilt;
      }
    }
    Ok(true)
  }
}

fn replace_rep_named_item(mut ni: NamedItem) -> Vec<NamedItem> {
  if !matches!(ni.item, Item::Repetition(..)) {
    return vec![ni];
  }
  let Item::Repetition(inner, first, last) = ni.item else {
    unreachable!()
  };

  let mut out = Vec::new();
  for _ in 0..first {
    out.push(NamedItem::unnamed((*inner).clone()));
  }

  if let Some(last) = last {
    let extra = last.saturating_sub(first);
    for _ in 0..extra {
      out.push(NamedItem::unnamed(Item::ZeroOrOne(inner.clone())));
    }
  } else {
    out.push(NamedItem::unnamed(Item::ZeroOrMore(inner.clone())));
  }

  if let Some(last_item) = out.last_mut() {
    last_item.name = ni.name.take();
  }
  out
}

/// Rewrites `And(item)` positive lookahead into `Not(Not(item))`, for
/// back ends whose primitive set only exposes negative lookahead (see
/// spec.md §4.6's 6 primitives — no `expect_and`).
#[derive(Default)]
pub struct EliminateAnd;

impl Pass for EliminateAnd {
  fn name(&self) -> &'static str {
    "EliminateAnd"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    for rule in grammar.rules.iter_mut() {
      for alt in rule.expr.alts.iter_mut() {
        for ni in alt.items.iter_mut() {
          eliminate_and_in_item(&mut ni.item);
        }
      }
    }
    Ok(true)
  }
}

fn eliminate_and_in_item(item: &mut Item) {
  match item {
    Item::And(inner) => {
      eliminate_and_in_item(inner);
      let taken = std::mem::replace(inner.as_mut(), Item::AnyChar);
      *item = Item::Not(Box::new(Item::Not(Box::new(taken))));
    }
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::Not(i) | Item::Repetition(i, _, _) => {
      eliminate_and_in_item(i)
    }
    Item::Nested(e) => {
      for alt in e.alts.iter_mut() {
        for ni in alt.items.iter_mut() {
          eliminate_and_in_item(&mut ni.item);
        }
      }
    }
    Item::Id(_) | Item::String(_) | Item::Char(_) | Item::AnyChar | Item::Class(_) => {}
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn rule(id: &str, alts: Vec<Alt>) -> Rule {
    Rule::new(Id::new(id), Expr { alts, info: None })
  }

  fn alt(items: Vec<NamedItem>) -> Alt {
    Alt { items, metarule: None, nullable: false, grower: false, info: None }
  }

  #[test]
  fn expand_class_lifts_ranges_into_a_generated_rule() {
    let class = Class { ranges: vec![Range { first: Char::new('a'), last: Some(Char::new('c')), info: None }] };
    let mut g = Grammar {
      rules: vec![rule("R", vec![alt(vec![NamedItem::unnamed(Item::Class(class))])])],
      metarules: vec![],
      entry: None,
    };
    let mut diags = Diagnostics::new();
    ExpandClass::default().step(&mut g, &mut diags).unwrap();
    assert_eq!(g.rules.len(), 2);
    assert!(matches!(g.rules[0].expr.alts[0].items[0].item, Item::Id(_)));
    assert_eq!(g.rules[1].expr.alts.len(), 3);
  }

  #[test]
  fn replace_rep_expands_bounded_repetition() {
    let item = Item::Repetition(Box::new(Item::Char(Char::new('a'))), 2, Some(4));
    let mut g = Grammar { rules: vec![rule("R", vec![alt(vec![NamedItem::unnamed(item)])])], metarules: vec![], entry: None };
    let mut diags = Diagnostics::new();
    ReplaceRep.step(&mut g, &mut diags).unwrap();
    assert_eq!(g.rules[0].expr.alts[0].items.len(), 4);
  }

  #[test]
  fn eliminate_and_rewrites_to_double_negation() {
    let item = Item::And(Box::new(Item::Char(Char::new('a'))));
    let mut g = Grammar { rules: vec![rule("R", vec![alt(vec![NamedItem::unnamed(item)])])], metarules: vec![], entry: None };
    let mut diags = Diagnostics::new();
    EliminateAnd.step(&mut g, &mut diags).unwrap();
    match &g.rules[0].expr.alts[0].items[0].item {
      Item::Not(inner) => assert!(matches!(**inner, Item::Not(_))),
      other => panic!("expected Not(Not(_)), got {other:?}"),
    }
  }
}
