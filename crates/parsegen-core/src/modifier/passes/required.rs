//! The nine required structural passes preceding left-recursion
//! analysis, in spec.md §4.3 order. Grounded pass-by-pass on
//! `polygen/modifier.py` (`CheckUndefinedRules` through
//! `ValidateRangesAndReps`); each here walks the `Grammar` it cares
//! about with a concrete recursive function rather than the Python
//! source's name-dispatched visitor, since Rust has no runtime
//! equivalent of `getattr(modifier, f"visit_{type(node).__name__}")`.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use super::super::Pass;
use crate::ast::*;
use crate::error::{CompileError, Diagnostics};

#[derive(Default)]
pub struct CheckUndefinedRules;

impl Pass for CheckUndefinedRules {
  fn name(&self) -> &'static str {
    "CheckUndefinedRules"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let defined: IndexSet<Id> = grammar.rules.iter().map(|r| r.id.clone()).collect();
    let mut referenced: IndexSet<Id> = IndexSet::new();
    for rule in &grammar.rules {
      collect_ids_in_expr(&rule.expr, &mut referenced);
    }
    let undefined: Vec<String> =
      referenced.into_iter().filter(|id| !defined.contains(id)).map(|id| id.as_str().to_string()).collect();
    if !undefined.is_empty() {
      return Err(CompileError::UndefinedReference { ids: undefined });
    }
    Ok(true)
  }
}

fn collect_ids_in_expr(expr: &Expr, out: &mut IndexSet<Id>) {
  for alt in &expr.alts {
    for ni in &alt.items {
      collect_ids_in_item(&ni.item, out);
    }
  }
}

fn collect_ids_in_item(item: &Item, out: &mut IndexSet<Id>) {
  match item {
    Item::Id(id) => {
      out.insert(id.clone());
    }
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => {
      collect_ids_in_item(i, out)
    }
    Item::Repetition(i, _, _) => collect_ids_in_item(i, out),
    Item::Nested(e) => collect_ids_in_expr(e, out),
    _ => {}
  }
}

#[derive(Default)]
pub struct CheckRedefinedRules;

impl Pass for CheckRedefinedRules {
  fn name(&self) -> &'static str {
    "CheckRedefinedRules"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let mut counts: IndexMap<Id, u32> = IndexMap::new();
    for rule in &grammar.rules {
      *counts.entry(rule.id.clone()).or_insert(0) += 1;
    }
    if let Some((id, _)) = counts.iter().find(|(_, count)| **count > 1) {
      return Err(CompileError::RedefinedRule { id: id.as_str().to_string() });
    }
    Ok(true)
  }
}

/// `A <- (En1 / En2) E1` becomes `A <- Ag E1` / `Ag <- En1 / En2`. A
/// single post-order pass suffices: children are rewritten (and their
/// own nested `Expr`s collapsed to `Id`s) before the parent `Item` is
/// visited, so a freshly generated rule's body never itself still
/// contains a `Nested` item by the time this pass is done.
#[derive(Default)]
pub struct ReplaceNestedExprs;

impl Pass for ReplaceNestedExprs {
  fn name(&self) -> &'static str {
    "ReplaceNestedExprs"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let mut created: Vec<(Id, Expr, Id)> = Vec::new();
    let mut counters: IndexMap<Id, u32> = IndexMap::new();
    let mut new_rules = Vec::new();

    for rule in grammar.rules.iter_mut() {
      let owner = rule.id.clone();
      replace_nested_in_expr(&mut rule.expr, &owner, &mut created, &mut counters, &mut new_rules);
    }
    grammar.rules.extend(new_rules);
    Ok(true)
  }
}

fn replace_nested_in_expr(
  expr: &mut Expr,
  owner: &Id,
  created: &mut Vec<(Id, Expr, Id)>,
  counters: &mut IndexMap<Id, u32>,
  new_rules: &mut Vec<Rule>,
) {
  for alt in &mut expr.alts {
    for ni in &mut alt.items {
      replace_nested_in_item(&mut ni.item, owner, created, counters, new_rules);
    }
  }
}

fn replace_nested_in_item(
  item: &mut Item,
  owner: &Id,
  created: &mut Vec<(Id, Expr, Id)>,
  counters: &mut IndexMap<Id, u32>,
  new_rules: &mut Vec<Rule>,
) {
  match item {
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => {
      replace_nested_in_item(i, owner, created, counters, new_rules)
    }
    Item::Repetition(i, _, _) => replace_nested_in_item(i, owner, created, counters, new_rules),
    Item::Nested(expr) => {
      replace_nested_in_expr(expr, owner, created, counters, new_rules);
      let existing = created.iter().find(|(o, e, _)| o == owner && e == expr.as_ref()).map(|(_, _, id)| id.clone());
      let gen_id = existing.unwrap_or_else(|| {
        let n = counters.entry(owner.clone()).or_insert(0);
        *n += 1;
        let gen_id = Id::new(format!("{}__GEN_{}", owner.as_str(), n));
        new_rules.push(Rule::new(gen_id.clone(), (**expr).clone()));
        created.push((owner.clone(), (**expr).clone(), gen_id.clone()));
        gen_id
      });
      *item = Item::Id(gen_id);
    }
    _ => {}
  }
}

#[derive(Default)]
pub struct FindEntryRule;

impl Pass for FindEntryRule {
  fn name(&self) -> &'static str {
    "FindEntryRule"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let entries: Vec<Id> = grammar.rules.iter().filter(|r| r.entry).map(|r| r.id.clone()).collect();
    match entries.len() {
      0 => Err(CompileError::UndefinedEntry),
      1 => {
        grammar.entry = Some(entries.into_iter().next().unwrap());
        Ok(true)
      }
      n => Err(CompileError::RedefinedEntry { count: n }),
    }
  }
}

pub struct CreateAnyChar {
  strict: bool,
}

impl CreateAnyChar {
  pub fn new(strict: bool) -> Self {
    Self { strict }
  }
}

impl Default for CreateAnyChar {
  fn default() -> Self {
    Self::new(false)
  }
}

impl Pass for CreateAnyChar {
  fn name(&self) -> &'static str {
    "CreateAnyChar"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    if !self.strict {
      return Ok(true);
    }

    let mut chars: IndexSet<Char> = IndexSet::new();
    for rule in &grammar.rules {
      collect_chars_in_expr(&rule.expr, &mut chars);
    }

    let rule_id = Id::new("AnyChar__GEN");
    for rule in grammar.rules.iter_mut() {
      replace_anychar_in_expr(&mut rule.expr, &rule_id);
    }

    if !grammar.rules.is_empty() {
      let class = charset_to_class(&chars);
      log::info!("AnyChar class: {class:?}");
      let alt = Alt { items: vec![NamedItem::unnamed(Item::Class(class))], metarule: None, nullable: false, grower: false, info: None };
      grammar.rules.push(Rule::new(rule_id, Expr { alts: vec![alt], info: None }));
    }
    Ok(true)
  }
}

fn collect_chars_in_expr(expr: &Expr, out: &mut IndexSet<Char>) {
  for alt in &expr.alts {
    for ni in &alt.items {
      collect_chars_in_item(&ni.item, out);
    }
  }
}

fn collect_chars_in_item(item: &Item, out: &mut IndexSet<Char>) {
  match item {
    Item::Char(c) => {
      out.insert(*c);
    }
    Item::String(chars) => {
      out.extend(chars.iter().copied());
    }
    Item::Class(class) => {
      for r in &class.ranges {
        out.insert(r.first);
        if let Some(last) = r.last {
          out.insert(last);
        }
      }
    }
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => {
      collect_chars_in_item(i, out)
    }
    Item::Repetition(i, _, _) => collect_chars_in_item(i, out),
    Item::Nested(e) => collect_chars_in_expr(e, out),
    _ => {}
  }
}

fn replace_anychar_in_expr(expr: &mut Expr, rule_id: &Id) {
  for alt in &mut expr.alts {
    for ni in &mut alt.items {
      replace_anychar_in_item(&mut ni.item, rule_id);
    }
  }
}

fn replace_anychar_in_item(item: &mut Item, rule_id: &Id) {
  match item {
    Item::AnyChar => *item = Item::Id(rule_id.clone()),
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => {
      replace_anychar_in_item(i, rule_id)
    }
    Item::Repetition(i, _, _) => replace_anychar_in_item(i, rule_id),
    Item::Nested(e) => replace_anychar_in_expr(e, rule_id),
    _ => {}
  }
}

/// Folds a set of code points into a minimal ordered set of `Range`s,
/// merging runs of adjacent code points.
fn charset_to_class(chars: &IndexSet<Char>) -> Class {
  let mut sorted: Vec<Char> = chars.iter().copied().collect();
  sorted.sort_by_key(|c| c.0);

  let mut ranges = Vec::new();
  let mut run: Vec<Char> = Vec::new();
  for c in sorted {
    let starts_new_run = match run.last() {
      Some(last) => c.0 - last.0 != 1,
      None => false,
    };
    if !starts_new_run {
      run.push(c);
    } else {
      ranges.push(finish_run(&run));
      run.clear();
      run.push(c);
    }
  }
  if !run.is_empty() {
    ranges.push(finish_run(&run));
  }
  Class { ranges }
}

fn finish_run(run: &[Char]) -> Range {
  if run.len() == 1 {
    Range::single(run[0])
  } else {
    Range::span(run[0], *run.last().unwrap())
  }
}

#[derive(Default)]
pub struct IgnoreRules;

impl Pass for IgnoreRules {
  fn name(&self) -> &'static str {
    "IgnoreRules"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let ignored: IndexSet<Id> = grammar.rules.iter().filter(|r| r.ignore).map(|r| r.id.clone()).collect();
    for rule in grammar.rules.iter_mut() {
      for alt in &mut rule.expr.alts {
        for ni in &mut alt.items {
          if ni.name.is_some() {
            continue;
          }
          if let Item::Id(id) = inner_item(&ni.item) {
            if ignored.contains(id) {
              ni.name = Some(Id::ignored());
            }
          }
        }
      }
    }
    Ok(true)
  }
}

/// Peels quantifier/lookahead wrappers to find the symbol a `NamedItem`
/// ultimately refers to, mirroring `NamedItem.inner_item` in the
/// original tree-modifier passes.
fn inner_item(item: &Item) -> &Item {
  match item {
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => inner_item(i),
    Item::Repetition(i, _, _) => inner_item(i),
    other => other,
  }
}

pub struct GenerateMetanames {
  reserved_words: HashSet<String>,
}

impl GenerateMetanames {
  pub fn new(reserved_words: HashSet<String>) -> Self {
    Self { reserved_words }
  }
}

impl Default for GenerateMetanames {
  fn default() -> Self {
    Self::new(HashSet::new())
  }
}

impl Pass for GenerateMetanames {
  fn name(&self) -> &'static str {
    "GenerateMetanames"
  }

  fn step(&mut self, grammar: &mut Grammar, diags: &mut Diagnostics) -> Result<bool, CompileError> {
    for rule in grammar.rules.iter_mut() {
      let rule_id = rule.id.as_str().to_string();
      for alt in rule.expr.alts.iter_mut() {
        assign_metanames_in_alt(alt, &rule_id, &self.reserved_words, diags)?;
      }
    }
    Ok(true)
  }
}

fn assign_metanames_in_alt(
  alt: &mut Alt,
  rule_id: &str,
  reserved_words: &HashSet<String>,
  diags: &mut Diagnostics,
) -> Result<(), CompileError> {
  let mut index = 1u32;
  let mut used: IndexSet<String> = IndexSet::new();
  let mut occurrences: IndexMap<String, u32> = IndexMap::new();

  for ni in alt.items.iter_mut() {
    if ni.item.is_lookahead() {
      if let Some(name) = &ni.name {
        if !name.is_ignored() {
          diags.warn(CompileError::LookaheadMetanameWarning { rule: rule_id.to_string(), name: name.as_str().to_string() });
        }
      }
      ni.name = Some(Id::ignored());
      continue;
    }

    if let Some(name) = ni.name.clone() {
      if name.is_ignored() {
        continue;
      }
      if !used.insert(name.as_str().to_string()) {
        return Err(CompileError::MetanameCollision { rule: rule_id.to_string(), name: name.as_str().to_string() });
      }
      continue;
    }

    let metaname = match inner_item(&ni.item) {
      Item::Id(id) => {
        let name = id.as_str();
        if name.contains("__GEN") {
          let m = format!("_{index}");
          index += 1;
          m
        } else {
          let mut m = name.to_lowercase();
          if reserved_words.contains(&m) {
            m = format!("_{m}");
          }
          let occ = occurrences.entry(m.clone()).or_insert(0);
          let this_occ = *occ;
          *occ += 1;
          if this_occ > 0 {
            format!("{m}{this_occ}")
          } else {
            m
          }
        }
      }
      _ => {
        let m = format!("_{index}");
        index += 1;
        m
      }
    };

    if !used.insert(metaname.clone()) {
      return Err(CompileError::MetanameCollision { rule: rule_id.to_string(), name: metaname });
    }
    ni.name = Some(Id::new(metaname));
  }
  Ok(())
}

/// Two-stage: collect `MetaAttach::Ref` occurrences by id, then walk
/// named `MetaRule` definitions and splice each body into the `Alt`s
/// that reference it.
#[derive(Default)]
pub struct AssignMetaRules {
  stage:    u8,
  refs:     IndexMap<Id, Vec<(usize, usize)>>,
  assigned: IndexSet<Id>,
}

impl Pass for AssignMetaRules {
  fn name(&self) -> &'static str {
    "AssignMetaRules"
  }

  fn step(&mut self, grammar: &mut Grammar, diags: &mut Diagnostics) -> Result<bool, CompileError> {
    match self.stage {
      0 => {
        self.refs.clear();
        for (ri, rule) in grammar.rules.iter().enumerate() {
          for (ai, alt) in rule.expr.alts.iter().enumerate() {
            if let Some(MetaAttach::Ref(id)) = &alt.metarule {
              self.refs.entry(id.clone()).or_insert_with(Vec::new).push((ri, ai));
            }
          }
        }
        self.stage = 1;
        Ok(false)
      }
      _ => {
        let mut grouped: IndexMap<Id, Vec<usize>> = IndexMap::new();
        for (i, mr) in grammar.metarules.iter().enumerate() {
          if let Some(id) = &mr.id {
            grouped.entry(id.clone()).or_insert_with(Vec::new).push(i);
          }
        }

        let dup: Vec<String> = grouped.iter().filter(|(_, v)| v.len() > 1).map(|(id, _)| id.as_str().to_string()).collect();
        if !dup.is_empty() {
          return Err(CompileError::RedefinedMetaRule { ids: dup });
        }

        for (id, indices) in &grouped {
          let body = grammar.metarules[indices[0]].body.clone();
          if let Some(positions) = self.refs.shift_remove(id) {
            self.assigned.insert(id.clone());
            for (ri, ai) in positions {
              grammar.rules[ri].expr.alts[ai].metarule = Some(MetaAttach::Inline(body.clone()));
            }
          } else if !self.assigned.contains(id) {
            diags.warn(CompileError::UnusedMetaRuleWarning { id: id.as_str().to_string() });
          }
        }

        if !self.refs.is_empty() {
          let ids: Vec<String> = self.refs.keys().map(|id| id.as_str().to_string()).collect();
          return Err(CompileError::UndefinedMetaRule { ids });
        }

        grammar.metarules.clear();
        Ok(true)
      }
    }
  }
}

#[derive(Default)]
pub struct ValidateRangesAndReps;

impl Pass for ValidateRangesAndReps {
  fn name(&self) -> &'static str {
    "ValidateRangesAndReps"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    let mut offenders: IndexSet<String> = IndexSet::new();
    for rule in &grammar.rules {
      if expr_has_invalid_range_or_rep(&rule.expr) {
        offenders.insert(rule.id.as_str().to_string());
      }
    }
    if !offenders.is_empty() {
      return Err(CompileError::InvalidRangeOrRepetition { rules: offenders.into_iter().collect() });
    }
    Ok(true)
  }
}

fn expr_has_invalid_range_or_rep(expr: &Expr) -> bool {
  expr.alts.iter().any(|alt| alt.items.iter().any(|ni| item_has_invalid_range_or_rep(&ni.item)))
}

fn item_has_invalid_range_or_rep(item: &Item) -> bool {
  match item {
    Item::Class(class) => class.ranges.iter().any(|r| r.is_invalid()),
    Item::Repetition(inner, first, last) => last.is_some_and(|l| l < *first) || item_has_invalid_range_or_rep(inner),
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::And(i) | Item::Not(i) => {
      item_has_invalid_range_or_rep(i)
    }
    Item::Nested(e) => expr_has_invalid_range_or_rep(e),
    _ => false,
  }
}
