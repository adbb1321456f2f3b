//! Walks a normalized `Grammar` and renders Rust source for each rule,
//! proving out the `Emitter` contract the way the teacher's
//! `radlr-bytecode` proves out the bytecode contract — kept
//! intentionally thin (spec.md §1: "a simple tree-walking visitor"),
//! with no optimization passes and no additional target languages.
//!
//! Generated rule functions produce `parsegen_runtime::interp::Value`
//! rather than a bespoke generated type: that enum already models
//! "matched items not bound to a metaname collapse into a default
//! tuple/array" (spec.md §4.5), so a second copy of the same shape in
//! every generated file would just be duplication.

use std::collections::HashSet;

use parsegen_core::ast::{Alt, Char, Class, Grammar, Id, Item, MetaAttach, NamedItem, Rule};
use parsegen_core::emitter::{grower_alts, head_rules};
use parsegen_core::error::CompileError;

pub fn rule_fn_name(id: &Id) -> String {
  format!("rule_{}", sanitize(id.as_str()))
}

fn sanitize(s: &str) -> String {
  s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

fn char_literal(c: Char) -> Result<String, CompileError> {
  let ch = c.to_char().ok_or_else(|| CompileError::InvalidRangeOrRepetition { rules: vec![format!("char code point {} is not a valid Unicode scalar value", c.0)] })?;
  Ok(format!("'{}'", ch.escape_default()))
}

fn string_literal(chars: &[Char]) -> Result<String, CompileError> {
  let mut s = String::new();
  for c in chars {
    let ch = c.to_char().ok_or_else(|| CompileError::InvalidRangeOrRepetition { rules: vec![format!("string code point {} is not a valid Unicode scalar value", c.0)] })?;
    s.push(ch);
  }
  Ok(format!("\"{}\"", s.escape_default()))
}

fn class_ranges_literal(class: &Class) -> Result<String, CompileError> {
  let mut parts = Vec::new();
  for r in &class.ranges {
    let lo = char_literal(r.first)?;
    let hi = char_literal(r.upper())?;
    parts.push(format!("({lo}, {hi})"));
  }
  Ok(format!("&[{}]", parts.join(", ")))
}

/// Renders a single `Option<Value>`-typed expression for `item`,
/// evaluated against `input`. The expression may itself contain nested
/// closures (for repetition/lookahead bodies) but never a bare `?` at
/// this level — the caller decides whether to propagate or collect.
fn emit_item_expr(grammar: &Grammar, item: &Item) -> Result<String, CompileError> {
  Ok(match item {
    Item::Id(id) => {
      if grammar.rule(id).is_none() {
        return Err(CompileError::UndefinedReference { ids: vec![id.as_str().to_string()] });
      }
      format!("self.{}(input)", rule_fn_name(id))
    }
    Item::String(chars) => {
      let lit = string_literal(chars)?;
      format!("parsegen_runtime::expect_string(input, {lit}).map(|_| Value::Str({lit}.to_string()))")
    }
    Item::Char(c) => {
      let lit = char_literal(*c)?;
      format!("parsegen_runtime::expect_char(input, Some({lit})).map(Value::Char)")
    }
    Item::AnyChar => "parsegen_runtime::expect_char(input, None).map(Value::Char)".to_string(),
    Item::Class(class) => {
      let ranges = class_ranges_literal(class)?;
      format!("parsegen_runtime::ranges(input, {ranges}).map(Value::Char)")
    }
    Item::ZeroOrOne(inner) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      format!(
        "{{ let __p = input.pos(); match (|input: &mut parsegen_runtime::Input| {inner_expr})(input) {{ Some(v) => Some(v), None => {{ input.set_pos(__p); Some(Value::Absent) }} }} }}"
      )
    }
    Item::ZeroOrMore(inner) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      format!("parsegen_runtime::loop_(false, input, |input| {inner_expr}).map(Value::Seq)")
    }
    Item::OneOrMore(inner) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      format!("parsegen_runtime::loop_(true, input, |input| {inner_expr}).map(Value::Seq)")
    }
    Item::Repetition(inner, first, last) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      let last = match last {
        Some(n) => format!("Some({n})"),
        None => "None".to_string(),
      };
      format!("parsegen_runtime::rep({first}, {last}, input, |input| {inner_expr}).map(Value::Seq)")
    }
    Item::And(inner) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      format!("parsegen_runtime::lookahead(input, true, |input| {inner_expr}).map(|_| Value::Unit)")
    }
    Item::Not(inner) => {
      let inner_expr = emit_item_expr(grammar, inner)?;
      format!("parsegen_runtime::lookahead(input, false, |input| {inner_expr}).map(|_| Value::Unit)")
    }
    Item::Nested(_) => {
      return Err(CompileError::SyntaxError { loc: None, msg: "unexpanded nested expression reached code generation; ReplaceNestedExprs must run first".to_string() });
    }
  })
}

fn emit_named_item(grammar: &Grammar, index: usize, ni: &NamedItem) -> Result<String, CompileError> {
  let expr = emit_item_expr(grammar, &ni.item)?;
  let var = format!("__v{index}");
  Ok(format!("    let {var} = {expr}?;\n"))
}

fn emit_alt_body(grammar: &Grammar, alt: &Alt) -> Result<String, CompileError> {
  let mut out = String::new();
  let mut bindings = Vec::new();
  for (i, ni) in alt.items.iter().enumerate() {
    out.push_str(&emit_named_item(grammar, i, ni)?);
    let is_ignored = ni.name.as_ref().map(|n| n.is_ignored()).unwrap_or(false);
    if !is_ignored {
      bindings.push((ni.name.clone(), format!("__v{i}")));
    }
  }

  match &alt.metarule {
    Some(MetaAttach::Inline(body)) => {
      for (name, var) in &bindings {
        if let Some(name) = name {
          out.push_str(&format!("    let {} = {var}.clone();\n", sanitize(name.as_str())));
        }
      }
      out.push_str(&format!("    Some((|| -> Value {{\n{body}\n    }})())\n"));
    }
    Some(MetaAttach::Ref(id)) => {
      return Err(CompileError::UndefinedMetaRule { ids: vec![id.as_str().to_string()] });
    }
    None => {
      let values = bindings.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>().join(", ");
      out.push_str(&format!("    Some(Value::Seq(vec![{values}]))\n"));
    }
  }
  Ok(out)
}

/// Renders an ordered-choice dispatcher over `alts`, resetting the
/// cursor between attempts — a `loop { ...; break VALUE; }` expression
/// rather than a chain of early returns, so it composes as a single
/// `Option<Value>`-typed value the caller can bind or return directly.
fn emit_ordered_choice(grammar: &Grammar, alts: &[&Alt]) -> Result<String, CompileError> {
  let mut out = String::new();
  out.push_str("  loop {\n");
  out.push_str("    input.set_pos(__start);\n");
  for alt in alts {
    let body = emit_alt_body(grammar, alt)?;
    out.push_str("    if let Some(__r) = (|| -> Option<Value> {\n");
    out.push_str(&body);
    out.push_str("    })() { break Some(__r); }\n");
    out.push_str("    input.set_pos(__start);\n");
  }
  out.push_str("    break None;\n");
  out.push_str("  }\n");
  Ok(out)
}

fn emit_plain_rule(grammar: &Grammar, rule: &Rule) -> Result<String, CompileError> {
  let name = rule_fn_name(&rule.id);
  let id_lit = rule.id.as_str();
  let alts: Vec<&Alt> = rule.expr.alts.iter().collect();
  let choice = emit_ordered_choice(grammar, &alts)?;
  Ok(format!(
    "  fn {name}(&mut self, input: &mut parsegen_runtime::Input) -> Option<Value> {{\n\
    \x20 let pos = input.pos();\n\
    \x20 if let parsegen_runtime::Lookup::Done(result) = self.memo.lookup(&{id_lit:?}, input) {{\n\
    \x20   return result;\n\
    \x20 }}\n\
    \x20 let __start = input.pos();\n\
    \x20 let result = {{\n{choice}\x20 }};\n\
    \x20 let end = if result.is_some() {{ input.pos() }} else {{ __start }};\n\
    \x20 self.memo.commit({id_lit:?}, pos, result.clone(), end);\n\
    \x20 input.set_pos(end);\n\
    \x20 result\n\
    \x20}}\n"
  ))
}

/// The first pass tries *every* alternative, not just the ones
/// classified `seed` (via [`seed_alts`]) — a `grower` alt can still
/// produce a valid base case on the first attempt when the recursion
/// it carries is indirect, because the recursive call it makes hits
/// this rule's freshly-seeded "no result" sentinel and fails, which can
/// fall through to an unrelated escape alternative deeper in the same
/// cycle rather than failing outright (see
/// `parsegen_runtime::interp::parse_head_rule`, which documents this in
/// full). Restricting the first pass to `seed_alts` leaves some
/// indirect-recursion cycles with zero alternatives to even try.
/// `grower_alts` still bounds the grow loop, matching spec.md §4.6 step
/// 3 exactly.
fn emit_head_rule(grammar: &Grammar, rule: &Rule) -> Result<String, CompileError> {
  let name = rule_fn_name(&rule.id);
  let id_lit = rule.id.as_str();
  let seeds: Vec<&Alt> = rule.expr.alts.iter().collect();
  let growers: Vec<&Alt> = grower_alts(rule).collect();
  let seed_choice = emit_ordered_choice(grammar, &seeds)?;
  let grow_choice = emit_ordered_choice(grammar, &growers)?;

  // Rules between this head and its own recursive reference (e.g. `B`
  // and `C` in `A <- B 'a'; B <- C 'b'; C <- A 'c' / D 'c'.`) memoize
  // their own result against the previous grow iteration; invalidating
  // them at this position forces them to re-derive against the value
  // just committed. See parsegen_runtime::interp::parse_head_rule.
  let involved: Vec<&str> = rule.leftrec.as_ref().and_then(|lr| lr.chains.first()).map(|chain| chain.iter().map(|id| id.as_str()).filter(|s| *s != id_lit).collect()).unwrap_or_default();
  let invalidate: String = involved.iter().map(|id| format!("    \x20 self.memo.invalidate(&{id:?}, pos);\n")).collect();

  Ok(format!(
    "  fn {name}(&mut self, input: &mut parsegen_runtime::Input) -> Option<Value> {{\n\
    \x20 let pos = input.pos();\n\
    \x20 if let parsegen_runtime::Lookup::Done(result) = self.memo.lookup(&{id_lit:?}, input) {{\n\
    \x20   return result;\n\
    \x20 }}\n\
    \x20 self.memo.begin_left_recursive({id_lit:?}, pos);\n\
    \x20 let __start = pos;\n\
    \x20 input.set_pos(pos);\n\
    \x20 let seed = {{\n{seed_choice}\x20 }};\n\
    \x20 match seed {{\n\
    \x20   Some(result) => self.memo.commit({id_lit:?}, pos, Some(result), input.pos()),\n\
    \x20   None => return self.memo.finish(&{id_lit:?}, pos, input),\n\
    \x20 }}\n\
    \x20 loop {{\n\
    {invalidate}\
    \x20   input.set_pos(pos);\n\
    \x20   let __start = pos;\n\
    \x20   let grown = {{\n{grow_choice}\x20   }};\n\
    \x20   match grown {{\n\
    \x20     Some(result) => {{\n\
    \x20       let end = input.pos();\n\
    \x20       if !self.memo.update_if_grown({id_lit:?}, pos, result, end) {{ break; }}\n\
    \x20     }}\n\
    \x20     None => break,\n\
    \x20   }}\n\
    \x20 }}\n\
    \x20 self.memo.finish(&{id_lit:?}, pos, input)\n\
    \x20}}\n"
  ))
}

pub fn emit_rule(grammar: &Grammar, rule: &Rule) -> Result<String, CompileError> {
  if rule.head {
    emit_head_rule(grammar, rule)
  } else {
    emit_plain_rule(grammar, rule)
  }
}

pub fn emit_body(grammar: &Grammar) -> Result<String, CompileError> {
  let mut out = String::new();
  let mut seen = HashSet::new();
  for rule in &grammar.rules {
    if !seen.insert(rule.id.clone()) {
      return Err(CompileError::RedefinedRule { id: rule.id.as_str().to_string() });
    }
    out.push_str(&emit_rule(grammar, rule)?);
    out.push('\n');
  }
  Ok(out)
}

pub fn emit_grow_rules(grammar: &Grammar) -> String {
  head_rules(grammar).map(|r| format!("  {:?},\n", r.id.as_str())).collect()
}

#[cfg(test)]
mod test {
  use super::*;
  use parsegen_core::compile;
  use parsegen_core::config::ModifierConfig;

  fn compiled(source: &str) -> Grammar {
    compile(source, None, &ModifierConfig::default()).unwrap().0
  }

  #[test]
  fn emits_a_plain_rule_as_a_sequential_ordered_choice() {
    let grammar = compiled("@entry G <- \"abc\" EOF\nEOF <- !.\n");
    let body = emit_body(&grammar).unwrap();
    assert!(body.contains("fn rule_G"));
    assert!(body.contains("fn rule_EOF"));
    assert!(body.contains("expect_string"));
  }

  #[test]
  fn emits_a_head_rule_with_seed_and_grow_loop() {
    let grammar = compiled("@entry E <- E '+' T / T\nT <- [0-9]\n");
    let body = emit_body(&grammar).unwrap();
    assert!(body.contains("begin_left_recursive"));
    assert!(body.contains("update_if_grown"));
    let grow_rules = emit_grow_rules(&grammar);
    assert!(grow_rules.contains("\"E\""));
  }

  #[test]
  fn emits_memo_invalidation_for_indirect_recursion() {
    let grammar = compiled("@entry A <- B 'a'\nB <- C 'b'\nC <- A 'c' / D 'c'\nD <- 'd'\n");
    let body = emit_body(&grammar).unwrap();
    assert!(body.contains("self.memo.invalidate(&\"B\", pos)"));
    assert!(body.contains("self.memo.invalidate(&\"C\", pos)"));
  }

  #[test]
  fn undefined_reference_is_an_emitter_error() {
    let mut grammar = Grammar::default();
    grammar.rules.push(Rule::new(Id::new("G"), parsegen_core::ast::Expr {
      alts: vec![Alt { items: vec![NamedItem::unnamed(Item::Id(Id::new("Missing")))], ..Default::default() }],
      info: None,
    }));
    let err = emit_body(&grammar).unwrap_err();
    assert!(matches!(err, CompileError::UndefinedReference { .. }));
  }
}
