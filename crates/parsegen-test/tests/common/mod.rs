//! Converts a compiled `parsegen_core::ast::Grammar` into
//! `parsegen_runtime::interp::Grammar` so the end-to-end scenarios in
//! spec.md §8 can run against the interpreted oracle instead of a
//! generated-and-recompiled parser — this workspace's core Non-goal is
//! that it never executes the generated parser at compile time (see
//! spec.md §1), so the interpreter plays the role a second `rustc`
//! invocation would otherwise have to.
//!
//! Only this crate converts between the two ASTs: `parsegen-runtime`
//! has no dependency on `parsegen-core` (mirroring the teacher's
//! dependency-free `radlr-rust-runtime`), so the conversion has to live
//! on whichever side is allowed to depend on both.

use std::collections::HashMap;

use parsegen_core::ast as core;
use parsegen_runtime::interp;

pub fn compile(source: &str) -> core::Grammar {
  let (grammar, diags) = parsegen_core::compile(source, None, &parsegen_core::config::ModifierConfig::default()).expect("grammar compiles");
  assert!(!diags.have_errors(), "unexpected compile errors: {:?}", diags.all());
  grammar
}

pub fn to_interp(grammar: &core::Grammar) -> interp::Grammar {
  let entry = grammar.entry_rule().expect("grammar has an entry rule").id.as_str().to_string();
  let rules = grammar.rules.iter().map(|r| (r.id.as_str().to_string(), convert_rule(r))).collect::<HashMap<_, _>>();
  interp::Grammar { rules, entry }
}

fn convert_rule(rule: &core::Rule) -> interp::Rule {
  let involved = rule
    .leftrec
    .as_ref()
    .and_then(|lr| lr.chains.first())
    .map(|chain| chain.iter().filter(|id| id.as_str() != rule.id.as_str()).map(|id| id.as_str().to_string()).collect())
    .unwrap_or_default();
  interp::Rule { id: rule.id.as_str().to_string(), expr: convert_expr(&rule.expr), head: rule.head, involved }
}

fn convert_expr(expr: &core::Expr) -> interp::Expr {
  interp::Expr { alts: expr.alts.iter().map(convert_alt).collect() }
}

fn convert_alt(alt: &core::Alt) -> interp::Alt {
  interp::Alt {
    items: alt.items.iter().map(convert_named_item).collect(),
    grower: alt.grower,
    // Metarule bodies are target-language source text (Rust, for this
    // backend); this interpreter has no evaluator for arbitrary Rust
    // snippets, so a converted rule's action always falls back to the
    // default tuple/array spec.md §4.5 describes for "no action".
    // Scenarios that need a real action (spec.md §8 scenario 6) build
    // their `interp::Grammar` directly instead of through this
    // conversion — see `semantic_action_runs_the_attached_closure`.
    action: None,
  }
}

fn convert_named_item(ni: &core::NamedItem) -> interp::NamedItem {
  interp::NamedItem { name: ni.name.as_ref().map(|id| id.as_str().to_string()), item: convert_item(&ni.item) }
}

fn convert_item(item: &core::Item) -> interp::Item {
  match item {
    core::Item::Id(id) => interp::Item::Ref(id.as_str().to_string()),
    core::Item::String(chars) => interp::Item::String(chars.iter().filter_map(|c| c.to_char()).collect()),
    core::Item::Char(c) => interp::Item::Char(c.to_char().expect("valid code point")),
    core::Item::AnyChar => interp::Item::AnyChar,
    core::Item::Class(class) => interp::Item::Class(class.ranges.iter().map(|r| (r.first.to_char().unwrap(), r.upper().to_char().unwrap())).collect()),
    core::Item::ZeroOrOne(inner) => interp::Item::ZeroOrOne(Box::new(convert_item(inner))),
    core::Item::ZeroOrMore(inner) => interp::Item::ZeroOrMore(Box::new(convert_item(inner))),
    core::Item::OneOrMore(inner) => interp::Item::OneOrMore(Box::new(convert_item(inner))),
    core::Item::And(inner) => interp::Item::And(Box::new(convert_item(inner))),
    core::Item::Not(inner) => interp::Item::Not(Box::new(convert_item(inner))),
    core::Item::Repetition(..) => panic!("bounded repetition has no interpreter counterpart; enable the ReplaceRep pass before interpreting"),
    core::Item::Nested(_) => unreachable!("ReplaceNestedExprs already eliminates Nested before the pipeline finishes"),
  }
}
