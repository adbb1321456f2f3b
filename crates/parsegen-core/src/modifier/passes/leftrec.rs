//! Left-recursion analysis: nullability, the first-reference graph,
//! strongly-connected components, and seed/grower classification. See
//! spec.md §4.4.
//!
//! Grounded on `polygen/modifier.py`'s `NullableVisitor`,
//! `FirstGraphVisitor`, `strongly_connected_components`,
//! `AlternativeVisitor` and `ComputeLR`. One deliberate fidelity note:
//! the original `strongly_connected_components(graph, start)` never
//! actually reads its `start` argument — the DFS sweep walks every key
//! of `graph` in insertion (declaration) order, falling through to
//! whichever rule the grammar happened to define first. This is
//! reproduced here rather than "fixed", since the entry rule's position
//! in the grammar's rule list is what the original's behavior actually
//! depends on.

use indexmap::{IndexMap, IndexSet};

use crate::ast::*;
use crate::error::CompileError;

pub fn compute_left_recursion(grammar: &mut Grammar) -> Result<(), CompileError> {
  compute_nullables(grammar);
  let graph = make_first_graph(grammar);

  if log::log_enabled!(log::Level::Info) {
    for (id, firsts) in &graph {
      if firsts.is_empty() {
        continue;
      }
      let names: Vec<&str> = firsts.iter().map(|i| i.as_str()).collect();
      log::info!("first graph: {id}: [{}]", names.join(", "));
    }
  }

  let sccs = strongly_connected_components(&graph);
  let mut heads: Vec<Id> = Vec::new();

  for scc in sccs {
    let head_id = scc[0].clone();
    if let Some(head_rule) = grammar.rule_mut(&head_id) {
      head_rule.head = true;
    }
    heads.push(head_id);

    for involved in &scc {
      if let Some(rule) = grammar.rule_mut(involved) {
        match &mut rule.leftrec {
          Some(lr) => lr.chains.push(scc.clone()),
          None => rule.leftrec = Some(LeftRecInfo { chains: vec![scc.clone()] }),
        }
      }
    }
  }

  for head_id in heads {
    let Some(leftrec) = grammar.rule(&head_id).and_then(|r| r.leftrec.clone()) else { continue };
    if let Some(head_rule) = grammar.rule_mut(&head_id) {
      for alt in head_rule.expr.alts.iter_mut() {
        let items = alt_first_ids(alt);
        if items.is_empty() {
          continue;
        }
        for chain in &leftrec.chains {
          let i = if chain.len() > 1 { &chain[1] } else { &chain[0] };
          if items.contains(i) {
            alt.grower = true;
          }
        }
      }
    }
  }

  Ok(())
}

/// Two full sweeps over the grammar. A rule's nullability can only be
/// resolved once every rule it refers to has itself been resolved; with
/// no dependency queue, a second sweep resolves any forward references
/// the first sweep saw too early. See spec.md §4.4(a).
fn compute_nullables(grammar: &mut Grammar) {
  let mut nullables: IndexSet<Id> = IndexSet::new();
  for _ in 0..2 {
    for rule in grammar.rules.iter_mut() {
      let n = expr_nullable(&mut rule.expr, &nullables);
      rule.nullable = n;
      if n {
        nullables.insert(rule.id.clone());
      }
    }
  }
}

fn expr_nullable(expr: &mut Expr, nullables: &IndexSet<Id>) -> bool {
  for alt in expr.alts.iter_mut() {
    if alt_nullable(alt, nullables) {
      return true;
    }
  }
  false
}

fn alt_nullable(alt: &mut Alt, nullables: &IndexSet<Id>) -> bool {
  for ni in alt.items.iter_mut() {
    if !named_item_nullable(ni, nullables) {
      return false;
    }
  }
  alt.nullable = true;
  true
}

fn named_item_nullable(ni: &mut NamedItem, nullables: &IndexSet<Id>) -> bool {
  let n = item_nullable(&mut ni.item, nullables);
  if n {
    ni.nullable = true;
  }
  n
}

fn item_nullable(item: &mut Item, nullables: &IndexSet<Id>) -> bool {
  match item {
    Item::Id(id) => nullables.contains(id),
    Item::String(chars) => chars.is_empty(),
    Item::Char(_) | Item::AnyChar => false,
    Item::Class(class) => class.is_empty(),
    Item::ZeroOrOne(_) | Item::ZeroOrMore(_) | Item::And(_) | Item::Not(_) => true,
    Item::OneOrMore(_) => false,
    Item::Repetition(_, first, _) => *first == 0,
    Item::Nested(expr) => expr_nullable(expr, nullables),
  }
}

/// For each rule, the ordered, deduplicated set of rule ids that could
/// be the first thing it consumes. See spec.md §4.4(b).
fn make_first_graph(grammar: &Grammar) -> IndexMap<Id, Vec<Id>> {
  let mut graph = IndexMap::new();
  for rule in &grammar.rules {
    let mut out = Vec::new();
    let mut seen = IndexSet::new();
    first_refs_in_expr(&rule.expr, &mut out, &mut seen);
    graph.insert(rule.id.clone(), out);
  }
  graph
}

fn first_refs_in_expr(expr: &Expr, out: &mut Vec<Id>, seen: &mut IndexSet<Id>) {
  for alt in &expr.alts {
    first_refs_in_alt(alt, out, seen);
  }
}

fn first_refs_in_alt(alt: &Alt, out: &mut Vec<Id>, seen: &mut IndexSet<Id>) {
  for ni in &alt.items {
    first_refs_in_item(&ni.item, out, seen);
    if !ni.nullable {
      break;
    }
  }
}

fn first_refs_in_item(item: &Item, out: &mut Vec<Id>, seen: &mut IndexSet<Id>) {
  match item {
    Item::Id(id) => {
      if seen.insert(id.clone()) {
        out.push(id.clone());
      }
    }
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) | Item::Repetition(i, _, _) => {
      first_refs_in_item(i, out, seen)
    }
    Item::Nested(e) => first_refs_in_expr(e, out, seen),
    Item::And(_) | Item::Not(_) | Item::String(_) | Item::Char(_) | Item::AnyChar | Item::Class(_) => {}
  }
}

/// Every back-edge the DFS finds becomes its own chain, not merged into
/// a single canonical component the way classic Tarjan would: a rule
/// that's the target of two distinct cycles gets two chains. This
/// matches `Rule::leftrec`'s `chains: Vec<Vec<Id>>` shape.
fn strongly_connected_components(graph: &IndexMap<Id, Vec<Id>>) -> Vec<Vec<Id>> {
  let mut stack: IndexMap<Id, usize> = IndexMap::new();
  let mut visited: IndexSet<Id> = IndexSet::new();
  let mut sccs = Vec::new();

  let starts: Vec<Id> = graph.keys().cloned().collect();
  for start in &starts {
    if !visited.contains(start) {
      dfs(start, graph, &mut stack, &mut visited, &mut sccs);
    }
  }
  sccs
}

fn dfs(v: &Id, graph: &IndexMap<Id, Vec<Id>>, stack: &mut IndexMap<Id, usize>, visited: &mut IndexSet<Id>, sccs: &mut Vec<Vec<Id>>) {
  visited.insert(v.clone());
  if let Some(&beg) = stack.get(v) {
    let chain: Vec<Id> = stack.keys().skip(beg).cloned().collect();
    sccs.push(chain);
    return;
  }
  stack.insert(v.clone(), stack.len());
  if let Some(neighbors) = graph.get(v) {
    for u in neighbors {
      dfs(u, graph, stack, visited, sccs);
    }
  }
  stack.pop();
}

/// The set of rule ids an `Alt` could start with: walks items until the
/// first non-nullable one (inclusive), collecting each item's leading
/// `Id` reference, if it has one.
fn alt_first_ids(alt: &Alt) -> IndexSet<Id> {
  let mut items = IndexSet::new();
  for ni in &alt.items {
    if let Some(id) = leading_id(&ni.item) {
      items.insert(id.clone());
    }
    if !ni.nullable {
      break;
    }
  }
  items
}

fn leading_id(item: &Item) -> Option<&Id> {
  match item {
    Item::Id(id) => Some(id),
    Item::ZeroOrOne(i) | Item::ZeroOrMore(i) | Item::OneOrMore(i) => leading_id(i),
    _ => None,
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn id(s: &str) -> Item {
    Item::Id(Id::new(s))
  }

  fn named(item: Item) -> NamedItem {
    NamedItem::unnamed(item)
  }

  fn alt(items: Vec<NamedItem>) -> Alt {
    Alt { items, metarule: None, nullable: false, grower: false, info: None }
  }

  #[test]
  fn marks_direct_left_recursion_head_with_seed_and_grower() {
    // A <- A 'x' / 'y'
    let mut g = Grammar {
      rules: vec![Rule::new(
        Id::new("A"),
        Expr {
          alts: vec![
            alt(vec![named(id("A")), named(Item::String(vec![Char::new('x')]))]),
            alt(vec![named(Item::String(vec![Char::new('y')]))]),
          ],
          info: None,
        },
      )],
      metarules: vec![],
      entry: Some(Id::new("A")),
    };

    compute_left_recursion(&mut g).unwrap();

    let rule = g.rule(&Id::new("A")).unwrap();
    assert!(rule.head);
    assert!(rule.leftrec.is_some());
    assert!(rule.expr.alts[0].grower, "A <- A 'x' should be classified as a grower alt");
    assert!(!rule.expr.alts[1].grower, "A <- 'y' has no left-recursive reference and stays a seed");
  }

  #[test]
  fn non_recursive_grammar_has_no_heads() {
    let mut g = Grammar {
      rules: vec![Rule::new(Id::new("A"), Expr { alts: vec![alt(vec![named(Item::String(vec![Char::new('a')]))])], info: None })],
      metarules: vec![],
      entry: Some(Id::new("A")),
    };
    compute_left_recursion(&mut g).unwrap();
    assert!(!g.rule(&Id::new("A")).unwrap().head);
  }
}
