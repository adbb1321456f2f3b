//! The Tree Modifier: a fixpoint driver running an ordered pipeline of
//! rewriting/analysis passes over a [`Grammar`], normalizing it into the
//! form the emitter expects. See spec.md §4.3.
//!
//! Grounded on `polygen/modifier.py`'s `ModifierVisitor`: each pass
//! repeats a traversal-plus-`apply` step until it reports `done`. Passes
//! here don't dispatch by runtime node-type name the way the Python
//! visitor does (no Rust analogue) — each walks the `Grammar` it cares
//! about directly. The spec's "explicit path stack, no parent pointers"
//! back-reference rule survives as [`PathSeg`]/[`Path`]: plain owned
//! breadcrumbs threaded through recursive calls, not references into the
//! tree being mutated.

mod passes;

pub use passes::leftrec::compute_left_recursion;
pub use passes::optional::{EliminateAnd, ExpandClass, ReplaceRep};
pub use passes::required::*;

use crate::ast::{Grammar, Id};
use crate::error::{CompileError, Diagnostics};

/// A breadcrumb of enclosing context, pushed on entry to a node and
/// popped on exit. Carries owned data (never a reference into the tree),
/// since passes mutate the very nodes a reference would borrow.
#[derive(Clone, Debug)]
pub enum PathSeg {
  Rule(Id),
  Alt(usize),
  NamedItem(usize),
}

pub type Path = Vec<PathSeg>;

/// One normalization or analysis stage of the modifier pipeline.
///
/// `step` performs one traversal of the grammar followed by the pass's
/// `apply` hook, and reports whether the pass has converged. Most passes
/// converge after a single step; `AssignMetaRules` needs two (collect,
/// then assign); `ReplaceNestedExprs`'s single post-order traversal
/// already handles nested-within-nested expressions, since children are
/// rewritten before their parents are visited.
pub trait Pass {
  fn name(&self) -> &'static str;

  /// Runs one traversal+apply step. Returns `Ok(true)` once the pass has
  /// converged, `Ok(false)` if the driver should call it again.
  fn step(&mut self, grammar: &mut Grammar, diags: &mut Diagnostics) -> Result<bool, CompileError>;
}

/// Runs every pass in `pipeline`, in order, to convergence. Each pass is
/// bounded to `2 * pipeline.len()` steps; exceeding that raises
/// [`CompileError::FixpointOverrun`] rather than looping forever.
pub fn run_pipeline(grammar: &mut Grammar, pipeline: &mut [Box<dyn Pass>], diags: &mut Diagnostics) -> Result<(), CompileError> {
  let bound = pipeline.len().max(1) * 2;
  for pass in pipeline.iter_mut() {
    let mut steps = 0;
    loop {
      let done = pass.step(grammar, diags)?;
      if done {
        log::debug!("modifier pass `{}` converged after {} step(s)", pass.name(), steps + 1);
        break;
      }
      steps += 1;
      if steps > bound {
        return Err(CompileError::FixpointOverrun);
      }
    }
  }
  Ok(())
}

/// Builds the required pipeline in spec order, with the optional passes
/// spliced in per `config` (see spec.md §4.3's "optional, backend-
/// configurable passes").
pub fn build_pipeline(config: &crate::config::ModifierConfig) -> Vec<Box<dyn Pass>> {
  let mut pipeline: Vec<Box<dyn Pass>> = vec![
    Box::new(CheckUndefinedRules::default()),
    Box::new(CheckRedefinedRules::default()),
    Box::new(ReplaceNestedExprs::default()),
    Box::new(FindEntryRule::default()),
    Box::new(CreateAnyChar::new(config.strict_any_char)),
    Box::new(IgnoreRules::default()),
    Box::new(AssignMetaRules::default()),
    Box::new(GenerateMetanames::new(config.reserved_words.clone())),
    Box::new(ValidateRangesAndReps::default()),
  ];
  if config.expand_class {
    pipeline.push(Box::new(ExpandClass::default()));
  }
  if config.replace_rep {
    pipeline.push(Box::new(ReplaceRep::default()));
  }
  if config.eliminate_and {
    pipeline.push(Box::new(EliminateAnd::default()));
  }
  pipeline.push(Box::new(ComputeLrPass::default()));
  pipeline
}

/// Thin [`Pass`] wrapper around [`compute_left_recursion`], run last.
#[derive(Default)]
pub struct ComputeLrPass;

impl Pass for ComputeLrPass {
  fn name(&self) -> &'static str {
    "ComputeLR"
  }

  fn step(&mut self, grammar: &mut Grammar, _diags: &mut Diagnostics) -> Result<bool, CompileError> {
    compute_left_recursion(grammar)?;
    Ok(true)
  }
}
