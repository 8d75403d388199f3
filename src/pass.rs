//! The pass framework: transform registration, analysis dependencies, and a
//! per-function analysis cache.
//!
//! Transforms run in registration order. Before a transform runs, the
//! analyses it declared through [`Transform::build_usage`] are materialized
//! for every function and cached; the cache survives across transforms until
//! a transform that rewrites instructions invalidates it.

use hashbrown::HashMap;
use crate::analysis::control_flow::ControlFlowAnalysis;
use crate::analysis::reaching_def::ReachingDefAnalysis;
use crate::diag::Diagnostics;
use crate::types::ir::{Program, ValueId};

/// The statically known analyses a transform can depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisKind {
  /// CFG, dominator tree and dominance frontiers per function.
  ControlFlow,
  /// Reaching definitions over stack slots, with memory-phi placement.
  ReachingDefs,
}

/// The set of analyses a transform declares it reads.
#[derive(Debug, Default)]
pub struct PassUsage {
  uses: Vec<AnalysisKind>,
}

impl PassUsage {
  /// Declare a dependency on `kind`.
  pub fn uses(&mut self, kind: AnalysisKind) {
    if !self.uses.contains(&kind) {
      self.uses.push(kind);
    }
  }
}

/// Cached per-function analysis results. Functions without blocks (prototypes)
/// have no entries.
#[derive(Debug, Default)]
pub struct AnalysisCache {
  control_flow: HashMap<ValueId, ControlFlowAnalysis>,
  reaching_defs: HashMap<ValueId, ReachingDefAnalysis>,
}

impl AnalysisCache {
  /// The control-flow analysis for `func`. The calling transform must have
  /// declared [`AnalysisKind::ControlFlow`].
  #[must_use] pub fn control_flow(&self, func: ValueId) -> &ControlFlowAnalysis {
    self.control_flow.get(&func).expect("control-flow analysis was not materialized")
  }

  /// The reaching-definition analysis for `func`. The calling transform must
  /// have declared [`AnalysisKind::ReachingDefs`].
  #[must_use] pub fn reaching_defs(&self, func: ValueId) -> &ReachingDefAnalysis {
    self.reaching_defs.get(&func).expect("reaching-def analysis was not materialized")
  }

  fn clear(&mut self, prog: &mut Program) {
    // unhook the memory phis the dropped results placed, so no stale user
    // edges survive the transform boundary
    for rda in self.reaching_defs.values() {
      rda.detach(prog);
    }
    self.control_flow.clear();
    self.reaching_defs.clear();
  }
}

/// A transform over the IR, driven by the [`PassManager`].
pub trait Transform {
  /// A short name for logging.
  fn name(&self) -> &'static str;

  /// Declare the analyses this transform reads.
  fn build_usage(&self, _usage: &mut PassUsage) {}

  /// Whether this transform rewrites instructions. Cached analyses are
  /// dropped after a rewriting transform runs.
  fn rewrites(&self) -> bool { false }

  /// Program-level entry, run once before the per-function entries.
  fn run_program(&mut self, _prog: &mut Program, _cache: &AnalysisCache,
    _diags: &mut Diagnostics) {}

  /// Per-function entry, run for each function in declaration order.
  fn run_function(&mut self, _prog: &mut Program, _func: ValueId, _cache: &AnalysisCache,
    _diags: &mut Diagnostics) {}
}

/// Owns the registered transforms and the analysis cache, and drives them
/// over a program.
#[derive(Default)]
pub struct PassManager {
  transforms: Vec<Box<dyn Transform>>,
  cache: AnalysisCache,
}

impl PassManager {
  /// Construct an empty manager.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Register a transform. Transforms run in registration order.
  pub fn add(&mut self, transform: impl Transform + 'static) {
    self.transforms.push(Box::new(transform));
  }

  /// Run every registered transform over `prog`, materializing declared
  /// analyses on demand.
  pub fn run(&mut self, prog: &mut Program, diags: &mut Diagnostics) {
    let mut transforms = std::mem::take(&mut self.transforms);
    for transform in &mut transforms {
      let mut usage = PassUsage::default();
      transform.build_usage(&mut usage);
      for &kind in &usage.uses {
        self.materialize(prog, kind);
      }
      log::debug!("running transform '{}'", transform.name());
      transform.run_program(prog, &self.cache, diags);
      for func in prog.functions().to_vec() {
        transform.run_function(prog, func, &self.cache, diags);
      }
      if transform.rewrites() {
        log::debug!("'{}' rewrote instructions, dropping cached analyses", transform.name());
        self.cache.clear(prog);
      }
    }
    self.transforms = transforms;
  }

  fn materialize(&mut self, prog: &mut Program, kind: AnalysisKind) {
    match kind {
      AnalysisKind::ControlFlow => {
        for func in prog.functions().to_vec() {
          if prog.func(func).blocks().is_empty() || self.cache.control_flow.contains_key(&func) {
            continue;
          }
          log::debug!("computing control-flow analysis for '{}'",
            prog.name(func).unwrap_or(""));
          let cfa = ControlFlowAnalysis::run(prog, func);
          self.cache.control_flow.insert(func, cfa);
        }
      }
      AnalysisKind::ReachingDefs => {
        self.materialize(prog, AnalysisKind::ControlFlow);
        for func in prog.functions().to_vec() {
          if prog.func(func).blocks().is_empty() || self.cache.reaching_defs.contains_key(&func) {
            continue;
          }
          log::debug!("computing reaching-def analysis for '{}'",
            prog.name(func).unwrap_or(""));
          let cfa = self.cache.control_flow.get(&func)
            .expect("control-flow analysis materialized above");
          let rda = ReachingDefAnalysis::run(prog, func, cfa);
          self.cache.reaching_defs.insert(func, rda);
        }
      }
    }
  }
}
