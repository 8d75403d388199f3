//! Mutability and initialization checks over the IR.
//!
//! Two checks in one pass: an immutable slot may receive at most one store
//! (its initialization), and a store through a pointer requires the pointer
//! type to be mutable; separately, a load whose reaching values include an
//! undefined one is reported as a possibly-uninitialized use.

use crate::diag::Diagnostics;
use crate::pass::{AnalysisCache, AnalysisKind, PassUsage, Transform};
use crate::types::ir::{ConstKind, InstKind, Program, ValueId, ValueKind};

/// The variable checker. Purely diagnostic; never rewrites.
#[derive(Debug, Default)]
pub struct VarChecker;

impl Transform for VarChecker {
  fn name(&self) -> &'static str { "var-checker" }

  fn build_usage(&self, usage: &mut PassUsage) { usage.uses(AnalysisKind::ReachingDefs) }

  fn run_function(&mut self, prog: &mut Program, func: ValueId, cache: &AnalysisCache,
    diags: &mut Diagnostics)
  {
    if prog.func(func).blocks().is_empty() {
      return;
    }

    // one store per immutable slot; users are in program order
    for &var in prog.func(func).vars() {
      let mut has_store = false;
      for &user in prog.users(var) {
        let Some(inst) = prog.as_inst(user) else { continue };
        let InstKind::Store { ptr, .. } = inst.kind else { continue };
        let is_assignment = ptr == var;
        if is_assignment && has_store && !prog.var(var).mutable {
          diags.error_at(inst.line, format!(
            "attempted assignment of immutable variable '{}'", prog.name(var).unwrap_or("")));
        }
        has_store |= is_assignment;
      }
    }

    let rda = cache.reaching_defs(func);
    for &block in prog.func(func).blocks() {
      for inst in prog.insts(block) {
        match prog.inst(inst).kind {
          InstKind::Store { ptr, .. } => {
            // stores directly to a slot are the assignment check above
            if prog.as_var(ptr).is_some() {
              continue;
            }
            if let Some((pointee, false)) = prog.types.as_pointer(prog.ty(ptr)) {
              diags.error_at(prog.inst(inst).line, format!(
                "attempted assignment of '{}' value pointed to by an immutable pointer",
                prog.types.display(pointee)));
            }
          }
          InstKind::Load { ptr } => {
            let Some(var) = prog.as_var(ptr) else { continue };
            // struct-typed slots are written field-wise through leas, which
            // this analysis does not track
            if prog.types.as_struct(prog.types.base(var.var_ty)).is_some() {
              continue;
            }
            let uninit = rda.reaching_values(prog, inst).iter().any(|value| match value {
              None => true,
              Some(value) =>
                matches!(prog.val(*value).kind(), ValueKind::Const(ConstKind::Undef)),
            });
            if uninit {
              diags.error_at(prog.inst(inst).line, format!(
                "use of possibly uninitialised variable '{}'", prog.name(ptr).unwrap_or("")));
            }
          }
          _ => {}
        }
      }
    }
  }
}
