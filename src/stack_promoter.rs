//! Promotion of stack slots to SSA values (the mem2reg transform).
//!
//! A slot is promotable when its every user is a direct load of it or a
//! store *to* it. Promotion turns the memory phis of promotable cells into
//! real phi instructions, rewrites each load to its reaching definition, and
//! removes the loads, the stores and the slot itself.

use bit_set::BitSet;
use hashbrown::HashMap;
use crate::diag::Diagnostics;
use crate::pass::{AnalysisCache, AnalysisKind, PassUsage, Transform};
use crate::types::Idx;
use crate::types::ir::{InstKind, Program, ValueId};

/// The mem2reg transform. Register after [`VarChecker`](crate::var_checker::VarChecker)
/// so diagnostics still see the unpromoted memory form.
#[derive(Debug, Default)]
pub struct StackPromoter;

/// Whether every user of `var` is a direct load or a store to it. A taken
/// address (call argument, cast, inline-asm output, lea base) or a store of
/// the slot's address disqualifies it.
fn is_promotable(prog: &Program, var: ValueId) -> bool {
  prog.users(var).iter().all(|&user| match prog.as_inst(user) {
    Some(inst) => match inst.kind {
      InstKind::Load { ptr } => ptr == var,
      InstKind::Store { ptr, .. } => ptr == var,
      _ => false,
    },
    None => false,
  })
}

impl Transform for StackPromoter {
  fn name(&self) -> &'static str { "stack-promoter" }

  fn build_usage(&self, usage: &mut PassUsage) { usage.uses(AnalysisKind::ReachingDefs) }

  fn rewrites(&self) -> bool { true }

  fn run_function(&mut self, prog: &mut Program, func: ValueId, cache: &AnalysisCache,
    _diags: &mut Diagnostics)
  {
    if prog.func(func).blocks().is_empty() {
      return;
    }

    let vars = prog.func(func).vars().to_vec();
    let mut promotable = BitSet::new();
    for &var in &vars {
      if is_promotable(prog, var) {
        promotable.insert(var.into_usize());
      }
    }

    let rda = cache.reaching_defs(func);
    let blocks = prog.func(func).blocks().to_vec();

    // stitch a real phi for every memory phi over a promotable cell
    let mut phi_map: HashMap<ValueId, ValueId> = HashMap::new();
    for &block in &blocks {
      for mem_phi in rda.memory_phis(block).to_vec() {
        let var = prog.mem_phi(mem_phi).var;
        if prog.as_var(var).is_none() || !promotable.contains(var.into_usize()) {
          continue;
        }
        let phi = prog.prepend_inst(block, 0, InstKind::Phi { incoming: vec![] });
        phi_map.insert(mem_phi, phi);
      }
    }
    // fill incomings after all phis exist, so edges between memory phis
    // resolve regardless of block order
    for &block in &blocks {
      for mem_phi in rda.memory_phis(block).to_vec() {
        let Some(&phi) = phi_map.get(&mem_phi) else { continue };
        let incoming = prog.mem_phi(mem_phi).incoming.clone();
        let mut typed = false;
        for (pred, value) in incoming {
          let value = value.map(|v| if prog.as_mem_phi(v).is_some() {
            *phi_map.get(&v).expect("incoming memory phi of a promotable cell was stitched")
          } else {
            v
          });
          prog.add_phi_incoming(phi, pred, value);
          if !typed && let Some(value) = value {
            let ty = prog.ty(value);
            prog.set_ty(phi, ty);
            typed = true;
          }
        }
      }
    }

    // rewrite loads to their reaching definitions and drop the slots.
    // `replaced` chases loads that were themselves rewritten away earlier.
    let mut replaced: HashMap<ValueId, ValueId> = HashMap::new();
    for &var in &vars {
      if !promotable.contains(var.into_usize()) {
        continue;
      }
      for user in prog.users(var).to_vec() {
        match prog.inst(user).kind {
          InstKind::Load { .. } => {
            let mut reaching = rda.reaching_def(user);
            if let Some(r) = reaching
              && prog.as_mem_phi(r).is_some()
            {
              reaching = Some(*phi_map.get(&r).expect("promotable cell phi was stitched"));
            }
            let repl = match reaching {
              Some(mut r) => {
                while let Some(&next) = replaced.get(&r) {
                  r = next;
                }
                r
              }
              None => {
                let ty = prog.ty(user);
                prog.undef_const(ty)
              }
            };
            prog.replace_all_uses_with(user, repl);
            replaced.insert(user, repl);
            prog.remove_inst(user);
          }
          InstKind::Store { .. } => {
            prog.remove_inst(user);
          }
          _ => unreachable!("promotable slot has a non-load/store user"),
        }
      }
      log::trace!("promoted slot '{}'", prog.name(var).unwrap_or(""));
      prog.remove_var(func, var);
    }
  }
}
