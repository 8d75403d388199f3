//! Reaching-definition analysis over memory locations.
//!
//! For each load the analysis records the definition visible at it under
//! memory semantics: the value of the most recent store to the same cell, a
//! [`MemPhi`](crate::types::ir::MemPhi) merging several such definitions, or
//! nothing when no store reaches. Memory phis are placed at dominance
//! frontiers exactly like classical phi placement, but keyed by memory cell.

use bit_set::BitSet;
use hashbrown::HashMap;
use crate::types::Idx;
use crate::types::ir::{InstKind, Program, ValueId};
use super::control_flow::ControlFlowAnalysis;

/// The reaching-definition facts for one function.
#[derive(Debug, Default)]
pub struct ReachingDefAnalysis {
  memory_phis: HashMap<ValueId, Vec<ValueId>>,
  reaching: HashMap<ValueId, Option<ValueId>>,
  placed: Vec<ValueId>,
}

impl ReachingDefAnalysis {
  /// The memory phis placed at the head of `block`, in placement order.
  #[must_use] pub fn memory_phis(&self, block: ValueId) -> &[ValueId] {
    self.memory_phis.get(&block).map_or(&[], Vec::as_slice)
  }

  /// The reaching definition for `load`: a store's value, a memory phi, or
  /// `None` when no definition reaches (or the load is unreachable from the
  /// entry).
  #[must_use] pub fn reaching_def(&self, load: ValueId) -> Option<ValueId> {
    self.reaching.get(&load).copied().flatten()
  }

  /// The reaching values for `load`, expanding a memory-phi reaching def one
  /// level into its incoming definitions. `None` entries are paths on which
  /// the cell is undefined.
  #[must_use] pub fn reaching_values(&self, prog: &Program, load: ValueId)
    -> Vec<Option<ValueId>>
  {
    match self.reaching.get(&load) {
      None => vec![],
      Some(&def) => match def {
        Some(def) => match prog.as_mem_phi(def) {
          Some(phi) => phi.incoming.iter().map(|&(_, value)| value).collect(),
          None => vec![Some(def)],
        },
        None => vec![None],
      },
    }
  }

  /// Unhook every memory phi this analysis placed. Called when the cached
  /// result is dropped.
  pub(crate) fn detach(&self, prog: &mut Program) {
    for &phi in &self.placed {
      prog.detach_mem_phi(phi);
    }
  }

  /// Compute the analysis for `func`, which must have at least one block.
  #[must_use] pub(crate) fn run(prog: &mut Program, func: ValueId, cfa: &ControlFlowAnalysis)
    -> Self
  {
    let mut rda = Self::default();
    let blocks = prog.func(func).blocks().to_vec();

    // placement: one phi per (cell, frontier block) pair
    let mut stores = Vec::new();
    for &block in &blocks {
      for inst in prog.insts(block) {
        if let InstKind::Store { ptr, .. } = prog.inst(inst).kind {
          stores.push((block, ptr));
        }
      }
    }
    let mut visited: HashMap<ValueId, BitSet> = HashMap::new();
    for (block, ptr) in stores {
      for &df in cfa.frontiers(block) {
        if visited.entry(ptr).or_default().insert(df.into_usize()) {
          let phi = prog.new_mem_phi(ptr);
          rda.memory_phis.entry(df).or_default().push(phi);
          rda.placed.push(phi);
        }
      }
    }

    // renaming: depth-first over the dominator tree with one definition
    // stack per cell, restored on frame exit
    let mut stacks = HashMap::new();
    rda.rename(prog, cfa, &mut stacks, cfa.entry());
    rda
  }

  fn rename(&mut self, prog: &mut Program, cfa: &ControlFlowAnalysis,
    stacks: &mut HashMap<ValueId, Vec<ValueId>>, block: ValueId)
  {
    let mut pushed = Vec::new();
    for phi in self.memory_phis(block).to_vec() {
      let var = prog.mem_phi(phi).var;
      stacks.entry(var).or_default().push(phi);
      pushed.push(var);
    }

    let mut cur = prog.first_inst(block);
    while let Some(inst) = cur {
      cur = prog.inst(inst).next();
      match prog.inst(inst).kind {
        InstKind::Load { ptr } => {
          let def = stacks.get(&ptr).and_then(|s| s.last().copied());
          self.reaching.insert(inst, def);
        }
        InstKind::Store { ptr, val } => {
          stacks.entry(ptr).or_default().push(val);
          pushed.push(ptr);
        }
        _ => {}
      }
    }

    for &succ in cfa.succs(block) {
      for phi in self.memory_phis(succ).to_vec() {
        let var = prog.mem_phi(phi).var;
        let incoming = stacks.get(&var).and_then(|s| s.last().copied());
        prog.add_mem_phi_incoming(phi, block, incoming);
      }
    }

    for &child in cfa.dominatees(block) {
      self.rename(prog, cfa, stacks, child);
    }

    for var in pushed.iter().rev() {
      stacks.get_mut(var).expect("definition stack underflow").pop();
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::types::ir::{InstKind, Program, ValueId};
  use super::super::control_flow::ControlFlowAnalysis;
  use super::ReachingDefAnalysis;

  /// `var z = a; if (c) { z = b; } use z` shaped memory flow.
  fn branchy() -> (Program, ValueId, ValueId, [ValueId; 3]) {
    let mut prog = Program::new();
    let i32t = prog.types.int(32, true);
    let f = prog.append_function("f", i32t, false);
    let entry = prog.append_block(f);
    let then = prog.append_block(f);
    let join = prog.append_block(f);
    let var = prog.append_var(f, i32t, true);
    let a = prog.int_const(i32t, 1);
    let b = prog.int_const(i32t, 2);
    let cond = prog.int_const(prog.types.bool(), 1);
    prog.append_inst(entry, 1, InstKind::Store { ptr: var, val: a });
    prog.append_inst(entry, 2, InstKind::CondBranch { cond, true_dst: then, false_dst: join });
    prog.append_inst(then, 3, InstKind::Store { ptr: var, val: b });
    prog.append_inst(then, 3, InstKind::Branch { dst: join });
    let load = prog.append_inst(join, 4, InstKind::Load { ptr: var });
    prog.append_inst(join, 4, InstKind::Ret { val: Some(load) });
    (prog, f, var, [entry, then, join])
  }

  #[test]
  fn places_a_phi_at_the_join_and_merges_both_stores() {
    let (mut prog, f, var, [entry, then, join]) = branchy();
    let i32t = prog.types.int(32, true);
    let a = prog.int_const(i32t, 1);
    let b = prog.int_const(i32t, 2);
    let cfa = ControlFlowAnalysis::run(&prog, f);
    let rda = ReachingDefAnalysis::run(&mut prog, f, &cfa);

    assert!(rda.memory_phis(entry).is_empty());
    assert!(rda.memory_phis(then).is_empty());
    let phis = rda.memory_phis(join);
    assert_eq!(phis.len(), 1);
    let phi = phis[0];
    assert_eq!(prog.mem_phi(phi).var, var);
    assert_eq!(prog.mem_phi(phi).incoming, vec![(entry, Some(a)), (then, Some(b))]);

    let load = prog.insts(join).next().expect("join has a load");
    assert_eq!(rda.reaching_def(load), Some(phi));
    assert_eq!(rda.reaching_values(&prog, load), vec![Some(a), Some(b)]);
  }

  #[test]
  fn straightline_load_sees_the_last_store() {
    let mut prog = Program::new();
    let i32t = prog.types.int(32, true);
    let f = prog.append_function("f", i32t, false);
    let entry = prog.append_block(f);
    let var = prog.append_var(f, i32t, true);
    let a = prog.int_const(i32t, 1);
    let b = prog.int_const(i32t, 2);
    prog.append_inst(entry, 1, InstKind::Store { ptr: var, val: a });
    prog.append_inst(entry, 2, InstKind::Store { ptr: var, val: b });
    let load = prog.append_inst(entry, 3, InstKind::Load { ptr: var });
    prog.append_inst(entry, 3, InstKind::Ret { val: Some(load) });

    let cfa = ControlFlowAnalysis::run(&prog, f);
    let rda = ReachingDefAnalysis::run(&mut prog, f, &cfa);
    assert_eq!(rda.reaching_def(load), Some(b));
    assert_eq!(rda.reaching_values(&prog, load), vec![Some(b)]);
  }

  #[test]
  fn unstored_load_has_no_reaching_definition() {
    let mut prog = Program::new();
    let i32t = prog.types.int(32, true);
    let f = prog.append_function("f", i32t, false);
    let entry = prog.append_block(f);
    let var = prog.append_var(f, i32t, false);
    let load = prog.append_inst(entry, 1, InstKind::Load { ptr: var });
    prog.append_inst(entry, 1, InstKind::Ret { val: Some(load) });

    let cfa = ControlFlowAnalysis::run(&prog, f);
    let rda = ReachingDefAnalysis::run(&mut prog, f, &cfa);
    assert_eq!(rda.reaching_def(load), None);
    assert_eq!(rda.reaching_values(&prog, load), vec![None]);
  }

  #[test]
  fn detach_unhooks_phi_user_edges() {
    let (mut prog, f, _, _) = branchy();
    let i32t = prog.types.int(32, true);
    let a = prog.int_const(i32t, 1);
    let before = prog.users(a).len();
    let cfa = ControlFlowAnalysis::run(&prog, f);
    let rda = ReachingDefAnalysis::run(&mut prog, f, &cfa);
    assert!(prog.users(a).len() > before);
    rda.detach(&mut prog);
    assert_eq!(prog.users(a).len(), before);
  }
}
