//! Control-flow analysis: the CFG, the dominator tree, and dominance
//! frontiers of one function.
//!
//! Immediate dominators come from the standard reverse-postorder fixpoint;
//! frontiers from the bottom-up pass over a postorder of the dominator tree:
//! `DF(b)` collects the CFG successors of `b` it does not immediately
//! dominate, plus the frontier entries of its tree children it does not
//! immediately dominate.

use bit_set::BitSet;
use hashbrown::HashMap;
use crate::types::Idx;
use crate::types::ir::{Program, ValueId};

/// The control-flow facts for one function.
#[derive(Debug)]
pub struct ControlFlowAnalysis {
  entry: ValueId,
  preds: HashMap<ValueId, Vec<ValueId>>,
  succs: HashMap<ValueId, Vec<ValueId>>,
  idom: HashMap<ValueId, ValueId>,
  children: HashMap<ValueId, Vec<ValueId>>,
  frontiers: HashMap<ValueId, Vec<ValueId>>,
}

impl ControlFlowAnalysis {
  /// The entry block.
  #[must_use] pub fn entry(&self) -> ValueId { self.entry }

  /// The CFG predecessors of `block`, in edge-creation order.
  #[must_use] pub fn preds(&self, block: ValueId) -> &[ValueId] {
    self.preds.get(&block).map_or(&[], Vec::as_slice)
  }

  /// The CFG successors of `block`, in terminator order.
  #[must_use] pub fn succs(&self, block: ValueId) -> &[ValueId] {
    self.succs.get(&block).map_or(&[], Vec::as_slice)
  }

  /// The immediate dominator of `block`; `None` for the entry and for blocks
  /// unreachable from it.
  #[must_use] pub fn idom(&self, block: ValueId) -> Option<ValueId> {
    self.idom.get(&block).copied()
  }

  /// The blocks immediately dominated by `block`.
  #[must_use] pub fn dominatees(&self, block: ValueId) -> &[ValueId] {
    self.children.get(&block).map_or(&[], Vec::as_slice)
  }

  /// The dominance frontier of `block`.
  #[must_use] pub fn frontiers(&self, block: ValueId) -> &[ValueId] {
    self.frontiers.get(&block).map_or(&[], Vec::as_slice)
  }

  /// Whether `a` dominates `b` (reflexively).
  #[must_use] pub fn dominates(&self, a: ValueId, b: ValueId) -> bool {
    let mut cur = b;
    loop {
      if cur == a {
        return true;
      }
      match self.idom(cur) {
        Some(next) => cur = next,
        None => return false,
      }
    }
  }

  /// Compute the analysis for `func`, which must have at least one block.
  #[must_use] pub(crate) fn run(prog: &Program, func: ValueId) -> Self {
    let entry = prog.entry(func);
    let mut cfa = Self {
      entry,
      preds: HashMap::new(),
      succs: HashMap::new(),
      idom: HashMap::new(),
      children: HashMap::new(),
      frontiers: HashMap::new(),
    };

    for &block in prog.func(func).blocks() {
      for succ in prog.successors(block) {
        cfa.succs.entry(block).or_default().push(succ);
        cfa.preds.entry(succ).or_default().push(block);
      }
    }

    // depth-first order over the CFG; unreachable blocks stay out of the tree
    let mut post = Vec::new();
    let mut seen = BitSet::new();
    seen.insert(entry.into_usize());
    cfa.post_order(entry, &mut seen, &mut post);
    let rpo: Vec<ValueId> = post.iter().rev().copied().collect();
    let index: HashMap<ValueId, usize> =
      rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    // immediate dominators by the reverse-postorder fixpoint
    let mut idom: Vec<Option<usize>> = vec![None; rpo.len()];
    idom[0] = Some(0);
    let mut changed = true;
    while changed {
      changed = false;
      for i in 1..rpo.len() {
        let mut new_idom = None;
        for &pred in cfa.preds(rpo[i]) {
          let Some(&p) = index.get(&pred) else { continue };
          if idom[p].is_none() {
            continue;
          }
          new_idom = Some(match new_idom {
            None => p,
            Some(cur) => intersect(&idom, p, cur),
          });
        }
        if idom[i] != new_idom {
          idom[i] = new_idom;
          changed = true;
        }
      }
    }
    for i in 1..rpo.len() {
      let dom = rpo[idom[i].expect("reachable block has no dominator")];
      cfa.idom.insert(rpo[i], dom);
      cfa.children.entry(dom).or_default().push(rpo[i]);
    }

    // frontiers, bottom-up over a postorder of the dominator tree
    let mut tree_post = Vec::new();
    cfa.tree_post_order(entry, &mut tree_post);
    for &block in &tree_post {
      let mut df = Vec::new();
      let mut dedup = BitSet::new();
      for &succ in cfa.succs(block) {
        if cfa.idom(succ) != Some(block) && dedup.insert(succ.into_usize()) {
          df.push(succ);
        }
      }
      for &child in cfa.dominatees(block) {
        for &w in cfa.frontiers(child) {
          if cfa.idom(w) != Some(block) && dedup.insert(w.into_usize()) {
            df.push(w);
          }
        }
      }
      cfa.frontiers.insert(block, df);
    }

    cfa
  }

  fn post_order(&self, block: ValueId, seen: &mut BitSet, out: &mut Vec<ValueId>) {
    for &succ in self.succs(block) {
      if seen.insert(succ.into_usize()) {
        self.post_order(succ, seen, out);
      }
    }
    out.push(block);
  }

  fn tree_post_order(&self, block: ValueId, out: &mut Vec<ValueId>) {
    for &child in self.dominatees(block) {
      self.tree_post_order(child, out);
    }
    out.push(block);
  }
}

fn intersect(idom: &[Option<usize>], mut a: usize, mut b: usize) -> usize {
  while a != b {
    while a > b {
      a = idom[a].expect("dominator fixpoint out of order");
    }
    while b > a {
      b = idom[b].expect("dominator fixpoint out of order");
    }
  }
  a
}

#[cfg(test)]
mod tests {
  use crate::types::ir::{InstKind, Program, ValueId};
  use super::ControlFlowAnalysis;

  /// entry → (then, join); then → join; join → (a, b); a and b return.
  fn diamondish() -> (Program, ValueId, [ValueId; 5]) {
    let mut prog = Program::new();
    let i32t = prog.types.int(32, true);
    let f = prog.append_function("f", i32t, false);
    let entry = prog.append_block(f);
    let then = prog.append_block(f);
    let join = prog.append_block(f);
    let a = prog.append_block(f);
    let b = prog.append_block(f);
    let cond = prog.int_const(prog.types.bool(), 1);
    let zero = prog.int_const(i32t, 0);
    prog.append_inst(entry, 1, InstKind::CondBranch { cond, true_dst: then, false_dst: join });
    prog.append_inst(then, 2, InstKind::Branch { dst: join });
    prog.append_inst(join, 3, InstKind::CondBranch { cond, true_dst: a, false_dst: b });
    prog.append_inst(a, 4, InstKind::Ret { val: Some(zero) });
    prog.append_inst(b, 5, InstKind::Ret { val: Some(zero) });
    (prog, f, [entry, then, join, a, b])
  }

  #[test]
  fn cfg_edges() {
    let (prog, f, [entry, then, join, a, b]) = diamondish();
    let cfa = ControlFlowAnalysis::run(&prog, f);
    assert_eq!(cfa.entry(), entry);
    assert_eq!(cfa.succs(entry), [then, join]);
    assert_eq!(cfa.succs(then), [join]);
    assert_eq!(cfa.preds(join), [entry, then]);
    assert!(cfa.succs(a).is_empty());
    assert_eq!(cfa.preds(b), [join]);
  }

  #[test]
  fn dominator_tree() {
    let (prog, f, [entry, then, join, a, b]) = diamondish();
    let cfa = ControlFlowAnalysis::run(&prog, f);
    assert_eq!(cfa.idom(entry), None);
    assert_eq!(cfa.idom(then), Some(entry));
    assert_eq!(cfa.idom(join), Some(entry));
    assert_eq!(cfa.idom(a), Some(join));
    assert_eq!(cfa.idom(b), Some(join));
    assert!(cfa.dominates(entry, a));
    assert!(cfa.dominates(join, b));
    assert!(!cfa.dominates(then, join));
    assert!(cfa.dominates(join, join));
  }

  #[test]
  fn dominance_frontiers() {
    let (prog, f, [entry, then, join, a, b]) = diamondish();
    let cfa = ControlFlowAnalysis::run(&prog, f);
    // `then` does not dominate `join` but is a predecessor of it
    assert_eq!(cfa.frontiers(then), [join]);
    assert!(cfa.frontiers(entry).is_empty());
    assert!(cfa.frontiers(join).is_empty());
    assert!(cfa.frontiers(a).is_empty());
    assert!(cfa.frontiers(b).is_empty());
  }

  #[test]
  fn unreachable_blocks_stay_out_of_the_tree() {
    let (mut prog, f, _) = diamondish();
    let i32t = prog.types.int(32, true);
    let zero = prog.int_const(i32t, 0);
    let dead = prog.append_block(f);
    prog.append_inst(dead, 9, InstKind::Ret { val: Some(zero) });
    let cfa = ControlFlowAnalysis::run(&prog, f);
    assert_eq!(cfa.idom(dead), None);
    assert!(!cfa.dominates(cfa.entry(), dead));
  }
}
