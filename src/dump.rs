//! Deterministic textual serializer for IR programs.
//!
//! The output is stable across runs for identical inputs: blocks are
//! labelled `L0, L1, ...` and values `%v0, %v1, ...` (or their source names)
//! in first-print order, stack slots `%s0, %s1, ...`. Golden-file tests
//! compare this form character by character.

use std::fmt::Write;
use hashbrown::HashMap;
use itertools::Itertools;
use crate::types::ir::{BinaryOp, CastOp, CompareOp, ConstKind, InstKind, Program, ValueId};
use crate::types::ty::Ty;

/// Render every function of the program, in registration order.
#[must_use] pub fn dump_program(prog: &Program) -> String {
  prog.functions().iter().map(|&f| dump_function(prog, f)).join("")
}

/// Render a single function.
#[must_use] pub fn dump_function(prog: &Program, func: ValueId) -> String {
  Dumper {
    prog,
    block_names: HashMap::new(),
    stack_names: HashMap::new(),
    value_names: HashMap::new(),
    out: String::new(),
  }
  .run(func)
}

struct Dumper<'a> {
  prog: &'a Program,
  block_names: HashMap<ValueId, usize>,
  stack_names: HashMap<ValueId, usize>,
  value_names: HashMap<ValueId, usize>,
  out: String,
}

impl<'a> Dumper<'a> {
  fn block_label(&mut self, block: ValueId) -> String {
    let next = self.block_names.len();
    let n = *self.block_names.entry(block).or_insert(next);
    format!("L{n}")
  }

  fn value_name(&mut self, v: ValueId, typed: bool) -> String {
    let prog = self.prog;
    if prog.as_func(v).is_some() {
      return format!("@{}", prog.name(v).unwrap_or(""));
    }
    if matches!(prog.as_const(v), Some(ConstKind::Undef)) {
      return "undef".into();
    }
    let mut ret = String::new();
    if typed {
      let _ = write!(ret, "{} ", prog.types.display(prog.ty(v)));
    }
    if prog.as_const(v).is_some() {
      let text = self.const_text(v);
      ret.push_str(&text);
      return ret;
    }
    ret.push('%');
    let is_var = prog.as_var(v).is_some();
    if !is_var && let Some(name) = prog.name(v) {
      ret.push_str(name);
      return ret;
    }
    let (map, prefix) =
      if is_var { (&mut self.stack_names, 's') } else { (&mut self.value_names, 'v') };
    let next = map.len();
    let n = *map.entry(v).or_insert(next);
    let _ = write!(ret, "{prefix}{n}");
    ret
  }

  fn const_text(&mut self, c: ValueId) -> String {
    let prog = self.prog;
    match prog.as_const(c).expect("value is not a constant") {
      ConstKind::Int(v) => v.to_string(),
      ConstKind::Null => "null".into(),
      ConstKind::Str(s) => s.to_string(),
      ConstKind::Struct(elems) => {
        let elems = elems.to_vec();
        let mut parts = Vec::with_capacity(elems.len());
        for e in elems { parts.push(self.value_name(e, true)) }
        format!("{{{}}}", parts.iter().join(", "))
      }
      ConstKind::Array(elems) => {
        let elems = elems.to_vec();
        let mut parts = Vec::with_capacity(elems.len());
        for e in elems { parts.push(self.value_name(e, true)) }
        format!("[{}]", parts.iter().join(", "))
      }
      ConstKind::Undef => "undef".into(),
    }
  }

  fn inst_text(&mut self, inst: ValueId) -> String {
    let prog = self.prog;
    match &prog.inst(inst).kind {
      InstKind::Binary { op, lhs, rhs } => {
        let mnemonic = match op {
          BinaryOp::Add => "add",
          BinaryOp::Sub => "sub",
          BinaryOp::Mul => "mul",
          BinaryOp::Div => "div",
        };
        format!("{mnemonic} {}, {}", self.value_name(*lhs, true), self.value_name(*rhs, true))
      }
      InstKind::Compare { op, lhs, rhs } => {
        let mnemonic = match op {
          CompareOp::LessThan => "cmp_lt",
          CompareOp::GreaterThan => "cmp_gt",
        };
        format!("{mnemonic} {}, {}", self.value_name(*lhs, true), self.value_name(*rhs, true))
      }
      InstKind::Cast { op, val } => {
        let op = match op {
          CastOp::SignExtend => "sext",
          CastOp::ZeroExtend => "zext",
          CastOp::Truncate => "trunc",
          CastOp::IntToPtr => "int_to_ptr",
          CastOp::PtrToInt => "ptr_to_int",
          CastOp::Reinterpret => "reinterpret",
        };
        format!("cast {} -> {} ({op})", self.value_name(*val, true),
          prog.types.display(prog.ty(inst)))
      }
      InstKind::Call { callee, args } => {
        let callee = self.value_name(*callee, false);
        let mut parts = Vec::with_capacity(args.len());
        for &arg in args.iter() { parts.push(self.value_name(arg, true)) }
        format!("call {} {callee}({})", prog.types.display(prog.ty(inst)), parts.iter().join(", "))
      }
      InstKind::Lea { ptr, indices } => {
        let mut ret = format!("lea {}, {}", prog.types.display(prog.ty(inst)),
          self.value_name(*ptr, true));
        for &index in indices {
          let _ = write!(ret, ", {}", self.value_name(index, true));
        }
        ret
      }
      InstKind::Load { ptr } => format!("load {}", self.value_name(*ptr, true)),
      InstKind::Store { ptr, val } =>
        format!("store {}, {}", self.value_name(*ptr, true), self.value_name(*val, true)),
      InstKind::Copy { dst, src, len } => format!("copy {} -> {} * {}",
        self.value_name(*src, true), self.value_name(*dst, true), self.value_name(*len, true)),
      InstKind::Branch { dst } => format!("br {}", self.block_label(*dst)),
      InstKind::CondBranch { cond, true_dst, false_dst } => format!("br {}, {}, {}",
        self.value_name(*cond, true), self.block_label(*true_dst),
        self.block_label(*false_dst)),
      InstKind::Phi { incoming } => {
        let mut parts = Vec::with_capacity(incoming.len());
        for &(block, value) in incoming {
          let label = self.block_label(block);
          let value = match value {
            Some(value) => self.value_name(value, true),
            None => "undef".into(),
          };
          parts.push(format!("{label}: {value}"));
        }
        format!("phi ({})", parts.iter().join(", "))
      }
      InstKind::InlineAsm { template, clobbers, inputs, outputs } => {
        let mut ret = format!("asm {} \"{template}\"", prog.types.display(prog.ty(inst)));
        for clobber in clobbers.iter() {
          let _ = write!(ret, ", clobber({clobber})");
        }
        for &(ref reg, value) in inputs {
          let _ = write!(ret, ", input({reg}, {})", self.value_name(value, true));
        }
        for &(ref reg, value) in outputs {
          let _ = write!(ret, ", output({reg}, {})", self.value_name(value, true));
        }
        ret
      }
      InstKind::Ret { val } => match val {
        Some(val) => format!("ret {}", self.value_name(*val, true)),
        None => "ret void".into(),
      },
    }
  }

  fn run(mut self, func: ValueId) -> String {
    let prog = self.prog;
    let data = prog.func(func);
    let header = self.value_name(func, false);
    let _ = write!(self.out, "fn {header}(");
    for (i, &arg) in data.args().iter().enumerate() {
      if i != 0 { self.out.push_str(", ") }
      let mutable = prog.as_arg(arg).expect("function argument expected").mutable;
      let name = self.value_name(arg, false);
      let _ = write!(self.out, "{} {name}: {}", if mutable { "var" } else { "let" },
        prog.types.display(prog.ty(arg)));
    }
    self.out.push(')');
    if data.ret != Ty::VOID {
      let _ = write!(self.out, ": {}", prog.types.display(data.ret));
    }
    if data.externed {
      self.out.push_str(";\n");
      return self.out;
    }
    self.out.push_str(" {\n");

    for &var in data.vars() {
      let vd = *prog.var(var);
      let name = self.value_name(var, false);
      let _ = writeln!(self.out, "  {} {name}: {}", if vd.mutable { "var" } else { "let" },
        prog.types.display(vd.var_ty));
    }

    for &block in data.blocks() {
      let label = self.block_label(block);
      let _ = writeln!(self.out, "  {label} {{");
      for inst in prog.insts(block) {
        self.out.push_str("    ");
        let ty = prog.ty(inst);
        let named = ty != Ty::INVALID && !(ty == Ty::VOID
          && matches!(prog.inst(inst).kind, InstKind::Call { .. } | InstKind::InlineAsm { .. }));
        if named {
          let name = self.value_name(inst, false);
          let _ = write!(self.out, "{name} = ");
        }
        let text = self.inst_text(inst);
        self.out.push_str(&text);
        self.out.push('\n');
      }
      self.out.push_str("  }\n");
    }
    self.out.push_str("}\n");
    self.out
  }
}
