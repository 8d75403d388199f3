//! The intermediate representation: a use-def value graph over one arena.
//!
//! Every IR entity (constants, globals, functions, arguments, stack slots,
//! basic blocks, instructions, memory phis) is a *value* stored in the
//! [`Program`]'s arena and named by a [`ValueId`]. Instructions reference
//! their operands by id and are registered in each operand's user list on
//! construction; the user lists are the only mutation channel for rewrites
//! ([`Program::replace_all_uses_with`]).
//!
//! Instructions within a block form a doubly-linked list threaded through the
//! arena, so walking a block with an explicit cursor survives insertion and
//! removal of other instructions in the same block.

use arrayvec::ArrayVec;
use hashbrown::HashMap;
use smallvec::SmallVec;
use crate::types::{IdxVec, mk_id};
use crate::types::ty::{Ty, TyKind, TypeCache};

mk_id! {
  /// A reference to a value in a [`Program`]'s arena.
  ValueId
}

/// The coarse classification of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueClass {
  /// A constant ([`ConstKind`]).
  Constant,
  /// A program-level global variable.
  GlobalVariable,
  /// A function with a body.
  Function,
  /// An externed function declaration without a body.
  Prototype,
  /// A formal argument of a function.
  Argument,
  /// A stack slot local to a function.
  LocalVar,
  /// A basic block (blocks are values so branches can be users of them).
  BasicBlock,
  /// An instruction.
  Instruction,
  /// A memory phi placed by reaching-definition analysis.
  MemoryPhi,
}

/// A value stored in the arena: its payload, type, optional name, and the
/// list of values that mention it as an operand.
#[derive(Clone, Debug)]
pub struct ValueData {
  kind: ValueKind,
  ty: Ty,
  name: Option<Box<str>>,
  users: SmallVec<[ValueId; 2]>,
}

impl ValueData {
  /// The payload of this value.
  #[must_use] pub fn kind(&self) -> &ValueKind { &self.kind }
  /// The type of this value ([`Ty::INVALID`] until set).
  #[must_use] pub fn ty(&self) -> Ty { self.ty }
  /// The name of this value, if it has one.
  #[must_use] pub fn name(&self) -> Option<&str> { self.name.as_deref() }
  /// The values that mention this value as an operand. A user appears once
  /// per mentioning operand.
  #[must_use] pub fn users(&self) -> &[ValueId] { &self.users }
}

/// The payload of a value.
#[derive(Clone, Debug)]
pub enum ValueKind {
  /// A constant.
  Const(ConstKind),
  /// A global variable.
  Global(GlobalData),
  /// A function or prototype.
  Func(FuncData),
  /// A formal argument.
  Arg(ArgData),
  /// A stack slot.
  Var(VarData),
  /// A basic block.
  Block(BlockData),
  /// An instruction.
  Inst(Inst),
  /// A memory phi.
  MemPhi(MemPhi),
}

/// The payload of a constant value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstKind {
  /// An integer constant; interned per (type, value).
  Int(u64),
  /// The null constant, used for error recovery.
  Null,
  /// A string constant; interned per content, typed `*u8`.
  Str(Box<str>),
  /// A struct constant over the value's struct type; one per creation site.
  Struct(Box<[ValueId]>),
  /// An array constant; one per creation site.
  Array(Box<[ValueId]>),
  /// The undefined value of the constant's type; interned per type.
  Undef,
}

/// The payload of a global variable.
#[derive(Clone, Debug)]
pub struct GlobalData {
  /// The constant initializer, if any.
  pub init: Option<ValueId>,
}

/// The payload of a function.
#[derive(Clone, Debug)]
pub struct FuncData {
  /// The return type.
  pub ret: Ty,
  /// Whether this is an externed declaration (no body).
  pub externed: bool,
  args: Vec<ValueId>,
  vars: Vec<ValueId>,
  blocks: Vec<ValueId>,
}

impl FuncData {
  /// The formal arguments, in declaration order.
  #[must_use] pub fn args(&self) -> &[ValueId] { &self.args }
  /// The stack slots, in allocation order.
  #[must_use] pub fn vars(&self) -> &[ValueId] { &self.vars }
  /// The basic blocks, in creation order. The first block is the entry.
  #[must_use] pub fn blocks(&self) -> &[ValueId] { &self.blocks }
}

/// The payload of a formal argument.
#[derive(Clone, Copy, Debug)]
pub struct ArgData {
  /// Whether the argument was declared reassignable.
  pub mutable: bool,
}

/// The payload of a stack slot. The slot's *value* type is
/// `Pointer(var_ty, mutable)`; `var_ty` is what lives in the slot.
#[derive(Clone, Copy, Debug)]
pub struct VarData {
  /// The type of the slot's contents.
  pub var_ty: Ty,
  /// Whether the variable was declared reassignable.
  pub mutable: bool,
}

/// The payload of a basic block: its parent function and the ends of its
/// instruction list.
#[derive(Clone, Copy, Debug)]
pub struct BlockData {
  parent: ValueId,
  first: Option<ValueId>,
  last: Option<ValueId>,
}

impl BlockData {
  /// The function this block belongs to.
  #[must_use] pub fn parent(&self) -> ValueId { self.parent }
}

/// The payload of an instruction: its operation, list links, and source line.
#[derive(Clone, Debug)]
pub struct Inst {
  /// The operation and its operands.
  pub kind: InstKind,
  /// 1-based source line for diagnostics.
  pub line: u32,
  block: ValueId,
  prev: Option<ValueId>,
  next: Option<ValueId>,
}

impl Inst {
  /// The block containing this instruction.
  #[must_use] pub fn block(&self) -> ValueId { self.block }
  /// The next instruction in the block, if any.
  #[must_use] pub fn next(&self) -> Option<ValueId> { self.next }
  /// The previous instruction in the block, if any.
  #[must_use] pub fn prev(&self) -> Option<ValueId> { self.prev }
}

/// A memory phi: merges incoming memory definitions for one stack slot at the
/// head of a block. Placed by reaching-definition analysis; not an
/// instruction, but a value usable as a reaching definition.
#[derive(Clone, Debug)]
pub struct MemPhi {
  /// The memory cell this phi merges definitions for.
  pub var: ValueId,
  /// `(predecessor block, incoming definition)` pairs; `None` means the cell
  /// is undefined along that path.
  pub incoming: Vec<(ValueId, Option<ValueId>)>,
}

/// A binary arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
  /// Integer addition.
  Add,
  /// Integer subtraction.
  Sub,
  /// Integer multiplication.
  Mul,
  /// Integer division; signed semantics when the operand type is signed.
  Div,
}

/// A comparison operator; signed comparison for signed integer operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
  /// `<`
  LessThan,
  /// `>`
  GreaterThan,
}

/// A cast operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOp {
  /// Widen, filling with the sign bit.
  SignExtend,
  /// Widen, filling with zeros.
  ZeroExtend,
  /// Narrow, discarding high bits.
  Truncate,
  /// Integer to pointer.
  IntToPtr,
  /// Pointer to integer.
  PtrToInt,
  /// Same-width bit reinterpretation.
  Reinterpret,
}

/// The operation of an instruction, with its operands.
#[derive(Clone, Debug)]
pub enum InstKind {
  /// Integer arithmetic; the result type is the left operand's type.
  Binary {
    /// The operator.
    op: BinaryOp,
    /// Left operand.
    lhs: ValueId,
    /// Right operand.
    rhs: ValueId,
  },
  /// Integer comparison; the result type is `bool`.
  Compare {
    /// The operator.
    op: CompareOp,
    /// Left operand.
    lhs: ValueId,
    /// Right operand.
    rhs: ValueId,
  },
  /// Conversion to the instruction's result type.
  Cast {
    /// The conversion performed.
    op: CastOp,
    /// The converted value.
    val: ValueId,
  },
  /// Call of a function-typed value; the result type is the callee's return
  /// type.
  Call {
    /// The called function.
    callee: ValueId,
    /// The actual arguments.
    args: Box<[ValueId]>,
  },
  /// Structural address computation: the first index strides by the pointee
  /// size, later indices select struct/array elements. The result type is set
  /// by the emitter.
  Lea {
    /// The base pointer.
    ptr: ValueId,
    /// The index list.
    indices: SmallVec<[ValueId; 2]>,
  },
  /// Read through a pointer; the result type is the pointee type.
  Load {
    /// The loaded address.
    ptr: ValueId,
  },
  /// Write through a pointer. `ptr`'s type must be a pointer to `val`'s type.
  Store {
    /// The stored-to address.
    ptr: ValueId,
    /// The stored value.
    val: ValueId,
  },
  /// Byte copy of `len` bytes from `src` to `dst`.
  Copy {
    /// Destination address.
    dst: ValueId,
    /// Source address.
    src: ValueId,
    /// Byte count.
    len: ValueId,
  },
  /// Unconditional branch; terminator.
  Branch {
    /// The jump target.
    dst: ValueId,
  },
  /// Two-way conditional branch; terminator.
  CondBranch {
    /// The boolean condition.
    cond: ValueId,
    /// Target when the condition holds.
    true_dst: ValueId,
    /// Target when the condition does not hold.
    false_dst: ValueId,
  },
  /// Value join at a control-flow merge. `None` incoming means the value is
  /// undefined along that path.
  Phi {
    /// `(predecessor block, incoming value)` pairs.
    incoming: Vec<(ValueId, Option<ValueId>)>,
  },
  /// Inline assembly. Outputs are addresses; a backend renders the call as a
  /// struct-of-outputs return plus element stores.
  InlineAsm {
    /// The instruction template.
    template: Box<str>,
    /// Clobbered registers.
    clobbers: Box<[Box<str>]>,
    /// `(register, value)` inputs.
    inputs: Vec<(Box<str>, ValueId)>,
    /// `(register, address)` outputs.
    outputs: Vec<(Box<str>, ValueId)>,
  },
  /// Return from the function; terminator. `None` only in `void` functions.
  Ret {
    /// The returned value, if any.
    val: Option<ValueId>,
  },
}

impl InstKind {
  /// Whether this instruction ends a basic block.
  #[must_use] pub fn is_terminator(&self) -> bool {
    matches!(self, InstKind::Branch { .. } | InstKind::CondBranch { .. } | InstKind::Ret { .. })
  }
}

/// Interning keys for the constants that are deduplicated per program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstKey {
  Int(Ty, u64),
  Str(Box<str>),
  Null,
  Undef(Ty),
}

/// A whole program: the value arena, the registered functions and globals,
/// and the type cache. Lives for the duration of compilation.
#[derive(Debug, Default)]
pub struct Program {
  values: IdxVec<ValueId, ValueData>,
  functions: Vec<ValueId>,
  globals: Vec<ValueId>,
  consts: HashMap<ConstKey, ValueId>,
  /// The program's interned types.
  pub types: TypeCache,
}

impl Program {
  /// Construct an empty program.
  #[must_use] pub fn new() -> Self { Self::default() }

  fn alloc(&mut self, kind: ValueKind, ty: Ty) -> ValueId {
    self.values.push(ValueData { kind, ty, name: None, users: SmallVec::new() })
  }

  /// The data of a value.
  #[must_use] pub fn val(&self, v: ValueId) -> &ValueData { &self.values[v] }

  /// The type of a value.
  #[must_use] pub fn ty(&self, v: ValueId) -> Ty { self.values[v].ty }

  /// Set the type of a value.
  pub fn set_ty(&mut self, v: ValueId, ty: Ty) { self.values[v].ty = ty }

  /// The name of a value, if set.
  #[must_use] pub fn name(&self, v: ValueId) -> Option<&str> { self.values[v].name.as_deref() }

  /// Name a value.
  pub fn set_name(&mut self, v: ValueId, name: &str) { self.values[v].name = Some(name.into()) }

  /// The user list of a value.
  #[must_use] pub fn users(&self, v: ValueId) -> &[ValueId] { &self.values[v].users }

  /// The coarse classification of a value.
  #[must_use] pub fn class(&self, v: ValueId) -> ValueClass {
    match &self.values[v].kind {
      ValueKind::Const(_) => ValueClass::Constant,
      ValueKind::Global(_) => ValueClass::GlobalVariable,
      ValueKind::Func(f) =>
        if f.externed { ValueClass::Prototype } else { ValueClass::Function },
      ValueKind::Arg(_) => ValueClass::Argument,
      ValueKind::Var(_) => ValueClass::LocalVar,
      ValueKind::Block(_) => ValueClass::BasicBlock,
      ValueKind::Inst(_) => ValueClass::Instruction,
      ValueKind::MemPhi(_) => ValueClass::MemoryPhi,
    }
  }

  /// The instruction payload of `v`, if it is an instruction.
  #[must_use] pub fn as_inst(&self, v: ValueId) -> Option<&Inst> {
    match &self.values[v].kind { ValueKind::Inst(i) => Some(i), _ => None }
  }

  /// The instruction payload of `v`. Panics if `v` is not an instruction.
  #[must_use] pub fn inst(&self, v: ValueId) -> &Inst {
    self.as_inst(v).expect("value is not an instruction")
  }

  fn inst_mut(&mut self, v: ValueId) -> &mut Inst {
    match &mut self.values[v].kind {
      ValueKind::Inst(i) => i,
      _ => panic!("value is not an instruction"),
    }
  }

  /// The block payload of `v`, if it is a basic block.
  #[must_use] pub fn as_block(&self, v: ValueId) -> Option<&BlockData> {
    match &self.values[v].kind { ValueKind::Block(b) => Some(b), _ => None }
  }

  /// The block payload of `v`. Panics if `v` is not a basic block.
  #[must_use] pub fn block(&self, v: ValueId) -> &BlockData {
    self.as_block(v).expect("value is not a basic block")
  }

  fn block_mut(&mut self, v: ValueId) -> &mut BlockData {
    match &mut self.values[v].kind {
      ValueKind::Block(b) => b,
      _ => panic!("value is not a basic block"),
    }
  }

  /// The function payload of `v`, if it is a function.
  #[must_use] pub fn as_func(&self, v: ValueId) -> Option<&FuncData> {
    match &self.values[v].kind { ValueKind::Func(f) => Some(f), _ => None }
  }

  /// The function payload of `v`. Panics if `v` is not a function.
  #[must_use] pub fn func(&self, v: ValueId) -> &FuncData {
    self.as_func(v).expect("value is not a function")
  }

  fn func_mut(&mut self, v: ValueId) -> &mut FuncData {
    match &mut self.values[v].kind {
      ValueKind::Func(f) => f,
      _ => panic!("value is not a function"),
    }
  }

  /// The stack-slot payload of `v`, if it is a local variable.
  #[must_use] pub fn as_var(&self, v: ValueId) -> Option<&VarData> {
    match &self.values[v].kind { ValueKind::Var(d) => Some(d), _ => None }
  }

  /// The stack-slot payload of `v`. Panics if `v` is not a local variable.
  #[must_use] pub fn var(&self, v: ValueId) -> &VarData {
    self.as_var(v).expect("value is not a local variable")
  }

  /// The argument payload of `v`, if it is a formal argument.
  #[must_use] pub fn as_arg(&self, v: ValueId) -> Option<&ArgData> {
    match &self.values[v].kind { ValueKind::Arg(a) => Some(a), _ => None }
  }

  /// The constant payload of `v`, if it is a constant.
  #[must_use] pub fn as_const(&self, v: ValueId) -> Option<&ConstKind> {
    match &self.values[v].kind { ValueKind::Const(c) => Some(c), _ => None }
  }

  /// The global-variable payload of `v`, if it is a global.
  #[must_use] pub fn as_global(&self, v: ValueId) -> Option<&GlobalData> {
    match &self.values[v].kind { ValueKind::Global(g) => Some(g), _ => None }
  }

  /// The memory-phi payload of `v`, if it is a memory phi.
  #[must_use] pub fn as_mem_phi(&self, v: ValueId) -> Option<&MemPhi> {
    match &self.values[v].kind { ValueKind::MemPhi(p) => Some(p), _ => None }
  }

  /// The memory-phi payload of `v`. Panics if `v` is not a memory phi.
  #[must_use] pub fn mem_phi(&self, v: ValueId) -> &MemPhi {
    self.as_mem_phi(v).expect("value is not a memory phi")
  }

  // ---------------------------------------------------------------- functions

  /// The registered functions, in registration order.
  #[must_use] pub fn functions(&self) -> &[ValueId] { &self.functions }

  /// Register a new function.
  pub fn append_function(&mut self, name: &str, ret: Ty, externed: bool) -> ValueId {
    let f = self.alloc(
      ValueKind::Func(FuncData { ret, externed, args: vec![], vars: vec![], blocks: vec![] }),
      Ty::INVALID,
    );
    self.values[f].name = Some(name.into());
    self.functions.push(f);
    f
  }

  /// Find a function by name.
  #[must_use] pub fn function_by_name(&self, name: &str) -> Option<ValueId> {
    self.functions.iter().copied().find(|&f| self.name(f) == Some(name))
  }

  /// Append a formal argument to `func`. The argument's type starts invalid.
  pub fn append_arg(&mut self, func: ValueId, mutable: bool) -> ValueId {
    let a = self.alloc(ValueKind::Arg(ArgData { mutable }), Ty::INVALID);
    self.func_mut(func).args.push(a);
    a
  }

  /// Append a stack slot holding a `var_ty` to `func`. The slot's value type
  /// is `Pointer(var_ty, mutable)`.
  pub fn append_var(&mut self, func: ValueId, var_ty: Ty, mutable: bool) -> ValueId {
    let ptr_ty = self.types.pointer(var_ty, mutable);
    let v = self.alloc(ValueKind::Var(VarData { var_ty, mutable }), ptr_ty);
    self.func_mut(func).vars.push(v);
    v
  }

  /// Re-type a stack slot, e.g. when an inferred declaration meets its
  /// initializer.
  pub fn set_var_ty(&mut self, var: ValueId, var_ty: Ty) {
    let mutable = self.var(var).mutable;
    let ptr_ty = self.types.pointer(var_ty, mutable);
    match &mut self.values[var].kind {
      ValueKind::Var(d) => d.var_ty = var_ty,
      _ => panic!("value is not a local variable"),
    }
    self.values[var].ty = ptr_ty;
  }

  /// Remove a stack slot from `func`. The slot must have no users.
  pub fn remove_var(&mut self, func: ValueId, var: ValueId) {
    assert!(self.users(var).is_empty(), "removing a local that still has users");
    let vars = &mut self.func_mut(func).vars;
    let pos = vars.iter().position(|&v| v == var).expect("local not in function");
    vars.remove(pos);
  }

  /// Append a fresh empty basic block to `func`.
  pub fn append_block(&mut self, func: ValueId) -> ValueId {
    let b = self.alloc(ValueKind::Block(BlockData { parent: func, first: None, last: None }),
      Ty::INVALID);
    self.func_mut(func).blocks.push(b);
    b
  }

  /// The entry block of `func`. Panics if the function has no blocks.
  #[must_use] pub fn entry(&self, func: ValueId) -> ValueId {
    *self.func(func).blocks.first().expect("function has no blocks")
  }

  // ---------------------------------------------------------------- globals

  /// The registered globals, in registration order.
  #[must_use] pub fn globals(&self) -> &[ValueId] { &self.globals }

  /// Register a global variable with an optional constant initializer.
  pub fn append_global(&mut self, name: &str, ty: Ty, init: Option<ValueId>) -> ValueId {
    let g = self.alloc(ValueKind::Global(GlobalData { init }), ty);
    self.values[g].name = Some(name.into());
    self.globals.push(g);
    g
  }

  // --------------------------------------------------------------- constants

  /// The interned integer constant `value` of type `ty`.
  pub fn int_const(&mut self, ty: Ty, value: u64) -> ValueId {
    let key = ConstKey::Int(ty, value);
    if let Some(&c) = self.consts.get(&key) { return c }
    let c = self.alloc(ValueKind::Const(ConstKind::Int(value)), ty);
    self.consts.insert(key, c);
    c
  }

  /// The interned string constant, typed `*u8`.
  pub fn str_const(&mut self, value: &str) -> ValueId {
    let key = ConstKey::Str(value.into());
    if let Some(&c) = self.consts.get(&key) { return c }
    let u8t = self.types.int(8, false);
    let ty = self.types.pointer(u8t, false);
    let c = self.alloc(ValueKind::Const(ConstKind::Str(value.into())), ty);
    self.consts.insert(key, c);
    c
  }

  /// The null constant, the error-recovery value of lowering.
  pub fn null_const(&mut self) -> ValueId {
    if let Some(&c) = self.consts.get(&ConstKey::Null) { return c }
    let c = self.alloc(ValueKind::Const(ConstKind::Null), Ty::INVALID);
    self.consts.insert(ConstKey::Null, c);
    c
  }

  /// The interned undefined value of type `ty`.
  pub fn undef_const(&mut self, ty: Ty) -> ValueId {
    let key = ConstKey::Undef(ty);
    if let Some(&c) = self.consts.get(&key) { return c }
    let c = self.alloc(ValueKind::Const(ConstKind::Undef), ty);
    self.consts.insert(key, c);
    c
  }

  /// A struct constant of struct type `ty`. Uninterned: one per creation
  /// site.
  pub fn struct_const(&mut self, ty: Ty, elems: Box<[ValueId]>) -> ValueId {
    self.alloc(ValueKind::Const(ConstKind::Struct(elems)), ty)
  }

  /// An array constant. Uninterned: one per creation site.
  pub fn array_const(&mut self, ty: Ty, elems: Box<[ValueId]>) -> ValueId {
    self.alloc(ValueKind::Const(ConstKind::Array(elems)), ty)
  }

  // ------------------------------------------------------------ instructions

  fn result_ty(&mut self, kind: &InstKind) -> Ty {
    match *kind {
      InstKind::Binary { lhs, .. } => self.ty(lhs),
      InstKind::Compare { .. } => Ty::BOOL,
      InstKind::Load { ptr } => match *self.types.kind(self.ty(ptr)) {
        TyKind::Pointer { pointee, .. } => pointee,
        _ => Ty::INVALID,
      },
      InstKind::Call { callee, .. } => self.as_func(callee).map_or(Ty::INVALID, |f| f.ret),
      _ => Ty::INVALID,
    }
  }

  fn create_inst(&mut self, block: ValueId, line: u32, kind: InstKind) -> ValueId {
    let ty = self.result_ty(&kind);
    let ops = operands_of(&kind);
    let inst = self.alloc(
      ValueKind::Inst(Inst { kind, line, block, prev: None, next: None }), ty);
    for op in ops { self.add_user(op, inst) }
    inst
  }

  /// Append a new instruction to the end of `block`.
  pub fn append_inst(&mut self, block: ValueId, line: u32, kind: InstKind) -> ValueId {
    let inst = self.create_inst(block, line, kind);
    let old_last = self.block(block).last;
    {
      let b = self.block_mut(block);
      b.last = Some(inst);
      if b.first.is_none() { b.first = Some(inst) }
    }
    if let Some(prev) = old_last {
      self.inst_mut(prev).next = Some(inst);
      self.inst_mut(inst).prev = Some(prev);
    }
    inst
  }

  /// Prepend a new instruction to the beginning of `block`.
  pub fn prepend_inst(&mut self, block: ValueId, line: u32, kind: InstKind) -> ValueId {
    match self.block(block).first {
      Some(first) => self.insert_inst_before(first, line, kind),
      None => self.append_inst(block, line, kind),
    }
  }

  /// Insert a new instruction before `before`, in the same block.
  pub fn insert_inst_before(&mut self, before: ValueId, line: u32, kind: InstKind) -> ValueId {
    let block = self.inst(before).block;
    let prev = self.inst(before).prev;
    let inst = self.create_inst(block, line, kind);
    self.inst_mut(inst).next = Some(before);
    self.inst_mut(before).prev = Some(inst);
    match prev {
      Some(p) => {
        self.inst_mut(p).next = Some(inst);
        self.inst_mut(inst).prev = Some(p);
      }
      None => self.block_mut(block).first = Some(inst),
    }
    inst
  }

  /// Unlink an instruction from its block and deregister it from its
  /// operands' user lists. The instruction must have no users. Returns the id
  /// of the instruction that followed it, if any.
  pub fn remove_inst(&mut self, inst: ValueId) -> Option<ValueId> {
    assert!(self.users(inst).is_empty(), "removing an instruction that still has users");
    let (block, prev, next) = {
      let i = self.inst(inst);
      (i.block, i.prev, i.next)
    };
    let ops = operands_of(&self.inst(inst).kind);
    for op in ops { self.remove_user(op, inst) }
    match prev {
      Some(p) => self.inst_mut(p).next = next,
      None => self.block_mut(block).first = next,
    }
    match next {
      Some(n) => self.inst_mut(n).prev = prev,
      None => self.block_mut(block).last = prev,
    }
    self.inst_mut(inst).prev = None;
    self.inst_mut(inst).next = None;
    next
  }

  /// The first instruction of `block`, if any.
  #[must_use] pub fn first_inst(&self, block: ValueId) -> Option<ValueId> {
    self.block(block).first
  }

  /// The last instruction of `block`, if any. For a well-formed block this is
  /// the terminator.
  #[must_use] pub fn last_inst(&self, block: ValueId) -> Option<ValueId> {
    self.block(block).last
  }

  /// An iterator over the instructions of `block`, for read-only walks.
  /// Rewriting walks should use [`Program::first_inst`] and [`Inst::next`] as
  /// an explicit cursor, reading the next id before touching the current one.
  pub fn insts(&self, block: ValueId) -> Insts<'_> {
    Insts { prog: self, cur: self.first_inst(block) }
  }

  /// The CFG successors of `block`: the targets of its terminator.
  #[must_use] pub fn successors(&self, block: ValueId) -> ArrayVec<ValueId, 2> {
    let mut succs = ArrayVec::new();
    if let Some(term) = self.last_inst(block) {
      match self.inst(term).kind {
        InstKind::Branch { dst } => succs.push(dst),
        InstKind::CondBranch { true_dst, false_dst, .. } => {
          succs.push(true_dst);
          succs.push(false_dst);
        }
        _ => {}
      }
    }
    succs
  }

  /// The operands of a value, in operand order; blocks mentioned by
  /// terminators and phis count as operands.
  #[must_use] pub fn operands(&self, v: ValueId) -> SmallVec<[ValueId; 4]> {
    match &self.values[v].kind {
      ValueKind::Inst(inst) => operands_of(&inst.kind),
      ValueKind::MemPhi(phi) => {
        let mut ops = SmallVec::new();
        for &(block, value) in &phi.incoming {
          ops.push(block);
          if let Some(value) = value { ops.push(value) }
        }
        ops
      }
      _ => SmallVec::new(),
    }
  }

  // --------------------------------------------------------------------- phis

  /// Add an incoming `(block, value)` edge to a phi instruction, registering
  /// the phi as a user of both.
  pub fn add_phi_incoming(&mut self, phi: ValueId, block: ValueId, value: Option<ValueId>) {
    match &mut self.inst_mut(phi).kind {
      InstKind::Phi { incoming } => incoming.push((block, value)),
      _ => panic!("value is not a phi instruction"),
    }
    self.add_user(block, phi);
    if let Some(value) = value { self.add_user(value, phi) }
  }

  /// Create a memory phi for the cell `var`. The phi is not attached to any
  /// block; the analysis that created it owns its placement.
  pub fn new_mem_phi(&mut self, var: ValueId) -> ValueId {
    self.alloc(ValueKind::MemPhi(MemPhi { var, incoming: Vec::new() }), Ty::INVALID)
  }

  /// Add an incoming `(block, definition)` edge to a memory phi, registering
  /// the phi as a user of the block and of the definition if present.
  pub fn add_mem_phi_incoming(&mut self, phi: ValueId, block: ValueId, value: Option<ValueId>) {
    debug_assert!(
      self.mem_phi(phi).incoming.iter().all(|&(b, _)| b != block),
      "duplicate incoming edge on memory phi"
    );
    match &mut self.values[phi].kind {
      ValueKind::MemPhi(p) => p.incoming.push((block, value)),
      _ => panic!("value is not a memory phi"),
    }
    self.add_user(block, phi);
    if let Some(value) = value { self.add_user(value, phi) }
  }

  /// Drop a memory phi's operand edges, deregistering it from the user lists
  /// of its incoming blocks and definitions. Idempotent.
  pub fn detach_mem_phi(&mut self, phi: ValueId) {
    let incoming = match &mut self.values[phi].kind {
      ValueKind::MemPhi(p) => std::mem::take(&mut p.incoming),
      _ => panic!("value is not a memory phi"),
    };
    for (block, value) in incoming {
      self.remove_user(block, phi);
      if let Some(value) = value { self.remove_user(value, phi) }
    }
  }

  // ------------------------------------------------------------------ use-def

  fn add_user(&mut self, value: ValueId, user: ValueId) {
    self.values[value].users.push(user);
  }

  fn remove_user(&mut self, value: ValueId, user: ValueId) {
    let users = &mut self.values[value].users;
    let pos = users.iter().position(|&u| u == user).expect("user list out of sync");
    users.remove(pos);
  }

  /// Rewrite every operand of `user` that equals `orig` to `repl`, updating
  /// both user lists symmetrically. Only instructions and memory phis can be
  /// users; anything else here means the graph is corrupt.
  fn replace_uses_of_with(&mut self, user: ValueId, orig: ValueId, repl: ValueId) {
    let count = match &mut self.values[user].kind {
      ValueKind::Inst(inst) => rewrite_operands(&mut inst.kind, orig, repl),
      ValueKind::MemPhi(phi) => {
        let mut n = 0;
        for (block, value) in &mut phi.incoming {
          debug_assert!(*block != orig, "cannot rewrite a memory phi's incoming block");
          if *value == Some(orig) {
            *value = Some(repl);
            n += 1;
          }
        }
        n
      }
      _ => unreachable!("value kind cannot be a user"),
    };
    for _ in 0..count {
      self.remove_user(orig, user);
      self.add_user(repl, user);
    }
  }

  /// Replace every use of `orig` with `repl`. On return `orig`'s user list is
  /// empty; a leftover user means some user failed to substitute, which is a
  /// broken-graph invariant violation. No-op if `orig == repl`.
  pub fn replace_all_uses_with(&mut self, orig: ValueId, repl: ValueId) {
    if orig == repl { return }
    let users = self.values[orig].users.clone();
    for user in users {
      self.replace_uses_of_with(user, orig, repl);
    }
    assert!(self.values[orig].users.is_empty(), "users remain after replace_all_uses_with");
  }
}

/// The operands of an instruction, in operand order.
fn operands_of(kind: &InstKind) -> SmallVec<[ValueId; 4]> {
  let mut ops = SmallVec::new();
  match kind {
    InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
      ops.push(*lhs);
      ops.push(*rhs);
    }
    InstKind::Cast { val, .. } => ops.push(*val),
    InstKind::Call { callee, args } => {
      ops.push(*callee);
      ops.extend(args.iter().copied());
    }
    InstKind::Lea { ptr, indices } => {
      ops.push(*ptr);
      ops.extend(indices.iter().copied());
    }
    InstKind::Load { ptr } => ops.push(*ptr),
    InstKind::Store { ptr, val } => {
      ops.push(*ptr);
      ops.push(*val);
    }
    InstKind::Copy { dst, src, len } => {
      ops.push(*dst);
      ops.push(*src);
      ops.push(*len);
    }
    InstKind::Branch { dst } => ops.push(*dst),
    InstKind::CondBranch { cond, true_dst, false_dst } => {
      ops.push(*cond);
      ops.push(*true_dst);
      ops.push(*false_dst);
    }
    InstKind::Phi { incoming } => for &(block, value) in incoming {
      ops.push(block);
      if let Some(value) = value { ops.push(value) }
    }
    InstKind::InlineAsm { inputs, outputs, .. } => {
      for &(_, value) in inputs { ops.push(value) }
      for &(_, value) in outputs { ops.push(value) }
    }
    InstKind::Ret { val } => if let Some(val) = val { ops.push(*val) },
  }
  ops
}

/// Rewrite operands equal to `orig` to `repl` in place, returning how many
/// were rewritten.
fn rewrite_operands(kind: &mut InstKind, orig: ValueId, repl: ValueId) -> usize {
  let mut n = 0;
  let mut visit = |op: &mut ValueId| if *op == orig {
    *op = repl;
    n += 1;
  };
  match kind {
    InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
      visit(lhs);
      visit(rhs);
    }
    InstKind::Cast { val, .. } => visit(val),
    InstKind::Call { callee, args } => {
      visit(callee);
      for arg in args { visit(arg) }
    }
    InstKind::Lea { ptr, indices } => {
      visit(ptr);
      for idx in indices { visit(idx) }
    }
    InstKind::Load { ptr } => visit(ptr),
    InstKind::Store { ptr, val } => {
      visit(ptr);
      visit(val);
    }
    InstKind::Copy { dst, src, len } => {
      visit(dst);
      visit(src);
      visit(len);
    }
    InstKind::Branch { dst } => visit(dst),
    InstKind::CondBranch { cond, true_dst, false_dst } => {
      visit(cond);
      visit(true_dst);
      visit(false_dst);
    }
    InstKind::Phi { incoming } => for (block, value) in incoming {
      visit(block);
      if let Some(value) = value { visit(value) }
    }
    InstKind::InlineAsm { inputs, outputs, .. } => {
      for (_, value) in inputs { visit(value) }
      for (_, value) in outputs { visit(value) }
    }
    InstKind::Ret { val } => if let Some(val) = val { visit(val) },
  }
  n
}

/// A read-only iterator over a block's instructions. See [`Program::insts`].
pub struct Insts<'a> {
  prog: &'a Program,
  cur: Option<ValueId>,
}

impl Iterator for Insts<'_> {
  type Item = ValueId;
  fn next(&mut self) -> Option<ValueId> {
    let cur = self.cur?;
    self.cur = self.prog.inst(cur).next;
    Some(cur)
  }
}
