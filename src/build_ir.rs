//! Build the IR from the resolved AST.
//!
//! Lowering walks declarations in order against one in-progress [`Program`].
//! Expression lowering is a recursive descent with two scoped modes: *deref*
//! (whether reading a symbol yields its loaded value or its address) and
//! *member load* (whether a member access yields the field value or the field
//! address), plus a downward-threaded *expected type* that gives integer
//! literals a width when the context has one.
//!
//! Semantic errors are reported to the [`Diagnostics`] sink and lowering
//! recovers with the null constant or the invalid type, so one run surfaces
//! as many errors as possible.

use hashbrown::HashMap;
use if_chain::if_chain;
use smallvec::smallvec;
use crate::diag::Diagnostics;
use crate::types::ast::{self, BinOp, UnaryOp};
use crate::types::ir::{BinaryOp, CastOp, CompareOp, ConstKind, InstKind, Program, ValueId};
use crate::types::ty::{Ty, TyKind};

/// Lower every declaration of `roots`, in order, into a fresh program.
///
/// The driver passes the import closure of the main file here, bootstrap
/// first; `import` declarations have already been resolved and are skipped.
pub fn lower(roots: &[ast::Root], diags: &mut Diagnostics) -> Program {
  let mut builder = BuildIr {
    prog: Program::new(),
    diags,
    func: None,
    block: None,
    scopes: vec![Scope::default()],
    struct_fields: HashMap::new(),
    deref: DerefState::Deref,
    member_load: MemberLoadState::Load,
    expected: None,
  };
  for root in roots {
    for decl in &root.decls {
      builder.gen_decl(decl);
    }
  }
  builder.prog
}

/// One lexical scope: a persistent-map snapshot of everything visible, so
/// lookup never needs to walk a parent chain.
#[derive(Clone, Default)]
struct Scope {
  types: im::HashMap<String, Ty>,
  vars: im::HashMap<String, ValueId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DerefState {
  Deref,
  DontDeref,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MemberLoadState {
  Load,
  DontLoad,
}

struct BuildIr<'a> {
  prog: Program,
  diags: &'a mut Diagnostics,
  func: Option<ValueId>,
  block: Option<ValueId>,
  scopes: Vec<Scope>,
  /// AST field names per struct type, for member resolution. The type system
  /// itself is structural over field types only.
  struct_fields: HashMap<Ty, Vec<String>>,
  deref: DerefState,
  member_load: MemberLoadState,
  expected: Option<Ty>,
}

impl BuildIr<'_> {
  fn cur_func(&self) -> ValueId { self.func.expect("no function is being lowered") }
  fn cur_block(&self) -> ValueId { self.block.expect("no block is being lowered") }

  fn emit(&mut self, line: u32, kind: InstKind) -> ValueId {
    let block = self.cur_block();
    self.prog.append_inst(block, line, kind)
  }

  fn with_deref<R>(&mut self, state: DerefState, f: impl FnOnce(&mut Self) -> R) -> R {
    let old = std::mem::replace(&mut self.deref, state);
    let r = f(self);
    self.deref = old;
    r
  }

  fn with_member_load<R>(&mut self, state: MemberLoadState, f: impl FnOnce(&mut Self) -> R) -> R {
    let old = std::mem::replace(&mut self.member_load, state);
    let r = f(self);
    self.member_load = old;
    r
  }

  fn with_expected<R>(&mut self, expected: Option<Ty>, f: impl FnOnce(&mut Self) -> R) -> R {
    let old = std::mem::replace(&mut self.expected, expected);
    let r = f(self);
    self.expected = old;
    r
  }

  /// Lower an lvalue: address of the place, member accesses unloaded.
  fn gen_place(&mut self, expr: &ast::Expr) -> ValueId {
    self.with_deref(DerefState::DontDeref,
      |this| this.with_member_load(MemberLoadState::DontLoad, |this| this.gen_expr(expr)))
  }

  // ------------------------------------------------------------------ scopes

  fn push_scope(&mut self) {
    let top = self.scopes.last().cloned().unwrap_or_default();
    self.scopes.push(top);
  }

  fn pop_scope(&mut self) { self.scopes.pop().expect("scope stack underflow"); }

  fn find_var(&self, name: &str) -> Option<ValueId> {
    self.scopes.last().and_then(|s| s.vars.get(name).copied())
  }

  fn find_type(&self, name: &str) -> Option<Ty> {
    self.scopes.last().and_then(|s| s.types.get(name).copied())
  }

  fn put_var(&mut self, name: &str, value: ValueId) {
    self.scopes.last_mut().expect("scope stack underflow").vars.insert(name.into(), value);
  }

  fn put_type(&mut self, name: &str, ty: Ty) {
    self.scopes.last_mut().expect("scope stack underflow").types.insert(name.into(), ty);
  }

  // ------------------------------------------------------------------- types

  fn gen_type(&mut self, line: u32, te: &ast::TypeExpr) -> Ty {
    match &te.kind {
      ast::TypeExprKind::Invalid => Ty::INVALID,
      ast::TypeExprKind::Inferred => Ty::INFERRED,
      ast::TypeExprKind::Base(name) => self.gen_base_type(line, name),
      ast::TypeExprKind::Pointer { pointee, mutable } => {
        let pointee = self.gen_type(line, pointee);
        self.prog.types.pointer(pointee, *mutable)
      }
      ast::TypeExprKind::Struct(fields) => self.gen_struct_type(line, fields),
    }
  }

  fn gen_base_type(&mut self, line: u32, base: &str) -> Ty {
    match base {
      "bool" => Ty::BOOL,
      "void" => Ty::VOID,
      _ => {
        if let Some(width) = base.strip_prefix('i').or_else(|| base.strip_prefix('u'))
          && !width.is_empty()
          && width.bytes().all(|b| b.is_ascii_digit())
          && let Ok(bits) = width.parse::<u32>()
        {
          return self.prog.types.int(bits, base.starts_with('i'));
        }
        if let Some(ty) = self.find_type(base) {
          return ty;
        }
        self.diags.error_at(line, format!("invalid type '{base}'"));
        Ty::INVALID
      }
    }
  }

  fn gen_struct_type(&mut self, line: u32, fields: &[ast::StructField]) -> Ty {
    let field_tys: Box<[Ty]> = fields.iter().map(|f| self.gen_type(line, &f.ty)).collect();
    let ty = self.prog.types.struct_of(field_tys);
    self.struct_fields.entry(ty)
      .or_insert_with(|| fields.iter().map(|f| f.name.clone()).collect());
    ty
  }

  // ---------------------------------------------------------------- literals

  fn int_fits(&self, value: u64, ty: Ty) -> bool {
    match self.prog.types.as_int(ty) {
      Some((bits, signed)) => {
        let avail = if signed { bits - 1 } else { bits };
        avail >= 64 || value < (1u64 << avail)
      }
      None => false,
    }
  }

  fn smallest_signed(&mut self, value: u64) -> Ty {
    let bits =
      [8_u32, 16, 32, 64].into_iter().find(|&b| value < (1u64 << (b - 1))).unwrap_or(64);
    self.prog.types.int(bits, true)
  }

  /// Re-intern an integer constant at `expected` when it fits there.
  fn coerce(&mut self, val: ValueId, expected: Ty) -> ValueId {
    if self.prog.ty(val) == expected {
      return val;
    }
    if let Some(&ConstKind::Int(value)) = self.prog.as_const(val)
      && self.int_fits(value, expected)
    {
      return self.prog.int_const(expected, value);
    }
    val
  }

  fn gen_num_lit(&mut self, value: u64) -> ValueId {
    let ty = match self.expected {
      Some(expected) if self.int_fits(value, expected) => expected,
      _ => self.smallest_signed(value),
    };
    self.prog.int_const(ty, value)
  }

  fn gen_string_lit(&mut self, value: &str) -> ValueId { self.prog.str_const(value) }

  // ------------------------------------------------------------------ stores

  /// Emit the pointer to field `index` of the struct behind `ptr`: a `lea`
  /// with indices `(0, index)`. The caller sets the result type.
  fn get_member_ptr(&mut self, line: u32, ptr: ValueId, index: usize) -> ValueId {
    let u32t = self.prog.types.int(32, false);
    let zero = self.prog.int_const(u32t, 0);
    let index = self.prog.int_const(u32t, index as u64);
    self.emit(line, InstKind::Lea { ptr, indices: smallvec![zero, index] })
  }

  /// Store `val` through `ptr`, breaking a struct-constant value into
  /// field-wise stores (recursively for nested struct fields).
  fn create_store(&mut self, line: u32, ptr: ValueId, val: ValueId) {
    if_chain! {
      if let Some(fields) = self.prog.types.as_struct(self.prog.ty(val)).map(<[Ty]>::to_vec);
      if let Some(ConstKind::Struct(elems)) = self.prog.as_const(val);
      then {
        let elems = elems.to_vec();
        // A derived member pointer inherits the outer pointer's mutability;
        // a direct local address counts as mutable.
        let mut mutable =
          self.prog.types.as_pointer(self.prog.ty(ptr)).is_some_and(|(_, m)| m);
        mutable |= self.prog.as_var(ptr).is_some();
        for (i, (&field_ty, &elem)) in fields.iter().zip(&elems).enumerate() {
          let member_ptr = self.get_member_ptr(line, ptr, i);
          let member_ty = self.prog.types.pointer(field_ty, mutable);
          self.prog.set_ty(member_ptr, member_ty);
          if self.prog.types.as_struct(field_ty).is_some() {
            self.create_store(line, member_ptr, elem);
          } else {
            self.emit(line, InstKind::Store { ptr: member_ptr, val: elem });
          }
        }
        return;
      }
    }
    self.emit(line, InstKind::Store { ptr, val });
  }

  /// The type a store through `ptr` should produce, when known.
  fn store_target_ty(&self, ptr: ValueId) -> Option<Ty> {
    if let Some(var) = self.prog.as_var(ptr) {
      return Some(var.var_ty);
    }
    self.prog.types.as_pointer(self.prog.ty(ptr)).map(|(pointee, _)| pointee)
  }

  // ------------------------------------------------------------- expressions

  fn gen_expr(&mut self, expr: &ast::Expr) -> ValueId {
    let line = expr.line;
    match &expr.kind {
      ast::ExprKind::Assign { lhs, rhs } => self.gen_assign_expr(line, lhs, rhs),
      ast::ExprKind::Bin { op, lhs, rhs } => self.gen_bin_expr(line, *op, lhs, rhs),
      ast::ExprKind::Unary { op, val } => self.gen_unary_expr(*op, val),
      ast::ExprKind::Call { name, args } => self.gen_call_expr(line, name, args),
      ast::ExprKind::Cast { ty, val } => self.gen_cast_expr(line, ty, val),
      ast::ExprKind::Construct { name, args } => self.gen_construct_expr(line, name, args),
      ast::ExprKind::Member { lhs, field } => self.gen_member_expr(line, lhs, field),
      ast::ExprKind::Symbol(name) => self.gen_symbol(line, name),
      ast::ExprKind::Num(value) => self.gen_num_lit(*value),
      ast::ExprKind::Str(value) => self.gen_string_lit(value),
      ast::ExprKind::Asm(asm) => self.gen_asm_expr(line, asm),
    }
  }

  fn gen_symbol(&mut self, line: u32, name: &str) -> ValueId {
    let Some(var) = self.find_var(name) else {
      self.diags.error_at(line, format!("no symbol named '{name}' in current context"));
      return self.prog.null_const();
    };
    if self.deref == DerefState::DontDeref {
      return var;
    }
    self.emit(line, InstKind::Load { ptr: var })
  }

  fn gen_assign_expr(&mut self, line: u32, lhs: &ast::Expr, rhs: &ast::Expr) -> ValueId {
    let lhs = self.gen_place(lhs);
    let target = self.store_target_ty(lhs);
    let mut rhs = self.with_expected(target, |this| this.gen_expr(rhs));
    if let Some(target) = target {
      rhs = self.coerce(rhs, target);
    }
    self.create_store(line, lhs, rhs);
    lhs
  }

  fn gen_bin_expr(&mut self, line: u32, op: BinOp, lhs: &ast::Expr, rhs: &ast::Expr) -> ValueId {
    let comparison = matches!(op, BinOp::LessThan | BinOp::GreaterThan);
    let lhs = if comparison {
      self.with_expected(None, |this| this.gen_expr(lhs))
    } else {
      self.gen_expr(lhs)
    };
    let lhs_ty = self.prog.ty(lhs);
    let lhs_is_int = self.prog.types.as_int(lhs_ty).is_some();
    let rhs_expected = if lhs_is_int {
      Some(lhs_ty)
    } else if comparison {
      None
    } else {
      self.expected
    };
    let mut rhs = self.with_expected(rhs_expected, |this| this.gen_expr(rhs));
    if lhs_is_int {
      rhs = self.coerce(rhs, lhs_ty);
    }
    // a literal left operand adopts the type of a typed right operand
    let rhs_ty = self.prog.ty(rhs);
    let lhs = if self.prog.types.as_int(rhs_ty).is_some() {
      self.coerce(lhs, rhs_ty)
    } else {
      lhs
    };
    let kind = match op {
      BinOp::Add => InstKind::Binary { op: BinaryOp::Add, lhs, rhs },
      BinOp::Sub => InstKind::Binary { op: BinaryOp::Sub, lhs, rhs },
      BinOp::Mul => InstKind::Binary { op: BinaryOp::Mul, lhs, rhs },
      BinOp::Div => InstKind::Binary { op: BinaryOp::Div, lhs, rhs },
      BinOp::LessThan => InstKind::Compare { op: CompareOp::LessThan, lhs, rhs },
      BinOp::GreaterThan => InstKind::Compare { op: CompareOp::GreaterThan, lhs, rhs },
    };
    self.emit(line, kind)
  }

  fn gen_unary_expr(&mut self, op: UnaryOp, val: &ast::Expr) -> ValueId {
    match op {
      UnaryOp::AddressOf =>
        self.with_deref(DerefState::DontDeref, |this| this.gen_expr(val)),
      UnaryOp::Deref => {
        let ptr = self.gen_expr(val);
        self.emit(val.line, InstKind::Load { ptr })
      }
    }
  }

  fn gen_call_expr(&mut self, line: u32, name: &str, args: &[ast::Expr]) -> ValueId {
    let callee = self.prog.function_by_name(name);
    let params: Option<Vec<Ty>> = callee.map(|f| {
      self.prog.func(f).args().iter().map(|&a| self.prog.ty(a)).collect()
    });
    // arguments are evaluated (for their effects) even when the call is bad
    let mut vals = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
      let expected = params.as_ref().and_then(|p| p.get(i).copied());
      let mut val = self.with_expected(expected, |this| this.gen_expr(arg));
      if let Some(expected) = expected {
        val = self.coerce(val, expected);
      }
      vals.push(val);
    }
    let Some(callee) = callee else {
      self.diags.error_at(line, format!("no function named '{name}' in current context"));
      return self.prog.null_const();
    };
    if vals.len() != params.expect("known callee has params").len() {
      self.diags.error_at(line, format!("wrong number of arguments to function '{name}'"));
      return self.prog.null_const();
    }
    self.emit(line, InstKind::Call { callee, args: vals.into() })
  }

  fn select_cast_op(&self, from: Ty, to: Ty) -> Option<CastOp> {
    match (self.prog.types.kind(from), self.prog.types.kind(to)) {
      (&TyKind::Int { bits: from_bits, signed }, &TyKind::Int { bits: to_bits, .. }) =>
        Some(if to_bits > from_bits {
          if signed { CastOp::SignExtend } else { CastOp::ZeroExtend }
        } else if to_bits < from_bits {
          CastOp::Truncate
        } else {
          CastOp::Reinterpret
        }),
      (TyKind::Int { .. }, TyKind::Pointer { .. }) => Some(CastOp::IntToPtr),
      (TyKind::Pointer { .. }, TyKind::Int { .. }) => Some(CastOp::PtrToInt),
      (TyKind::Pointer { .. }, TyKind::Pointer { .. }) => Some(CastOp::Reinterpret),
      (TyKind::Bool, TyKind::Int { .. }) => Some(CastOp::ZeroExtend),
      _ => None,
    }
  }

  fn gen_cast_expr(&mut self, line: u32, te: &ast::TypeExpr, val: &ast::Expr) -> ValueId {
    let val = self.with_expected(None, |this| this.gen_expr(val));
    let target = self.gen_type(line, te);
    let Some(op) = self.select_cast_op(self.prog.ty(val), target) else {
      let from = self.prog.types.display(self.prog.ty(val)).to_string();
      let to = self.prog.types.display(target).to_string();
      self.diags.error_at(line, format!("invalid cast from '{from}' to '{to}'"));
      return self.prog.null_const();
    };
    let cast = self.emit(line, InstKind::Cast { op, val });
    self.prog.set_ty(cast, target);
    cast
  }

  fn gen_construct_expr(&mut self, line: u32, name: &str, args: &[ast::Expr]) -> ValueId {
    let ty = self.gen_base_type(line, name);
    let Some(fields) = self.prog.types.as_struct(ty).map(<[Ty]>::to_vec) else {
      self.diags.error_at(line, format!("cannot construct non-struct type '{name}'"));
      return self.prog.null_const();
    };
    if args.len() != fields.len() {
      self.diags.error_at(line, format!("wrong number of values for struct '{name}'"));
      return self.prog.null_const();
    }
    let mut elems = Vec::with_capacity(args.len());
    for (arg, &field_ty) in args.iter().zip(&fields) {
      let val = self.with_expected(Some(field_ty), |this| this.gen_expr(arg));
      elems.push(self.coerce(val, field_ty));
    }
    self.prog.struct_const(ty, elems.into())
  }

  fn gen_member_expr(&mut self, line: u32, lhs: &ast::Expr, field: &str) -> ValueId {
    let lhs = self.gen_place(lhs);
    // the containing struct sits behind the local's slot type and at most one
    // level of pointer indirection
    let mut ty = self.prog.ty(lhs);
    let mut mutable = false;
    if let Some(var) = self.prog.as_var(lhs) {
      ty = var.var_ty;
      mutable = true;
    }
    if let Some((pointee, m)) = self.prog.types.as_pointer(ty) {
      ty = pointee;
      mutable = m;
    }
    if self.prog.types.as_struct(ty).is_none() {
      let shown = self.prog.types.display(ty).to_string();
      self.diags.error_at(line, format!("member access on non-struct type '{shown}'"));
      return self.prog.null_const();
    }
    let index = self.struct_fields.get(&ty)
      .and_then(|names| names.iter().position(|n| n == field));
    let Some(index) = index else {
      self.diags.error_at(line, format!("struct has no member named '{field}'"));
      return self.prog.null_const();
    };
    let field_ty = self.prog.types.as_struct(ty).expect("checked struct above")[index];
    let lea = self.get_member_ptr(line, lhs, index);
    let lea_ty = self.prog.types.pointer(field_ty, mutable);
    self.prog.set_ty(lea, lea_ty);
    if self.member_load == MemberLoadState::Load {
      return self.emit(line, InstKind::Load { ptr: lea });
    }
    lea
  }

  fn gen_asm_expr(&mut self, line: u32, asm: &ast::AsmExpr) -> ValueId {
    let mut inputs = Vec::with_capacity(asm.inputs.len());
    for (reg, expr) in &asm.inputs {
      let val = self.with_expected(None, |this| this.gen_expr(expr));
      inputs.push((reg.as_str().into(), val));
    }
    // outputs are lowered to addresses; the backend stores into them
    let mut outputs = Vec::with_capacity(asm.outputs.len());
    for (reg, expr) in &asm.outputs {
      let addr = self.gen_place(expr);
      outputs.push((reg.as_str().into(), addr));
    }
    let ty = if outputs.is_empty() {
      Ty::VOID
    } else {
      let fields: Box<[Ty]> = outputs.iter().map(|&(_, addr)| {
        self.prog.types.as_pointer(self.prog.ty(addr)).map_or(Ty::INVALID, |(p, _)| p)
      }).collect();
      self.prog.types.struct_of(fields)
    };
    let clobbers: Box<[Box<str>]> = asm.clobbers.iter().map(|c| c.as_str().into()).collect();
    let inst = self.emit(line, InstKind::InlineAsm {
      template: asm.template.as_str().into(),
      clobbers,
      inputs,
      outputs,
    });
    self.prog.set_ty(inst, ty);
    inst
  }

  // -------------------------------------------------------------- statements

  fn gen_stmt(&mut self, stmt: &ast::Stmt) {
    match &stmt.kind {
      ast::StmtKind::Decl { name, ty, init, mutable } =>
        self.gen_decl_stmt(stmt.line, name, ty, init.as_ref(), *mutable),
      ast::StmtKind::If { cond, block } => self.gen_if_stmt(stmt.line, cond, block),
      ast::StmtKind::Ret(val) => self.gen_ret_stmt(stmt.line, val.as_ref()),
      ast::StmtKind::Expr(expr) => { self.gen_expr(expr); }
    }
  }

  fn gen_decl_stmt(&mut self, line: u32, name: &str, ty: &ast::TypeExpr,
    init: Option<&ast::Expr>, mutable: bool) {
    if self.find_var(name).is_some() {
      self.diags.error_at(line, format!("redeclaration of variable '{name}'"));
      return;
    }
    let ty = self.gen_type(line, ty);
    let func = self.cur_func();
    let var = self.prog.append_var(func, ty, mutable);
    self.prog.set_name(var, name);
    if let Some(init) = init {
      let expected = if ty == Ty::INFERRED { None } else { Some(ty) };
      let mut val = self.with_expected(expected, |this| this.gen_expr(init));
      if let Some(expected) = expected {
        val = self.coerce(val, expected);
      }
      self.create_store(line, var, val);
      if ty == Ty::INFERRED {
        let inferred = self.prog.ty(val);
        self.prog.set_var_ty(var, inferred);
      }
    }
    self.put_var(name, var);
  }

  fn gen_if_stmt(&mut self, line: u32, cond: &ast::Expr, block: &ast::Block) {
    let cond = self.with_expected(None, |this| this.gen_expr(cond));
    let func = self.cur_func();
    let true_dst = self.prog.append_block(func);
    let false_dst = self.prog.append_block(func);
    self.emit(line, InstKind::CondBranch { cond, true_dst, false_dst });
    // the false destination doubles as the fallthrough continuation
    self.block = Some(true_dst);
    self.gen_block(block);
    let tail = self.cur_block();
    let terminated = self.prog.last_inst(tail)
      .is_some_and(|t| matches!(self.prog.inst(t).kind, InstKind::Ret { .. }));
    if !terminated {
      self.prog.append_inst(tail, line, InstKind::Branch { dst: false_dst });
    }
    self.block = Some(false_dst);
  }

  fn gen_ret_stmt(&mut self, line: u32, val: Option<&ast::Expr>) {
    let val = val.map(|expr| {
      let ret_ty = self.prog.func(self.cur_func()).ret;
      let val = self.with_expected(Some(ret_ty), |this| this.gen_expr(expr));
      self.coerce(val, ret_ty)
    });
    self.emit(line, InstKind::Ret { val });
  }

  fn gen_block(&mut self, block: &ast::Block) {
    self.push_scope();
    for stmt in &block.stmts {
      self.gen_stmt(stmt);
    }
    self.pop_scope();
  }

  // ------------------------------------------------------------ declarations

  fn gen_decl(&mut self, decl: &ast::Decl) {
    match &decl.kind {
      ast::DeclKind::Function(fd) => self.gen_function_decl(decl.line, fd),
      ast::DeclKind::Type(td) => self.gen_type_decl(decl.line, td),
      ast::DeclKind::Import(path) => log::trace!("skipping resolved import '{path}'"),
    }
  }

  fn gen_function_decl(&mut self, line: u32, fd: &ast::FunctionDecl) {
    log::trace!("lowering function '{}'", fd.name);
    let ret = self.gen_type(line, &fd.ret);
    let func = self.prog.append_function(&fd.name, ret, fd.externed);
    self.func = Some(func);
    let mut param_tys = Vec::with_capacity(fd.args.len());
    for ast_arg in &fd.args {
      let arg = self.prog.append_arg(func, ast_arg.mutable);
      self.prog.set_name(arg, &ast_arg.name);
      let arg_ty = self.gen_type(ast_arg.line, &ast_arg.ty);
      self.prog.set_ty(arg, arg_ty);
      param_tys.push(arg_ty);
    }
    let fn_ty = self.prog.types.function(ret, param_tys.into());
    self.prog.set_ty(func, fn_ty);

    if fd.externed {
      return;
    }
    let body = fd.block.as_ref().expect("non-externed function without a body");

    let entry = self.prog.append_block(func);
    self.block = Some(entry);
    self.push_scope();
    // spill arguments into slots so they are ordinary places
    for arg in self.prog.func(func).args().to_vec() {
      let arg_ty = self.prog.ty(arg);
      let mutable = self.prog.as_arg(arg).expect("function argument expected").mutable;
      let var = self.prog.append_var(func, arg_ty, mutable);
      let name = self.prog.name(arg).unwrap_or_default().to_string();
      self.prog.set_name(var, &name);
      self.prog.append_inst(entry, line, InstKind::Store { ptr: var, val: arg });
      self.put_var(&name, var);
    }

    self.gen_block(body);
    self.pop_scope();

    // insert the implicit return of void functions
    let last = *self.prog.func(func).blocks().last().expect("function has no blocks");
    let terminated = self.prog.last_inst(last)
      .is_some_and(|t| matches!(self.prog.inst(t).kind, InstKind::Ret { .. }));
    if ret == Ty::VOID && !terminated {
      self.prog.append_inst(last, line, InstKind::Ret { val: None });
    }
  }

  fn gen_type_decl(&mut self, line: u32, td: &ast::TypeDecl) {
    let ty = self.gen_type(line, &td.ty);
    self.put_type(&td.name, ty);
  }
}
