//! Shared AST-building helpers for the integration tests. The parser is not
//! part of this crate, so tests construct the AST the front end would
//! produce.

#![allow(dead_code)]

pub use loricc::types::ast::{AsmExpr, BinOp, Block, Decl, DeclKind, Expr, ExprKind, FunctionArg,
  FunctionDecl, Root, Stmt, StmtKind, StructField, TypeDecl, TypeExpr, TypeExprKind, UnaryOp};

pub fn num(line: u32, value: u64) -> Expr {
  Expr::new(line, ExprKind::Num(value))
}

pub fn sym(line: u32, name: &str) -> Expr {
  Expr::new(line, ExprKind::Symbol(name.into()))
}

pub fn bin(line: u32, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
  Expr::new(line, ExprKind::Bin { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
}

pub fn unary(line: u32, op: UnaryOp, val: Expr) -> Expr {
  Expr::new(line, ExprKind::Unary { op, val: Box::new(val) })
}

pub fn assign(line: u32, lhs: Expr, rhs: Expr) -> Expr {
  Expr::new(line, ExprKind::Assign { lhs: Box::new(lhs), rhs: Box::new(rhs) })
}

pub fn call(line: u32, name: &str, args: Vec<Expr>) -> Expr {
  Expr::new(line, ExprKind::Call { name: name.into(), args })
}

pub fn cast(line: u32, ty: TypeExpr, val: Expr) -> Expr {
  Expr::new(line, ExprKind::Cast { ty, val: Box::new(val) })
}

pub fn construct(line: u32, name: &str, args: Vec<Expr>) -> Expr {
  Expr::new(line, ExprKind::Construct { name: name.into(), args })
}

pub fn member(line: u32, lhs: Expr, field: &str) -> Expr {
  Expr::new(line, ExprKind::Member { lhs: Box::new(lhs), field: field.into() })
}

pub fn asm(line: u32, template: &str, clobbers: Vec<&str>, inputs: Vec<(&str, Expr)>,
  outputs: Vec<(&str, Expr)>) -> Expr
{
  Expr::new(line, ExprKind::Asm(AsmExpr {
    template: template.into(),
    clobbers: clobbers.into_iter().map(String::from).collect(),
    inputs: inputs.into_iter().map(|(reg, e)| (reg.into(), e)).collect(),
    outputs: outputs.into_iter().map(|(reg, e)| (reg.into(), e)).collect(),
  }))
}

pub fn expr_stmt(expr: Expr) -> Stmt {
  Stmt { line: expr.line, kind: StmtKind::Expr(expr) }
}

pub fn decl_stmt(line: u32, name: &str, ty: TypeExpr, init: Option<Expr>, mutable: bool) -> Stmt {
  Stmt { line, kind: StmtKind::Decl { name: name.into(), ty, init, mutable } }
}

pub fn if_stmt(line: u32, cond: Expr, block: Block) -> Stmt {
  Stmt { line, kind: StmtKind::If { cond, block } }
}

pub fn ret(line: u32, val: Option<Expr>) -> Stmt {
  Stmt { line, kind: StmtKind::Ret(val) }
}

pub fn block(line: u32, stmts: Vec<Stmt>) -> Block {
  Block { line, stmts }
}

pub fn arg(line: u32, name: &str, ty: TypeExpr, mutable: bool) -> FunctionArg {
  FunctionArg { line, name: name.into(), ty, mutable }
}

pub fn function(line: u32, name: &str, args: Vec<FunctionArg>, ret_ty: TypeExpr,
  body: Block) -> Decl
{
  Decl {
    line,
    kind: DeclKind::Function(FunctionDecl {
      name: name.into(),
      externed: false,
      args,
      ret: ret_ty,
      block: Some(body),
    }),
  }
}

pub fn extern_function(line: u32, name: &str, args: Vec<FunctionArg>, ret_ty: TypeExpr) -> Decl {
  Decl {
    line,
    kind: DeclKind::Function(FunctionDecl {
      name: name.into(),
      externed: true,
      args,
      ret: ret_ty,
      block: None,
    }),
  }
}

pub fn type_decl(line: u32, name: &str, ty: TypeExpr) -> Decl {
  Decl { line, kind: DeclKind::Type(TypeDecl { name: name.into(), ty }) }
}

pub fn pointer_to(line: u32, pointee: TypeExpr, mutable: bool) -> TypeExpr {
  TypeExpr { line, kind: TypeExprKind::Pointer { pointee: Box::new(pointee), mutable } }
}

pub fn struct_ty(line: u32, fields: Vec<(&str, TypeExpr)>) -> TypeExpr {
  TypeExpr {
    line,
    kind: TypeExprKind::Struct(
      fields.into_iter().map(|(name, ty)| StructField { name: name.into(), ty }).collect()),
  }
}

pub fn root(decls: Vec<Decl>) -> Root {
  Root { decls }
}
