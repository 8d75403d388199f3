//! The abstract syntax tree consumed by IR lowering.
//!
//! The parser (an external collaborator) produces this shape; the surface
//! syntax behind it is not this crate's concern. Every node carries a 1-based
//! source line for diagnostics.

/// A binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
  /// Integer addition.
  Add,
  /// Integer subtraction.
  Sub,
  /// Integer multiplication.
  Mul,
  /// Integer division.
  Div,
  /// Less-than comparison.
  LessThan,
  /// Greater-than comparison.
  GreaterThan,
}

/// A unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
  /// `&e`: the address of a place.
  AddressOf,
  /// `*e`: the value behind a pointer.
  Deref,
}

/// A type as written in the source.
#[derive(Clone, Debug)]
pub struct TypeExpr {
  /// Source line of the type syntax.
  pub line: u32,
  /// The shape of the type.
  pub kind: TypeExprKind,
}

/// The shape of a source-level type.
#[derive(Clone, Debug)]
pub enum TypeExprKind {
  /// A type the parser could not make sense of.
  Invalid,
  /// An omitted type, to be inferred from the initializer.
  Inferred,
  /// A base type name: `bool`, `void`, `iN`/`uN`, or a declared type name.
  Base(String),
  /// `*T` or `*mut T`.
  Pointer {
    /// The pointed-to type.
    pointee: Box<TypeExpr>,
    /// Whether this is a `*mut` pointer.
    mutable: bool,
  },
  /// `struct { f: T; ... }`.
  Struct(Vec<StructField>),
}

/// A named field of a source-level struct type.
#[derive(Clone, Debug)]
pub struct StructField {
  /// The field name.
  pub name: String,
  /// The field type.
  pub ty: TypeExpr,
}

/// A parsed translation unit.
#[derive(Clone, Debug, Default)]
pub struct Root {
  /// Top-level declarations in source order.
  pub decls: Vec<Decl>,
}

/// A top-level declaration.
#[derive(Clone, Debug)]
pub struct Decl {
  /// Source line of the declaration.
  pub line: u32,
  /// The declaration itself.
  pub kind: DeclKind,
}

/// The kinds of top-level declaration.
#[derive(Clone, Debug)]
pub enum DeclKind {
  /// A function declaration or definition.
  Function(FunctionDecl),
  /// `type Name = T;`
  Type(TypeDecl),
  /// `import "path";`, already resolved by the driver and ignored by lowering.
  Import(String),
}

/// A function declaration.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
  /// The function name.
  pub name: String,
  /// Whether the function is declared `extern` (no body, external linkage).
  pub externed: bool,
  /// The formal arguments.
  pub args: Vec<FunctionArg>,
  /// The declared return type.
  pub ret: TypeExpr,
  /// The body, absent for externed declarations.
  pub block: Option<Block>,
}

/// A formal argument of a function.
#[derive(Clone, Debug)]
pub struct FunctionArg {
  /// Source line of the argument.
  pub line: u32,
  /// The argument name.
  pub name: String,
  /// The declared type.
  pub ty: TypeExpr,
  /// Whether the argument was declared `var` (reassignable) rather than `let`.
  pub mutable: bool,
}

/// A named type declaration.
#[derive(Clone, Debug)]
pub struct TypeDecl {
  /// The declared name.
  pub name: String,
  /// The aliased type.
  pub ty: TypeExpr,
}

/// A brace-delimited statement block.
#[derive(Clone, Debug)]
pub struct Block {
  /// Source line of the opening brace.
  pub line: u32,
  /// The statements, in order.
  pub stmts: Vec<Stmt>,
}

/// A statement.
#[derive(Clone, Debug)]
pub struct Stmt {
  /// Source line of the statement.
  pub line: u32,
  /// The statement itself.
  pub kind: StmtKind,
}

/// The kinds of statement.
#[derive(Clone, Debug)]
pub enum StmtKind {
  /// `let x: T = e;` / `var x = e;` / `let x: T;`
  Decl {
    /// The declared name.
    name: String,
    /// The declared type (possibly inferred).
    ty: TypeExpr,
    /// The initializer, if any.
    init: Option<Expr>,
    /// Whether the variable was declared `var`.
    mutable: bool,
  },
  /// `if (e) { ... }`
  If {
    /// The condition.
    cond: Expr,
    /// The guarded block.
    block: Block,
  },
  /// `return e;` / `return;`
  Ret(Option<Expr>),
  /// An expression in statement position.
  Expr(Expr),
}

/// An expression.
#[derive(Clone, Debug)]
pub struct Expr {
  /// Source line of the expression.
  pub line: u32,
  /// The expression itself.
  pub kind: ExprKind,
}

/// The kinds of expression.
#[derive(Clone, Debug)]
pub enum ExprKind {
  /// `lhs = rhs`
  Assign {
    /// The assigned place.
    lhs: Box<Expr>,
    /// The assigned value.
    rhs: Box<Expr>,
  },
  /// `lhs op rhs`
  Bin {
    /// The operator.
    op: BinOp,
    /// Left operand.
    lhs: Box<Expr>,
    /// Right operand.
    rhs: Box<Expr>,
  },
  /// `&e` / `*e`
  Unary {
    /// The operator.
    op: UnaryOp,
    /// The operand.
    val: Box<Expr>,
  },
  /// `f(a, b)`
  Call {
    /// The callee name.
    name: String,
    /// The actual arguments.
    args: Vec<Expr>,
  },
  /// `e as T`
  Cast {
    /// The target type.
    ty: TypeExpr,
    /// The value being cast.
    val: Box<Expr>,
  },
  /// `Name(a, b)`: construction of a named struct type.
  Construct {
    /// The struct type name.
    name: String,
    /// The field values, in field order.
    args: Vec<Expr>,
  },
  /// `e.field`
  Member {
    /// The accessed value.
    lhs: Box<Expr>,
    /// The field name.
    field: String,
  },
  /// A name in scope.
  Symbol(String),
  /// An integer literal.
  Num(u64),
  /// A string literal.
  Str(String),
  /// An inline assembly expression.
  Asm(AsmExpr),
}

/// An inline assembly expression.
#[derive(Clone, Debug)]
pub struct AsmExpr {
  /// The instruction template.
  pub template: String,
  /// Clobbered registers, in source order.
  pub clobbers: Vec<String>,
  /// `(register, value)` inputs, in source order.
  pub inputs: Vec<(String, Expr)>,
  /// `(register, place)` outputs, in source order.
  pub outputs: Vec<(String, Expr)>,
}

impl Expr {
  /// Shorthand for an expression at a line.
  #[must_use] pub fn new(line: u32, kind: ExprKind) -> Self { Self { line, kind } }
}

impl TypeExpr {
  /// Shorthand for a base type name at a line.
  #[must_use] pub fn base(line: u32, name: &str) -> Self {
    Self { line, kind: TypeExprKind::Base(name.into()) }
  }

  /// Shorthand for an inferred type at a line.
  #[must_use] pub fn inferred(line: u32) -> Self {
    Self { line, kind: TypeExprKind::Inferred }
  }
}
