//! Golden-dump tests for lowering: each program's textual IR is compared
//! character by character.

mod common;

use common::*;
use loricc::types::ast::BinOp;
use loricc::{Diagnostics, dump_program, lower};

#[test]
fn const_add() {
  // fn main(): i32 { return 1 + 2; }
  let main = function(1, "main", vec![], TypeExpr::base(1, "i32"),
    block(1, vec![ret(2, Some(bin(2, BinOp::Add, num(2, 1), num(2, 2))))]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![main])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @main(): i32 {
  L0 {
    %v0 = add i32 1, i32 2
    ret i32 %v0
  }
}
");
}

#[test]
fn local_var_no_branch() {
  // fn f(): i32 { let x: i32 = 5; return x; }
  let f = function(1, "f", vec![], TypeExpr::base(1, "i32"),
    block(1, vec![
      decl_stmt(2, "x", TypeExpr::base(2, "i32"), Some(num(2, 5)), false),
      ret(3, Some(sym(3, "x"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f(): i32 {
  let %s0: i32
  L0 {
    store *i32 %s0, i32 5
    %v0 = load *i32 %s0
    ret i32 %v0
  }
}
");
}

#[test]
fn if_return_then_fallthrough() {
  // fn g(var x: i32): i32 { if (x < 0) { return 0; } return x; }
  let g = function(1, "g", vec![arg(1, "x", TypeExpr::base(1, "i32"), true)],
    TypeExpr::base(1, "i32"),
    block(1, vec![
      if_stmt(2, bin(2, BinOp::LessThan, sym(2, "x"), num(2, 0)),
        block(2, vec![ret(3, Some(num(3, 0)))])),
      ret(4, Some(sym(4, "x"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![g])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @g(var %x: i32): i32 {
  var %s0: i32
  L0 {
    store *mut i32 %s0, i32 %x
    %v0 = load *mut i32 %s0
    %v1 = cmp_lt i32 %v0, i32 0
    br bool %v1, L1, L2
  }
  L1 {
    ret i32 0
  }
  L2 {
    %v2 = load *mut i32 %s0
    ret i32 %v2
  }
}
");
}

#[test]
fn assignment_under_if() {
  // fn h(var x: i32, var y: i32): i32 { var z: i32 = x; if (y > 0) { z = y; } return z; }
  let h = function(1, "h",
    vec![arg(1, "x", TypeExpr::base(1, "i32"), true), arg(1, "y", TypeExpr::base(1, "i32"), true)],
    TypeExpr::base(1, "i32"),
    block(1, vec![
      decl_stmt(2, "z", TypeExpr::base(2, "i32"), Some(sym(2, "x")), true),
      if_stmt(3, bin(3, BinOp::GreaterThan, sym(3, "y"), num(3, 0)),
        block(3, vec![expr_stmt(assign(4, sym(4, "z"), sym(4, "y")))])),
      ret(5, Some(sym(5, "z"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![h])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @h(var %x: i32, var %y: i32): i32 {
  var %s0: i32
  var %s1: i32
  var %s2: i32
  L0 {
    store *mut i32 %s0, i32 %x
    store *mut i32 %s1, i32 %y
    %v0 = load *mut i32 %s0
    store *mut i32 %s2, i32 %v0
    %v1 = load *mut i32 %s1
    %v2 = cmp_gt i32 %v1, i32 0
    br bool %v2, L1, L2
  }
  L1 {
    %v3 = load *mut i32 %s1
    store *mut i32 %s2, i32 %v3
    br L2
  }
  L2 {
    %v4 = load *mut i32 %s2
    ret i32 %v4
  }
}
");
}

#[test]
fn struct_member_reads() {
  // type P = struct { a: i32; b: i32; };
  // fn f(let p: *P): i32 { return p.a + p.b; }
  let p_ty = type_decl(1, "P",
    struct_ty(1, vec![("a", TypeExpr::base(1, "i32")), ("b", TypeExpr::base(1, "i32"))]));
  let f = function(2, "f",
    vec![arg(2, "p", pointer_to(2, TypeExpr::base(2, "P"), false), false)],
    TypeExpr::base(2, "i32"),
    block(2, vec![ret(3, Some(bin(3, BinOp::Add,
      member(3, sym(3, "p"), "a"), member(3, sym(3, "p"), "b"))))]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![p_ty, f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f(let %p: *{i32, i32}): i32 {
  let %s0: *{i32, i32}
  L0 {
    store **{i32, i32} %s0, *{i32, i32} %p
    %v0 = lea *i32, **{i32, i32} %s0, u32 0, u32 0
    %v1 = load *i32 %v0
    %v2 = lea *i32, **{i32, i32} %s0, u32 0, u32 1
    %v3 = load *i32 %v2
    %v4 = add i32 %v1, i32 %v3
    ret i32 %v4
  }
}
");
}

#[test]
fn struct_literal_breaks_into_fieldwise_stores() {
  // type P = struct { a: i32; b: i32; };
  // fn f(): i32 { let p: P = P(1, 2); return p.a; }
  let p_ty = type_decl(1, "P",
    struct_ty(1, vec![("a", TypeExpr::base(1, "i32")), ("b", TypeExpr::base(1, "i32"))]));
  let f = function(2, "f", vec![], TypeExpr::base(2, "i32"),
    block(2, vec![
      decl_stmt(3, "p", TypeExpr::base(3, "P"),
        Some(construct(3, "P", vec![num(3, 1), num(3, 2)])), false),
      ret(4, Some(member(4, sym(4, "p"), "a"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![p_ty, f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f(): i32 {
  let %s0: {i32, i32}
  L0 {
    %v0 = lea *mut i32, *{i32, i32} %s0, u32 0, u32 0
    store *mut i32 %v0, i32 1
    %v1 = lea *mut i32, *{i32, i32} %s0, u32 0, u32 1
    store *mut i32 %v1, i32 2
    %v2 = lea *mut i32, *{i32, i32} %s0, u32 0, u32 0
    %v3 = load *mut i32 %v2
    ret i32 %v3
  }
}
");
}

#[test]
fn calls_casts_and_prototypes() {
  // extern fn g(let a: i64): i64;
  // fn main(): i64 { return g(7 as i64); }
  let g = extern_function(1, "g", vec![arg(1, "a", TypeExpr::base(1, "i64"), false)],
    TypeExpr::base(1, "i64"));
  let main = function(2, "main", vec![], TypeExpr::base(2, "i64"),
    block(2, vec![ret(3, Some(call(3, "g",
      vec![cast(3, TypeExpr::base(3, "i64"), num(3, 7))])))]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![g, main])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @g(let %a: i64): i64;
fn @main(): i64 {
  L0 {
    %v0 = cast i8 7 -> i64 (sext)
    %v1 = call i64 @g(i64 %v0)
    ret i64 %v1
  }
}
");
}

#[test]
fn pointers_and_deref() {
  // fn f(var x: i32): i32 { let p: *mut i32 = &x; *p = 3; return x; }
  let f = function(1, "f", vec![arg(1, "x", TypeExpr::base(1, "i32"), true)],
    TypeExpr::base(1, "i32"),
    block(1, vec![
      decl_stmt(2, "p", pointer_to(2, TypeExpr::base(2, "i32"), true),
        Some(unary(2, loricc::types::ast::UnaryOp::AddressOf, sym(2, "x"))), false),
      expr_stmt(assign(3,
        unary(3, loricc::types::ast::UnaryOp::Deref, sym(3, "p")), num(3, 3))),
      ret(4, Some(sym(4, "x"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f(var %x: i32): i32 {
  var %s0: i32
  let %s1: *mut i32
  L0 {
    store *mut i32 %s0, i32 %x
    store **mut i32 %s1, *mut i32 %s0
    %v0 = load **mut i32 %s1
    store *mut i32 %v0, i32 3
    %v1 = load *mut i32 %s0
    ret i32 %v1
  }
}
");
}

#[test]
fn inline_asm_outputs_take_addresses() {
  // fn f() { var lo: i32; asm("rdtsc", clobber edx, output(eax, lo)); }
  let f = function(1, "f", vec![], TypeExpr::base(1, "void"),
    block(1, vec![
      decl_stmt(2, "lo", TypeExpr::base(2, "i32"), None, true),
      expr_stmt(asm(3, "rdtsc", vec!["edx"], vec![], vec![("eax", sym(3, "lo"))])),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f() {
  var %s0: i32
  L0 {
    %v0 = asm {i32} \"rdtsc\", clobber(edx), output(eax, *mut i32 %s0)
    ret void
  }
}
");
}

#[test]
fn void_function_gets_an_implicit_return() {
  let f = function(1, "f", vec![], TypeExpr::base(1, "void"), block(1, vec![]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f() {
  L0 {
    ret void
  }
}
");
}

#[test]
fn inferred_declarations_take_the_initializer_type() {
  // fn f(): i64 { let x = 300; return x; } where 300 needs 16 bits, so x: i16
  let f = function(1, "f", vec![], TypeExpr::base(1, "i64"),
    block(1, vec![
      decl_stmt(2, "x", TypeExpr::inferred(2), Some(num(2, 300)), false),
      ret(3, Some(sym(3, "x"))),
    ]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @f(): i64 {
  let %s0: i16
  L0 {
    store *i16 %s0, i16 300
    %v0 = load *i16 %s0
    ret i16 %v0
  }
}
");
}

#[test]
fn unknown_symbols_and_callees_are_reported_and_recovered() {
  // fn f(): i32 { return missing(q); }
  let f = function(1, "f", vec![], TypeExpr::base(1, "i32"),
    block(1, vec![ret(2, Some(call(2, "missing", vec![sym(2, "q")])))]));
  let mut diags = Diagnostics::new();
  let prog = lower(&[root(vec![f])], &mut diags);
  assert!(diags.has_errors());
  let messages: Vec<&str> =
    diags.diagnostics().iter().map(|d| d.message.as_str()).collect();
  assert_eq!(messages, vec![
    "no symbol named 'q' in current context",
    "no function named 'missing' in current context",
  ]);
  assert_eq!(diags.diagnostics()[0].line, Some(2));
  // lowering still produced a function with a terminator
  let func = prog.function_by_name("f").expect("f was lowered");
  let entry = prog.entry(func);
  assert!(prog.last_inst(entry).is_some());
}

#[test]
fn redeclaration_is_an_error() {
  let f = function(1, "f", vec![], TypeExpr::base(1, "void"),
    block(1, vec![
      decl_stmt(2, "x", TypeExpr::base(2, "i32"), Some(num(2, 1)), false),
      decl_stmt(3, "x", TypeExpr::base(3, "i32"), Some(num(3, 2)), false),
    ]));
  let mut diags = Diagnostics::new();
  lower(&[root(vec![f])], &mut diags);
  assert_eq!(diags.diagnostics().len(), 1);
  assert_eq!(diags.diagnostics()[0].message, "redeclaration of variable 'x'");
  assert_eq!(diags.diagnostics()[0].line, Some(3));
}

#[test]
fn unknown_types_are_reported() {
  let f = function(1, "f", vec![], TypeExpr::base(1, "Nope"), block(1, vec![]));
  let mut diags = Diagnostics::new();
  lower(&[root(vec![f])], &mut diags);
  assert_eq!(diags.diagnostics().len(), 1);
  assert_eq!(diags.diagnostics()[0].message, "invalid type 'Nope'");
}

#[test]
fn unknown_struct_members_are_reported() {
  let p_ty = type_decl(1, "P", struct_ty(1, vec![("a", TypeExpr::base(1, "i32"))]));
  let f = function(2, "f",
    vec![arg(2, "p", pointer_to(2, TypeExpr::base(2, "P"), false), false)],
    TypeExpr::base(2, "i32"),
    block(2, vec![ret(3, Some(member(3, sym(3, "p"), "b")))]));
  let mut diags = Diagnostics::new();
  lower(&[root(vec![p_ty, f])], &mut diags);
  assert_eq!(diags.diagnostics().len(), 1);
  assert_eq!(diags.diagnostics()[0].message, "struct has no member named 'b'");
  assert_eq!(diags.diagnostics()[0].line, Some(3));
}

#[test]
fn wrong_arity_calls_are_reported() {
  let g = extern_function(1, "g", vec![arg(1, "a", TypeExpr::base(1, "i32"), false)],
    TypeExpr::base(1, "void"));
  let f = function(2, "f", vec![], TypeExpr::base(2, "void"),
    block(2, vec![expr_stmt(call(3, "g", vec![num(3, 1), num(3, 2)]))]));
  let mut diags = Diagnostics::new();
  lower(&[root(vec![g, f])], &mut diags);
  assert_eq!(diags.diagnostics().len(), 1);
  assert_eq!(diags.diagnostics()[0].message, "wrong number of arguments to function 'g'");
}

#[test]
fn lowering_spans_multiple_roots() {
  // the bootstrap root declares `start`, the main root calls it
  let bootstrap = root(vec![extern_function(1, "start", vec![], TypeExpr::base(1, "void"))]);
  let main = root(vec![function(1, "main", vec![], TypeExpr::base(1, "void"),
    block(1, vec![expr_stmt(call(2, "start", vec![]))]))]);
  let mut diags = Diagnostics::new();
  let prog = lower(&[bootstrap, main], &mut diags);
  assert!(!diags.has_errors());
  assert_eq!(dump_program(&prog), "\
fn @start();
fn @main() {
  L0 {
    call void @start()
    ret void
  }
}
");
}
