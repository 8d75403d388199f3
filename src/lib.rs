//! The IR core of the Loric compiler.
//!
//! Loric is a small statically typed language with pointers, mutability
//! qualifiers, record types and inline assembly. This crate is the middle of
//! its ahead-of-time compiler: it consumes the resolved AST produced by the
//! front end ([`types::ast`]), lowers it to a use-def IR ([`build_ir`],
//! [`types::ir`]), and runs the analysis/transform pipeline over it
//! ([`pass`]): control-flow analysis, reaching definitions over stack
//! slots, stack promotion (mem2reg) and the variable checker. The lowered
//! program is handed to a downstream native code generator, which is not
//! part of this crate; the deterministic textual form in [`dump`] is the
//! crate's observable output.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod types;
pub mod diag;
pub mod build_ir;
pub mod dump;
pub mod pass;
pub mod analysis;
pub mod stack_promoter;
pub mod var_checker;

pub use build_ir::lower;
pub use diag::Diagnostics;
pub use dump::{dump_function, dump_program};
pub use pass::PassManager;
pub use stack_promoter::StackPromoter;
pub use types::ir::Program;
pub use var_checker::VarChecker;
