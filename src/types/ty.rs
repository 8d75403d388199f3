//! The type system: a per-program cache of interned structural types.
//!
//! Two types are structurally equal iff their [`Ty`] ids are equal, so type
//! comparison anywhere in the crate is a plain integer comparison. The cache
//! is append-only; an interned type is never removed or mutated.

use std::fmt;
use hashbrown::HashMap;
use itertools::Itertools;
use crate::types::{IdxVec, mk_id};

mk_id! {
  /// A reference to an interned type in a [`TypeCache`].
  Ty
}

impl Ty {
  /// The invalid type, carried by values that have not been typed yet and by
  /// error-recovery values.
  pub const INVALID: Ty = Ty(0);
  /// The type of booleans.
  pub const BOOL: Ty = Ty(1);
  /// The type of valueless constructs.
  pub const VOID: Ty = Ty(2);
  /// The to-be-inferred type, resolved at a declaration's first
  /// initialization.
  pub const INFERRED: Ty = Ty(3);
}

/// The structure of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TyKind {
  /// The placeholder type of values that have not been typed yet.
  Invalid,
  /// The type of booleans.
  Bool,
  /// The type of valueless constructs.
  Void,
  /// A declared-but-not-yet-known type, resolved at the first init site.
  Inferred,
  /// An integer type of the given bit width. Widths are multiples of 8.
  Int {
    /// Bit width, one of 8, 16, 32, 64.
    bits: u32,
    /// Whether the type is signed.
    signed: bool,
  },
  /// A pointer type. Mutability is part of the type's identity.
  Pointer {
    /// The pointed-to type.
    pointee: Ty,
    /// Whether stores through this pointer are permitted.
    mutable: bool,
  },
  /// A structure type, identified by its ordered field types. Field names are
  /// surface syntax and live with the lowering context, not here.
  Struct(Box<[Ty]>),
  /// The type of functions.
  Function {
    /// The return type.
    ret: Ty,
    /// The parameter types, in declaration order.
    params: Box<[Ty]>,
  },
}

/// The per-program store of interned types.
///
/// Each accessor returns the unique existing instance for its structural key
/// if one exists, and allocates a fresh one otherwise.
#[derive(Debug)]
pub struct TypeCache {
  kinds: IdxVec<Ty, TyKind>,
  intern: HashMap<TyKind, Ty>,
}

impl Default for TypeCache {
  fn default() -> Self { Self::new() }
}

impl TypeCache {
  /// Construct a new cache with the primitive types pre-interned at their
  /// fixed ids.
  #[must_use] pub fn new() -> Self {
    let mut cache = Self { kinds: IdxVec::new(), intern: HashMap::new() };
    for kind in [TyKind::Invalid, TyKind::Bool, TyKind::Void, TyKind::Inferred] {
      let ty = cache.kinds.push(kind.clone());
      cache.intern.insert(kind, ty);
    }
    debug_assert!(cache.kinds.len() == 4);
    cache
  }

  fn mk(&mut self, kind: TyKind) -> Ty {
    if let Some(&ty) = self.intern.get(&kind) { return ty }
    let ty = self.kinds.push(kind.clone());
    self.intern.insert(kind, ty);
    ty
  }

  /// The invalid type.
  #[must_use] pub fn invalid(&self) -> Ty { Ty::INVALID }
  /// The boolean type.
  #[must_use] pub fn bool(&self) -> Ty { Ty::BOOL }
  /// The void type.
  #[must_use] pub fn void(&self) -> Ty { Ty::VOID }
  /// The inferred-type placeholder.
  #[must_use] pub fn inferred(&self) -> Ty { Ty::INFERRED }

  /// The integer type with the given width and signedness.
  pub fn int(&mut self, bits: u32, signed: bool) -> Ty {
    self.mk(TyKind::Int { bits, signed })
  }

  /// The pointer type to `pointee` with the given mutability.
  pub fn pointer(&mut self, pointee: Ty, mutable: bool) -> Ty {
    self.mk(TyKind::Pointer { pointee, mutable })
  }

  /// The structure type with the given ordered field types.
  pub fn struct_of(&mut self, fields: Box<[Ty]>) -> Ty {
    self.mk(TyKind::Struct(fields))
  }

  /// The function type with the given return and parameter types.
  pub fn function(&mut self, ret: Ty, params: Box<[Ty]>) -> Ty {
    self.mk(TyKind::Function { ret, params })
  }

  /// The structure of the given type.
  #[must_use] pub fn kind(&self, ty: Ty) -> &TyKind { &self.kinds[ty] }

  /// Is this the invalid type?
  #[must_use] pub fn is_invalid(&self, ty: Ty) -> bool { ty == Ty::INVALID }

  /// The integer width and signedness, if `ty` is an integer type.
  #[must_use] pub fn as_int(&self, ty: Ty) -> Option<(u32, bool)> {
    match *self.kind(ty) {
      TyKind::Int { bits, signed } => Some((bits, signed)),
      _ => None,
    }
  }

  /// The pointee type and mutability, if `ty` is a pointer type.
  #[must_use] pub fn as_pointer(&self, ty: Ty) -> Option<(Ty, bool)> {
    match *self.kind(ty) {
      TyKind::Pointer { pointee, mutable } => Some((pointee, mutable)),
      _ => None,
    }
  }

  /// The field types, if `ty` is a structure type.
  #[must_use] pub fn as_struct(&self, ty: Ty) -> Option<&[Ty]> {
    match self.kind(ty) {
      TyKind::Struct(fields) => Some(fields),
      _ => None,
    }
  }

  /// Strip any number of pointer levels off `ty`.
  #[must_use] pub fn base(&self, ty: Ty) -> Ty {
    match *self.kind(ty) {
      TyKind::Pointer { pointee, .. } => self.base(pointee),
      _ => ty,
    }
  }

  /// The size of a value of this type in bytes.
  ///
  /// # Panics
  /// Asking for the size of an unsized type (invalid, void, inferred,
  /// function) is a usage error and panics.
  #[must_use] pub fn size_in_bytes(&self, ty: Ty) -> u32 {
    match *self.kind(ty) {
      TyKind::Bool => 1,
      TyKind::Int { bits, .. } => {
        assert!(bits % 8 == 0, "integer width is not a multiple of 8");
        bits / 8
      }
      TyKind::Pointer { .. } => 8,
      TyKind::Struct(ref fields) => fields.iter().map(|&f| self.size_in_bytes(f)).sum(),
      TyKind::Invalid | TyKind::Void | TyKind::Inferred | TyKind::Function { .. } =>
        panic!("type '{}' has no size", self.display(ty)),
    }
  }

  /// A displayable form of `ty`.
  #[must_use] pub fn display(&self, ty: Ty) -> TyDisplay<'_> { TyDisplay { cache: self, ty } }
}

/// A [`Ty`] paired with its cache for rendering. See [`TypeCache::display`].
#[derive(Clone, Copy)]
pub struct TyDisplay<'a> {
  cache: &'a TypeCache,
  ty: Ty,
}

impl fmt::Display for TyDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self.cache.kind(self.ty) {
      TyKind::Invalid => write!(f, "invalid"),
      TyKind::Bool => write!(f, "bool"),
      TyKind::Void => write!(f, "void"),
      TyKind::Inferred => write!(f, "inferred"),
      TyKind::Int { bits, signed } => write!(f, "{}{bits}", if signed { 'i' } else { 'u' }),
      TyKind::Pointer { pointee, mutable } =>
        write!(f, "*{}{}", if mutable { "mut " } else { "" }, self.cache.display(pointee)),
      TyKind::Struct(ref fields) =>
        write!(f, "{{{}}}", fields.iter().map(|&t| self.cache.display(t)).format(", ")),
      TyKind::Function { ret, ref params } => write!(f, "fn({}): {}",
        params.iter().map(|&t| self.cache.display(t)).format(", "), self.cache.display(ret)),
    }
  }
}
