//! The JS/TS/JSX syntax tree and symbol model.
//!
//! Nodes live in per-file arena `Vec`s inside [`JsAst`]; statements and
//! expressions are addressed by 32-bit ids. Every identifier-bearing node
//! stores a [`Ref`], not a name string. Cross-file references go through the
//! union-find `link` field on [`Symbol`].

use crate::interner::Atom;
use crate::source::Loc;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Integer identity for a symbol: `(source_index, inner_index)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref {
  pub source: u32,
  pub inner: u32,
}

impl Ref {
  pub fn new(source: u32, inner: u32) -> Ref {
    Ref { source, inner }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
  /// A reference that resolved to no declaration; keeps its original name.
  Unbound,
  /// `var` and function declarations, hoisted to the enclosing function.
  Hoisted,
  /// `let`, `const`, class declarations, block scoped.
  BlockScoped,
  /// A function argument binding.
  Argument,
  /// The local binding created by an import clause.
  Import,
  /// A class name binding.
  Class,
  /// A label name. Not renamed against identifiers.
  Label,
  /// Synthetic symbols: exports/module/require shims, wrapper refs, temps.
  Synthetic,
  /// TS enum or namespace container binding.
  TsNamespace,
}

/// When an import binds to a CommonJS module, the printed reference becomes
/// `namespace.alias` instead of a renamed identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceAlias {
  pub namespace_ref: Ref,
  pub alias: Atom,
}

#[derive(Clone, Debug)]
pub struct Symbol {
  pub original_name: Atom,
  pub kind: SymbolKind,
  /// Union-find link. Following it yields the canonical symbol after
  /// import/export binding. Chains are acyclic.
  pub link: Option<Ref>,
  /// An estimate is enough: used to order the minifier's name handout.
  pub use_count_estimate: u32,
  pub must_not_be_renamed: bool,
  pub namespace_alias: Option<NamespaceAlias>,
  /// Assigned by the linker during chunk assignment.
  pub chunk_index: Option<u32>,
}

impl Symbol {
  pub fn new(original_name: Atom, kind: SymbolKind) -> Symbol {
    Symbol {
      original_name,
      kind,
      link: None,
      use_count_estimate: 0,
      must_not_be_renamed: false,
      namespace_alias: None,
      chunk_index: None,
    }
  }
}

/// Per-source-index symbol tables. Symbols are union-find nodes; `follow`
/// walks `link` to a root, compressing along the way.
#[derive(Debug, Default)]
pub struct SymbolMap {
  pub tables: Vec<Vec<Symbol>>,
}

impl SymbolMap {
  pub fn new(source_count: usize) -> SymbolMap {
    SymbolMap {
      tables: vec![Vec::new(); source_count],
    }
  }

  pub fn get(&self, r: Ref) -> &Symbol {
    &self.tables[r.source as usize][r.inner as usize]
  }

  pub fn get_mut(&mut self, r: Ref) -> &mut Symbol {
    &mut self.tables[r.source as usize][r.inner as usize]
  }

  /// Walk `link` to the root, compressing the path.
  pub fn follow(&mut self, r: Ref) -> Ref {
    let link = match self.get(r).link {
      Some(link) => link,
      None => return r,
    };
    let root = self.follow(link);
    if root != link {
      self.get_mut(r).link = Some(root);
    }
    root
  }

  /// Read-only follow for stages that must not mutate symbols (the printer).
  pub fn follow_readonly(&self, mut r: Ref) -> Ref {
    while let Some(link) = self.get(r).link {
      r = link;
    }
    r
  }

  /// Merge `old` into `new`: all references to `old` now resolve to `new`.
  pub fn merge(&mut self, old: Ref, new: Ref) -> Ref {
    let old_root = self.follow(old);
    let new_root = self.follow(new);
    if old_root == new_root {
      return new_root;
    }
    let count = self.get(old_root).use_count_estimate;
    self.get_mut(old_root).link = Some(new_root);
    self.get_mut(new_root).use_count_estimate += count;
    new_root
  }
}

// --------------------------------------------------------------------------
// Expressions
// --------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

#[derive(Clone, Debug)]
pub struct Expr {
  pub loc: Loc,
  pub data: EData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
  Pos,
  Neg,
  Not,
  BitNot,
  Void,
  TypeOf,
  Delete,
  PreInc,
  PreDec,
  PostInc,
  PostDec,
}

impl UnOp {
  pub fn is_prefix(self) -> bool {
    !matches!(self, UnOp::PostInc | UnOp::PostDec)
  }

  pub fn text(self) -> &'static str {
    match self {
      UnOp::Pos => "+",
      UnOp::Neg => "-",
      UnOp::Not => "!",
      UnOp::BitNot => "~",
      UnOp::Void => "void",
      UnOp::TypeOf => "typeof",
      UnOp::Delete => "delete",
      UnOp::PreInc | UnOp::PostInc => "++",
      UnOp::PreDec | UnOp::PostDec => "--",
    }
  }

  pub fn is_keyword(self) -> bool {
    matches!(self, UnOp::Void | UnOp::TypeOf | UnOp::Delete)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
  // Multiplicative and additive
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Pow,
  // Shift
  Shl,
  Shr,
  UShr,
  // Relational
  Lt,
  Le,
  Gt,
  Ge,
  In,
  InstanceOf,
  // Equality
  LooseEq,
  LooseNe,
  StrictEq,
  StrictNe,
  // Bitwise
  BitAnd,
  BitXor,
  BitOr,
  // Logical
  LogicalAnd,
  LogicalOr,
  NullishCoalescing,
  // Sequence
  Comma,
  // Assignment
  Assign,
  AddAssign,
  SubAssign,
  MulAssign,
  DivAssign,
  RemAssign,
  PowAssign,
  ShlAssign,
  ShrAssign,
  UShrAssign,
  BitAndAssign,
  BitXorAssign,
  BitOrAssign,
  LogicalAndAssign,
  LogicalOrAssign,
  NullishAssign,
}

impl BinOp {
  pub fn is_assign(self) -> bool {
    matches!(
      self,
      BinOp::Assign
        | BinOp::AddAssign
        | BinOp::SubAssign
        | BinOp::MulAssign
        | BinOp::DivAssign
        | BinOp::RemAssign
        | BinOp::PowAssign
        | BinOp::ShlAssign
        | BinOp::ShrAssign
        | BinOp::UShrAssign
        | BinOp::BitAndAssign
        | BinOp::BitXorAssign
        | BinOp::BitOrAssign
        | BinOp::LogicalAndAssign
        | BinOp::LogicalOrAssign
        | BinOp::NullishAssign
    )
  }

  pub fn text(self) -> &'static str {
    match self {
      BinOp::Add => "+",
      BinOp::Sub => "-",
      BinOp::Mul => "*",
      BinOp::Div => "/",
      BinOp::Rem => "%",
      BinOp::Pow => "**",
      BinOp::Shl => "<<",
      BinOp::Shr => ">>",
      BinOp::UShr => ">>>",
      BinOp::Lt => "<",
      BinOp::Le => "<=",
      BinOp::Gt => ">",
      BinOp::Ge => ">=",
      BinOp::In => "in",
      BinOp::InstanceOf => "instanceof",
      BinOp::LooseEq => "==",
      BinOp::LooseNe => "!=",
      BinOp::StrictEq => "===",
      BinOp::StrictNe => "!==",
      BinOp::BitAnd => "&",
      BinOp::BitXor => "^",
      BinOp::BitOr => "|",
      BinOp::LogicalAnd => "&&",
      BinOp::LogicalOr => "||",
      BinOp::NullishCoalescing => "??",
      BinOp::Comma => ",",
      BinOp::Assign => "=",
      BinOp::AddAssign => "+=",
      BinOp::SubAssign => "-=",
      BinOp::MulAssign => "*=",
      BinOp::DivAssign => "/=",
      BinOp::RemAssign => "%=",
      BinOp::PowAssign => "**=",
      BinOp::ShlAssign => "<<=",
      BinOp::ShrAssign => ">>=",
      BinOp::UShrAssign => ">>>=",
      BinOp::BitAndAssign => "&=",
      BinOp::BitXorAssign => "^=",
      BinOp::BitOrAssign => "|=",
      BinOp::LogicalAndAssign => "&&=",
      BinOp::LogicalOrAssign => "||=",
      BinOp::NullishAssign => "??=",
    }
  }

  pub fn is_keyword(self) -> bool {
    matches!(self, BinOp::In | BinOp::InstanceOf)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropKind {
  Normal,
  Get,
  Set,
  Spread,
}

#[derive(Clone, Debug)]
pub struct Prop {
  pub kind: PropKind,
  pub is_computed: bool,
  /// Shorthand `{a}` prints the key only.
  pub is_shorthand: bool,
  pub key: ExprId,
  pub value: ExprId,
}

#[derive(Clone, Debug)]
pub struct TemplatePart {
  pub value: ExprId,
  pub raw: Atom,
  pub loc: Loc,
}

#[derive(Clone, Debug)]
pub struct Fn {
  pub name: Option<Ref>,
  pub args: Vec<Arg>,
  pub has_rest_arg: bool,
  pub body: Vec<StmtId>,
  pub is_async: bool,
  pub is_generator: bool,
  pub loc: Loc,
}

#[derive(Clone, Debug)]
pub struct Arg {
  pub binding: Binding,
  pub default: Option<ExprId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassPropKind {
  Method,
  Get,
  Set,
  Field,
  /// `static { ... }`; the body lives in `value` as a function expression.
  StaticBlock,
}

#[derive(Clone, Debug)]
pub struct ClassProp {
  pub kind: ClassPropKind,
  pub is_static: bool,
  pub is_computed: bool,
  /// Private members have a key expression of `EData::PrivateIdent`.
  pub key: ExprId,
  pub value: Option<ExprId>,
  pub loc: Loc,
}

#[derive(Clone, Debug)]
pub struct Class {
  pub name: Option<Ref>,
  pub extends: Option<ExprId>,
  pub props: Vec<ClassProp>,
  pub loc: Loc,
}

#[derive(Clone, Debug)]
pub enum EData {
  /// Error recovery placeholder, and array holes.
  Missing,
  /// Synthesized undefined (lowered chains, defaulted fields); prints as
  /// `void 0`. A source-level `undefined` is an ordinary identifier.
  Undefined,
  Null,
  This,
  SuperE,
  NewTarget,
  ImportMeta,
  Bool(bool),
  Number {
    value: f64,
    /// Original text, kept for non-minified re-printing.
    raw: Option<Atom>,
  },
  BigInt(Atom),
  String(Atom),
  /// Raw regexp text including flags.
  Regex(Atom),
  Template {
    tag: Option<ExprId>,
    head_raw: Atom,
    parts: Vec<TemplatePart>,
  },
  Array {
    items: Vec<ExprId>,
  },
  Object {
    props: Vec<Prop>,
  },
  Ident(Ref),
  /// `#name` appearing as an expression (`#x in obj`).
  PrivateIdent(Atom),
  Dot {
    target: ExprId,
    name: Atom,
    optional: bool,
  },
  Index {
    target: ExprId,
    index: ExprId,
    optional: bool,
  },
  Call {
    target: ExprId,
    args: Vec<ExprId>,
    optional: bool,
    is_pure: bool,
  },
  New {
    target: ExprId,
    args: Vec<ExprId>,
  },
  Unary {
    op: UnOp,
    value: ExprId,
  },
  Binary {
    op: BinOp,
    left: ExprId,
    right: ExprId,
  },
  Cond {
    test: ExprId,
    yes: ExprId,
    no: ExprId,
  },
  Arrow {
    args: Vec<Arg>,
    has_rest_arg: bool,
    /// A single-expression body prints without braces.
    prefer_expr: bool,
    body: Vec<StmtId>,
    is_async: bool,
  },
  Function(Fn),
  Class(Class),
  Spread(ExprId),
  Await(ExprId),
  Yield {
    value: Option<ExprId>,
    is_star: bool,
  },
  /// `import(...)`; the specifier lives in the import record. A
  /// non-string-literal argument has no record and is kept verbatim.
  DynamicImport {
    record: Option<u32>,
    expr: Option<ExprId>,
  },
  /// `require(...)` once the reference is known to hit the free `require`.
  Require {
    record: u32,
  },
  RequireResolve {
    record: u32,
  },
}

// --------------------------------------------------------------------------
// Bindings (destructuring targets)
// --------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum Binding {
  /// Error recovery placeholder and elided array slots.
  Missing,
  Ident(Ref),
  Array {
    items: Vec<ArrayBindingItem>,
    has_rest: bool,
  },
  Object {
    props: Vec<ObjectBindingProp>,
    rest: Option<Box<Binding>>,
  },
}

#[derive(Clone, Debug)]
pub struct ArrayBindingItem {
  pub binding: Binding,
  pub default: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct ObjectBindingProp {
  pub is_computed: bool,
  pub key: ExprId,
  pub binding: Binding,
  pub default: Option<ExprId>,
}

// --------------------------------------------------------------------------
// Statements
// --------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalKind {
  Var,
  Let,
  Const,
}

impl LocalKind {
  pub fn text(self) -> &'static str {
    match self {
      LocalKind::Var => "var",
      LocalKind::Let => "let",
      LocalKind::Const => "const",
    }
  }
}

#[derive(Clone, Debug)]
pub struct Decl {
  pub binding: Binding,
  pub init: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct Catch {
  pub loc: Loc,
  pub binding: Option<Binding>,
  pub body: Vec<StmtId>,
}

#[derive(Clone, Debug)]
pub struct Case {
  pub test: Option<ExprId>,
  pub body: Vec<StmtId>,
}

/// `import {x as y}` / `export {x as y}` clause entry.
#[derive(Clone, Debug)]
pub struct ClauseItem {
  /// The name on the other side of the module boundary.
  pub alias: Atom,
  pub alias_loc: Loc,
  pub name_ref: Ref,
}

#[derive(Clone, Debug)]
pub enum DefaultValue {
  Expr(ExprId),
  Fn(Fn),
  Class(Class),
}

#[derive(Clone, Debug)]
pub enum SData {
  Empty,
  Debugger,
  Directive(Atom),
  Expr(ExprId),
  Block(Vec<StmtId>),
  Local {
    kind: LocalKind,
    decls: Vec<Decl>,
    is_export: bool,
  },
  Fn {
    func: Fn,
    is_export: bool,
  },
  Class {
    class: Class,
    is_export: bool,
  },
  If {
    test: ExprId,
    yes: StmtId,
    no: Option<StmtId>,
  },
  For {
    init: Option<StmtId>,
    test: Option<ExprId>,
    update: Option<ExprId>,
    body: StmtId,
  },
  ForIn {
    init: StmtId,
    value: ExprId,
    body: StmtId,
  },
  ForOf {
    is_await: bool,
    init: StmtId,
    value: ExprId,
    body: StmtId,
  },
  While {
    test: ExprId,
    body: StmtId,
  },
  DoWhile {
    body: StmtId,
    test: ExprId,
  },
  Try {
    body: Vec<StmtId>,
    catch: Option<Catch>,
    finally: Option<Vec<StmtId>>,
  },
  Switch {
    test: ExprId,
    cases: Vec<Case>,
  },
  Return(Option<ExprId>),
  Throw(ExprId),
  Break(Option<Atom>),
  Continue(Option<Atom>),
  Label {
    name: Atom,
    stmt: StmtId,
  },
  Import {
    record: u32,
    /// The user's `* as ns` binding, or a synthetic per-statement namespace
    /// symbol used for CJS interop printing.
    namespace_ref: Ref,
    default_ref: Option<Ref>,
    items: Vec<ClauseItem>,
    is_star: bool,
  },
  ExportNamed {
    items: Vec<ClauseItem>,
    record: Option<u32>,
  },
  ExportStar {
    record: u32,
    /// `export * as ns from` binds the namespace to a local symbol.
    alias: Option<(Atom, Ref)>,
  },
  ExportDefault {
    default_ref: Ref,
    value: DefaultValue,
  },
}

#[derive(Clone, Debug)]
pub struct Stmt {
  pub loc: Loc,
  pub data: SData,
}

// --------------------------------------------------------------------------
// Module-level structures
// --------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExportsKind {
  /// No imports or exports; statements can be hoisted freely.
  #[default]
  None,
  /// Uses `exports` / `module` / top-level `require`.
  Cjs,
  /// Has ESM import/export syntax.
  Esm,
}

/// A named `import {alias}` binding waiting to be wired to an export.
#[derive(Clone, Debug)]
pub struct NamedImport {
  pub alias: Atom,
  pub alias_loc: Loc,
  pub import_record_index: u32,
  /// True when the import is itself re-exported (`export {x} from`).
  pub is_exported: bool,
}

#[derive(Clone, Debug)]
pub struct NamedExport {
  pub target: Ref,
  pub alias_loc: Loc,
}

/// A contiguous group of top-level statements with a shared liveness fate.
/// Parts are the unit of tree-shaking.
#[derive(Clone, Debug, Default)]
pub struct Part {
  pub stmts: Vec<StmtId>,
  /// Symbols declared at module scope by this part.
  pub declared_symbols: Vec<Ref>,
  /// Occurrence refs used by this part; resolve through union-find.
  pub symbol_uses: FxHashMap<Ref, u32>,
  pub import_record_indices: Vec<u32>,
  /// False when the part has observable side effects and must be kept.
  pub can_be_removed_if_unused: bool,
}

/// The parsed module: arenas, parts, imports/exports, and special refs.
#[derive(Debug, Default)]
pub struct JsAst {
  pub exprs: Vec<Expr>,
  pub stmts: Vec<Stmt>,
  pub parts: Vec<Part>,
  pub import_records: Vec<crate::graph::ImportRecord>,

  pub named_imports: IndexMap<Ref, NamedImport>,
  pub named_exports: IndexMap<Atom, NamedExport>,
  /// Import record indices of `export * from` statements.
  pub export_star_records: Vec<u32>,
  pub top_level_symbols_to_parts: FxHashMap<Ref, Vec<u32>>,

  pub exports_kind: ExportsKind,
  pub uses_exports_ref: bool,
  pub uses_module_ref: bool,
  pub has_top_level_await: bool,
  /// Direct `eval` forces every symbol in the file to keep its name.
  pub has_direct_eval: bool,
  /// Set for synthesized modules (`json`, `text`, ...) whose only statement
  /// is a default export of a constant.
  pub has_lazy_export: bool,

  /// Synthetic refs. Always present; whether they are used depends on flags.
  pub exports_ref: Ref,
  pub module_ref: Ref,
  pub wrapper_ref: Ref,

  pub directive: Option<Atom>,
}

impl JsAst {
  pub fn expr(&self, id: ExprId) -> &Expr {
    &self.exprs[id.0 as usize]
  }

  pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
    &mut self.exprs[id.0 as usize]
  }

  pub fn stmt(&self, id: StmtId) -> &Stmt {
    &self.stmts[id.0 as usize]
  }

  pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
    &mut self.stmts[id.0 as usize]
  }

  pub fn alloc_expr(&mut self, loc: Loc, data: EData) -> ExprId {
    let id = ExprId(self.exprs.len() as u32);
    self.exprs.push(Expr { loc, data });
    id
  }

  pub fn alloc_stmt(&mut self, loc: Loc, data: SData) -> StmtId {
    let id = StmtId(self.stmts.len() as u32);
    self.stmts.push(Stmt { loc, data });
    id
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_union_find_follow_and_merge() {
    let mut map = SymbolMap::new(2);
    map.tables[0].push(Symbol::new(Atom::new("a"), SymbolKind::Hoisted));
    map.tables[0].push(Symbol::new(Atom::new("b"), SymbolKind::Hoisted));
    map.tables[1].push(Symbol::new(Atom::new("c"), SymbolKind::Hoisted));

    let a = Ref::new(0, 0);
    let b = Ref::new(0, 1);
    let c = Ref::new(1, 0);

    assert_eq!(map.follow(a), a);
    map.merge(a, b);
    assert_eq!(map.follow(a), b);
    map.merge(b, c);
    assert_eq!(map.follow(a), c);
    assert_eq!(map.follow_readonly(a), c);
    // Merging twice is a no-op
    assert_eq!(map.merge(a, c), c);
  }

  #[test]
  fn test_use_counts_accumulate_across_merge() {
    let mut map = SymbolMap::new(1);
    map.tables[0].push(Symbol::new(Atom::new("a"), SymbolKind::Hoisted));
    map.tables[0].push(Symbol::new(Atom::new("b"), SymbolKind::Hoisted));
    let a = Ref::new(0, 0);
    let b = Ref::new(0, 1);
    map.get_mut(a).use_count_estimate = 3;
    map.get_mut(b).use_count_estimate = 2;
    map.merge(a, b);
    let root = map.follow(a);
    assert_eq!(map.get(root).use_count_estimate, 5);
  }

  #[test]
  fn test_arena_allocation() {
    let mut ast = JsAst::default();
    let e = ast.alloc_expr(Loc(0), EData::Bool(true));
    let s = ast.alloc_stmt(Loc(0), SData::Expr(e));
    assert!(matches!(ast.expr(e).data, EData::Bool(true)));
    assert!(matches!(ast.stmt(s).data, SData::Expr(_)));
  }
}
