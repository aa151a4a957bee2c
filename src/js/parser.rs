//! Recursive-descent parser for JS/TS/JSX.
//!
//! Produces a [`JsAst`] plus a per-file symbol table, records every
//! import/require, and applies file-local lowerings driven by the compat
//! table. References are resolved after the whole file has been parsed:
//! every identifier occurrence gets its own symbol, and resolution links it
//! to the declaration through the union-find `link` field. Forward
//! references and `var` hoisting fall out of doing this at end of file.

mod expr;
mod jsx;
mod lower;
mod typescript;

use crate::compat::{feature, feature_name, FeatureSet};
use crate::graph::{ImportKind, ImportRecord};
use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::lexer::{is_identifier, Lexer, T};
use crate::logger::Log;
use crate::options::{Define, JsxMode, Loader};
use crate::source::{Loc, Range, Source};
use rustc_hash::{FxHashMap, FxHashSet};

/// Per-file parse configuration, derived from the build options.
#[derive(Debug, Clone)]
pub struct ParseOptions {
  pub unsupported: FeatureSet,
  pub defines: Vec<Define>,
  pub pure_calls: Vec<Vec<Atom>>,
  pub jsx: JsxMode,
  pub jsx_factory: Vec<Atom>,
  pub jsx_fragment: Vec<Atom>,
  pub jsx_import_source: String,
}

impl Default for ParseOptions {
  fn default() -> ParseOptions {
    ParseOptions {
      unsupported: 0,
      defines: Vec::new(),
      pure_calls: Vec::new(),
      jsx: JsxMode::Transform,
      jsx_factory: vec![Atom::new("React"), Atom::new("createElement")],
      jsx_fragment: vec![Atom::new("React"), Atom::new("Fragment")],
      jsx_import_source: "react".to_string(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
  Module,
  Function,
  Block,
  Catch,
  TsNamespace,
}

struct Scope {
  parent: Option<usize>,
  kind: ScopeKind,
  members: FxHashMap<Atom, Ref>,
}

struct PendingRef {
  scope: usize,
  atom: Atom,
  occurrence: Ref,
}

struct RequireCandidate {
  expr: ExprId,
  target: Ref,
  specifier: Atom,
  range: Range,
  kind: ImportKind,
}

/// The result of parsing one file.
pub struct ParseResult {
  pub ast: JsAst,
  pub symbols: Vec<Symbol>,
}

pub struct Parser<'a> {
  lexer: Lexer<'a>,
  source: &'a Source,
  log: &'a Log,
  opts: &'a ParseOptions,
  loader: Loader,
  ts: bool,
  jsx_enabled: bool,

  ast: JsAst,
  symbols: Vec<Symbol>,
  scopes: Vec<Scope>,
  scope: usize,

  pending_refs: Vec<PendingRef>,
  cancelled_refs: FxHashSet<Ref>,
  require_candidates: Vec<RequireCandidate>,
  unbound: FxHashMap<Atom, Ref>,

  // Current part accumulation (top level only)
  cur_uses: FxHashMap<Ref, u32>,
  cur_decls: Vec<Ref>,
  cur_records: Vec<u32>,

  // Context flags
  in_async: bool,
  in_generator: bool,
  allow_in: bool,
  fn_depth: u32,

  // Temps needing `var` declarations, one list per enclosing function scope;
  // index 0 is the module level.
  temp_stack: Vec<Vec<Ref>>,
  temp_counter: u32,

  top_level_await: Option<Loc>,
  has_es_module_syntax: bool,
  has_direct_eval: bool,
  ts_overload_marker: bool,

  /// Statements generated by a lowering that must follow the statement being
  /// parsed (static field assignments, enum/namespace initializer calls).
  /// Drained by every statement-list loop.
  pending_stmts: Vec<StmtId>,
  /// When inside a TS namespace body, exported members collect here instead
  /// of in the module's named exports.
  ts_namespace_exports: Option<Vec<Ref>>,

  /// Synthetic import record for runtime helpers, created on first use.
  runtime_record: Option<u32>,
  runtime_imports: FxHashMap<Atom, Ref>,

  /// JSX automatic-runtime import record and helper refs.
  jsx_record: Option<u32>,
  jsx_imports: FxHashMap<Atom, Ref>,
}

/// The specifier the scheduler resolves to the synthetic runtime module.
pub const RUNTIME_SPECIFIER: &str = "<runtime>";

impl<'a> Parser<'a> {
  pub fn new(source: &'a Source, log: &'a Log, opts: &'a ParseOptions) -> Parser<'a> {
    let loader = source.loader;
    let mut parser = Parser {
      lexer: Lexer::new(source, log),
      source,
      log,
      opts,
      loader,
      ts: loader.is_typescript(),
      jsx_enabled: loader.is_jsx_enabled(),
      ast: JsAst::default(),
      symbols: Vec::new(),
      scopes: Vec::new(),
      scope: 0,
      pending_refs: Vec::new(),
      cancelled_refs: FxHashSet::default(),
      require_candidates: Vec::new(),
      unbound: FxHashMap::default(),
      cur_uses: FxHashMap::default(),
      cur_decls: Vec::new(),
      cur_records: Vec::new(),
      in_async: false,
      in_generator: false,
      allow_in: true,
      fn_depth: 0,
      temp_stack: vec![Vec::new()],
      temp_counter: 0,
      top_level_await: None,
      has_es_module_syntax: false,
      has_direct_eval: false,
      ts_overload_marker: false,
      pending_stmts: Vec::new(),
      ts_namespace_exports: None,
      runtime_record: None,
      runtime_imports: FxHashMap::default(),
      jsx_record: None,
      jsx_imports: FxHashMap::default(),
    };
    parser.scopes.push(Scope {
      parent: None,
      kind: ScopeKind::Module,
      members: FxHashMap::default(),
    });

    // Synthetic refs exist for every file; the linker decides whether they
    // are used.
    let stem = module_stem(source);
    parser.ast.exports_ref = parser.new_symbol(Atom::new("exports"), SymbolKind::Synthetic);
    parser.ast.module_ref = parser.new_symbol(Atom::new("module"), SymbolKind::Synthetic);
    parser.ast.wrapper_ref =
      parser.new_symbol(Atom::new(&format!("require_{}", stem)), SymbolKind::Synthetic);
    parser
  }

  pub fn parse(mut self) -> ParseResult {
    // A leading "use strict" (or any directive prologue entry) is recorded
    // and not treated as an expression statement.
    if self.lexer.token.kind == T::Str && !self.ts {
      let value = self.lexer.token.value;
      if value.as_str() == "use strict" {
        let loc = Loc(self.lexer.token.start);
        self.lexer.next();
        self.semicolon();
        self.ast.directive = Some(value);
        let stmt = self.ast.alloc_stmt(loc, SData::Directive(value));
        self.end_part(vec![stmt], true);
      }
    }

    while self.lexer.token.kind != T::Eof {
      let start = self.lexer.token.start;
      let stmt = self.parse_stmt();
      let mut stmts = vec![stmt];
      stmts.append(&mut self.pending_stmts);
      let removable = stmts.iter().all(|&s| self.stmt_can_be_removed_if_unused(s));
      self.end_part(stmts, removable);
      // Guarantee forward progress on malformed input
      if self.lexer.token.start == start && self.lexer.token.kind != T::Eof {
        self.lexer.next();
      }
    }

    self.finalize()
  }

  // ------------------------------------------------------------------
  // Symbols and scopes
  // ------------------------------------------------------------------

  fn new_symbol(&mut self, name: Atom, kind: SymbolKind) -> Ref {
    let r = Ref::new(self.source.index, self.symbols.len() as u32);
    self.symbols.push(Symbol::new(name, kind));
    r
  }

  fn push_scope(&mut self, kind: ScopeKind) {
    self.scopes.push(Scope {
      parent: Some(self.scope),
      kind,
      members: FxHashMap::default(),
    });
    self.scope = self.scopes.len() - 1;
    if kind == ScopeKind::Function {
      self.fn_depth += 1;
      self.temp_stack.push(Vec::new());
    }
  }

  /// Pop a function scope, returning temp refs that need a `var` statement.
  fn pop_fn_scope(&mut self) -> Vec<Ref> {
    let temps = self.temp_stack.pop().unwrap_or_default();
    self.fn_depth -= 1;
    self.pop_scope();
    temps
  }

  fn pop_scope(&mut self) {
    self.scope = self.scopes[self.scope].parent.expect("cannot pop the module scope");
  }

  /// Declare a binding, respecting `var`/function hoisting. Returns the
  /// symbol that now owns the name in the target scope.
  fn declare(&mut self, kind: SymbolKind, name: Atom, loc: Loc) -> Ref {
    let target = match kind {
      SymbolKind::Hoisted => {
        let mut s = self.scope;
        while !matches!(
          self.scopes[s].kind,
          ScopeKind::Module | ScopeKind::Function | ScopeKind::TsNamespace
        ) {
          s = self.scopes[s].parent.expect("scope chain ends at module");
        }
        s
      }
      _ => self.scope,
    };

    if let Some(&existing) = self.scopes[target].members.get(&name) {
      let existing_kind = self.symbols[existing.inner as usize].kind;
      match (existing_kind, kind) {
        // var/function redeclaration merges
        (SymbolKind::Hoisted, SymbolKind::Hoisted)
        | (SymbolKind::Argument, SymbolKind::Hoisted)
        | (SymbolKind::Hoisted, SymbolKind::Argument)
        | (SymbolKind::TsNamespace, SymbolKind::TsNamespace) => return existing,
        _ => {
          self.log.add_error(
            Some(self.source),
            Range::new(loc.0, loc.0 + name.as_str().len() as u32),
            format!("The symbol {:?} has already been declared", name.as_str()),
          );
          return existing;
        }
      }
    }

    let r = self.new_symbol(name, kind);
    self.scopes[target].members.insert(name, r);
    if target == 0 {
      self.cur_decls.push(r);
    }
    r
  }

  /// Record an identifier reference. Resolution happens after the file has
  /// been fully parsed so forward references work.
  fn ref_symbol(&mut self, atom: Atom) -> Ref {
    let occurrence = self.new_symbol(atom, SymbolKind::Unbound);
    self.symbols[occurrence.inner as usize].use_count_estimate = 1;
    self.pending_refs.push(PendingRef {
      scope: self.scope,
      atom,
      occurrence,
    });
    *self.cur_uses.entry(occurrence).or_insert(0) += 1;
    occurrence
  }

  fn cancel_ref(&mut self, r: Ref) {
    self.cancelled_refs.insert(r);
    if let Some(count) = self.cur_uses.get_mut(&r) {
      *count = count.saturating_sub(1);
      if *count == 0 {
        self.cur_uses.remove(&r);
      }
    }
    self.symbols[r.inner as usize].use_count_estimate = 0;
  }

  fn lookup(&self, mut scope: usize, atom: Atom) -> Option<Ref> {
    loop {
      if let Some(&r) = self.scopes[scope].members.get(&atom) {
        return Some(r);
      }
      scope = self.scopes[scope].parent?;
    }
  }

  /// A fresh temporary, unique within the file and collision-checked against
  /// enclosing declarations. Declared as `var` in the innermost function.
  fn temp_ref(&mut self) -> Ref {
    let name = loop {
      let name = temp_name(self.temp_counter);
      self.temp_counter += 1;
      let atom = Atom::new(&name);
      if self.lookup(self.scope, atom).is_none() {
        break atom;
      }
    };
    let r = self.new_symbol(name, SymbolKind::Synthetic);
    self.temp_stack.last_mut().unwrap().push(r);
    if self.temp_stack.len() == 1 {
      // Module-level temp: counts as a top-level declaration
      self.cur_decls.push(r);
      self.scopes[0].members.insert(name, r);
    } else {
      self.scopes[self.scope].members.insert(name, r);
    }
    r
  }

  /// Use a runtime helper, e.g. `__spreadValues`. Creates the synthetic
  /// import record on first use so the helper binds like a normal import.
  fn runtime_ref(&mut self, name: &str) -> Ref {
    let atom = Atom::new(name);
    if let Some(&r) = self.runtime_imports.get(&atom) {
      *self.cur_uses.entry(r).or_insert(0) += 1;
      self.symbols[r.inner as usize].use_count_estimate += 1;
      return r;
    }
    let record = match self.runtime_record {
      Some(record) => record,
      None => {
        let record = self.add_import_record(ImportKind::Stmt, Atom::new(RUNTIME_SPECIFIER), Range::default());
        self.ast.import_records[record as usize].is_internal = true;
        self.runtime_record = Some(record);
        record
      }
    };
    let r = self.new_symbol(atom, SymbolKind::Import);
    self.ast.named_imports.insert(
      r,
      NamedImport {
        alias: atom,
        alias_loc: Loc(0),
        import_record_index: record,
        is_exported: false,
      },
    );
    self.runtime_imports.insert(atom, r);
    self.symbols[r.inner as usize].use_count_estimate = 1;
    *self.cur_uses.entry(r).or_insert(0) += 1;
    r
  }

  fn add_import_record(&mut self, kind: ImportKind, specifier: Atom, range: Range) -> u32 {
    let index = self.ast.import_records.len() as u32;
    self.ast.import_records.push(ImportRecord {
      kind,
      specifier,
      range,
      source_index: None,
      is_external: false,
      is_internal: false,
    });
    self.cur_records.push(index);
    index
  }

  // ------------------------------------------------------------------
  // Token helpers
  // ------------------------------------------------------------------

  fn loc(&self) -> Loc {
    Loc(self.lexer.token.start)
  }

  fn eat(&mut self, kind: T) -> bool {
    if self.lexer.token.kind == kind {
      self.lexer.next();
      true
    } else {
      false
    }
  }

  fn expect(&mut self, kind: T, what: &str) {
    if self.lexer.token.kind == kind {
      self.lexer.next();
    } else {
      let range = self.lexer.token.range();
      self
        .log
        .add_error(Some(self.source), range, format!("Expected {}", what));
    }
  }

  /// Automatic semicolon insertion: a `;` is implied before `}`, at EOF, and
  /// after a newline.
  fn semicolon(&mut self) {
    match self.lexer.token.kind {
      T::Semicolon => self.lexer.next(),
      T::CloseBrace | T::Eof => {}
      _ if self.lexer.token.newline_before => {}
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected \";\"".to_string());
      }
    }
  }

  fn is_contextual(&self, word: &str) -> bool {
    self.lexer.token.kind == T::Ident && self.lexer.token.value.as_str() == word
  }

  fn unsupported(&self, bit: u64) -> bool {
    self.opts.unsupported & bit != 0
  }

  fn feature_error(&mut self, range: Range, bit: u64) {
    self.log.add_error(
      Some(self.source),
      range,
      format!("Transforming {} to the configured target environment is not supported yet", feature_name(bit)),
    );
  }

  // ------------------------------------------------------------------
  // Statements
  // ------------------------------------------------------------------

  fn parse_stmt(&mut self) -> StmtId {
    let loc = self.loc();
    match self.lexer.token.kind {
      T::Semicolon => {
        self.lexer.next();
        self.ast.alloc_stmt(loc, SData::Empty)
      }
      T::OpenBrace => {
        self.push_scope(ScopeKind::Block);
        let stmts = self.parse_block();
        self.pop_scope();
        self.ast.alloc_stmt(loc, SData::Block(stmts))
      }
      T::Debugger => {
        self.lexer.next();
        self.semicolon();
        self.ast.alloc_stmt(loc, SData::Debugger)
      }
      T::Var => self.parse_local(LocalKind::Var, false),
      T::Const => {
        if self.ts && self.peek_is_enum_keyword() {
          // `const enum` is lowered like a regular enum
          self.lexer.next();
          return self.parse_ts_enum(false);
        }
        self.parse_local(LocalKind::Const, false)
      }
      T::Function => self.parse_fn_stmt(false, false),
      T::Class => self.parse_class_stmt(false),
      T::If => self.parse_if(),
      T::For => self.parse_for(),
      T::While => {
        self.lexer.next();
        self.expect(T::OpenParen, "\"(\"");
        let test = self.parse_expr(expr::Level::Lowest);
        self.expect(T::CloseParen, "\")\"");
        let body = self.parse_stmt();
        self.ast.alloc_stmt(loc, SData::While { test, body })
      }
      T::Do => {
        self.lexer.next();
        let body = self.parse_stmt();
        self.expect(T::While, "\"while\"");
        self.expect(T::OpenParen, "\"(\"");
        let test = self.parse_expr(expr::Level::Lowest);
        self.expect(T::CloseParen, "\")\"");
        // The semicolon after do-while is optional
        self.eat(T::Semicolon);
        self.ast.alloc_stmt(loc, SData::DoWhile { body, test })
      }
      T::Try => self.parse_try(),
      T::Switch => self.parse_switch(),
      T::Return => {
        self.lexer.next();
        let value = if matches!(self.lexer.token.kind, T::Semicolon | T::CloseBrace | T::Eof)
          || self.lexer.token.newline_before
        {
          None
        } else {
          Some(self.parse_expr(expr::Level::Lowest))
        };
        self.semicolon();
        self.ast.alloc_stmt(loc, SData::Return(value))
      }
      T::Throw => {
        self.lexer.next();
        if self.lexer.token.newline_before {
          let range = self.lexer.token.range();
          self
            .log
            .add_error(Some(self.source), range, "Unexpected newline after \"throw\"".to_string());
        }
        let value = self.parse_expr(expr::Level::Lowest);
        self.semicolon();
        self.ast.alloc_stmt(loc, SData::Throw(value))
      }
      T::Break | T::Continue => {
        let is_break = self.lexer.token.kind == T::Break;
        self.lexer.next();
        let label = if self.lexer.token.kind == T::Ident && !self.lexer.token.newline_before {
          let name = self.lexer.token.value;
          self.lexer.next();
          Some(name)
        } else {
          None
        };
        self.semicolon();
        self.ast.alloc_stmt(
          loc,
          if is_break {
            SData::Break(label)
          } else {
            SData::Continue(label)
          },
        )
      }
      T::With => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "\"with\" statements cannot be bundled".to_string());
        self.lexer.next();
        self.expect(T::OpenParen, "\"(\"");
        let _ = self.parse_expr(expr::Level::Lowest);
        self.expect(T::CloseParen, "\")\"");
        let _ = self.parse_stmt();
        self.ast.alloc_stmt(loc, SData::Empty)
      }
      T::Import => self.parse_import_stmt(),
      T::Export => self.parse_export_stmt(),
      T::Enum if self.ts => self.parse_ts_enum(false),
      T::Ident => self.parse_ident_stmt(),
      _ => {
        let value = self.parse_expr(expr::Level::Lowest);
        self.semicolon();
        self.ast.alloc_stmt(loc, SData::Expr(value))
      }
    }
  }

  /// Statements that start with a contextual keyword or a plain identifier:
  /// `let`, `async function`, labels, TS declarations, and expressions.
  fn parse_ident_stmt(&mut self) -> StmtId {
    let loc = self.loc();
    let word = self.lexer.token.value.as_str();

    match word {
      "let" => {
        // `let` is only a declaration when followed by a binding
        if self.next_token_starts_binding() {
          return self.parse_local(LocalKind::Let, false);
        }
      }
      "async" => {
        if self.peek_is_function_keyword() {
          self.lexer.next(); // async
          return self.parse_fn_stmt(false, true);
        }
      }
      "type" if self.ts => {
        if self.peek_is_ident_no_newline() {
          self.skip_ts_type_alias();
          return self.ast.alloc_stmt(loc, SData::Empty);
        }
      }
      "interface" if self.ts => {
        if self.peek_is_ident_no_newline() {
          self.skip_ts_interface();
          return self.ast.alloc_stmt(loc, SData::Empty);
        }
      }
      "namespace" | "module" if self.ts => {
        if self.peek_is_namespace_name() {
          return self.parse_ts_namespace(false);
        }
      }
      "declare" if self.ts => {
        if self.peek_starts_declaration() {
          self.skip_ts_declare();
          return self.ast.alloc_stmt(loc, SData::Empty);
        }
      }
      "abstract" if self.ts => {
        if self.peek_is_class_keyword() {
          self.lexer.next();
          return self.parse_class_stmt(false);
        }
      }
      _ => {}
    }

    // Label?
    let name = self.lexer.token.value;
    if self.peek_is_colon() {
      self.lexer.next();
      self.lexer.next(); // ':'
      let stmt = self.parse_stmt();
      return self.ast.alloc_stmt(loc, SData::Label { name, stmt });
    }

    let value = self.parse_expr(expr::Level::Lowest);
    self.semicolon();
    self.ast.alloc_stmt(loc, SData::Expr(value))
  }

  fn parse_block(&mut self) -> Vec<StmtId> {
    self.expect(T::OpenBrace, "\"{\"");
    let mut stmts = Vec::new();
    while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
      let start = self.lexer.token.start;
      stmts.push(self.parse_stmt());
      stmts.append(&mut self.pending_stmts);
      if self.lexer.token.start == start && self.lexer.token.kind != T::Eof {
        self.lexer.next();
      }
    }
    self.expect(T::CloseBrace, "\"}\"");
    stmts
  }

  fn parse_local(&mut self, kind: LocalKind, is_export: bool) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // var/let/const
    let mut decls = Vec::new();
    loop {
      let binding = self.parse_binding(kind);
      if self.ts && self.lexer.token.kind == T::Exclamation {
        // Definite assignment assertion: `let x!: T`
        self.lexer.next();
      }
      if self.ts && self.lexer.token.kind == T::Colon {
        self.lexer.next();
        self.skip_ts_type();
      }
      let init = if self.eat(T::Equals) {
        Some(self.parse_expr(expr::Level::Comma))
      } else {
        None
      };
      decls.push(Decl { binding, init });
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.semicolon();

    if is_export {
      self.record_decl_exports(&decls);
    }

    let decls = self.lower_object_rest_decls(decls);
    self.ast.alloc_stmt(loc, SData::Local { kind, decls, is_export })
  }

  fn record_decl_exports(&mut self, decls: &[Decl]) {
    let mut refs = Vec::new();
    for decl in decls {
      collect_binding_refs(&decl.binding, &mut refs);
    }
    for r in refs {
      self.record_export_ref(r);
    }
  }

  /// Route an exported binding to the module's named exports, or to the
  /// enclosing TS namespace when inside one.
  fn record_export_ref(&mut self, r: Ref) {
    if let Some(exports) = self.ts_namespace_exports.as_mut() {
      exports.push(r);
      return;
    }
    let name = self.symbols[r.inner as usize].original_name;
    self.add_named_export(name, r, Loc(0));
  }

  /// Register an export name, reporting a duplicate as an error on the
  /// second binding site.
  fn add_named_export(&mut self, alias: Atom, target: Ref, loc: Loc) {
    if self.ast.named_exports.contains_key(&alias) {
      let len = alias.as_str().len().max(1) as u32;
      self.log.add_error(
        Some(self.source),
        Range::new(loc.0, loc.0 + len),
        format!("Multiple exports with the same name {:?}", alias.as_str()),
      );
      return;
    }
    self.ast.named_exports.insert(
      alias,
      NamedExport {
        target,
        alias_loc: loc,
      },
    );
  }

  fn binding_kind(kind: LocalKind) -> SymbolKind {
    match kind {
      LocalKind::Var => SymbolKind::Hoisted,
      LocalKind::Let | LocalKind::Const => SymbolKind::BlockScoped,
    }
  }

  fn parse_binding(&mut self, kind: LocalKind) -> Binding {
    let sym_kind = Self::binding_kind(kind);
    match self.lexer.token.kind {
      T::Ident => {
        let name = self.lexer.token.value;
        let loc = self.loc();
        self.lexer.next();
        Binding::Ident(self.declare(sym_kind, name, loc))
      }
      T::OpenBracket => {
        self.lexer.next();
        let mut items = Vec::new();
        let mut has_rest = false;
        while self.lexer.token.kind != T::CloseBracket && self.lexer.token.kind != T::Eof {
          if self.lexer.token.kind == T::Comma {
            self.lexer.next();
            items.push(ArrayBindingItem {
              binding: Binding::Missing,
              default: None,
            });
            continue;
          }
          if self.eat(T::DotDotDot) {
            has_rest = true;
            let binding = self.parse_binding(kind);
            items.push(ArrayBindingItem { binding, default: None });
            break;
          }
          let binding = self.parse_binding(kind);
          let default = if self.eat(T::Equals) {
            Some(self.parse_expr(expr::Level::Comma))
          } else {
            None
          };
          items.push(ArrayBindingItem { binding, default });
          if !self.eat(T::Comma) {
            break;
          }
        }
        self.expect(T::CloseBracket, "\"]\"");
        Binding::Array { items, has_rest }
      }
      T::OpenBrace => {
        self.lexer.next();
        let mut props = Vec::new();
        let mut rest = None;
        while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
          if self.eat(T::DotDotDot) {
            rest = Some(Box::new(self.parse_binding(kind)));
            break;
          }
          let (key, is_computed, can_shorthand) = self.parse_property_key();
          if can_shorthand && self.lexer.token.kind != T::Colon {
            // Shorthand: `{a}` or `{a = 1}`
            let name = match self.ast.expr(key).data {
              EData::String(name) => name,
              _ => Atom::new(""),
            };
            let loc = self.ast.expr(key).loc;
            let binding = Binding::Ident(self.declare(sym_kind, name, loc));
            let default = if self.eat(T::Equals) {
              Some(self.parse_expr(expr::Level::Comma))
            } else {
              None
            };
            props.push(ObjectBindingProp {
              is_computed: false,
              key,
              binding,
              default,
            });
          } else {
            self.expect(T::Colon, "\":\"");
            let binding = self.parse_binding(kind);
            let default = if self.eat(T::Equals) {
              Some(self.parse_expr(expr::Level::Comma))
            } else {
              None
            };
            props.push(ObjectBindingProp {
              is_computed,
              key,
              binding,
              default,
            });
          }
          if !self.eat(T::Comma) {
            break;
          }
        }
        self.expect(T::CloseBrace, "\"}\"");
        Binding::Object { props, rest }
      }
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected a binding pattern".to_string());
        Binding::Missing
      }
    }
  }

  fn parse_fn_stmt(&mut self, is_export: bool, is_async: bool) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // function
    let is_generator = self.eat(T::Asterisk);
    let name = if self.lexer.token.kind == T::Ident {
      let name = self.lexer.token.value;
      let name_loc = self.loc();
      self.lexer.next();
      Some(self.declare(SymbolKind::Hoisted, name, name_loc))
    } else {
      None
    };

    // TS overload signature: `function f(): void;` with no body
    let func = self.parse_fn_rest(loc, is_async, is_generator);
    if self.ts && self.ts_overload_marker {
      return self.ast.alloc_stmt(loc, SData::Empty);
    }
    let func = Fn { name, ..func };

    if is_export {
      if let Some(name_ref) = func.name {
        self.record_export_ref(name_ref);
      }
    }
    self.ast.alloc_stmt(loc, SData::Fn { func, is_export })
  }

  /// Parse parameters and body. The caller has consumed everything up to the
  /// parameter list (including any name).
  fn parse_fn_rest(&mut self, loc: Loc, is_async: bool, is_generator: bool) -> Fn {
    if is_async && self.unsupported(feature::ASYNC_AWAIT) {
      let range = Range::new(loc.0, loc.0 + 5);
      self.feature_error(range, feature::ASYNC_AWAIT);
    }
    if is_generator && self.unsupported(feature::GENERATOR) {
      let range = Range::new(loc.0, loc.0 + 1);
      self.feature_error(range, feature::GENERATOR);
    }

    self.push_scope(ScopeKind::Function);
    if self.ts && self.lexer.token.kind == T::LessThan {
      self.skip_ts_type_params();
    }
    let (args, has_rest_arg) = self.parse_fn_args();
    if self.ts && self.lexer.token.kind == T::Colon {
      self.lexer.next();
      self.skip_ts_type();
    }

    self.ts_overload_marker = false;
    let (body, temps) = if self.lexer.token.kind == T::OpenBrace {
      let old_async = std::mem::replace(&mut self.in_async, is_async);
      let old_gen = std::mem::replace(&mut self.in_generator, is_generator);
      let body = self.parse_block();
      self.in_async = old_async;
      self.in_generator = old_gen;
      let temps = self.pop_fn_scope();
      (body, temps)
    } else {
      // No body: a TS overload signature
      self.ts_overload_marker = true;
      self.semicolon();
      let temps = self.pop_fn_scope();
      (Vec::new(), temps)
    };
    let body = self.prepend_temp_decls(body, temps);

    Fn {
      name: None,
      args,
      has_rest_arg,
      body,
      is_async,
      is_generator,
      loc,
    }
  }

  fn parse_fn_args(&mut self) -> (Vec<Arg>, bool) {
    self.expect(T::OpenParen, "\"(\"");
    let mut args = Vec::new();
    let mut has_rest = false;
    while self.lexer.token.kind != T::CloseParen && self.lexer.token.kind != T::Eof {
      if self.ts {
        // Skip TS parameter modifiers: public/private/protected/readonly
        while self.lexer.token.kind == T::Ident
          && matches!(
            self.lexer.token.value.as_str(),
            "public" | "private" | "protected" | "readonly" | "override"
          )
          && self.peek_is_binding_start()
        {
          self.lexer.next();
        }
      }
      if self.eat(T::DotDotDot) {
        has_rest = true;
        let binding = self.parse_binding(LocalKind::Var);
        self.mark_args(&binding);
        if self.ts && self.lexer.token.kind == T::Colon {
          self.lexer.next();
          self.skip_ts_type();
        }
        args.push(Arg { binding, default: None });
        break;
      }
      let binding = self.parse_binding(LocalKind::Var);
      self.mark_args(&binding);
      if self.ts && self.lexer.token.kind == T::Question {
        self.lexer.next();
      }
      if self.ts && self.lexer.token.kind == T::Colon {
        self.lexer.next();
        self.skip_ts_type();
      }
      let default = if self.eat(T::Equals) {
        Some(self.parse_expr(expr::Level::Comma))
      } else {
        None
      };
      args.push(Arg { binding, default });
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.expect(T::CloseParen, "\")\"");
    (args, has_rest)
  }

  fn mark_args(&mut self, binding: &Binding) {
    let mut refs = Vec::new();
    collect_binding_refs(binding, &mut refs);
    for r in refs {
      self.symbols[r.inner as usize].kind = SymbolKind::Argument;
    }
  }

  fn prepend_temp_decls(&mut self, mut body: Vec<StmtId>, temps: Vec<Ref>) -> Vec<StmtId> {
    if temps.is_empty() {
      return body;
    }
    let decls = temps
      .into_iter()
      .map(|r| Decl {
        binding: Binding::Ident(r),
        init: None,
      })
      .collect();
    let stmt = self.ast.alloc_stmt(
      Loc(0),
      SData::Local {
        kind: LocalKind::Var,
        decls,
        is_export: false,
      },
    );
    body.insert(0, stmt);
    body
  }

  fn parse_class_stmt(&mut self, is_export: bool) -> StmtId {
    let loc = self.loc();
    let class = self.parse_class(loc, true);
    if is_export {
      if let Some(name_ref) = class.name {
        self.record_export_ref(name_ref);
      }
    }
    let (stmt_data, extra) = self.lower_class(class, is_export);
    let stmt = self.ast.alloc_stmt(loc, stmt_data);
    self.pending_stmts.extend(extra);
    stmt
  }

  fn parse_if(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next();
    self.expect(T::OpenParen, "\"(\"");
    let test = self.parse_expr(expr::Level::Lowest);
    self.expect(T::CloseParen, "\")\"");
    let yes = self.parse_stmt();
    let no = if self.eat(T::Else) {
      Some(self.parse_stmt())
    } else {
      None
    };
    self.ast.alloc_stmt(loc, SData::If { test, yes, no })
  }

  fn parse_for(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // for
    let is_await = if self.is_contextual("await") {
      let range = self.lexer.token.range();
      if self.unsupported(feature::FOR_AWAIT) {
        self.feature_error(range, feature::FOR_AWAIT);
      }
      self.lexer.next();
      true
    } else {
      false
    };
    self.expect(T::OpenParen, "\"(\"");
    self.push_scope(ScopeKind::Block);

    // Parse the init clause with `in` disabled so `for (a in b)` works
    let init: Option<StmtId> = if self.lexer.token.kind == T::Semicolon {
      None
    } else {
      let init_loc = self.loc();
      let old_allow_in = std::mem::replace(&mut self.allow_in, false);
      let stmt = match self.lexer.token.kind {
        T::Var => Some(self.parse_for_local(LocalKind::Var)),
        T::Const => Some(self.parse_for_local(LocalKind::Const)),
        T::Ident if self.lexer.token.value.as_str() == "let" && self.next_token_starts_binding() => {
          Some(self.parse_for_local(LocalKind::Let))
        }
        _ => {
          let value = self.parse_expr(expr::Level::Lowest);
          Some(self.ast.alloc_stmt(init_loc, SData::Expr(value)))
        }
      };
      self.allow_in = old_allow_in;
      stmt
    };

    // for-in / for-of
    if self.lexer.token.kind == T::In {
      self.lexer.next();
      let value = self.parse_expr(expr::Level::Lowest);
      self.expect(T::CloseParen, "\")\"");
      let body = self.parse_stmt();
      self.pop_scope();
      let init = init.unwrap_or_else(|| self.ast.alloc_stmt(loc, SData::Empty));
      return self.ast.alloc_stmt(loc, SData::ForIn { init, value, body });
    }
    if self.is_contextual("of") && init.is_some() {
      self.lexer.next();
      let value = self.parse_expr(expr::Level::Comma);
      self.expect(T::CloseParen, "\")\"");
      let body = self.parse_stmt();
      self.pop_scope();
      let init = init.unwrap();
      return self.ast.alloc_stmt(loc, SData::ForOf { is_await, init, value, body });
    }

    self.expect(T::Semicolon, "\";\"");
    let test = if self.lexer.token.kind == T::Semicolon {
      None
    } else {
      Some(self.parse_expr(expr::Level::Lowest))
    };
    self.expect(T::Semicolon, "\";\"");
    let update = if self.lexer.token.kind == T::CloseParen {
      None
    } else {
      Some(self.parse_expr(expr::Level::Lowest))
    };
    self.expect(T::CloseParen, "\")\"");
    let body = self.parse_stmt();
    self.pop_scope();
    self.ast.alloc_stmt(loc, SData::For { init, test, update, body })
  }

  /// A variable clause inside `for (...)`: no semicolon, single or multi
  /// declaration.
  fn parse_for_local(&mut self, kind: LocalKind) -> StmtId {
    let loc = self.loc();
    self.lexer.next();
    let mut decls = Vec::new();
    loop {
      let binding = self.parse_binding(kind);
      if self.ts && self.lexer.token.kind == T::Colon {
        self.lexer.next();
        self.skip_ts_type();
      }
      let init = if self.eat(T::Equals) {
        Some(self.parse_expr(expr::Level::Comma))
      } else {
        None
      };
      decls.push(Decl { binding, init });
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.ast.alloc_stmt(loc, SData::Local { kind, decls, is_export: false })
  }

  fn parse_try(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next();
    self.push_scope(ScopeKind::Block);
    let body = self.parse_block();
    self.pop_scope();

    let catch = if self.lexer.token.kind == T::Catch {
      let catch_loc = self.loc();
      self.lexer.next();
      self.push_scope(ScopeKind::Catch);
      let binding = if self.eat(T::OpenParen) {
        let binding = self.parse_binding(LocalKind::Let);
        if self.ts && self.lexer.token.kind == T::Colon {
          self.lexer.next();
          self.skip_ts_type();
        }
        self.expect(T::CloseParen, "\")\"");
        Some(binding)
      } else if self.unsupported(feature::OPTIONAL_CATCH_BINDING) {
        // Lower `catch {}` by synthesizing an unused binding
        let r = self.temp_ref_block_scoped();
        Some(Binding::Ident(r))
      } else {
        None
      };
      let body = self.parse_block();
      self.pop_scope();
      Some(Catch {
        loc: catch_loc,
        binding,
        body,
      })
    } else {
      None
    };

    let finally = if self.eat(T::Finally) {
      self.push_scope(ScopeKind::Block);
      let body = self.parse_block();
      self.pop_scope();
      Some(body)
    } else {
      None
    };

    if catch.is_none() && finally.is_none() {
      let range = self.lexer.token.range();
      self
        .log
        .add_error(Some(self.source), range, "Expected \"catch\" or \"finally\"".to_string());
    }

    self.ast.alloc_stmt(loc, SData::Try { body, catch, finally })
  }

  /// A block-scoped synthetic binding for lowered optional catch clauses.
  fn temp_ref_block_scoped(&mut self) -> Ref {
    let name = loop {
      let name = temp_name(self.temp_counter);
      self.temp_counter += 1;
      let atom = Atom::new(&name);
      if self.lookup(self.scope, atom).is_none() {
        break atom;
      }
    };
    let r = self.new_symbol(name, SymbolKind::Synthetic);
    self.scopes[self.scope].members.insert(name, r);
    r
  }

  fn parse_switch(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next();
    self.expect(T::OpenParen, "\"(\"");
    let test = self.parse_expr(expr::Level::Lowest);
    self.expect(T::CloseParen, "\")\"");
    self.expect(T::OpenBrace, "\"{\"");
    self.push_scope(ScopeKind::Block);
    let mut cases = Vec::new();
    while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
      let test = if self.eat(T::Case) {
        let value = self.parse_expr(expr::Level::Lowest);
        Some(value)
      } else {
        self.expect(T::Default, "\"case\" or \"default\"");
        None
      };
      self.expect(T::Colon, "\":\"");
      let mut body = Vec::new();
      while !matches!(self.lexer.token.kind, T::Case | T::Default | T::CloseBrace | T::Eof) {
        let start = self.lexer.token.start;
        body.push(self.parse_stmt());
        body.append(&mut self.pending_stmts);
        if self.lexer.token.start == start && self.lexer.token.kind != T::Eof {
          self.lexer.next();
        }
      }
      cases.push(Case { test, body });
    }
    self.pop_scope();
    self.expect(T::CloseBrace, "\"}\"");
    self.ast.alloc_stmt(loc, SData::Switch { test, cases })
  }

  // ------------------------------------------------------------------
  // Imports and exports
  // ------------------------------------------------------------------

  fn parse_import_stmt(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // import

    // `import(...)` and `import.meta` are expressions
    if matches!(self.lexer.token.kind, T::OpenParen | T::Dot) {
      let value = self.parse_import_expr_suffix(loc);
      let value = self.parse_suffix(value, expr::Level::Lowest);
      self.semicolon();
      return self.ast.alloc_stmt(loc, SData::Expr(value));
    }

    self.has_es_module_syntax = true;

    // `import 'path'` (side-effect only)
    if self.lexer.token.kind == T::Str {
      let specifier = self.lexer.token.value;
      let range = self.lexer.token.range();
      self.lexer.next();
      self.semicolon();
      let record = self.add_import_record(ImportKind::Stmt, specifier, range);
      let ns = self.new_symbol(self.import_namespace_name(specifier), SymbolKind::Import);
      return self.ast.alloc_stmt(
        loc,
        SData::Import {
          record,
          namespace_ref: ns,
          default_ref: None,
          items: Vec::new(),
          is_star: false,
        },
      );
    }

    // TS `import type ... from` is erased
    if self.ts && self.is_contextual("type") && !self.peek_is_from_or_comma() {
      self.skip_ts_import_clause();
      return self.ast.alloc_stmt(loc, SData::Empty);
    }

    let mut default_ref = None;
    let mut items = Vec::new();
    let mut is_star = false;
    let mut star_ref = None;

    if self.lexer.token.kind == T::Ident {
      // Default import
      let name = self.lexer.token.value;
      let name_loc = self.loc();
      self.lexer.next();
      default_ref = Some(self.declare(SymbolKind::Import, name, name_loc));
      if self.eat(T::Comma) {
        // fall through to * or {...}
      } else {
        self.expect_contextual("from");
        return self.finish_import_stmt(loc, default_ref, None, Vec::new(), false);
      }
    }

    if self.eat(T::Asterisk) {
      self.expect_contextual("as");
      let name = self.lexer.token.value;
      let name_loc = self.loc();
      self.expect(T::Ident, "an identifier");
      star_ref = Some(self.declare(SymbolKind::Import, name, name_loc));
      is_star = true;
    } else if self.eat(T::OpenBrace) {
      while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
        // TS: `import {type X}` entries are erased
        if self.ts && self.is_contextual("type") && !self.peek_is_from_or_comma_or_close() {
          self.lexer.next();
          self.lexer.next();
          if self.is_contextual("as") {
            self.lexer.next();
            self.lexer.next();
          }
          if !self.eat(T::Comma) {
            break;
          }
          continue;
        }
        let alias = self.parse_import_export_name();
        let alias_loc = self.loc();
        let (name, name_loc) = if self.is_contextual("as") {
          self.lexer.next();
          let name = self.lexer.token.value;
          let name_loc = self.loc();
          self.expect(T::Ident, "an identifier");
          (name, name_loc)
        } else {
          (alias, alias_loc)
        };
        let r = self.declare(SymbolKind::Import, name, name_loc);
        items.push(ClauseItem {
          alias,
          alias_loc,
          name_ref: r,
        });
        if !self.eat(T::Comma) {
          break;
        }
      }
      self.expect(T::CloseBrace, "\"}\"");
    }

    self.expect_contextual("from");
    self.finish_import_stmt(loc, default_ref, star_ref, items, is_star)
  }

  fn finish_import_stmt(
    &mut self,
    loc: Loc,
    default_ref: Option<Ref>,
    star_ref: Option<Ref>,
    items: Vec<ClauseItem>,
    is_star: bool,
  ) -> StmtId {
    let specifier = self.lexer.token.value;
    let range = self.lexer.token.range();
    self.expect(T::Str, "a module specifier string");
    self.semicolon();

    let record = self.add_import_record(ImportKind::Stmt, specifier, range);
    let namespace_ref = match star_ref {
      Some(r) => r,
      None => self.new_symbol(self.import_namespace_name(specifier), SymbolKind::Import),
    };

    if let Some(d) = default_ref {
      self.ast.named_imports.insert(
        d,
        NamedImport {
          alias: Atom::new("default"),
          alias_loc: loc,
          import_record_index: record,
          is_exported: false,
        },
      );
    }
    if is_star {
      self.ast.named_imports.insert(
        namespace_ref,
        NamedImport {
          alias: Atom::new("*"),
          alias_loc: loc,
          import_record_index: record,
          is_exported: false,
        },
      );
    }
    for item in &items {
      self.ast.named_imports.insert(
        item.name_ref,
        NamedImport {
          alias: item.alias,
          alias_loc: item.alias_loc,
          import_record_index: record,
          is_exported: false,
        },
      );
    }

    self.ast.alloc_stmt(
      loc,
      SData::Import {
        record,
        namespace_ref,
        default_ref,
        items,
        is_star,
      },
    )
  }

  /// Import/export names may be strings (`export {a as "b c"}`) and
  /// keywords are valid aliases.
  fn parse_import_export_name(&mut self) -> Atom {
    match self.lexer.token.kind {
      T::Str | T::Ident => {
        let name = self.lexer.token.value;
        self.lexer.next();
        name
      }
      _ if is_identifier(self.lexer.raw()) => {
        let name = self.lexer.token.value;
        self.lexer.next();
        name
      }
      _ => {
        let name = self.lexer.token.value;
        self.expect(T::Ident, "an identifier");
        name
      }
    }
  }

  fn parse_export_stmt(&mut self) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // export
    self.has_es_module_syntax = true;

    match self.lexer.token.kind {
      T::Var => self.parse_local(LocalKind::Var, true),
      T::Const => {
        if self.ts && self.peek_is_enum_keyword() {
          self.lexer.next();
          return self.parse_ts_enum(true);
        }
        self.parse_local(LocalKind::Const, true)
      }
      T::Function => self.parse_fn_stmt(true, false),
      T::Class => self.parse_class_stmt(true),
      T::Enum if self.ts => self.parse_ts_enum(true),
      T::Default => {
        self.lexer.next();
        let default_name = Atom::new(&format!("{}_default", module_stem(self.source)));
        let default_ref = self.declare(SymbolKind::Hoisted, default_name, loc);
        self.add_named_export(Atom::new("default"), default_ref, loc);

        let value = match self.lexer.token.kind {
          T::Function => {
            let fn_loc = self.loc();
            self.lexer.next();
            let is_generator = self.eat(T::Asterisk);
            let name = if self.lexer.token.kind == T::Ident {
              let name = self.lexer.token.value;
              let name_loc = self.loc();
              self.lexer.next();
              Some(self.declare(SymbolKind::Hoisted, name, name_loc))
            } else {
              None
            };
            let func = self.parse_fn_rest(fn_loc, false, is_generator);
            DefaultValue::Fn(Fn { name, ..func })
          }
          T::Class => {
            let class_loc = self.loc();
            let mut class = self.parse_class(class_loc, true);
            if self.unsupported(feature::CLASS_FIELD)
              && class.props.iter().any(|p| p.kind == ClassPropKind::Field)
            {
              let target = class.name.or(Some(default_ref));
              let extra = self.lower_class_fields_in_place(&mut class, target);
              self.pending_stmts.extend(extra);
            }
            DefaultValue::Class(class)
          }
          T::Ident if self.lexer.token.value.as_str() == "async" && self.peek_is_function_keyword() => {
            self.lexer.next();
            let fn_loc = self.loc();
            self.lexer.next();
            let is_generator = self.eat(T::Asterisk);
            let name = if self.lexer.token.kind == T::Ident {
              let name = self.lexer.token.value;
              let name_loc = self.loc();
              self.lexer.next();
              Some(self.declare(SymbolKind::Hoisted, name, name_loc))
            } else {
              None
            };
            let func = self.parse_fn_rest(fn_loc, true, is_generator);
            DefaultValue::Fn(Fn { name, ..func })
          }
          _ => {
            let value = self.parse_expr(expr::Level::Comma);
            self.semicolon();
            DefaultValue::Expr(value)
          }
        };
        self.ast.alloc_stmt(loc, SData::ExportDefault { default_ref, value })
      }
      T::Asterisk => {
        self.lexer.next();
        let alias = if self.is_contextual("as") {
          self.lexer.next();
          let name = self.parse_import_export_name();
          Some(name)
        } else {
          None
        };
        self.expect_contextual("from");
        let specifier = self.lexer.token.value;
        let range = self.lexer.token.range();
        self.expect(T::Str, "a module specifier string");
        self.semicolon();
        let record = self.add_import_record(ImportKind::Stmt, specifier, range);

        match alias {
          Some(name) => {
            // `export * as ns from` imports the namespace then exports it
            let ns_ref = self.new_symbol(name, SymbolKind::Import);
            self.ast.named_imports.insert(
              ns_ref,
              NamedImport {
                alias: Atom::new("*"),
                alias_loc: loc,
                import_record_index: record,
                is_exported: true,
              },
            );
            self.add_named_export(name, ns_ref, loc);
            self.ast.alloc_stmt(
              loc,
              SData::ExportStar {
                record,
                alias: Some((name, ns_ref)),
              },
            )
          }
          None => {
            self.ast.export_star_records.push(record);
            self.ast.alloc_stmt(loc, SData::ExportStar { record, alias: None })
          }
        }
      }
      T::OpenBrace => {
        self.lexer.next();
        let mut entries: Vec<(Atom, Loc, Atom, Loc)> = Vec::new();
        while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
          if self.ts && self.is_contextual("type") && !self.peek_is_from_or_comma_or_close() {
            // `export {type X}` is erased
            self.lexer.next();
            self.lexer.next();
            if self.is_contextual("as") {
              self.lexer.next();
              self.lexer.next();
            }
            if !self.eat(T::Comma) {
              break;
            }
            continue;
          }
          let name_loc = self.loc();
          let name = self.parse_import_export_name();
          let (alias, alias_loc) = if self.is_contextual("as") {
            self.lexer.next();
            let alias_loc = self.loc();
            let alias = self.parse_import_export_name();
            (alias, alias_loc)
          } else {
            (name, name_loc)
          };
          entries.push((name, name_loc, alias, alias_loc));
          if !self.eat(T::Comma) {
            break;
          }
        }
        self.expect(T::CloseBrace, "\"}\"");

        if self.is_contextual("from") {
          // Re-export: `export {a as b} from 'x'`
          self.lexer.next();
          let specifier = self.lexer.token.value;
          let range = self.lexer.token.range();
          self.expect(T::Str, "a module specifier string");
          self.semicolon();
          let record = self.add_import_record(ImportKind::Stmt, specifier, range);
          let mut items = Vec::new();
          for (name, name_loc, alias, alias_loc) in entries {
            let r = self.new_symbol(alias, SymbolKind::Import);
            self.ast.named_imports.insert(
              r,
              NamedImport {
                alias: name,
                alias_loc: name_loc,
                import_record_index: record,
                is_exported: true,
              },
            );
            self.add_named_export(alias, r, alias_loc);
            items.push(ClauseItem {
              alias,
              alias_loc,
              name_ref: r,
            });
          }
          self.ast.alloc_stmt(loc, SData::ExportNamed { items, record: Some(record) })
        } else {
          self.semicolon();
          let mut items = Vec::new();
          for (name, name_loc, alias, alias_loc) in entries {
            // The local name is a reference resolved like any identifier
            let old_scope = std::mem::replace(&mut self.scope, 0);
            let r = self.ref_symbol(name);
            self.scope = old_scope;
            let _ = name_loc;
            self.add_named_export(alias, r, alias_loc);
            items.push(ClauseItem {
              alias,
              alias_loc,
              name_ref: r,
            });
          }
          self.ast.alloc_stmt(loc, SData::ExportNamed { items, record: None })
        }
      }
      T::Ident => {
        let word = self.lexer.token.value.as_str();
        match word {
          "type" if self.ts => {
            // `export type ...` / `export type {..}` is erased
            self.skip_ts_export_type();
            self.ast.alloc_stmt(loc, SData::Empty)
          }
          "interface" if self.ts => {
            self.skip_ts_interface();
            self.ast.alloc_stmt(loc, SData::Empty)
          }
          "namespace" | "module" if self.ts => self.parse_ts_namespace(true),
          "abstract" if self.ts && self.peek_is_class_keyword() => {
            self.lexer.next();
            self.parse_class_stmt(true)
          }
          "declare" if self.ts => {
            self.skip_ts_declare();
            self.ast.alloc_stmt(loc, SData::Empty)
          }
          "let" => self.parse_local(LocalKind::Let, true),
          "async" if self.peek_is_function_keyword() => {
            self.lexer.next();
            self.parse_fn_stmt(true, true)
          }
          _ => {
            let range = self.lexer.token.range();
            self
              .log
              .add_error(Some(self.source), range, "Unexpected token after \"export\"".to_string());
            self.lexer.next();
            self.ast.alloc_stmt(loc, SData::Empty)
          }
        }
      }
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Unexpected token after \"export\"".to_string());
        self.lexer.next();
        self.ast.alloc_stmt(loc, SData::Empty)
      }
    }
  }

  fn expect_contextual(&mut self, word: &str) {
    if self.is_contextual(word) {
      self.lexer.next();
    } else {
      let range = self.lexer.token.range();
      self
        .log
        .add_error(Some(self.source), range, format!("Expected \"{}\"", word));
    }
  }

  fn import_namespace_name(&self, specifier: Atom) -> Atom {
    let text = specifier.as_str();
    let stem = text
      .rsplit('/')
      .next()
      .unwrap_or(text)
      .split('.')
      .next()
      .unwrap_or("module");
    let mut name = String::from("import_");
    for c in stem.chars() {
      if c.is_alphanumeric() || c == '_' || c == '$' {
        name.push(c);
      } else {
        name.push('_');
      }
    }
    Atom::new(&name)
  }

  // ------------------------------------------------------------------
  // Lookahead helpers (save/restore free: they only inspect bytes)
  // ------------------------------------------------------------------

  fn peek_is_colon(&self) -> bool {
    self.peek_first_byte() == Some(b':')
  }

  fn peek_is_binding_start(&self) -> bool {
    matches!(self.peek_first_byte(), Some(b) if b == b'{' || b == b'[' || b == b'_' || b == b'$' || b.is_ascii_alphabetic())
  }

  fn next_token_starts_binding(&self) -> bool {
    self.peek_is_binding_start()
  }

  fn peek_is_ident_no_newline(&self) -> bool {
    match self.peek_first_byte() {
      Some(b) => b == b'_' || b == b'$' || b.is_ascii_alphabetic(),
      None => false,
    }
  }

  fn peek_is_namespace_name(&self) -> bool {
    self.peek_is_ident_no_newline() || self.peek_first_byte() == Some(b'"') || self.peek_first_byte() == Some(b'\'')
  }

  fn peek_is_function_keyword(&self) -> bool {
    self.peek_word() == Some("function")
  }

  fn peek_is_class_keyword(&self) -> bool {
    self.peek_word() == Some("class")
  }

  fn peek_is_enum_keyword(&self) -> bool {
    self.peek_word() == Some("enum")
  }

  fn peek_is_from_or_comma(&self) -> bool {
    self.peek_word() == Some("from") || self.peek_first_byte() == Some(b',')
  }

  fn peek_is_from_or_comma_or_close(&self) -> bool {
    self.peek_word() == Some("from")
      || matches!(self.peek_first_byte(), Some(b',') | Some(b'}'))
      || self.peek_word() == Some("as")
  }

  fn peek_starts_declaration(&self) -> bool {
    matches!(
      self.peek_word(),
      Some("var") | Some("let") | Some("const") | Some("function") | Some("class") | Some("enum")
        | Some("namespace") | Some("module") | Some("global") | Some("abstract") | Some("async")
        | Some("interface") | Some("type")
    )
  }

  /// The first non-whitespace, non-comment byte after the current token.
  fn peek_first_byte(&self) -> Option<u8> {
    let bytes = self.source.contents.as_bytes();
    let mut i = self.lexer.token.end as usize;
    while i < bytes.len() {
      match bytes[i] {
        b' ' | b'\t' | b'\r' | b'\n' => i += 1,
        b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
          while i < bytes.len() && bytes[i] != b'\n' {
            i += 1;
          }
        }
        b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
          i += 2;
          while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
            i += 1;
          }
          i += 2;
        }
        b => return Some(b),
      }
    }
    None
  }

  /// The identifier word starting at the first peeked byte, if any.
  fn peek_word(&self) -> Option<&str> {
    let bytes = self.source.contents.as_bytes();
    let mut i = self.lexer.token.end as usize;
    while i < bytes.len() {
      match bytes[i] {
        b' ' | b'\t' | b'\r' | b'\n' => i += 1,
        b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
          while i < bytes.len() && bytes[i] != b'\n' {
            i += 1;
          }
        }
        b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
          i += 2;
          while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
            i += 1;
          }
          i += 2;
        }
        _ => break,
      }
    }
    let start = i;
    while i < bytes.len() {
      let b = bytes[i];
      if b == b'_' || b == b'$' || b.is_ascii_alphanumeric() {
        i += 1;
      } else {
        break;
      }
    }
    if i > start {
      Some(&self.source.contents[start..i])
    } else {
      None
    }
  }

  // ------------------------------------------------------------------
  // Parts
  // ------------------------------------------------------------------

  fn end_part(&mut self, stmts: Vec<StmtId>, can_be_removed_if_unused: bool) {
    let part_index = self.ast.parts.len() as u32;
    let declared_symbols = std::mem::take(&mut self.cur_decls);
    let symbol_uses = std::mem::take(&mut self.cur_uses);
    let import_record_indices = std::mem::take(&mut self.cur_records);
    for &decl in &declared_symbols {
      self
        .ast
        .top_level_symbols_to_parts
        .entry(decl)
        .or_default()
        .push(part_index);
    }
    self.ast.parts.push(Part {
      stmts,
      declared_symbols,
      symbol_uses,
      import_record_indices,
      can_be_removed_if_unused,
    });
  }

  // ------------------------------------------------------------------
  // Finalization: reference resolution and module kind
  // ------------------------------------------------------------------

  fn finalize(mut self) -> ParseResult {
    // Module-level temps become a leading part
    let temps = std::mem::take(&mut self.temp_stack[0]);
    if !temps.is_empty() {
      let stmt_vec = self.prepend_temp_decls(Vec::new(), temps.clone());
      self.cur_decls = temps;
      let stmts = stmt_vec;
      self.end_part(stmts, true);
    }

    // Resolve references through the scope tree
    let pending = std::mem::take(&mut self.pending_refs);
    let exports_atom = Atom::new("exports");
    let module_atom = Atom::new("module");
    let require_atom = Atom::new("require");
    let eval_atom = Atom::new("eval");

    for p in pending {
      if self.cancelled_refs.contains(&p.occurrence) {
        continue;
      }
      match self.lookup(p.scope, p.atom) {
        Some(decl) if decl != p.occurrence => {
          self.symbols[p.occurrence.inner as usize].link = Some(decl);
        }
        _ => {
          // Free variable
          if !self.has_es_module_syntax {
            if p.atom == exports_atom {
              self.symbols[p.occurrence.inner as usize].link = Some(self.ast.exports_ref);
              self.ast.uses_exports_ref = true;
              continue;
            }
            if p.atom == module_atom {
              self.symbols[p.occurrence.inner as usize].link = Some(self.ast.module_ref);
              self.ast.uses_module_ref = true;
              continue;
            }
          }
          if p.atom == eval_atom {
            self.has_direct_eval = true;
          }
          let unbound = match self.unbound.get(&p.atom) {
            Some(&r) => r,
            None => {
              let r = self.new_symbol(p.atom, SymbolKind::Unbound);
              self.symbols[r.inner as usize].must_not_be_renamed = true;
              self.unbound.insert(p.atom, r);
              r
            }
          };
          if unbound != p.occurrence {
            self.symbols[p.occurrence.inner as usize].link = Some(unbound);
          } else {
            self.symbols[p.occurrence.inner as usize].must_not_be_renamed = true;
          }
        }
      }
    }

    // Convert calls to the free `require` into require records
    let candidates = std::mem::take(&mut self.require_candidates);
    for c in candidates {
      let resolved_unbound = {
        let mut r = c.target;
        while let Some(link) = self.symbols[r.inner as usize].link {
          if link.source != self.source.index {
            break;
          }
          r = link;
        }
        self.symbols[r.inner as usize].kind == SymbolKind::Unbound
          && self.symbols[r.inner as usize].original_name == require_atom
      };
      if resolved_unbound {
        let index = self.ast.import_records.len() as u32;
        self.ast.import_records.push(ImportRecord {
          kind: c.kind,
          specifier: c.specifier,
          range: c.range,
          source_index: None,
          is_external: false,
          is_internal: false,
        });
        // Attribute the record to the part that contained the call
        if let Some(part) = self
          .ast
          .parts
          .iter_mut()
          .find(|part| part.symbol_uses.contains_key(&c.target))
        {
          part.import_record_indices.push(index);
        } else if let Some(part) = self.ast.parts.last_mut() {
          part.import_record_indices.push(index);
        }
        self.ast.exprs[c.expr.0 as usize].data = match c.kind {
          ImportKind::RequireResolve => EData::RequireResolve { record: index },
          _ => EData::Require { record: index },
        };
      }
    }

    // Module kind
    if self.has_es_module_syntax || self.top_level_await.is_some() {
      self.ast.exports_kind = ExportsKind::Esm;
    } else if self.ast.uses_exports_ref
      || self.ast.uses_module_ref
      || self
        .ast
        .import_records
        .iter()
        .any(|r| matches!(r.kind, ImportKind::Require | ImportKind::RequireResolve))
    {
      self.ast.exports_kind = ExportsKind::Cjs;
    } else {
      self.ast.exports_kind = ExportsKind::None;
    }
    self.ast.has_top_level_await = self.top_level_await.is_some();
    self.ast.has_direct_eval = self.has_direct_eval;

    ParseResult {
      ast: self.ast,
      symbols: self.symbols,
    }
  }

  // ------------------------------------------------------------------
  // Side-effect analysis (drives tree shaking)
  // ------------------------------------------------------------------

  fn stmt_can_be_removed_if_unused(&self, stmt: StmtId) -> bool {
    match &self.ast.stmt(stmt).data {
      SData::Empty | SData::Directive(_) => true,
      SData::Fn { .. } => true,
      SData::Class { class, .. } => self.class_can_be_removed_if_unused(class),
      SData::Local { decls, .. } => decls.iter().all(|d| {
        d.init.map_or(true, |init| self.expr_can_be_removed_if_unused(init))
          && binding_has_no_side_effects(&d.binding)
      }),
      SData::Import { items, default_ref, is_star, .. } => {
        // A bare `import 'x'` exists for its side effects
        !items.is_empty() || default_ref.is_some() || *is_star
      }
      SData::ExportNamed { .. } | SData::ExportStar { .. } => true,
      SData::ExportDefault { value, .. } => match value {
        DefaultValue::Expr(e) => self.expr_can_be_removed_if_unused(*e),
        DefaultValue::Fn(_) => true,
        DefaultValue::Class(class) => self.class_can_be_removed_if_unused(class),
      },
      SData::Expr(e) => self.expr_can_be_removed_if_unused(*e),
      SData::Block(stmts) => stmts.iter().all(|&s| self.stmt_can_be_removed_if_unused(s)),
      _ => false,
    }
  }

  fn class_can_be_removed_if_unused(&self, class: &Class) -> bool {
    if let Some(extends) = class.extends {
      if !self.expr_can_be_removed_if_unused(extends) {
        return false;
      }
    }
    class.props.iter().all(|p| {
      !p.is_computed
        && (p.kind != ClassPropKind::Field
          || !p.is_static
          || p.value.map_or(true, |v| self.expr_can_be_removed_if_unused(v)))
    })
  }

  fn expr_can_be_removed_if_unused(&self, e: ExprId) -> bool {
    match &self.ast.expr(e).data {
      EData::Missing
      | EData::Undefined
      | EData::Null
      | EData::This
      | EData::Bool(_)
      | EData::Number { .. }
      | EData::BigInt(_)
      | EData::String(_)
      | EData::Regex(_)
      | EData::Ident(_)
      | EData::ImportMeta
      | EData::NewTarget
      | EData::PrivateIdent(_) => true,
      EData::Function(_) | EData::Arrow { .. } => true,
      EData::Class(class) => self.class_can_be_removed_if_unused(class),
      EData::Array { items } => items.iter().all(|&item| self.expr_can_be_removed_if_unused(item)),
      EData::Object { props } => props.iter().all(|p| {
        p.kind != PropKind::Spread
          && (!p.is_computed || self.expr_can_be_removed_if_unused(p.key))
          && self.expr_can_be_removed_if_unused(p.value)
      }),
      EData::Template { tag: None, parts, .. } => {
        parts.iter().all(|part| self.expr_can_be_removed_if_unused(part.value))
      }
      EData::Unary { op, value } => {
        !matches!(op, UnOp::Delete | UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec)
          && self.expr_can_be_removed_if_unused(*value)
      }
      EData::Binary { op, left, right } => {
        !op.is_assign()
          && self.expr_can_be_removed_if_unused(*left)
          && self.expr_can_be_removed_if_unused(*right)
      }
      EData::Cond { test, yes, no } => {
        self.expr_can_be_removed_if_unused(*test)
          && self.expr_can_be_removed_if_unused(*yes)
          && self.expr_can_be_removed_if_unused(*no)
      }
      EData::Call { is_pure, args, .. } => {
        *is_pure && args.iter().all(|&a| self.expr_can_be_removed_if_unused(a))
      }
      _ => false,
    }
  }
}

fn binding_has_no_side_effects(binding: &Binding) -> bool {
  // Destructuring can invoke getters/iterators
  matches!(binding, Binding::Ident(_) | Binding::Missing)
}

pub fn collect_binding_refs(binding: &Binding, out: &mut Vec<Ref>) {
  match binding {
    Binding::Missing => {}
    Binding::Ident(r) => out.push(*r),
    Binding::Array { items, .. } => {
      for item in items {
        collect_binding_refs(&item.binding, out);
      }
    }
    Binding::Object { props, rest } => {
      for prop in props {
        collect_binding_refs(&prop.binding, out);
      }
      if let Some(rest) = rest {
        collect_binding_refs(rest, out);
      }
    }
  }
}

fn temp_name(counter: u32) -> String {
  let letters = b"abcdefghijklmnopqrstuvwxyz";
  let letter = letters[(counter % 26) as usize] as char;
  let cycle = counter / 26;
  if cycle == 0 {
    format!("_{}", letter)
  } else {
    format!("_{}{}", letter, cycle + 1)
  }
}

/// A sanitized identifier stem for a source path, used to name synthetic
/// symbols (`require_foo`, `foo_default`).
pub fn module_stem(source: &Source) -> String {
  let stem = source
    .path
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("module");
  let mut out = String::new();
  for c in stem.chars() {
    if c.is_alphanumeric() || c == '_' || c == '$' {
      out.push(c);
    } else {
      out.push('_');
    }
  }
  if out.is_empty() || out.chars().next().unwrap().is_ascii_digit() {
    out.insert(0, '_');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::Loader;
  use std::path::PathBuf;

  fn parse_with(contents: &str, loader: Loader) -> (ParseResult, Log) {
    let source = Source::new(
      1,
      PathBuf::from(match loader {
        Loader::Ts => "in.ts",
        Loader::Tsx => "in.tsx",
        Loader::Jsx => "in.jsx",
        _ => "in.js",
      }),
      "in".to_string(),
      contents.to_string(),
      loader,
    );
    let log = Log::new(0);
    let opts = ParseOptions::default();
    let result = Parser::new(&source, &log, &opts).parse();
    (result, log)
  }

  fn parse(contents: &str) -> ParseResult {
    let (result, log) = parse_with(contents, Loader::Js);
    assert!(!log.has_errors(), "parse errors: {:?}", log.take_msgs());
    result
  }

  #[test]
  fn test_import_records_and_named_imports() {
    let result = parse("import a, { b, c as d } from './x.js';\nimport * as ns from './y.js';\n");
    assert_eq!(result.ast.import_records.len(), 2);
    assert_eq!(result.ast.import_records[0].specifier.as_str(), "./x.js");
    assert_eq!(result.ast.import_records[0].kind, ImportKind::Stmt);
    // default + b + d + ns
    assert_eq!(result.ast.named_imports.len(), 4);
    let aliases: Vec<&str> = result
      .ast
      .named_imports
      .values()
      .map(|ni| ni.alias.as_str())
      .collect();
    assert!(aliases.contains(&"default"));
    assert!(aliases.contains(&"b"));
    assert!(aliases.contains(&"c"));
    assert!(aliases.contains(&"*"));
  }

  #[test]
  fn test_named_exports() {
    let result = parse("export const a = 1;\nexport function f() {}\nexport default 2;\nexport { a as renamed };\n");
    assert!(result.ast.named_exports.contains_key(&Atom::new("a")));
    assert!(result.ast.named_exports.contains_key(&Atom::new("f")));
    assert!(result.ast.named_exports.contains_key(&Atom::new("default")));
    assert!(result.ast.named_exports.contains_key(&Atom::new("renamed")));
    assert_eq!(result.ast.exports_kind, ExportsKind::Esm);
  }

  #[test]
  fn test_exports_kind_detection() {
    assert_eq!(parse("export {};").ast.exports_kind, ExportsKind::Esm);
    assert_eq!(parse("module.exports = 1;").ast.exports_kind, ExportsKind::Cjs);
    assert_eq!(parse("const x = require('./y.js');").ast.exports_kind, ExportsKind::Cjs);
    assert_eq!(parse("let x = 1;").ast.exports_kind, ExportsKind::None);
  }

  #[test]
  fn test_require_call_becomes_record() {
    let result = parse("const x = require('./y.js');\n");
    assert_eq!(result.ast.import_records.len(), 1);
    assert_eq!(result.ast.import_records[0].kind, ImportKind::Require);
    assert_eq!(result.ast.import_records[0].specifier.as_str(), "./y.js");
  }

  #[test]
  fn test_shadowed_require_is_not_a_record() {
    let result = parse("function f(require) { return require('./y.js'); }\n");
    assert!(result.ast.import_records.is_empty());
  }

  #[test]
  fn test_parts_track_declarations_and_uses() {
    let result = parse("function used() {}\nfunction caller() { used(); }\n");
    assert_eq!(result.ast.parts.len(), 2);
    let used_decl = result.ast.parts[0].declared_symbols[0];
    assert_eq!(
      result.ast.top_level_symbols_to_parts.get(&used_decl),
      Some(&vec![0])
    );
    // The second part records a use that resolves to the first declaration
    let caller_part = &result.ast.parts[1];
    let resolves = caller_part.symbol_uses.keys().any(|&use_ref| {
      let mut r = use_ref;
      while let Some(link) = result.symbols[r.inner as usize].link {
        r = link;
      }
      r == used_decl
    });
    assert!(resolves);
  }

  #[test]
  fn test_forward_references_resolve() {
    let result = parse("f();\nfunction f() {}\n");
    let decl = result.ast.parts[1].declared_symbols[0];
    let use_ref = *result.ast.parts[0].symbol_uses.keys().next().unwrap();
    let mut r = use_ref;
    while let Some(link) = result.symbols[r.inner as usize].link {
      r = link;
    }
    assert_eq!(r, decl);
  }

  #[test]
  fn test_unbound_references_must_keep_their_names() {
    let result = parse("console.log(1);\n");
    let unbound = result
      .symbols
      .iter()
      .find(|s| s.original_name.as_str() == "console" && s.link.is_none())
      .expect("console is a free symbol");
    assert!(unbound.must_not_be_renamed);
  }

  #[test]
  fn test_import_parts_are_removable_but_bare_imports_are_not() {
    let result = parse("import { a } from './x.js';\nimport './effect.js';\n");
    assert!(result.ast.parts[0].can_be_removed_if_unused);
    assert!(!result.ast.parts[1].can_be_removed_if_unused);
  }

  #[test]
  fn test_top_level_await_marks_module() {
    let result = parse("await fetch('/x');\n");
    assert!(result.ast.has_top_level_await);
    assert_eq!(result.ast.exports_kind, ExportsKind::Esm);
  }

  #[test]
  fn test_duplicate_export_reports_error() {
    let (_, log) = parse_with("export const a = 1;\nexport function a() {}\n", Loader::Js);
    assert!(log.has_errors());
  }

  #[test]
  fn test_ts_type_only_imports_are_erased() {
    let (result, log) = parse_with("import type { T } from './types';\nlet x = 1;\n", Loader::Ts);
    assert!(!log.has_errors(), "{:?}", log.take_msgs());
    assert!(result.ast.import_records.is_empty());
  }
}
