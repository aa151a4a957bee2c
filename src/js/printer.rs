//! JS printer: walks an AST and appends bytes to the output buffer, emitting
//! source-map segments in the same pass. No allocation-heavy formatting;
//! numbers and identifiers write directly into the buffer.

use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::lexer::is_identifier;
use crate::source::LineOffsetTable;
use crate::sourcemap::SourceMapBuilder;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
  pub minify_whitespace: bool,
  pub minify_syntax: bool,
  /// Escape code points >= 0x80 so the output is plain ASCII.
  pub ascii_only: bool,
}

/// Precedence used for parenthesization decisions. Mirrors the parser's
/// climbing levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum L {
  Lowest,
  Comma,
  Spread,
  Yield,
  Assign,
  Conditional,
  Nullish,
  LogicalOr,
  LogicalAnd,
  BitOr,
  BitXor,
  BitAnd,
  Equals,
  Compare,
  Shift,
  Add,
  Multiply,
  Exponentiation,
  Prefix,
  Postfix,
  New,
  Call,
  Member,
}

impl L {
  fn next(self) -> L {
    match self {
      L::Lowest => L::Comma,
      L::Comma => L::Spread,
      L::Spread => L::Yield,
      L::Yield => L::Assign,
      L::Assign => L::Conditional,
      L::Conditional => L::Nullish,
      L::Nullish => L::LogicalOr,
      L::LogicalOr => L::LogicalAnd,
      L::LogicalAnd => L::BitOr,
      L::BitOr => L::BitXor,
      L::BitXor => L::BitAnd,
      L::BitAnd => L::Equals,
      L::Equals => L::Compare,
      L::Compare => L::Shift,
      L::Shift => L::Add,
      L::Add => L::Multiply,
      L::Multiply => L::Exponentiation,
      L::Exponentiation => L::Prefix,
      L::Prefix => L::Postfix,
      L::Postfix => L::New,
      L::New => L::Call,
      L::Call => L::Member,
      L::Member => L::Member,
    }
  }
}

fn bin_op_level(op: BinOp) -> (L, bool) {
  use BinOp::*;
  match op {
    Comma => (L::Comma, false),
    Assign | AddAssign | SubAssign | MulAssign | DivAssign | RemAssign | PowAssign | ShlAssign
    | ShrAssign | UShrAssign | BitAndAssign | BitXorAssign | BitOrAssign | LogicalAndAssign
    | LogicalOrAssign | NullishAssign => (L::Assign, true),
    NullishCoalescing => (L::Nullish, false),
    LogicalOr => (L::LogicalOr, false),
    LogicalAnd => (L::LogicalAnd, false),
    BitOr => (L::BitOr, false),
    BitXor => (L::BitXor, false),
    BitAnd => (L::BitAnd, false),
    LooseEq | LooseNe | StrictEq | StrictNe => (L::Equals, false),
    Lt | Le | Gt | Ge | In | InstanceOf => (L::Compare, false),
    Shl | Shr | UShr => (L::Shift, false),
    Add | Sub => (L::Add, false),
    Mul | Div | Rem => (L::Multiply, false),
    Pow => (L::Exponentiation, true),
  }
}

/// Small flag set threaded down the leftmost spine of an expression so
/// `({}).x`, `(function(){})()`, and `new (a())` parenthesize correctly.
/// `assign_target` marks positions where rewriting a reference to a value
/// form (`undefined` to `void 0`) would not re-parse.
#[derive(Clone, Copy, Default)]
struct Flags {
  stmt_start: bool,
  forbid_call: bool,
  forbid_in: bool,
  assign_target: bool,
}

impl Flags {
  fn none() -> Flags {
    Flags::default()
  }
}

pub struct Printer<'a> {
  pub out: String,
  opts: PrintOptions,
  symbols: &'a SymbolMap,
  renames: &'a FxHashMap<Ref, String>,
  indent: usize,
  pending_semicolon: bool,
  line: u32,
  col: u32,
  last_byte: u8,
  map: Option<SourceMapBuilder>,

  // Current file context
  ast: Option<&'a JsAst>,
  table: Option<&'a LineOffsetTable>,
  source_index: u32,
}

impl<'a> Printer<'a> {
  pub fn new(opts: PrintOptions, symbols: &'a SymbolMap, renames: &'a FxHashMap<Ref, String>) -> Printer<'a> {
    Printer {
      out: String::new(),
      opts,
      symbols,
      renames,
      indent: 0,
      pending_semicolon: false,
      line: 0,
      col: 0,
      last_byte: 0,
      map: None,
      ast: None,
      table: None,
      source_index: 0,
    }
  }

  pub fn set_map(&mut self, map: SourceMapBuilder) {
    self.map = Some(map);
  }

  /// Raw prelude text (IIFE wrappers); keeps generated line/column tracking
  /// accurate for source maps.
  pub fn print_raw(&mut self, text: &str) {
    self.write(text);
  }

  pub fn take_map(&mut self) -> Option<SourceMapBuilder> {
    self.map.take()
  }

  /// Print a file's statements into the shared output buffer.
  pub fn print_file(&mut self, ast: &'a JsAst, table: &'a LineOffsetTable, source_index: u32, stmts: &[StmtId]) {
    self.ast = Some(ast);
    self.table = Some(table);
    self.source_index = source_index;
    for &stmt in stmts {
      self.print_stmt(stmt);
    }
  }

  pub fn finish(mut self) -> (String, Option<SourceMapBuilder>) {
    if self.pending_semicolon {
      self.pending_semicolon = false;
    }
    if !self.opts.minify_whitespace && !self.out.ends_with('\n') && !self.out.is_empty() {
      self.out.push('\n');
    }
    (self.out, self.map)
  }

  fn ast(&self) -> &'a JsAst {
    self.ast.expect("print_file sets the ast")
  }

  // ------------------------------------------------------------------
  // Low-level writing
  // ------------------------------------------------------------------

  fn write(&mut self, text: &str) {
    for b in text.bytes() {
      if b == b'\n' {
        self.line += 1;
        self.col = 0;
      } else {
        self.col += 1;
      }
    }
    if let Some(last) = text.bytes().last() {
      self.last_byte = last;
    }
    self.out.push_str(text);
  }

  /// Write an operator, inserting a space when the previous byte would
  /// otherwise glue into it (`a - -b` minified must not become `a--b`).
  fn write_op(&mut self, text: &str) {
    let first = text.as_bytes()[0];
    if (first == b'-' || first == b'+') && self.last_byte == first {
      self.write(" ");
    }
    self.write(text);
  }

  fn space(&mut self) {
    if !self.opts.minify_whitespace {
      self.write(" ");
    }
  }

  fn newline(&mut self) {
    if !self.opts.minify_whitespace {
      self.flush_semi();
      self.write("\n");
      let indent = "  ".repeat(self.indent);
      self.write(&indent);
    }
  }

  fn semi(&mut self) {
    if self.opts.minify_whitespace {
      self.pending_semicolon = true;
    } else {
      self.write(";");
    }
  }

  fn flush_semi(&mut self) {
    if self.pending_semicolon {
      self.pending_semicolon = false;
      self.write(";");
    }
  }

  fn add_mapping(&mut self, loc: crate::source::Loc) {
    let (line, col, gen_line, gen_col, source_index) = {
      let table = match self.table {
        Some(table) => table,
        None => return,
      };
      if self.map.is_none() {
        return;
      }
      let (line, col) = table.position(loc);
      (line as u32, col as u32, self.line, self.col, self.source_index)
    };
    if let Some(map) = self.map.as_mut() {
      map.add_mapping(source_index, line, col, gen_line, gen_col);
    }
  }

  // ------------------------------------------------------------------
  // Names
  // ------------------------------------------------------------------

  fn name_of(&self, r: Ref) -> String {
    let root = self.symbols.follow_readonly(r);
    match self.renames.get(&root) {
      Some(name) => name.clone(),
      None => self.symbols.get(root).original_name.as_str().to_string(),
    }
  }

  fn print_name(&mut self, r: Ref) {
    let name = self.name_of(r);
    self.print_identifier_text(&name);
  }

  fn print_identifier_text(&mut self, name: &str) {
    if self.opts.ascii_only && !name.is_ascii() {
      let mut escaped = String::with_capacity(name.len());
      for c in name.chars() {
        if c.is_ascii() {
          escaped.push(c);
        } else {
          let mut buf = [0u16; 2];
          for unit in c.encode_utf16(&mut buf) {
            escaped.push_str(&format!("\\u{:04X}", unit));
          }
        }
      }
      self.write(&escaped);
    } else {
      self.write(name);
    }
  }

  /// A reference whose root carries a namespace alias prints as
  /// `namespace.alias` (CJS interop).
  fn print_ident(&mut self, r: Ref) {
    let root = self.symbols.follow_readonly(r);
    let alias = self.symbols.get(root).namespace_alias.clone();
    if let Some(alias) = alias {
      self.print_name(alias.namespace_ref);
      if is_identifier(alias.alias.as_str()) {
        self.write(".");
        self.print_identifier_text(alias.alias.as_str());
      } else {
        self.write("[");
        self.print_string(alias.alias.as_str());
        self.write("]");
      }
      return;
    }
    self.print_name(r);
  }

  // ------------------------------------------------------------------
  // Statements
  // ------------------------------------------------------------------

  pub fn print_stmt(&mut self, stmt: StmtId) {
    self.flush_semi();
    let data = self.ast().stmt(stmt).data.clone();
    let loc = self.ast().stmt(stmt).loc;
    if !matches!(data, SData::Empty) {
      if !self.out.is_empty() {
        self.newline();
      }
      self.add_mapping(loc);
    }
    match data {
      SData::Empty => {}
      SData::Debugger => {
        self.write("debugger");
        self.semi();
      }
      SData::Directive(text) => {
        let text = text.as_str().to_string();
        self.print_string(&text);
        self.semi();
      }
      SData::Expr(e) => {
        self.print_expr(
          e,
          L::Lowest,
          Flags {
            stmt_start: true,
            ..Flags::none()
          },
        );
        self.semi();
      }
      SData::Block(stmts) => self.print_block(&stmts),
      SData::Local { kind, decls, is_export } => {
        if is_export {
          self.write("export ");
        }
        self.print_local(kind, &decls);
        self.semi();
      }
      SData::Fn { func, is_export } => {
        if is_export {
          self.write("export ");
        }
        self.print_fn_keyword_and_body(&func, true);
      }
      SData::Class { class, is_export } => {
        if is_export {
          self.write("export ");
        }
        self.print_class(&class);
      }
      SData::If { test, yes, no } => {
        // `if (x) return a; else return b;` shortens to `return x ? a : b;`
        // only when both branches are single returns, the one shape where
        // the rewrite cannot change behavior
        let collapsed = if self.opts.minify_syntax {
          match (self.single_return(yes), no.and_then(|no| self.single_return(no))) {
            (Some(yes_value), Some(no_value)) => Some((yes_value, no_value)),
            _ => None,
          }
        } else {
          None
        };
        match collapsed {
          Some((yes_value, no_value)) => {
            self.write("return ");
            self.print_expr(test, L::Conditional, Flags::none());
            self.space();
            self.write("?");
            self.space();
            match yes_value {
              Some(value) => self.print_expr(value, L::Yield, Flags::none()),
              None => self.write("void 0"),
            }
            self.space();
            self.write(":");
            self.space();
            match no_value {
              Some(value) => self.print_expr(value, L::Yield, Flags::none()),
              None => self.write("void 0"),
            }
            self.semi();
          }
          None => self.print_if(test, yes, no),
        }
      }
      SData::For { init, test, update, body } => {
        self.write("for");
        self.space();
        self.write("(");
        if let Some(init) = init {
          self.print_for_init(init);
        }
        self.write(";");
        if let Some(test) = test {
          self.space();
          self.print_expr(test, L::Lowest, Flags::none());
        }
        self.write(";");
        if let Some(update) = update {
          self.space();
          self.print_expr(update, L::Lowest, Flags::none());
        }
        self.write(")");
        self.print_body(body);
      }
      SData::ForIn { init, value, body } => {
        self.write("for");
        self.space();
        self.write("(");
        self.print_for_init(init);
        self.write(" in ");
        self.print_expr(value, L::Lowest, Flags::none());
        self.write(")");
        self.print_body(body);
      }
      SData::ForOf { is_await, init, value, body } => {
        self.write("for");
        if is_await {
          self.write(" await");
        }
        self.space();
        self.write("(");
        self.print_for_init(init);
        self.write(" of ");
        self.print_expr(value, L::Comma, Flags::none());
        self.write(")");
        self.print_body(body);
      }
      SData::While { test, body } => {
        self.write("while");
        self.space();
        self.write("(");
        self.print_expr(test, L::Lowest, Flags::none());
        self.write(")");
        self.print_body(body);
      }
      SData::DoWhile { body, test } => {
        self.write("do");
        match &self.ast().stmt(body).data {
          SData::Block(_) => {
            self.space();
            self.print_body_inline(body);
            self.space();
          }
          _ => {
            self.write(" ");
            self.print_body_inline(body);
            self.flush_semi();
            if self.last_byte != b';' {
              self.write(";");
            }
            self.space();
          }
        }
        self.write("while");
        self.space();
        self.write("(");
        self.print_expr(test, L::Lowest, Flags::none());
        self.write(")");
        self.semi();
      }
      SData::Try { body, catch, finally } => {
        self.write("try");
        self.space();
        self.print_block(&body);
        if let Some(catch) = catch {
          self.space();
          self.write("catch");
          if let Some(binding) = &catch.binding {
            self.space();
            self.write("(");
            self.print_binding(binding);
            self.write(")");
          }
          self.space();
          self.print_block(&catch.body);
        }
        if let Some(finally) = finally {
          self.space();
          self.write("finally");
          self.space();
          self.print_block(&finally);
        }
      }
      SData::Switch { test, cases } => {
        self.write("switch");
        self.space();
        self.write("(");
        self.print_expr(test, L::Lowest, Flags::none());
        self.write(")");
        self.space();
        self.write("{");
        self.indent += 1;
        for case in &cases {
          self.newline();
          match case.test {
            Some(test) => {
              self.write("case ");
              self.print_expr(test, L::Lowest, Flags::none());
              self.write(":");
            }
            None => self.write("default:"),
          }
          self.indent += 1;
          for &s in &case.body {
            self.print_stmt(s);
          }
          self.indent -= 1;
        }
        self.indent -= 1;
        self.pending_semicolon = false;
        self.newline();
        self.write("}");
      }
      SData::Return(value) => {
        self.write("return");
        if let Some(value) = value {
          self.write(" ");
          self.print_expr(value, L::Lowest, Flags::none());
        }
        self.semi();
      }
      SData::Throw(value) => {
        self.write("throw ");
        self.print_expr(value, L::Lowest, Flags::none());
        self.semi();
      }
      SData::Break(label) => {
        self.write("break");
        if let Some(label) = label {
          self.write(" ");
          self.print_identifier_text(label.as_str());
        }
        self.semi();
      }
      SData::Continue(label) => {
        self.write("continue");
        if let Some(label) = label {
          self.write(" ");
          self.print_identifier_text(label.as_str());
        }
        self.semi();
      }
      SData::Label { name, stmt } => {
        self.print_identifier_text(name.as_str());
        self.write(":");
        self.space();
        self.print_body_inline(stmt);
      }
      SData::Import {
        record,
        namespace_ref,
        default_ref,
        items,
        is_star,
      } => {
        let specifier = self.ast().import_records[record as usize].specifier;
        self.write("import");
        let mut need_comma = false;
        let has_bindings = default_ref.is_some() || is_star || !items.is_empty();
        if let Some(d) = default_ref {
          self.write(" ");
          self.print_name(d);
          need_comma = true;
        }
        if is_star {
          if need_comma {
            self.write(",");
            self.space();
          } else {
            self.write(" ");
          }
          self.write("* as ");
          self.print_name(namespace_ref);
        } else if !items.is_empty() {
          if need_comma {
            self.write(",");
            self.space();
          } else {
            self.space();
          }
          self.write("{");
          self.space();
          for (i, item) in items.iter().enumerate() {
            if i > 0 {
              self.write(",");
              self.space();
            }
            self.print_clause_item(item, true);
          }
          self.space();
          self.write("}");
        }
        if has_bindings {
          if self.opts.minify_whitespace && self.last_byte == b'}' {
            self.write("from");
          } else {
            self.write(" from ");
          }
        } else {
          self.write(" ");
        }
        let text = specifier.as_str().to_string();
        self.print_string(&text);
        self.semi();
      }
      SData::ExportNamed { items, record } => {
        self.write("export");
        self.space();
        self.write("{");
        self.space();
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          self.print_clause_item(item, false);
        }
        self.space();
        self.write("}");
        if let Some(record) = record {
          let specifier = self.ast().import_records[record as usize].specifier;
          self.write(" from ");
          let text = specifier.as_str().to_string();
          self.print_string(&text);
        }
        self.semi();
      }
      SData::ExportStar { record, alias } => {
        let specifier = self.ast().import_records[record as usize].specifier;
        self.write("export *");
        if let Some((name, _)) = alias {
          self.write(" as ");
          self.print_identifier_text(name.as_str());
        }
        self.write(" from ");
        let text = specifier.as_str().to_string();
        self.print_string(&text);
        self.semi();
      }
      SData::ExportDefault { default_ref, value } => {
        self.write("export default ");
        let _ = default_ref;
        match value {
          DefaultValue::Expr(e) => {
            self.print_expr(e, L::Comma, Flags::none());
            self.semi();
          }
          DefaultValue::Fn(func) => self.print_fn_keyword_and_body(&func, true),
          DefaultValue::Class(class) => self.print_class(&class),
        }
      }
    }
  }

  /// Import/export clause entry. For imports the local name prints with its
  /// alias (`alias as local`); exports print `local as alias`.
  fn print_clause_item(&mut self, item: &ClauseItem, is_import: bool) {
    let local = self.name_of(item.name_ref);
    let alias = item.alias.as_str();
    if is_import {
      if local == alias {
        self.print_identifier_text(alias);
      } else {
        self.print_identifier_text(alias);
        self.write(" as ");
        self.print_identifier_text(&local);
      }
    } else if local == alias {
      self.print_identifier_text(alias);
    } else {
      self.print_identifier_text(&local);
      self.write(" as ");
      if is_identifier(alias) {
        self.print_identifier_text(alias);
      } else {
        self.print_string(alias);
      }
    }
  }

  fn print_block(&mut self, stmts: &[StmtId]) {
    self.write("{");
    self.indent += 1;
    for &s in stmts {
      self.print_stmt(s);
    }
    self.indent -= 1;
    self.pending_semicolon = false;
    self.newline();
    self.write("}");
  }

  /// The body of an `if`/`for`/`while`: a block inline, anything else on the
  /// next line (or immediately when minified).
  fn print_body(&mut self, body: StmtId) {
    match &self.ast().stmt(body).data {
      SData::Block(_) => {
        self.space();
        self.print_body_inline(body);
      }
      SData::Empty => self.write(";"),
      _ => {
        if self.opts.minify_whitespace {
          self.print_body_inline(body);
        } else {
          self.indent += 1;
          self.print_stmt(body);
          self.indent -= 1;
        }
      }
    }
  }

  /// Print a statement on the current line (used after `do`, labels, `else`,
  /// and minified bodies). Non-block statements borrow the minified printer
  /// so no newline is emitted before them.
  fn print_body_inline(&mut self, body: StmtId) {
    match self.ast().stmt(body).data.clone() {
      SData::Block(stmts) => self.print_block(&stmts),
      _ => {
        let was = self.opts.minify_whitespace;
        self.opts.minify_whitespace = true;
        self.print_stmt(body);
        self.flush_semi();
        self.opts.minify_whitespace = was;
      }
    }
  }

  /// The return value when a statement is exactly one `return` (directly or
  /// as a single-statement block); `Some(None)` is a value-less return.
  fn single_return(&self, stmt: StmtId) -> Option<Option<ExprId>> {
    match &self.ast().stmt(stmt).data {
      SData::Return(value) => Some(*value),
      SData::Block(stmts) if stmts.len() == 1 => match &self.ast().stmt(stmts[0]).data {
        SData::Return(value) => Some(*value),
        _ => None,
      },
      _ => None,
    }
  }

  fn print_if(&mut self, test: ExprId, yes: StmtId, no: Option<StmtId>) {
    self.write("if");
    self.space();
    self.write("(");
    self.print_expr(test, L::Lowest, Flags::none());
    self.write(")");
    let yes_is_block = matches!(self.ast().stmt(yes).data, SData::Block(_));
    self.print_body(yes);
    if let Some(no) = no {
      self.flush_semi();
      if self.last_byte != b'}' && self.last_byte != b';' {
        self.write(";");
      }
      if yes_is_block {
        self.space();
      } else {
        self.newline();
      }
      self.write("else");
      if let SData::If { test, yes, no } = self.ast().stmt(no).data.clone() {
        self.write(" ");
        self.print_if(test, yes, no);
      } else {
        match &self.ast().stmt(no).data {
          SData::Block(_) => {
            self.space();
            self.print_body_inline(no);
          }
          _ => {
            self.write(" ");
            self.print_body_inline(no);
          }
        }
      }
    }
  }

  fn print_local(&mut self, kind: LocalKind, decls: &[Decl]) {
    self.write(kind.text());
    self.write(" ");
    for (i, decl) in decls.iter().enumerate() {
      if i > 0 {
        self.write(",");
        self.space();
      }
      self.print_binding(&decl.binding);
      if let Some(init) = decl.init {
        self.space();
        self.write("=");
        self.space();
        self.print_expr(init, L::Comma, Flags::none());
      }
    }
  }

  fn print_for_init(&mut self, init: StmtId) {
    match self.ast().stmt(init).data.clone() {
      SData::Local { kind, decls, .. } => self.print_local(kind, &decls),
      SData::Expr(e) => self.print_expr(
        e,
        L::Lowest,
        Flags {
          forbid_in: true,
          ..Flags::none()
        },
      ),
      _ => {}
    }
  }

  fn print_binding(&mut self, binding: &Binding) {
    match binding {
      Binding::Missing => {}
      Binding::Ident(r) => self.print_name(*r),
      Binding::Array { items, has_rest } => {
        self.write("[");
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          let is_rest = *has_rest && i == items.len() - 1;
          if is_rest {
            self.write("...");
          }
          self.print_binding(&item.binding);
          if let Some(default) = item.default {
            self.space();
            self.write("=");
            self.space();
            self.print_expr(default, L::Comma, Flags::none());
          }
        }
        self.write("]");
      }
      Binding::Object { props, rest } => {
        self.write("{");
        self.space();
        let mut first = true;
        for prop in props {
          if !first {
            self.write(",");
            self.space();
          }
          first = false;
          self.print_object_binding_prop(prop);
        }
        if let Some(rest) = rest {
          if !first {
            self.write(",");
            self.space();
          }
          self.write("...");
          self.print_binding(rest);
        }
        self.space();
        self.write("}");
      }
    }
  }

  fn print_object_binding_prop(&mut self, prop: &ObjectBindingProp) {
    let mut shorthand = false;
    if !prop.is_computed {
      if let (EData::String(key), Binding::Ident(r)) = (&self.ast().expr(prop.key).data, &prop.binding) {
        if self.name_of(*r) == key.as_str() {
          shorthand = true;
        }
      }
    }
    if shorthand {
      self.print_binding(&prop.binding);
    } else {
      if prop.is_computed {
        self.write("[");
        self.print_expr(prop.key, L::Comma, Flags::none());
        self.write("]");
      } else {
        self.print_property_key(prop.key);
      }
      self.write(":");
      self.space();
      self.print_binding(&prop.binding);
    }
    if let Some(default) = prop.default {
      self.space();
      self.write("=");
      self.space();
      self.print_expr(default, L::Comma, Flags::none());
    }
  }

  fn print_property_key(&mut self, key: ExprId) {
    match self.ast().expr(key).data.clone() {
      EData::String(s) => {
        if is_identifier(s.as_str()) && (!self.opts.ascii_only || s.as_str().is_ascii()) {
          self.print_identifier_text(s.as_str());
        } else {
          let text = s.as_str().to_string();
          self.print_string(&text);
        }
      }
      EData::Number { value, raw } => self.print_number(value, raw),
      EData::PrivateIdent(name) => self.print_identifier_text(name.as_str()),
      _ => self.print_expr(key, L::Comma, Flags::none()),
    }
  }

  // ------------------------------------------------------------------
  // Functions and classes
  // ------------------------------------------------------------------

  fn print_fn_keyword_and_body(&mut self, func: &Fn, _is_stmt: bool) {
    if func.is_async {
      self.write("async ");
    }
    self.write("function");
    if func.is_generator {
      self.write("*");
    }
    if let Some(name) = func.name {
      self.write(" ");
      self.print_name(name);
    } else if !func.is_generator {
      self.space();
    }
    self.print_fn_args_and_body(func);
  }

  fn print_fn_args_and_body(&mut self, func: &Fn) {
    self.write("(");
    for (i, arg) in func.args.iter().enumerate() {
      if i > 0 {
        self.write(",");
        self.space();
      }
      if func.has_rest_arg && i == func.args.len() - 1 {
        self.write("...");
      }
      self.print_binding(&arg.binding);
      if let Some(default) = arg.default {
        self.space();
        self.write("=");
        self.space();
        self.print_expr(default, L::Comma, Flags::none());
      }
    }
    self.write(")");
    self.space();
    self.print_block(&func.body);
  }

  fn print_class(&mut self, class: &Class) {
    self.write("class");
    if let Some(name) = class.name {
      self.write(" ");
      self.print_name(name);
    }
    if let Some(extends) = class.extends {
      self.write(" extends ");
      self.print_expr(extends, L::New, Flags::none());
    }
    self.space();
    self.write("{");
    self.indent += 1;
    for prop in &class.props {
      self.newline();
      self.print_class_prop(prop);
    }
    self.indent -= 1;
    self.pending_semicolon = false;
    self.newline();
    self.write("}");
  }

  fn print_class_prop(&mut self, prop: &ClassProp) {
    if prop.kind == ClassPropKind::StaticBlock {
      self.write("static");
      self.space();
      if let Some(value) = prop.value {
        if let EData::Function(func) = self.ast().expr(value).data.clone() {
          self.print_block(&func.body);
        }
      }
      return;
    }

    if prop.is_static {
      self.write("static ");
    }
    match prop.kind {
      ClassPropKind::Get => self.write("get "),
      ClassPropKind::Set => self.write("set "),
      _ => {}
    }

    if prop.kind == ClassPropKind::Field {
      if prop.is_computed {
        self.write("[");
        self.print_expr(prop.key, L::Comma, Flags::none());
        self.write("]");
      } else {
        self.print_property_key(prop.key);
      }
      if let Some(value) = prop.value {
        self.space();
        self.write("=");
        self.space();
        self.print_expr(value, L::Comma, Flags::none());
      }
      self.write(";");
      return;
    }

    // Method / accessor
    let func = match prop.value {
      Some(value) => match self.ast().expr(value).data.clone() {
        EData::Function(func) => func,
        _ => return,
      },
      None => return,
    };
    if func.is_async {
      self.write("async ");
    }
    if func.is_generator {
      self.write("*");
    }
    if prop.is_computed {
      self.write("[");
      self.print_expr(prop.key, L::Comma, Flags::none());
      self.write("]");
    } else {
      self.print_property_key(prop.key);
    }
    self.print_fn_args_and_body(&func);
  }

  // ------------------------------------------------------------------
  // Expressions
  // ------------------------------------------------------------------

  fn expr_level(&self, e: ExprId) -> L {
    match &self.ast().expr(e).data {
      EData::Binary { op, .. } => bin_op_level(*op).0,
      EData::Cond { .. } => L::Conditional,
      EData::Arrow { .. } => L::Assign,
      EData::Yield { .. } => L::Yield,
      EData::Await(_) => L::Prefix,
      EData::Unary { op, .. } => {
        if op.is_prefix() {
          L::Prefix
        } else {
          L::Postfix
        }
      }
      EData::Call { .. } | EData::DynamicImport { .. } | EData::Require { .. } | EData::RequireResolve { .. } => {
        L::Call
      }
      EData::New { args, .. } => {
        if args.is_empty() {
          L::New
        } else {
          L::Member
        }
      }
      EData::Spread(_) => L::Spread,
      _ => L::Member,
    }
  }

  fn print_expr(&mut self, e: ExprId, level: L, flags: Flags) {
    let data = self.ast().expr(e).data.clone();
    let loc = self.ast().expr(e).loc;

    let mut needs_parens = self.expr_level(e) < level;
    if flags.forbid_call && matches!(data, EData::Call { .. }) {
      needs_parens = true;
    }
    if flags.forbid_in {
      if let EData::Binary { op: BinOp::In, .. } = data {
        needs_parens = true;
      }
    }
    if flags.stmt_start
      && matches!(
        data,
        EData::Object { .. } | EData::Function(_) | EData::Class(_)
      )
    {
      needs_parens = true;
    }
    let inner_flags = if needs_parens { Flags::none() } else { flags };

    if needs_parens {
      self.write("(");
    }
    self.add_mapping(loc);

    match data {
      EData::Missing => {}
      EData::Undefined => {
        // Synthesized by lowerings; `void 0` is immune to shadowing
        self.write_op("void 0");
      }
      EData::Null => self.write("null"),
      EData::This => self.write("this"),
      EData::SuperE => self.write("super"),
      EData::NewTarget => self.write("new.target"),
      EData::ImportMeta => self.write("import.meta"),
      EData::Bool(value) => {
        if self.opts.minify_syntax {
          self.write(if value { "!0" } else { "!1" });
        } else {
          self.write(if value { "true" } else { "false" });
        }
      }
      EData::Number { value, raw } => self.print_number(value, raw),
      EData::BigInt(raw) => self.write(raw.as_str()),
      EData::String(s) => {
        let text = s.as_str().to_string();
        self.print_string(&text);
      }
      EData::Regex(raw) => {
        // `/regex/` after a keyword or another slash needs a space
        if self.last_byte == b'/' {
          self.write(" ");
        }
        self.write(raw.as_str());
      }
      EData::Template { tag, head_raw, parts } => {
        if let Some(tag) = tag {
          self.print_expr(tag, L::Postfix, inner_flags);
        }
        self.write("`");
        self.write(head_raw.as_str());
        for part in &parts {
          self.write("${");
          self.print_expr(part.value, L::Lowest, Flags::none());
          self.write("}");
          self.write(part.raw.as_str());
        }
        self.write("`");
      }
      EData::Array { items } => {
        self.write("[");
        for (i, &item) in items.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          if !matches!(self.ast().expr(item).data, EData::Missing) {
            // An array literal can be a destructuring assignment target;
            // its elements inherit that position
            self.print_expr(
              item,
              L::Spread,
              Flags {
                assign_target: inner_flags.assign_target,
                ..Flags::none()
              },
            );
          } else if i == items.len() - 1 {
            // A trailing hole needs an extra comma to survive reparsing
            self.write(",");
          }
        }
        self.write("]");
      }
      EData::Object { props } => {
        self.write("{");
        self.space();
        for (i, prop) in props.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          self.print_object_prop(prop);
        }
        self.space();
        self.write("}");
      }
      EData::Ident(r) => {
        // The global `undefined` shortens to `void 0`, but never a shadowed
        // binding and never an assignment target
        if self.opts.minify_syntax && !inner_flags.assign_target && self.is_global_undefined(r) {
          self.write_op("void 0");
        } else {
          self.print_ident(r);
        }
      }
      EData::PrivateIdent(name) => self.print_identifier_text(name.as_str()),
      EData::Dot { target, name, optional } => {
        self.print_expr(target, L::Call, inner_flags);
        self.write(if optional { "?." } else { "." });
        self.print_identifier_text(name.as_str());
      }
      EData::Index { target, index, optional } => {
        self.print_expr(target, L::Call, inner_flags);
        if optional {
          self.write("?.");
        }
        self.write("[");
        self.print_expr(index, L::Lowest, Flags::none());
        self.write("]");
      }
      EData::Call { target, args, optional, .. } => {
        self.print_expr(target, L::Call, inner_flags);
        if optional {
          self.write("?.");
        }
        self.write("(");
        for (i, &arg) in args.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          self.print_expr(arg, L::Spread, Flags::none());
        }
        self.write(")");
      }
      EData::New { target, args } => {
        self.write("new ");
        self.print_expr(
          target,
          L::Member,
          Flags {
            forbid_call: true,
            ..Flags::none()
          },
        );
        self.write("(");
        for (i, &arg) in args.iter().enumerate() {
          if i > 0 {
            self.write(",");
            self.space();
          }
          self.print_expr(arg, L::Spread, Flags::none());
        }
        self.write(")");
      }
      EData::Unary { op, value } => {
        let is_update = matches!(op, UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec);
        if op.is_prefix() {
          if op.is_keyword() {
            self.write(op.text());
            self.write(" ");
          } else {
            self.write_op(op.text());
          }
          self.print_expr(
            value,
            L::Prefix,
            Flags {
              assign_target: is_update,
              ..Flags::none()
            },
          );
        } else {
          self.print_expr(
            value,
            L::Postfix,
            Flags {
              assign_target: is_update,
              ..inner_flags
            },
          );
          self.write_op(op.text());
        }
      }
      EData::Binary { op, left, right } => {
        let (op_level, right_assoc) = bin_op_level(op);
        let (left_level, right_level) = if right_assoc {
          (op_level.next(), op_level)
        } else {
          (op_level, op_level.next())
        };
        // `??` cannot mix with `||`/`&&` without parens
        let force_left = op == BinOp::NullishCoalescing && self.is_logical_binary(left);
        let force_right = op == BinOp::NullishCoalescing && self.is_logical_binary(right);
        // A unary left operand of `**` must be parenthesized
        let force_pow = op == BinOp::Pow && matches!(self.ast().expr(left).data, EData::Unary { .. });

        if force_left || force_pow {
          self.write("(");
          self.print_expr(left, L::Lowest, Flags::none());
          self.write(")");
        } else {
          self.print_expr(
            left,
            left_level,
            Flags {
              stmt_start: inner_flags.stmt_start,
              forbid_in: inner_flags.forbid_in,
              forbid_call: false,
              assign_target: op.is_assign(),
            },
          );
        }
        if op == BinOp::Comma {
          self.write(",");
          self.space();
        } else if op.is_keyword() {
          self.write(" ");
          self.write(op.text());
          self.write(" ");
        } else {
          self.space();
          self.write_op(op.text());
          self.space();
        }
        if force_right {
          self.write("(");
          self.print_expr(right, L::Lowest, Flags::none());
          self.write(")");
        } else {
          self.print_expr(
            right,
            right_level,
            Flags {
              forbid_in: inner_flags.forbid_in,
              ..Flags::none()
            },
          );
        }
      }
      EData::Cond { test, yes, no } => {
        self.print_expr(
          test,
          L::Conditional,
          Flags {
            stmt_start: inner_flags.stmt_start,
            forbid_in: inner_flags.forbid_in,
            ..Flags::none()
          },
        );
        self.space();
        self.write("?");
        self.space();
        self.print_expr(yes, L::Yield, Flags::none());
        self.space();
        self.write(":");
        self.space();
        self.print_expr(no, L::Yield, Flags::none());
      }
      EData::Arrow {
        args,
        has_rest_arg,
        prefer_expr,
        body,
        is_async,
      } => {
        if is_async {
          self.write("async ");
        }
        let simple = args.len() == 1
          && !has_rest_arg
          && args[0].default.is_none()
          && matches!(args[0].binding, Binding::Ident(_));
        if simple {
          self.print_binding(&args[0].binding);
        } else {
          self.write("(");
          for (i, arg) in args.iter().enumerate() {
            if i > 0 {
              self.write(",");
              self.space();
            }
            if has_rest_arg && i == args.len() - 1 {
              self.write("...");
            }
            self.print_binding(&arg.binding);
            if let Some(default) = arg.default {
              self.space();
              self.write("=");
              self.space();
              self.print_expr(default, L::Comma, Flags::none());
            }
          }
          self.write(")");
        }
        self.space();
        self.write("=>");
        self.space();
        if prefer_expr && body.len() == 1 {
          if let SData::Return(Some(value)) = self.ast().stmt(body[0]).data {
            let wrap = matches!(self.ast().expr(value).data, EData::Object { .. });
            if wrap {
              self.write("(");
            }
            self.print_expr(value, L::Comma, Flags::none());
            if wrap {
              self.write(")");
            }
            if needs_parens {
              self.write(")");
            }
            return;
          }
        }
        self.print_block(&body);
      }
      EData::Function(func) => self.print_fn_keyword_and_body(&func, false),
      EData::Class(class) => self.print_class(&class),
      EData::Spread(value) => {
        self.write("...");
        self.print_expr(value, L::Comma, Flags::none());
      }
      EData::Await(value) => {
        self.write("await ");
        self.print_expr(value, L::Prefix, Flags::none());
      }
      EData::Yield { value, is_star } => {
        self.write("yield");
        if is_star {
          self.write("*");
        }
        if let Some(value) = value {
          self.write(" ");
          self.print_expr(value, L::Yield, Flags::none());
        }
      }
      EData::DynamicImport { record, expr } => {
        self.write("import(");
        match (record, expr) {
          (Some(record), _) => {
            let specifier = self.ast().import_records[record as usize].specifier;
            let text = specifier.as_str().to_string();
            self.print_string(&text);
          }
          (None, Some(expr)) => self.print_expr(expr, L::Comma, Flags::none()),
          (None, None) => {}
        }
        self.write(")");
      }
      EData::Require { record } => {
        let specifier = self.ast().import_records[record as usize].specifier;
        self.write("require(");
        let text = specifier.as_str().to_string();
        self.print_string(&text);
        self.write(")");
      }
      EData::RequireResolve { record } => {
        let specifier = self.ast().import_records[record as usize].specifier;
        self.write("require.resolve(");
        let text = specifier.as_str().to_string();
        self.print_string(&text);
        self.write(")");
      }
    }

    if needs_parens {
      self.write(")");
    }
  }

  /// True when a reference resolves to the global `undefined` (an unbound
  /// symbol, not a local binding or interop alias).
  fn is_global_undefined(&self, r: Ref) -> bool {
    let root = self.symbols.follow_readonly(r);
    let symbol = self.symbols.get(root);
    matches!(symbol.kind, crate::js::ast::SymbolKind::Unbound)
      && symbol.namespace_alias.is_none()
      && symbol.original_name.as_str() == "undefined"
  }

  fn is_logical_binary(&self, e: ExprId) -> bool {
    matches!(
      self.ast().expr(e).data,
      EData::Binary {
        op: BinOp::LogicalAnd | BinOp::LogicalOr,
        ..
      }
    )
  }

  fn print_object_prop(&mut self, prop: &Prop) {
    match prop.kind {
      PropKind::Spread => {
        self.write("...");
        self.print_expr(prop.value, L::Comma, Flags::none());
        return;
      }
      PropKind::Get => self.write("get "),
      PropKind::Set => self.write("set "),
      PropKind::Normal => {}
    }

    // Methods print their function value inline
    let as_method = matches!(prop.kind, PropKind::Get | PropKind::Set)
      || (prop.kind == PropKind::Normal && self.prop_is_method(prop));
    if as_method {
      if let EData::Function(func) = self.ast().expr(prop.value).data.clone() {
        if func.is_async {
          self.write("async ");
        }
        if func.is_generator {
          self.write("*");
        }
        if prop.is_computed {
          self.write("[");
          self.print_expr(prop.key, L::Comma, Flags::none());
          self.write("]");
        } else {
          self.print_property_key(prop.key);
        }
        self.print_fn_args_and_body(&func);
        return;
      }
    }

    // Shorthand survives only when the value still prints as the key
    if prop.is_shorthand && !prop.is_computed {
      if let (EData::String(key), EData::Ident(r)) =
        (&self.ast().expr(prop.key).data, &self.ast().expr(prop.value).data)
      {
        let root = self.symbols.follow_readonly(*r);
        if self.symbols.get(root).namespace_alias.is_none() && self.name_of(*r) == key.as_str() {
          self.print_ident(*r);
          return;
        }
      }
    }

    if prop.is_computed {
      self.write("[");
      self.print_expr(prop.key, L::Comma, Flags::none());
      self.write("]");
    } else {
      self.print_property_key(prop.key);
    }
    self.write(":");
    self.space();
    self.print_expr(prop.value, L::Comma, Flags::none());
  }

  fn prop_is_method(&self, prop: &Prop) -> bool {
    // Heuristic: function-valued props parsed from method syntax have no
    // name; printing them as methods is equivalent either way
    match &self.ast().expr(prop.value).data {
      EData::Function(func) => func.name.is_none(),
      _ => false,
    }
  }

  // ------------------------------------------------------------------
  // Literals
  // ------------------------------------------------------------------

  fn print_number(&mut self, value: f64, raw: Option<Atom>) {
    if let Some(raw) = raw {
      if !self.opts.minify_syntax {
        self.write_op(raw.as_str());
        return;
      }
    }
    let text = format_number(value, self.opts.minify_syntax);
    self.write_op(&text);
  }

  pub fn print_string(&mut self, text: &str) {
    let double_count = text.matches('"').count();
    let single_count = text.matches('\'').count();
    let quote = if single_count < double_count { '\'' } else { '"' };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
      match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{8}' => out.push_str("\\b"),
        '\u{b}' => out.push_str("\\v"),
        '\u{c}' => out.push_str("\\f"),
        '\0' => out.push_str("\\0"),
        '\u{2028}' => out.push_str("\\u2028"),
        '\u{2029}' => out.push_str("\\u2029"),
        c if c == quote => {
          out.push('\\');
          out.push(c);
        }
        c if (c as u32) < 0x20 => {
          out.push_str(&format!("\\x{:02X}", c as u32));
        }
        c if (c as u32) >= 0x80 && self.opts.ascii_only => {
          let mut buf = [0u16; 2];
          for unit in c.encode_utf16(&mut buf) {
            out.push_str(&format!("\\u{:04X}", unit));
          }
        }
        c => out.push(c),
      }
    }
    out.push(quote);
    self.write(&out);
  }
}

/// Shortest-roundtrip number formatting, with minify tweaks (`.5`, `-.5`).
pub fn format_number(value: f64, minify: bool) -> String {
  if value.is_nan() {
    return "NaN".to_string();
  }
  if value.is_infinite() {
    return if value < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
  }
  if value == 0.0 {
    return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
  }
  let mut text = format!("{}", value);
  if minify {
    if let Some(stripped) = text.strip_prefix("0.") {
      text = format!(".{}", stripped);
    } else if let Some(stripped) = text.strip_prefix("-0.") {
      text = format!("-.{}", stripped);
    }
  }
  text
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_number() {
    assert_eq!(format_number(5.0, false), "5");
    assert_eq!(format_number(0.5, false), "0.5");
    assert_eq!(format_number(0.5, true), ".5");
    assert_eq!(format_number(-0.5, true), "-.5");
    assert_eq!(format_number(0.0, false), "0");
    assert_eq!(format_number(f64::NAN, false), "NaN");
  }
}
